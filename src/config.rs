use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::formula::{FormulaError, WeightedFormula};
use crate::models::PrefixCategory;

/// Rating floor and ceiling of the instruments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            floor: 1.0,
            ceiling: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub categories: Vec<PrefixCategory>,
    /// Question id to prompt text, used for display only.
    #[serde(default)]
    pub questions: BTreeMap<String, String>,
}

impl FamilyConfig {
    pub fn prompt<'a>(&'a self, question_id: &'a str) -> &'a str {
        self.questions
            .get(question_id)
            .map(String::as_str)
            .unwrap_or(question_id)
    }
}

/// A named meta formula, parsed once when the configuration is built. A
/// syntax error is kept alongside the source text and reported per formula
/// instead of rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetaFormulaEntry", into = "MetaFormulaEntry")]
pub struct MetaFormula {
    pub name: String,
    pub source: String,
    pub parsed: Result<WeightedFormula, FormulaError>,
}

impl MetaFormula {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            parsed: WeightedFormula::parse(name, source),
        }
    }
}

/// Written form of a `[[meta]]` entry.
#[derive(Serialize, Deserialize)]
struct MetaFormulaEntry {
    name: String,
    formula: String,
}

impl From<MetaFormulaEntry> for MetaFormula {
    fn from(entry: MetaFormulaEntry) -> Self {
        MetaFormula::new(&entry.name, &entry.formula)
    }
}

impl From<MetaFormula> for MetaFormulaEntry {
    fn from(meta: MetaFormula) -> Self {
        MetaFormulaEntry {
            name: meta.name,
            formula: meta.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub scale: Scale,
    pub families: Vec<FamilyConfig>,
    pub meta: Vec<MetaFormula>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            analysis_dir: PathBuf::from("analysis"),
            scale: Scale::default(),
            families: vec![
                family(
                    "hsc",
                    "HSC",
                    &[
                        ("s1", "Management methods"),
                        ("s2", "Product/service portfolio"),
                        ("s3", "Company positioning"),
                        ("s4", "Strategy"),
                    ],
                ),
                family("dms", "DMS", &[]),
                family("ohix", "OHIx", &[]),
            ],
            meta: [
                ("Strategy and Vision", "0.40 * hsc_s1_1 + 0.60 * dms_s4_4"),
                ("Market Positioning", "1.0 * hsc_s2_1"),
                ("Portfolio (Products/Services)", "1.0 * hsc_s3_1"),
                ("Technology and Innovation", "1.0 * dms_s2_1"),
                ("Data and Analytics", "1.0 * dms_s3_1"),
                ("Operations and Processes", "1.0 * hsc_s4_2"),
                ("Infrastructure and Resources", "1.0 * dms_s5_1"),
                ("People and Organizational Culture", "1.0 * ohix_s4_1"),
                ("Harmony and Leadership", "1.0 * ohix_s5_5"),
            ]
            .iter()
            .map(|(name, formula)| MetaFormula::new(name, formula))
            .collect(),
        }
    }
}

fn family(name: &str, label: &str, categories: &[(&str, &str)]) -> FamilyConfig {
    FamilyConfig {
        name: name.to_string(),
        label: label.to_string(),
        categories: categories
            .iter()
            .map(|(prefix, name)| PrefixCategory {
                name: name.to_string(),
                prefix: prefix.to_string(),
            })
            .collect(),
        questions: BTreeMap::new(),
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.scale.floor < self.scale.ceiling) {
            bail!(
                "scale floor {} must be below ceiling {}",
                self.scale.floor,
                self.scale.ceiling
            );
        }

        let mut seen = HashSet::new();
        for family in &self.families {
            let valid = family
                .name
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
                && family
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                bail!("invalid survey family name `{}`", family.name);
            }
            if !seen.insert(family.name.as_str()) {
                bail!("survey family `{}` declared twice", family.name);
            }
        }

        Ok(())
    }

    pub fn family(&self, name: &str) -> Option<&FamilyConfig> {
        self.families.iter().find(|family| family.name == name)
    }
}
