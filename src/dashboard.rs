use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::aggregate;
use crate::bounds;
use crate::cache::DatasetCache;
use crate::commentary;
use crate::config::{Config, FamilyConfig};
use crate::formula;
use crate::models::{
    CategoryDistribution, CategoryStatistics, Dataset, EngagementScore, FamilyContent,
    FamilyPanel, MetaPanel, QuestionScore, RadarPoint,
};
use crate::stats;

pub const LOWEST_QUESTION_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub families: Vec<FamilyPanel>,
    pub meta: MetaPanel,
}

/// One full recomputation pass: every family panel, then the meta panel.
pub fn build(config: &Config, cache: &mut DatasetCache) -> Dashboard {
    let datasets: Vec<(&FamilyConfig, Arc<Dataset>)> = config
        .families
        .iter()
        .map(|family| (family, cache.get(&family.name)))
        .collect();

    let families = datasets
        .iter()
        .map(|(family, dataset)| family_panel(config, family, dataset))
        .collect();

    let sources: Vec<(&str, &Dataset)> = datasets
        .iter()
        .map(|(family, dataset)| (family.name.as_str(), dataset.as_ref()))
        .collect();
    let meta = meta_panel(config, &sources);

    Dashboard {
        generated_at: Utc::now(),
        families,
        meta,
    }
}

pub fn family_panel(config: &Config, family: &FamilyConfig, dataset: &Dataset) -> FamilyPanel {
    let content = if dataset.is_empty() {
        info!(family = %family.name, "no data available");
        None
    } else {
        Some(family_content(config, family, dataset))
    };

    FamilyPanel {
        family: family.name.clone(),
        label: family.label.clone(),
        content,
    }
}

fn family_content(config: &Config, family: &FamilyConfig, dataset: &Dataset) -> FamilyContent {
    let notes = commentary::question_notes(&config.analysis_dir);
    let lowest_questions = aggregate::lowest_questions(dataset, LOWEST_QUESTION_COUNT)
        .into_iter()
        .enumerate()
        .map(|(rank, (id, mean))| QuestionScore {
            prompt: family.prompt(&id).to_string(),
            note: commentary::note_for(&notes, rank),
            id,
            mean,
        })
        .collect();

    let mut scored = dataset.clone();
    let categories = aggregate::aggregate_categories(&mut scored, &family.categories);

    let mut radar = Vec::new();
    let mut distributions = Vec::new();
    let mut engagement = Vec::new();
    for category in &categories {
        let Some(column) = scored.column(category) else {
            continue;
        };
        let summary = stats::summarize(&column.values);
        radar.push(RadarPoint {
            category: category.clone(),
            mean: summary.mean,
            min: summary.min,
            max: summary.max,
        });
        distributions.push(CategoryDistribution {
            category: category.clone(),
            summary,
        });
        engagement.push(EngagementScore {
            category: category.clone(),
            index: stats::engagement_index(&column.values),
        });
    }
    engagement.sort_by(|a, b| a.index.partial_cmp(&b.index).unwrap_or(Ordering::Equal));

    FamilyContent {
        respondents: dataset.row_count(),
        columns: dataset.columns().iter().map(|c| c.name.clone()).collect(),
        lowest_questions,
        radar,
        distributions,
        engagement,
        commentary: commentary::family_commentary(&config.analysis_dir, &family.name),
    }
}

/// Cross-family statistics for every meta formula. Needs data for every
/// source family; otherwise the panel only names the families lacking data.
pub fn meta_panel(config: &Config, sources: &[(&str, &Dataset)]) -> MetaPanel {
    let missing_families: Vec<String> = sources
        .iter()
        .filter(|(_, dataset)| dataset.is_empty())
        .map(|(name, _)| name.to_string())
        .collect();

    if !missing_families.is_empty() {
        info!(missing = ?missing_families, "meta categories unavailable");
        return MetaPanel {
            missing_families,
            respondents: 0,
            rows: Vec::new(),
            failures: Vec::new(),
        };
    }

    let combined = formula::join_by_position(sources);
    let outcome = formula::evaluate_batch(&combined, &config.meta);

    let rows = outcome
        .scored
        .iter()
        .map(|scored| {
            let range = bounds::theoretical_bounds(&scored.formula, config.scale);
            CategoryStatistics {
                category: scored.formula.name.clone(),
                theoretical_min: range.min,
                summary: stats::summarize(&scored.scores),
                theoretical_max: range.max,
            }
        })
        .collect();

    MetaPanel {
        missing_families,
        respondents: combined.row_count(),
        rows,
        failures: outcome.failures,
    }
}
