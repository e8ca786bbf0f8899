use thiserror::Error;
use tracing::{info, warn};

use crate::config::MetaFormula;
use crate::models::{Dataset, FormulaFailure};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("malformed term `{0}`")]
    MalformedTerm(String),
    #[error("invalid coefficient `{0}`")]
    InvalidCoefficient(String),
    #[error("coefficient {0} must be positive")]
    NonPositiveCoefficient(f64),
    #[error("invalid field name `{0}`")]
    InvalidField(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub field: String,
    pub coefficient: f64,
}

/// A linear combination of question fields, parsed once from its written
/// form (`0.40 * hsc_s1_1 + 0.60 * dms_s4_4`).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFormula {
    pub name: String,
    pub terms: Vec<Term>,
}

impl WeightedFormula {
    pub fn parse(name: &str, expression: &str) -> Result<Self, FormulaError> {
        if expression.trim().is_empty() {
            return Err(FormulaError::Empty);
        }

        let terms = expression
            .split('+')
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            terms,
        })
    }

    pub fn coefficient_sum(&self) -> f64 {
        self.terms.iter().map(|term| term.coefficient).sum()
    }

    /// Weighted sum per row. A row with any undefined input is undefined.
    pub fn evaluate(&self, dataset: &Dataset) -> Result<Vec<Option<f64>>, FormulaError> {
        let columns = self
            .terms
            .iter()
            .map(|term| {
                dataset
                    .column(&term.field)
                    .map(|column| (term.coefficient, column))
                    .ok_or_else(|| FormulaError::UnknownField(term.field.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scores = (0..dataset.row_count())
            .map(|row| {
                columns.iter().try_fold(0.0, |acc, (coefficient, column)| {
                    column.values[row].map(|value| acc + coefficient * value)
                })
            })
            .collect();

        Ok(scores)
    }
}

impl std::fmt::Display for WeightedFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{} * {}", term.coefficient, term.field)?;
        }
        Ok(())
    }
}

fn parse_term(raw: &str) -> Result<Term, FormulaError> {
    let parts: Vec<&str> = raw.split('*').map(str::trim).collect();

    match parts.as_slice() {
        [field] => Ok(Term {
            field: parse_field(field)?,
            coefficient: 1.0,
        }),
        [left, right] => {
            // `inf` and `nan` parse as floats, so pick the side by field grammar
            let (number, field) = if is_field_name(left) && !is_field_name(right) {
                (right, left)
            } else {
                (left, right)
            };
            Ok(Term {
                field: parse_field(field)?,
                coefficient: parse_coefficient(number)?,
            })
        }
        _ => Err(FormulaError::MalformedTerm(raw.trim().to_string())),
    }
}

fn parse_field(raw: &str) -> Result<String, FormulaError> {
    if raw.is_empty() {
        return Err(FormulaError::MalformedTerm(raw.to_string()));
    }
    if is_field_name(raw) {
        Ok(raw.to_string())
    } else {
        Err(FormulaError::InvalidField(raw.to_string()))
    }
}

fn is_field_name(raw: &str) -> bool {
    let mut chars = raw.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_coefficient(raw: &str) -> Result<f64, FormulaError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| FormulaError::InvalidCoefficient(raw.to_string()))?;
    if !value.is_finite() {
        return Err(FormulaError::InvalidCoefficient(raw.to_string()));
    }
    if value <= 0.0 {
        return Err(FormulaError::NonPositiveCoefficient(value));
    }
    Ok(value)
}

/// Field name of a question inside the combined dataset: `s1-3` from `hsc`
/// becomes `hsc_s1_3`.
pub fn namespaced(prefix: &str, question_id: &str) -> String {
    format!("{}_{}", prefix, question_id.replace('-', "_"))
}

/// Row-joins several family datasets by position. Row `i` of the result
/// holds row `i` of every source, so all sources are cut to the shortest.
/// Respondents are not matched across instruments: ordering is assumed to
/// correspond by submission.
pub fn join_by_position(sources: &[(&str, &Dataset)]) -> Dataset {
    let rows = sources
        .iter()
        .map(|(_, dataset)| dataset.row_count())
        .min()
        .unwrap_or(0);

    let mut combined = Dataset::with_rows(rows);
    for (prefix, dataset) in sources {
        if dataset.row_count() > rows {
            info!(
                family = %prefix,
                dropped = dataset.row_count() - rows,
                "truncating family to shortest source"
            );
        }
        for column in dataset.question_columns() {
            combined.push_column(
                namespaced(prefix, &column.name),
                column.values[..rows].to_vec(),
            );
        }
    }
    combined
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFormula {
    pub formula: WeightedFormula,
    pub scores: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub scored: Vec<ScoredFormula>,
    pub failures: Vec<FormulaFailure>,
}

/// Evaluates every meta formula. A formula that failed to parse or fails
/// here is recorded by name and skipped; the rest still evaluate.
pub fn evaluate_batch(combined: &Dataset, definitions: &[MetaFormula]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for definition in definitions {
        let result = definition.parsed.clone().and_then(|formula| {
            formula
                .evaluate(combined)
                .map(|scores| (formula, scores))
        });

        match result {
            Ok((formula, scores)) => outcome.scored.push(ScoredFormula { formula, scores }),
            Err(err) => {
                warn!(category = %definition.name, error = %err, "formula evaluation failed");
                outcome.failures.push(FormulaFailure {
                    category: definition.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, f64)]) -> Dataset {
        let mut dataset = Dataset::with_rows(1);
        for (name, value) in fields {
            dataset.push_column(*name, vec![Some(*value)]);
        }
        dataset
    }

    fn meta(name: &str, formula: &str) -> MetaFormula {
        MetaFormula::new(name, formula)
    }

    #[test]
    fn parses_coefficients_and_fields() {
        let formula = WeightedFormula::parse("Strategy", "0.40 * hsc_s1_1 + 0.60 * dms_s4_4")
            .expect("valid formula");
        assert_eq!(
            formula.terms,
            vec![
                Term {
                    field: "hsc_s1_1".to_string(),
                    coefficient: 0.4
                },
                Term {
                    field: "dms_s4_4".to_string(),
                    coefficient: 0.6
                },
            ]
        );
        assert!((formula.coefficient_sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bare_field_and_trailing_coefficient() {
        let formula = WeightedFormula::parse("x", "a + b * 2").expect("valid formula");
        assert_eq!(formula.terms[0].coefficient, 1.0);
        assert_eq!(formula.terms[1].field, "b");
        assert_eq!(formula.terms[1].coefficient, 2.0);
    }

    #[test]
    fn rejects_malformed_formulas() {
        assert_eq!(WeightedFormula::parse("x", "  "), Err(FormulaError::Empty));
        assert_eq!(
            WeightedFormula::parse("x", "1.0 * a +"),
            Err(FormulaError::MalformedTerm(String::new()))
        );
        assert_eq!(
            WeightedFormula::parse("x", "-1 * a"),
            Err(FormulaError::NonPositiveCoefficient(-1.0))
        );
        assert_eq!(
            WeightedFormula::parse("x", "0.5 * 3a"),
            Err(FormulaError::InvalidField("3a".to_string()))
        );
        assert_eq!(
            WeightedFormula::parse("x", "1 * a * 2"),
            Err(FormulaError::MalformedTerm("1 * a * 2".to_string()))
        );
    }

    #[test]
    fn numeric_looking_field_names() {
        let expected = vec![Term {
            field: "inf".to_string(),
            coefficient: 2.0,
        }];
        let formula = WeightedFormula::parse("x", "inf * 2").expect("valid formula");
        assert_eq!(formula.terms, expected);
        let formula = WeightedFormula::parse("x", "2 * inf").expect("valid formula");
        assert_eq!(formula.terms, expected);
        let formula = WeightedFormula::parse("x", "nan").expect("valid formula");
        assert_eq!(formula.terms[0].field, "nan");
        assert_eq!(
            WeightedFormula::parse("x", "a * b"),
            Err(FormulaError::InvalidCoefficient("a".to_string()))
        );
    }

    #[test]
    fn evaluates_weighted_sum() {
        let formula = WeightedFormula::parse("x", "0.5*a + 0.25*b").expect("valid formula");
        let scores = formula.evaluate(&row(&[("a", 2.0), ("b", 4.0)])).expect("fields exist");
        assert_eq!(scores, vec![Some(2.0)]);
    }

    #[test]
    fn undefined_input_yields_undefined_score() {
        let mut dataset = Dataset::with_rows(2);
        dataset.push_column("a", vec![Some(1.0), None]);
        let formula = WeightedFormula::parse("x", "2 * a").expect("valid formula");
        assert_eq!(formula.evaluate(&dataset), Ok(vec![Some(2.0), None]));
    }

    #[test]
    fn unknown_field_fails_only_that_formula() {
        let combined = row(&[("a", 2.0), ("b", 4.0)]);
        let outcome = evaluate_batch(
            &combined,
            &[
                meta("good", "0.5*a + 0.25*b"),
                meta("stale", "1.0 * c"),
                meta("broken", "1.0 * "),
                meta("also good", "b"),
            ],
        );

        let names: Vec<&str> = outcome.scored.iter().map(|s| s.formula.name.as_str()).collect();
        assert_eq!(names, vec!["good", "also good"]);
        assert_eq!(outcome.scored[1].scores, vec![Some(4.0)]);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].category, "stale");
        assert_eq!(outcome.failures[0].error, "unknown field `c`");
        assert_eq!(outcome.failures[1].category, "broken");
    }

    #[test]
    fn positional_join_truncates_and_namespaces() {
        let mut hsc = Dataset::empty();
        hsc.append_rows(
            &["id".to_string(), "s1-1".to_string()],
            &[
                vec![Some(1.0), Some(3.0)],
                vec![Some(2.0), Some(5.0)],
                vec![Some(3.0), Some(7.0)],
            ],
        );
        let mut dms = Dataset::empty();
        dms.append_rows(&["s1-1".to_string()], &[vec![Some(9.0)], vec![Some(8.0)]]);

        let combined = join_by_position(&[("hsc", &hsc), ("dms", &dms)]);

        assert_eq!(combined.row_count(), 2);
        assert!(combined.column("hsc_id").is_none());
        assert_eq!(
            combined.column("hsc_s1_1").map(|c| c.values.clone()),
            Some(vec![Some(3.0), Some(5.0)])
        );
        assert_eq!(
            combined.column("dms_s1_1").map(|c| c.values.clone()),
            Some(vec![Some(9.0), Some(8.0)])
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let formula = WeightedFormula::parse("x", "0.4 * a + 0.6 * b").expect("valid formula");
        let reparsed = WeightedFormula::parse("x", &formula.to_string()).expect("valid formula");
        assert_eq!(formula, reparsed);
    }
}
