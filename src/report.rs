use std::fmt::Write;

use anyhow::Context;

use crate::bounds;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::models::{FamilyContent, FamilyPanel, MetaPanel};

const NO_DATA: &str = "no data";

fn fmt_value(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| NO_DATA.to_string())
}

pub fn build_report(dashboard: &Dashboard, family: Option<&str>, show_data: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Survey Metrics Report");
    let _ = writeln!(
        output,
        "Generated {}",
        dashboard.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    for panel in dashboard
        .families
        .iter()
        .filter(|panel| family.map(|name| name == panel.family).unwrap_or(true))
    {
        let _ = writeln!(output);
        write_family(&mut output, panel, show_data);
    }

    if family.is_none() {
        let _ = writeln!(output);
        write_meta(&mut output, &dashboard.meta);
    }

    output
}

fn write_family(output: &mut String, panel: &FamilyPanel, show_data: bool) {
    let _ = writeln!(output, "## {}", panel.label);

    let Some(content) = &panel.content else {
        let _ = writeln!(output, "No {} data available.", panel.label);
        return;
    };

    let _ = writeln!(output, "{} respondents.", content.respondents);
    if show_data {
        let _ = writeln!(output, "Columns: {}", content.columns.join(", "));
    }

    write_lowest(output, content);
    write_categories(output, content);

    let _ = writeln!(output);
    let _ = writeln!(output, "### Commentary");
    let _ = writeln!(output, "{}", content.commentary.trim_end());
}

fn write_lowest(output: &mut String, content: &FamilyContent) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### Lowest-scoring questions");

    if content.lowest_questions.is_empty() {
        let _ = writeln!(output, "No question scores recorded.");
        return;
    }
    for question in &content.lowest_questions {
        let _ = writeln!(
            output,
            "- \"{}\" ({}) mean {:.2}: {}",
            question.prompt, question.id, question.mean, question.note
        );
    }
}

fn write_categories(output: &mut String, content: &FamilyContent) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### Categories");

    if content.distributions.is_empty() {
        let _ = writeln!(output, "No categories configured for this survey.");
        return;
    }

    let _ = writeln!(output, "| Category | Min | Q1 | Median | Mean | Q3 | Max |");
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for distribution in &content.distributions {
        let s = &distribution.summary;
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            distribution.category,
            fmt_value(s.min),
            fmt_value(s.q1),
            fmt_value(s.median),
            fmt_value(s.mean),
            fmt_value(s.q3),
            fmt_value(s.max)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Engagement index");
    for score in &content.engagement {
        let _ = writeln!(output, "- {}: {:.1}%", score.category, score.index);
    }
}

fn write_meta(output: &mut String, meta: &MetaPanel) {
    let _ = writeln!(output, "## Meta categories");

    if !meta.is_available() {
        let _ = writeln!(
            output,
            "Missing data for {}; meta categories need every survey.",
            meta.missing_families.join(", ")
        );
        return;
    }

    let _ = writeln!(output, "{} joined respondents.", meta.respondents);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Category | Theo min | Min | Q1 | Median | Mean | Q3 | Max | Theo max |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
    for row in &meta.rows {
        let s = &row.summary;
        let _ = writeln!(
            output,
            "| {} | {:.2} | {} | {} | {} | {} | {} | {} | {:.2} |",
            row.category,
            row.theoretical_min,
            fmt_value(s.min),
            fmt_value(s.q1),
            fmt_value(s.median),
            fmt_value(s.mean),
            fmt_value(s.q3),
            fmt_value(s.max),
            row.theoretical_max
        );
    }

    if !meta.failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Formula errors");
        for failure in &meta.failures {
            let _ = writeln!(output, "- Check the formula for '{}': {}", failure.category, failure.error);
        }
    }
}

/// Parsed terms and theoretical range of every configured meta formula.
pub fn bounds_listing(config: &Config) -> String {
    let mut output = String::new();

    if config.meta.is_empty() {
        let _ = writeln!(output, "No meta formulas configured.");
        return output;
    }

    for definition in &config.meta {
        match &definition.parsed {
            Ok(formula) => {
                let range = bounds::theoretical_bounds(formula, config.scale);
                let _ = writeln!(
                    output,
                    "- {}: {} -> [{:.2}, {:.2}]",
                    formula.name, formula, range.min, range.max
                );
            }
            Err(err) => {
                let _ = writeln!(output, "- {}: invalid formula ({})", definition.name, err);
            }
        }
    }

    output
}

pub fn to_json(dashboard: &Dashboard) -> anyhow::Result<String> {
    serde_json::to_string_pretty(dashboard).context("failed to serialize dashboard")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaFormula;
    use crate::models::{CategoryStatistics, FormulaFailure, Summary};
    use chrono::TimeZone;
    use chrono::Utc;

    fn dashboard(families: Vec<FamilyPanel>, meta: MetaPanel) -> Dashboard {
        Dashboard {
            generated_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
            families,
            meta,
        }
    }

    fn meta_with_row() -> MetaPanel {
        MetaPanel {
            missing_families: Vec::new(),
            respondents: 5,
            rows: vec![CategoryStatistics {
                category: "Strategy and Vision".to_string(),
                theoretical_min: 1.0,
                summary: Summary {
                    count: 5,
                    min: Some(2.0),
                    q1: Some(3.0),
                    median: Some(4.0),
                    mean: Some(4.5),
                    q3: Some(6.0),
                    max: Some(8.0),
                },
                theoretical_max: 10.0,
            }],
            failures: vec![FormulaFailure {
                category: "Stale".to_string(),
                error: "unknown field `dms_s9_9`".to_string(),
            }],
        }
    }

    #[test]
    fn renders_no_data_family_and_meta_table() {
        let report = build_report(
            &dashboard(
                vec![FamilyPanel {
                    family: "dms".to_string(),
                    label: "DMS".to_string(),
                    content: None,
                }],
                meta_with_row(),
            ),
            None,
            false,
        );

        assert!(report.contains("Generated 2026-03-02 09:30 UTC"));
        assert!(report.contains("No DMS data available."));
        assert!(report.contains("| Strategy and Vision | 1.00 | 2.00 | 3.00 | 4.00 | 4.50 | 6.00 | 8.00 | 10.00 |"));
        assert!(report.contains("- Check the formula for 'Stale': unknown field `dms_s9_9`"));
    }

    #[test]
    fn family_filter_skips_meta() {
        let report = build_report(
            &dashboard(
                vec![
                    FamilyPanel {
                        family: "hsc".to_string(),
                        label: "HSC".to_string(),
                        content: None,
                    },
                    FamilyPanel {
                        family: "dms".to_string(),
                        label: "DMS".to_string(),
                        content: None,
                    },
                ],
                meta_with_row(),
            ),
            Some("hsc"),
            false,
        );
        assert!(report.contains("## HSC"));
        assert!(!report.contains("## DMS"));
        assert!(!report.contains("Meta categories"));
    }

    #[test]
    fn undefined_statistics_render_as_no_data() {
        assert_eq!(fmt_value(None), "no data");
        assert_eq!(fmt_value(Some(3.456)), "3.46");
    }

    #[test]
    fn bounds_listing_reports_invalid_formulas() {
        let mut config = Config::default();
        config.meta = vec![
            MetaFormula::new("Wide", "2 * a + 1.5 * b"),
            MetaFormula::new("Broken", "2 * "),
        ];
        let listing = bounds_listing(&config);
        assert!(listing.contains("- Wide: 2 * a + 1.5 * b -> [3.50, 35.00]"));
        assert!(listing.contains("- Broken: invalid formula"));
    }

    #[test]
    fn json_export_flattens_statistics() {
        let json = to_json(&dashboard(Vec::new(), meta_with_row())).expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let row = &value["meta"]["rows"][0];
        assert_eq!(row["category"], "Strategy and Vision");
        assert_eq!(row["median"], 4.0);
        assert_eq!(row["theoretical_max"], 10.0);
    }
}
