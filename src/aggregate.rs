use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::models::{Dataset, PrefixCategory};

/// Per-row mean of the defined cells in every question column whose id
/// starts with `prefix`. Returns `None` when no column matches.
/// Plain prefix match: `s1` also covers `s10-*` ids.
pub fn prefix_scores(dataset: &Dataset, prefix: &str) -> Option<Vec<Option<f64>>> {
    let matching: Vec<_> = dataset
        .question_columns()
        .filter(|column| column.name.starts_with(prefix))
        .collect();

    if matching.is_empty() {
        return None;
    }

    let scores = (0..dataset.row_count())
        .map(|row| {
            let (sum, count) = matching
                .iter()
                .filter_map(|column| column.values[row])
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        })
        .collect();

    Some(scores)
}

/// Adds one derived column per category, named after the category.
/// Every prefix is matched against the columns as loaded, never against
/// columns derived here. Categories matching no column are left out, and
/// a category whose name is already a column is skipped. The returned
/// names list the columns that were actually added, in declaration order.
pub fn aggregate_categories(dataset: &mut Dataset, categories: &[PrefixCategory]) -> Vec<String> {
    let mut derived: Vec<(String, Vec<Option<f64>>)> = Vec::new();

    for category in categories {
        let taken = dataset.column(&category.name).is_some()
            || derived.iter().any(|(name, _)| *name == category.name);
        if taken {
            warn!(category = %category.name, "category name collides with an existing column; skipped");
            continue;
        }
        match prefix_scores(dataset, &category.prefix) {
            Some(scores) => derived.push((category.name.clone(), scores)),
            None => {
                debug!(category = %category.name, prefix = %category.prefix, "no columns match prefix");
            }
        }
    }

    derived
        .into_iter()
        .map(|(name, scores)| {
            dataset.push_column(name.clone(), scores);
            name
        })
        .collect()
}

/// Mean of each question column over its defined cells, in column order.
/// Columns with no defined cell are skipped.
pub fn question_means(dataset: &Dataset) -> Vec<(String, f64)> {
    dataset
        .question_columns()
        .filter_map(|column| {
            let (sum, count) = column
                .defined()
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            (count > 0).then(|| (column.name.clone(), sum / count as f64))
        })
        .collect()
}

/// The `limit` questions with the smallest mean, ascending. Ties keep
/// column order.
pub fn lowest_questions(dataset: &Dataset, limit: usize) -> Vec<(String, f64)> {
    let mut means = question_means(dataset);
    means.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    means.truncate(limit);
    means
}
