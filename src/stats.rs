use std::cmp::Ordering;

use crate::models::Summary;

pub const PROMOTER_MIN: f64 = 9.0;
pub const DETRACTOR_MAX: f64 = 6.0;

/// Summarizes the defined values of a score column. Quantiles use linear
/// interpolation between closest ranks.
pub fn summarize(values: &[Option<f64>]) -> Summary {
    let mut sorted: Vec<f64> = values.iter().filter_map(|value| *value).collect();
    if sorted.is_empty() {
        return Summary::default();
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;

    Summary {
        count,
        min: sorted.first().copied(),
        q1: Some(quantile(&sorted, 0.25)),
        median: Some(quantile(&sorted, 0.5)),
        mean: Some(mean),
        q3: Some(quantile(&sorted, 0.75)),
        max: sorted.last().copied(),
    }
}

/// `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    // rounding can overshoot the upper neighbour
    (sorted[lower] + (sorted[upper] - sorted[lower]) * fraction).min(sorted[upper])
}

/// Share of promoters minus share of detractors, scaled to [-100, 100].
/// Every row counts toward the total, so undefined observations dilute the
/// index as neutrals do. An empty column gives 0.
pub fn engagement_index(values: &[Option<f64>]) -> f64 {
    let total = values.len();
    if total == 0 {
        return 0.0;
    }

    let (promoters, detractors) = values.iter().filter_map(|value| *value).fold(
        (0usize, 0usize),
        |(promoters, detractors), score| {
            if score >= PROMOTER_MIN {
                (promoters + 1, detractors)
            } else if score <= DETRACTOR_MAX {
                (promoters, detractors + 1)
            } else {
                (promoters, detractors)
            }
        },
    );

    (promoters as f64 - detractors as f64) / total as f64 * 100.0
}
