use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::models::Dataset;

struct ParsedFile {
    headers: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

pub fn family_dir(data_dir: &Path, family: &str) -> PathBuf {
    data_dir.join(family)
}

/// CSV files directly under `dir`, sorted by name. A missing or unreadable
/// directory has no files.
pub fn source_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(dir = %dir.display(), "survey directory not found");
            return Vec::new();
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "failed to list survey directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Unions every usable CSV file of a survey family into one dataset.
/// Empty or malformed files are skipped; with nothing usable the result is
/// an empty dataset.
pub fn load_family(data_dir: &Path, family: &str) -> Dataset {
    let dir = family_dir(data_dir, family);
    let mut dataset = Dataset::empty();
    let mut used = 0usize;

    for path in source_files(&dir) {
        match read_file(&path) {
            Ok(Some(parsed)) => {
                debug!(file = %path.display(), rows = parsed.rows.len(), "loaded survey file");
                dataset.append_rows(&parsed.headers, &parsed.rows);
                used += 1;
            }
            Ok(None) => info!(file = %path.display(), "skipping empty survey file"),
            Err(err) => info!(file = %path.display(), error = %format!("{err:#}"), "skipping unreadable survey file"),
        }
    }

    info!(
        family,
        files = used,
        rows = dataset.row_count(),
        columns = dataset.columns().len(),
        "survey family loaded"
    );
    dataset
}

fn read_file(path: &Path) -> anyhow::Result<Option<ParsedFile>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if metadata.len() == 0 {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read header row")?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Ok(None);
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed record {}", index + 1))?;
        rows.push(record.iter().map(parse_cell).collect());
    }

    Ok(Some(ParsedFile { headers, rows }))
}

/// Blank and non-numeric cells are undefined.
fn parse_cell(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
