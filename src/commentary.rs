use std::path::Path;

use tracing::{debug, warn};

pub const QUESTION_NOTES_FILE: &str = "file.txt";
pub const MISSING_NOTE: &str = "No analysis available in file.txt.";

/// Analyst commentary for a survey family, read verbatim from
/// `<analysis_dir>/<family>.txt`.
pub fn family_commentary(analysis_dir: &Path, family: &str) -> String {
    let file_name = format!("{family}.txt");
    read_text(&analysis_dir.join(&file_name)).unwrap_or_else(|| {
        format!(
            "**Missing file:** create `{}` to show conclusions here.",
            analysis_dir.join(&file_name).display()
        )
    })
}

/// Non-empty lines of the shared question notes file, one note per
/// lowest-scoring question in rank order.
pub fn question_notes(analysis_dir: &Path) -> Vec<String> {
    read_text(&analysis_dir.join(QUESTION_NOTES_FILE))
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn note_for(notes: &[String], rank: usize) -> String {
    notes
        .get(rank)
        .cloned()
        .unwrap_or_else(|| MISSING_NOTE.to_string())
}

fn read_text(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(file = %path.display(), "no commentary file");
            None
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to read commentary");
            None
        }
    }
}
