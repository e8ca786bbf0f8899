use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::loader;
use crate::models::Dataset;

/// Identity of a family's source files: path, size and modification time.
type Fingerprint = Vec<(PathBuf, u64, Option<SystemTime>)>;

struct CacheEntry {
    fingerprint: Fingerprint,
    dataset: Arc<Dataset>,
}

/// Loaded datasets keyed by survey family. An entry is reused only while
/// the family's files are unchanged; loaded datasets are shared read-only.
pub struct DatasetCache {
    data_dir: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl DatasetCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, family: &str) -> Arc<Dataset> {
        let current = fingerprint(&loader::family_dir(&self.data_dir, family));

        if let Some(entry) = self.entries.get(family) {
            if entry.fingerprint == current {
                debug!(family, "dataset cache hit");
                return Arc::clone(&entry.dataset);
            }
            debug!(family, "survey files changed, reloading");
        }

        let dataset = Arc::new(loader::load_family(&self.data_dir, family));
        self.entries.insert(
            family.to_string(),
            CacheEntry {
                fingerprint: current,
                dataset: Arc::clone(&dataset),
            },
        );
        dataset
    }
}

fn fingerprint(dir: &Path) -> Fingerprint {
    loader::source_files(dir)
        .into_iter()
        .map(|path| {
            let metadata = std::fs::metadata(&path).ok();
            let len = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata.and_then(|m| m.modified().ok());
            (path, len, modified)
        })
        .collect()
}
