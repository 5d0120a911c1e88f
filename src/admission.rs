//! Which candidate files take part in a search.
use crate::error::{Result, RevgrepError};
use crate::search::FileFilter;
use log::debug;
use std::collections::HashSet;
use std::path::Path;

/// A path with this name would read as the end-of-options marker in the
/// `git grep` invocation, so it is never searched.
pub const RESERVED_PATH: &str = "--";

/// Filters `candidates` against the checked-out tree at `root`.
///
/// Symlinks and the reserved name are skipped before `filter` is consulted.
/// Order is preserved and duplicates keep their first position.
pub fn admit_files(
    root: &Path,
    candidates: &[String],
    filter: Option<&FileFilter>,
) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut admitted = Vec::with_capacity(candidates.len());

    for path in candidates {
        if !seen.insert(path.as_str()) {
            continue;
        }

        let resolved = root.join(path);
        let metadata = std::fs::symlink_metadata(&resolved).map_err(|source| {
            RevgrepError::Stat {
                path: resolved.clone(),
                source,
            }
        })?;
        if metadata.file_type().is_symlink() {
            debug!("Skipping symlink: {path}");
            continue;
        }

        if path == RESERVED_PATH {
            debug!("Skipping reserved path: {path}");
            continue;
        }

        if let Some(filter) = filter {
            let allow = filter(path.as_str()).map_err(|source| RevgrepError::Filter {
                path: path.clone(),
                source,
            })?;
            if !allow {
                debug!("Skipping filtered file: {path}");
                continue;
            }
        }

        admitted.push(path.clone());
    }

    debug!("Admitted {} of {} candidate files", admitted.len(), candidates.len());
    Ok(admitted)
}
