//! Merge-root resolution.
//!
//! A directory whose rule file says `merge` is a *merge root*: its icons are
//! exposed one level higher, as if they lived in the parent directory. This
//! folds a new icon set into an existing one without renaming every
//! reference.
//!
//! Two inputs refine the default promotion:
//!
//! - **`mergeAdd:`** entries name icons explicitly. A leading `/` keeps the
//!   icon under its full id; without it the icon is promoted like the rest.
//!   An explicit entry always wins over the mapping file.
//! - **Mapping file** (`*Mapping*.json` in the resource root): maps new icon
//!   paths (relative to the merge root) to the old identifiers they replace.
//!   An entry only counts when its old identifier is an id already in the
//!   catalog. A mapped icon is recorded as a replacement and is not promoted:
//!   it stays in the catalog, visible under its full id. Entries whose old
//!   identifier names nothing are logged and otherwise ignored.
//!
//! ```json
//! {
//!   "general": { "close": "closeOld", "add": ["plus", "addOld"] },
//!   "run": "execute"
//! }
//! ```
//!
//! flattens to `closeOld → general/close`, `plus → general/add`,
//! `addOld → general/add`, `execute → run`.

use crate::catalog::LogicalImage;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to read mapping file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in mapping file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Mapping file {} has an unsupported value at '{key}': only strings, arrays and objects are allowed", path.display())]
    UnsupportedValue { path: PathBuf, key: String },
    #[error("More than one mapping file in {}: {files:?}", root.display())]
    MultipleMappingFiles { root: PathBuf, files: Vec<PathBuf> },
    #[error("Merging '{from}' into '{id}' collides with an existing image")]
    Conflict { id: String, from: String },
}

/// A directory declared as merge root, relative to the resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRoot {
    /// `/`-joined directory path, the id prefix of its icons.
    pub prefix: String,
    /// Raw `mergeAdd:` values declared alongside `merge`.
    pub merge_add: Vec<String>,
}

impl MergeRoot {
    /// Id the merge root's icons are promoted into (its parent directory).
    fn parent_prefix(&self) -> Option<&str> {
        self.prefix.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// `mergeAdd` entry matching `rest`, returning whether it is absolute.
    fn explicit_add(&self, rest: &str) -> Option<bool> {
        self.merge_add.iter().find_map(|entry| {
            let absolute = entry.starts_with('/');
            let trimmed = entry.trim_start_matches('/');
            let without_ext = match trimmed.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => trimmed,
            };
            (without_ext == rest).then_some(absolute)
        })
    }
}

/// One `old identifier → new identifier` pair from a mapping file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MappingEntry {
    pub old_id: String,
    pub new_id: String,
}

/// Locate the mapping file of a resource root.
///
/// An unreadable root has no mapping file.
pub fn find_mapping_file(root: &Path) -> Result<Option<PathBuf>, MergeError> {
    let Ok(entries) = fs::read_dir(root) else {
        return Ok(None);
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_mapping_file_name(p))
        .collect();
    files.sort();
    match files.len() {
        0 => Ok(None),
        1 => Ok(files.pop()),
        _ => Err(MergeError::MultipleMappingFiles {
            root: root.to_path_buf(),
            files,
        }),
    }
}

fn is_mapping_file_name(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .is_some_and(|n| n.contains("Mapping") && n.ends_with(".json"))
}

/// Read and flatten a mapping file.
pub fn load_mapping(path: &Path) -> Result<Vec<MappingEntry>, MergeError> {
    let content = fs::read_to_string(path).map_err(|source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| MergeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    flatten_mapping(&value).map_err(|key| MergeError::UnsupportedValue {
        path: path.to_path_buf(),
        key,
    })
}

/// Flatten a mapping document. On an unsupported value, returns the key
/// path where it was found.
pub fn flatten_mapping(value: &Value) -> Result<Vec<MappingEntry>, String> {
    let mut entries = Vec::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(key, child, &mut entries)?;
            }
        }
        _ => return Err(String::new()),
    }
    entries.sort();
    Ok(entries)
}

fn flatten_into(key: &str, value: &Value, out: &mut Vec<MappingEntry>) -> Result<(), String> {
    match value {
        Value::String(old) => out.push(MappingEntry {
            old_id: old.clone(),
            new_id: key.to_string(),
        }),
        Value::Array(items) => {
            for item in items {
                flatten_into(key, item, out)?;
            }
        }
        Value::Object(map) => {
            for (sub, child) in map {
                flatten_into(&format!("{key}/{sub}"), child, out)?;
            }
        }
        _ => return Err(key.to_string()),
    }
    Ok(())
}

/// Result of [`merge_images`].
#[derive(Debug, Default)]
pub struct Merged {
    /// Sorted by id.
    pub images: Vec<LogicalImage>,
    /// Mapping entries that matched an image, with `new_id` set to that
    /// image's final id.
    pub mappings: Vec<MappingEntry>,
}

/// Apply merge roots and the mapping file to a collected image list.
pub fn merge_images(
    images: Vec<LogicalImage>,
    merge_roots: &[MergeRoot],
    mapping: Option<&[MappingEntry]>,
) -> Result<Merged, MergeError> {
    match (mapping.is_some(), merge_roots.is_empty()) {
        (true, true) => warn!("Mapping file present but no directory declares 'merge'"),
        (false, false) => warn!(
            "Merge roots declared without a mapping file: {:?}",
            merge_roots.iter().map(|r| &r.prefix).collect::<Vec<_>>()
        ),
        _ => {}
    }
    let mapping = mapping.unwrap_or_default();

    // Longest prefix first, so nested merge roots win over their ancestors.
    let mut roots: Vec<&MergeRoot> = merge_roots.iter().collect();
    roots.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(&b.prefix)));

    let original_ids: HashSet<String> = images.iter().map(|i| i.id.clone()).collect();
    let mut result: BTreeMap<String, LogicalImage> = BTreeMap::new();
    let mut promoted: Vec<(String, LogicalImage)> = Vec::new();
    let mut mappings = Vec::new();

    for image in images {
        let Some((root, rest)) = roots.iter().find_map(|root| {
            image
                .id
                .strip_prefix(root.prefix.as_str())
                .and_then(|r| r.strip_prefix('/'))
                .map(|rest| (*root, rest.to_string()))
        }) else {
            result.insert(image.id.clone(), image);
            continue;
        };
        let Some(parent) = root.parent_prefix() else {
            debug!("Merge root '{}' has no parent level, keeping ids", root.prefix);
            result.insert(image.id.clone(), image);
            continue;
        };

        let mut mapped = Vec::new();
        for entry in mapping.iter().filter(|m| m.new_id == rest) {
            if original_ids.contains(&entry.old_id) {
                mapped.push(entry);
            } else {
                warn!(
                    "Mapping '{}' -> '{}' names no catalog entry, ignored",
                    entry.old_id, image.id
                );
            }
        }
        for entry in &mapped {
            mappings.push(MappingEntry {
                old_id: entry.old_id.clone(),
                new_id: image.id.clone(),
            });
        }

        let keep_full = match root.explicit_add(&rest) {
            Some(absolute) => absolute,
            None => !mapped.is_empty(),
        };
        if keep_full {
            result.insert(image.id.clone(), image);
        } else {
            let new_id = format!("{parent}/{rest}");
            promoted.push((new_id, image));
        }
    }

    for (new_id, mut image) in promoted {
        if original_ids.contains(&new_id) || result.contains_key(&new_id) {
            return Err(MergeError::Conflict {
                id: new_id,
                from: image.id,
            });
        }
        debug!("Merged '{}' as '{new_id}'", image.id);
        image.id = new_id.clone();
        result.insert(new_id, image);
    }

    mappings.sort();
    Ok(Merged {
        images: result.into_values().collect(),
        mappings,
    })
}
