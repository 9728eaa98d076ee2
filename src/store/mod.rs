//! Binary bitmap cache.
//!
//! One append-only store per (scale, theme) pair, named
//! `icon-v<version>-<scale><theme suffix>.db`:
//!
//! ```text
//! icon-v3-1.0.db     icon-v3-1.0-d.db
//! icon-v3-1.25.db    icon-v3-1.25-d.db
//! ...
//! ```
//!
//! [`StoreSet`] owns every store of a run. [`StoreSet::close_all`] closes all
//! of them regardless of earlier failures, so a failed run never leaves a
//! half-written writer open.

pub mod header;
pub mod writer;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
pub use writer::{Record, StoreReader, StoreStats, StoreWriter};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Key {key:#010x} written twice to {}", path.display())]
    DuplicateKey { path: PathBuf, key: u32 },
    #[error("Record {key:#010x} has {actual} pixels, expected {expected}")]
    PixelCount {
        key: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Truncated {0}")]
    Truncated(&'static str),
    #[error("Varint does not fit its target type")]
    VarintOverflow,
    #[error("Corrupt store {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

/// `icon-v3-1.25-d.db` for version 3, scale 1.25, dark.
pub fn store_file_name(version: u32, scale: f32, theme: Theme, dark_suffix: &str) -> String {
    let suffix = match theme {
        Theme::Light => "",
        Theme::Dark => dark_suffix,
    };
    format!("icon-v{version}-{scale:?}{suffix}.db")
}

/// Every store of one run, in `(scale, theme)` order.
pub struct StoreSet {
    stores: Vec<(f32, Theme, StoreWriter)>,
}

impl StoreSet {
    /// Create the db directory and one store per scale and theme.
    ///
    /// If any store cannot be created, the ones already open are closed
    /// before the error is returned.
    pub fn create(dir: &Path, version: u32, scales: &[f32], dark_suffix: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut set = Self { stores: Vec::new() };
        for &scale in scales {
            for theme in Theme::ALL {
                let path = dir.join(store_file_name(version, scale, theme, dark_suffix));
                match StoreWriter::create(&path, version) {
                    Ok(writer) => set.stores.push((scale, theme, writer)),
                    Err(e) => {
                        set.close_all();
                        return Err(e);
                    }
                }
            }
        }
        Ok(set)
    }

    pub fn get_mut(&mut self, scale: f32, theme: Theme) -> Option<&mut StoreWriter> {
        self.stores
            .iter_mut()
            .find(|(s, t, _)| *s == scale && *t == theme)
            .map(|(_, _, w)| w)
    }

    /// Close every store. Returns the stats of stores that closed cleanly and
    /// the errors of those that did not.
    pub fn close_all(self) -> (Vec<StoreStats>, Vec<StoreError>) {
        let mut stats = Vec::new();
        let mut errors = Vec::new();
        for (_, _, writer) in self.stores {
            match writer.close() {
                Ok(s) => {
                    info!(
                        "Closed {} ({} records, {} bytes)",
                        s.path.display(),
                        s.records,
                        s.bytes
                    );
                    stats.push(s);
                }
                Err(e) => errors.push(e),
            }
        }
        (stats, errors)
    }
}
