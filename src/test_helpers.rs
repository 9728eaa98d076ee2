//! Shared test utilities for the icon-pipeline test suite.
//!
//! Fixture builders that lay out resource trees in a temp directory, and
//! lookup helpers for collected catalogs.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! touch_icon(&tmp.path().join("icons/close.svg"));
//! write_rules(&tmp.path().join("icons"), "skip: build/*");
//!
//! let catalog = Collector::new(CollectOptions::default())
//!     .collect(&[tmp.path().to_path_buf()])
//!     .unwrap();
//! assert_eq!(catalog_ids(&catalog), vec!["icons/close"]);
//! ```

use std::fs;
use std::path::Path;

use crate::collect::Catalog;
use crate::rules::RULE_FILE_NAME;

// =========================================================================
// Fixture setup
// =========================================================================

/// Minimal SVG written by [`touch_icon`].
pub const PLACEHOLDER_SVG: &str = "<svg/>";

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Create a placeholder icon file.
pub fn touch_icon(path: &Path) {
    write_file(path, PLACEHOLDER_SVG);
}

/// Write the rule file of `dir`.
pub fn write_rules(dir: &Path, content: &str) {
    write_file(&dir.join(RULE_FILE_NAME), content);
}

// =========================================================================
// Catalog lookups
// =========================================================================

/// Ids of a catalog, in catalog order.
pub fn catalog_ids(catalog: &Catalog) -> Vec<&str> {
    catalog.images.iter().map(|i| i.id.as_str()).collect()
}
