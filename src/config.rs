//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `icon-pipeline.toml`. Stock
//! defaults are the base layer; the user file overrides any subset of keys.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [collect]
//! rule_file = "icon-robots.txt"   # Per-directory rule file name
//! image_extensions = ["svg", "png"]
//! excluded_dirs = []              # Extra top-level dirs to ignore
//! parallel_depth = 3              # Walk subdirectories in parallel above this depth
//! ignore_skip = false             # Sanity mode: disable every skip rule
//! purge_compat_rule_files = false # Delete rule files in compatibilityResources
//! # android_icons = "res/android" # Vendor icon set directory
//!
//! [cache]
//! format_version = 3
//! scales = [1.0, 1.25, 1.5, 2.0, 2.5]
//! dark_suffix = "-d"              # Store name suffix for the dark theme
//! require_square = false          # Non-square light 1x renders are fatal
//!
//! [processing]
//! max_processes = 4               # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, override just the values you want:
//!
//! ```toml
//! [cache]
//! scales = [1.0, 2.0]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::collect::CollectOptions;
use crate::precompile::PrecompileOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "icon-pipeline.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `icon-pipeline.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Resource tree collection.
    pub collect: CollectConfig,
    /// Binary cache generation.
    pub cache: CacheConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rule_file = &self.collect.rule_file;
        if rule_file.is_empty() || rule_file.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "collect.rule_file must be a plain file name".into(),
            ));
        }
        if self.collect.image_extensions.is_empty()
            || self.collect.image_extensions.iter().any(|e| e.is_empty())
        {
            return Err(ConfigError::Validation(
                "collect.image_extensions must list at least one extension".into(),
            ));
        }
        if self.collect.parallel_depth > 16 {
            return Err(ConfigError::Validation(
                "collect.parallel_depth must be 0-16".into(),
            ));
        }
        let scales = &self.cache.scales;
        if scales.is_empty() {
            return Err(ConfigError::Validation(
                "cache.scales must not be empty".into(),
            ));
        }
        if scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ConfigError::Validation(
                "cache.scales must be positive numbers".into(),
            ));
        }
        let unique: HashSet<u32> = scales.iter().map(|s| s.to_bits()).collect();
        if unique.len() != scales.len() {
            return Err(ConfigError::Validation(
                "cache.scales must not contain duplicates".into(),
            ));
        }
        if self.cache.dark_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "cache.dark_suffix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Collector options for this config.
    pub fn collect_options(&self) -> CollectOptions {
        let c = &self.collect;
        CollectOptions {
            rule_file: c.rule_file.clone(),
            image_extensions: c
                .image_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            excluded_dirs: c.excluded_dirs.clone(),
            parallel_depth: c.parallel_depth,
            ignore_skip: c.ignore_skip,
            purge_compat_rule_files: c.purge_compat_rule_files,
            android_icons: c.android_icons.clone(),
        }
    }

    /// Precompiler options for this config.
    pub fn precompile_options(&self) -> PrecompileOptions {
        PrecompileOptions {
            format_version: self.cache.format_version,
            scales: self.cache.scales.clone(),
            dark_suffix: self.cache.dark_suffix.clone(),
            require_square: self.cache.require_square,
            android_icons: self.collect.android_icons.clone(),
        }
    }
}

/// Resource tree collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    /// Name of the per-directory rule file.
    pub rule_file: String,
    /// File extensions treated as images.
    pub image_extensions: Vec<String>,
    /// Top-level directories excluded in addition to the built-in list.
    pub excluded_dirs: Vec<String>,
    /// Directories shallower than this walk their subdirectories in parallel.
    pub parallel_depth: usize,
    /// Disable all `skip:` rules (sanity checks).
    pub ignore_skip: bool,
    /// Delete rule files found in a `compatibilityResources` root.
    pub purge_compat_rule_files: bool,
    /// Vendor icon set directory. Its images are flagged and exempt from the
    /// square check.
    pub android_icons: Option<PathBuf>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            rule_file: crate::rules::RULE_FILE_NAME.to_string(),
            image_extensions: vec!["svg".into(), "png".into()],
            excluded_dirs: Vec::new(),
            parallel_depth: 3,
            ignore_skip: false,
            purge_compat_rule_files: false,
            android_icons: None,
        }
    }
}

/// Binary cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Store format version, part of every store file name.
    pub format_version: u32,
    /// Display scales; one light and one dark store each.
    pub scales: Vec<f32>,
    /// Appended to dark store names: `icon-v3-1.0-d.db`.
    pub dark_suffix: String,
    /// Reject non-square light 1x renders.
    pub require_square: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            format_version: 3,
            scales: vec![1.0, 1.25, 1.5, 2.0, 2.5],
            dark_suffix: "-d".to_string(),
            require_square: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `icon-pipeline.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Icon Pipeline Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Collection
# ---------------------------------------------------------------------------
[collect]
# Name of the per-directory rule file (skip:, used:, deprecated:, merge, ...).
rule_file = "icon-robots.txt"

# File extensions treated as icons.
image_extensions = ["svg", "png"]

# Top-level directories of a resource root that never hold icons, in addition
# to META-INF, intentionDescriptions, inspectionDescriptions and fileTemplates.
excluded_dirs = []

# Directories shallower than this walk their subdirectories in parallel.
parallel_depth = 3

# Sanity mode: ignore every skip: rule.
ignore_skip = false

# Delete stray rule files found in a compatibilityResources root.
purge_compat_rule_files = false

# Vendor icon set. Icons below it are flagged and exempt from the square check.
# android_icons = "resources/android"

# ---------------------------------------------------------------------------
# Binary cache
# ---------------------------------------------------------------------------
[cache]
# Store format version, part of every store file name (icon-v3-1.0.db).
format_version = 3

# Display scales. One light and one dark store is written per scale.
scales = [1.0, 1.25, 1.5, 2.0, 2.5]

# Suffix of dark theme store names (icon-v3-1.0-d.db).
dark_suffix = "-d"

# Reject icons whose light 1x render is not square.
require_square = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
