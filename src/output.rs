//! CLI output formatting for the collect, check and precompile commands.
//!
//! Output is information-first: every entry leads with its canonical id, with
//! variants, flags and source files shown as indented context lines.
//!
//! ## Collect
//!
//! ```text
//! Images (3, 1 phantom)
//! 001 actions/close [basic, retina, dark]
//! 002 actions/old (phantom)
//!     Deprecated: use /actions/close.svg
//!     Replacement: actions/close
//! 003 general/add [basic] used
//!
//! Mappings
//!     add → general/add
//!
//! Rule files
//!     icons/icon-robots.txt
//! ```
//!
//! ## Precompile
//!
//! ```text
//! Icons: 120 (4 duplicates)
//!     icon-v3-1.0.db: 120 records, 45210 bytes
//!     icon-v3-1.0-d.db: 37 records, 13010 bytes
//! Wrote 2 stores, 58220 bytes in 1.52s
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::catalog::LogicalImage;
use crate::collect::Catalog;
use crate::precompile::PrecompileStats;
use std::collections::BTreeSet;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// One header line per image: index, id, variants and markers.
fn image_header(index: usize, image: &LogicalImage) -> String {
    let mut line = format!("{} {}", format_index(index), image.id);
    if image.phantom {
        line.push_str(" (phantom)");
    } else {
        let variants: Vec<String> = image.files.keys().map(|v| v.to_string()).collect();
        line.push_str(&format!(" [{}]", variants.join(", ")));
    }
    if image.flags.used {
        line.push_str(" used");
    }
    if image.vendor {
        line.push_str(" vendor");
    }
    line
}

/// Context lines for the flags that need more than a marker.
fn image_details(image: &LogicalImage) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(ref deprecation) = image.flags.deprecation {
        let mut line = "    Deprecated".to_string();
        if let Some(ref replacement) = deprecation.replacement {
            line.push_str(&format!(": use {}", replacement));
        }
        if image.scheduled_for_removal() {
            line.push_str(" (to be removed)");
        }
        lines.push(line);
        if let Some(ref reference) = deprecation.replacement_reference {
            lines.push(format!("    Replacement: {}", reference));
        }
    }
    let sync = image.flags.sync;
    if sync.force_sync {
        lines.push("    Sync: forced".to_string());
    } else if sync.skip_sync {
        lines.push("    Sync: skipped".to_string());
    }
    lines
}

// ============================================================================
// Collect output
// ============================================================================

/// Format the collected catalog: images, mappings, directory names and the
/// rule files that were read.
pub fn format_catalog_summary(catalog: &Catalog) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(if catalog.phantom_count > 0 {
        format!(
            "Images ({}, {} phantom)",
            catalog.images.len(),
            catalog.phantom_count
        )
    } else {
        format!("Images ({})", catalog.images.len())
    });
    for (i, image) in catalog.images.iter().enumerate() {
        lines.push(image_header(i + 1, image));
        lines.extend(image_details(image));
    }

    if !catalog.mappings.is_empty() {
        lines.push(String::new());
        lines.push("Mappings".to_string());
        for entry in &catalog.mappings {
            lines.push(format!("    {} → {}", entry.old_id, entry.new_id));
        }
    }

    if !catalog.directory_names.is_empty() {
        lines.push(String::new());
        lines.push("Directory names".to_string());
        for (dir, name) in &catalog.directory_names {
            lines.push(format!("    {}: {}", dir, name));
        }
    }

    if !catalog.rule_files.is_empty() {
        lines.push(String::new());
        lines.push("Rule files".to_string());
        for path in &catalog.rule_files {
            lines.push(format!("    {}", path.display()));
        }
    }

    lines
}

/// Print the catalog summary to stdout.
pub fn print_catalog_summary(catalog: &Catalog) {
    for line in format_catalog_summary(catalog) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Compare a normal collection with one that ignored every skip rule.
///
/// Lists the ids that only exist because skip rules were disabled, i.e. the
/// icons the rule files hide.
pub fn format_check(filtered: &Catalog, unfiltered: &Catalog) -> Vec<String> {
    let kept: BTreeSet<&str> = filtered.images.iter().map(|i| i.id.as_str()).collect();
    let hidden: Vec<&str> = unfiltered
        .images
        .iter()
        .map(|i| i.id.as_str())
        .filter(|id| !kept.contains(id))
        .collect();

    let mut lines = vec![format!(
        "Collected {} image(s), {} without skip rules",
        filtered.images.len(),
        unfiltered.images.len()
    )];
    if hidden.is_empty() {
        lines.push("No icons hidden by skip rules".to_string());
    } else {
        lines.push(format!("Hidden by skip rules ({})", hidden.len()));
        for (i, id) in hidden.iter().enumerate() {
            lines.push(format!("    {} {}", format_index(i + 1), id));
        }
    }
    lines
}

/// Print the check report to stdout.
pub fn print_check(filtered: &Catalog, unfiltered: &Catalog) {
    for line in format_check(filtered, unfiltered) {
        println!("{}", line);
    }
}

// ============================================================================
// Precompile output
// ============================================================================

/// Format precompiler totals: icons, per-store records, bytes and wall time.
pub fn format_precompile_stats(stats: &PrecompileStats) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(if stats.duplicates > 0 {
        format!("Icons: {} ({} duplicates)", stats.icons, stats.duplicates)
    } else {
        format!("Icons: {}", stats.icons)
    });

    let mut total = 0u64;
    for store in &stats.stores {
        total += store.bytes;
        let name = store
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| store.path.display().to_string());
        lines.push(format!(
            "    {}: {} records, {} bytes",
            name, store.records, store.bytes
        ));
    }
    lines.push(format!(
        "Wrote {} stores, {} bytes in {:.2}s",
        stats.stores.len(),
        total,
        stats.elapsed.as_secs_f64()
    ));
    lines
}

/// Print precompiler totals to stdout.
pub fn print_precompile_stats(stats: &PrecompileStats) {
    for line in format_precompile_stats(stats) {
        println!("{}", line);
    }
}
