//! Centralized filename parsing for icon variant suffixes.
//!
//! Every icon concept may exist as several files that differ only by a
//! suffix placed between the stem and the extension:
//!
//! | File | Variant |
//! |---|---|
//! | `close.svg` | [`ImageVariant::Basic`] |
//! | `close@2x.svg` | [`ImageVariant::Retina`] |
//! | `close_dark.svg` | [`ImageVariant::Dark`] |
//! | `close@2x_dark.svg` | [`ImageVariant::RetinaDark`] |
//! | `close_stroke.svg` | [`ImageVariant::Stroke`] |
//!
//! The longest matching suffix wins, so `close@2x_dark` is `RetinaDark`, not
//! `Dark` with a stem of `close@2x`.
//!
//! ## Canonical ids
//!
//! A logical image is identified by its path relative to a resource root,
//! with the variant suffix and extension removed and segments joined by `/`:
//! `root/actions/close@2x_dark.svg` → `actions/close`.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// A display variant of a logical image, derived from the filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariant {
    Basic,
    Retina,
    Dark,
    RetinaDark,
    Stroke,
}

/// Suffixes ordered longest first; the first match wins.
const SUFFIXES: &[(&str, ImageVariant)] = &[
    ("@2x_dark", ImageVariant::RetinaDark),
    ("_stroke", ImageVariant::Stroke),
    ("_dark", ImageVariant::Dark),
    ("@2x", ImageVariant::Retina),
];

impl ImageVariant {
    /// Filename suffix for this variant (empty for `Basic`).
    pub fn suffix(self) -> &'static str {
        match self {
            ImageVariant::Basic => "",
            ImageVariant::Retina => "@2x",
            ImageVariant::Dark => "_dark",
            ImageVariant::RetinaDark => "@2x_dark",
            ImageVariant::Stroke => "_stroke",
        }
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageVariant::Basic => "basic",
            ImageVariant::Retina => "retina",
            ImageVariant::Dark => "dark",
            ImageVariant::RetinaDark => "retina_dark",
            ImageVariant::Stroke => "stroke",
        };
        f.write_str(name)
    }
}

/// Result of splitting a file stem into its base name and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStem<'a> {
    pub base: &'a str,
    pub variant: ImageVariant,
}

/// Split a stem (filename without extension) into base name and variant.
///
/// A suffix is only recognized when something remains in front of it, so a
/// file literally named `@2x.svg` is a `Basic` image called `@2x`.
pub fn parse_stem(stem: &str) -> ParsedStem<'_> {
    for (suffix, variant) in SUFFIXES {
        if let Some(base) = stem.strip_suffix(suffix)
            && !base.is_empty()
        {
            return ParsedStem {
                base,
                variant: *variant,
            };
        }
    }
    ParsedStem {
        base: stem,
        variant: ImageVariant::Basic,
    }
}

/// Split a filename into `(stem, extension)`; the extension excludes the dot.
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], Some(&file_name[pos + 1..])),
        _ => (file_name, None),
    }
}

/// Variant of a file, judged by its name alone.
pub fn variant_of(file_name: &str) -> ImageVariant {
    parse_stem(split_extension(file_name).0).variant
}

/// Strip stacked suffixes from a stem. The variant is the one named by the
/// outermost suffix: `close_dark@2x` is `close`, `Retina`.
fn strip_stem(stem: &str) -> ParsedStem<'_> {
    let outer = parse_stem(stem);
    let mut base = outer.base;
    loop {
        let parsed = parse_stem(base);
        if parsed.variant == ImageVariant::Basic {
            break;
        }
        base = parsed.base;
    }
    ParsedStem {
        base,
        variant: outer.variant,
    }
}

/// Remove every trailing variant suffix from a filename, keeping the extension.
///
/// `close@2x_dark.svg` → `close.svg`. Suffixes are stripped until none
/// remains, which makes the operation idempotent.
pub fn strip_variant_suffix(file_name: &str) -> String {
    let (stem, ext) = split_extension(file_name);
    let base = strip_stem(stem).base;
    match ext {
        Some(ext) => format!("{base}.{ext}"),
        None => base.to_string(),
    }
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

/// Canonical id and variant of `file` relative to `root`.
///
/// The id drops stacked suffixes exactly like [`strip_variant_suffix`], so
/// rule patterns and catalog ids agree on what an icon is called.
///
/// Returns `None` when `file` is not below `root`.
pub fn canonical_id(file: &Path, root: &Path) -> Option<(String, ImageVariant)> {
    let rel = file.strip_prefix(root).ok()?;
    let file_name = rel.file_name()?.to_string_lossy();
    let (stem, _) = split_extension(&file_name);
    let parsed = strip_stem(stem);
    let id = match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => format!("{}/{}", to_slash(parent), parsed.base),
        None => parsed.base.to_string(),
    };
    Some((id, parsed.variant))
}

/// File extension in lower case, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}
