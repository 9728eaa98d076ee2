//! Logical image catalog.
//!
//! A [`LogicalImage`] groups every variant file of one icon concept under its
//! canonical id, together with the flags the rule chain assigned to it. The
//! [`ImageCatalog`] is the concurrent accumulation map the collector's
//! directory workers share; once the walk finishes it is frozen into a
//! sorted `Vec` so downstream output never depends on scan order.

use crate::variant::ImageVariant;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Image '{id}' has two {variant} files: {} and {}", first.display(), second.display())]
    DuplicateFile {
        id: String,
        variant: ImageVariant,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Image '{id}' has several basic files: {files:?}")]
    MultipleBasic { id: String, files: Vec<PathBuf> },
    #[error("Image '{id}' is deprecated inconsistently: {first:?} vs {second:?}")]
    InconsistentDeprecation {
        id: String,
        first: Box<DeprecationInfo>,
        second: Box<DeprecationInfo>,
    },
}

/// Deprecation data assigned by a `deprecated:` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeprecationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Replacement path as written in the rule, anchored to the tree root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_context_type: Option<String>,
    /// Canonical id of the replacement image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_reference: Option<String>,
}

impl DeprecationInfo {
    /// A deprecation whose comment announces removal.
    pub fn scheduled_for_removal(&self) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|c| c.contains("to be removed"))
    }
}

/// Two rule scopes disagree about one file's deprecation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationConflict {
    pub first: DeprecationInfo,
    pub second: DeprecationInfo,
}

/// Combine two optional deprecations: either side may be absent, but two
/// present values must be equal.
pub fn merge_deprecation(
    first: Option<DeprecationInfo>,
    second: Option<DeprecationInfo>,
) -> Result<Option<DeprecationInfo>, DeprecationConflict> {
    match (first, second) {
        (Some(a), Some(b)) if a != b => Err(DeprecationConflict {
            first: a,
            second: b,
        }),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

/// `forceSync:` / `skipSync:` results for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncFlags {
    pub skip_sync: bool,
    pub force_sync: bool,
}

impl SyncFlags {
    pub fn or(self, other: SyncFlags) -> SyncFlags {
        SyncFlags {
            skip_sync: self.skip_sync || other.skip_sync,
            force_sync: self.force_sync || other.force_sync,
        }
    }
}

/// Flags the rule chain assigns to a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageFlags {
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<DeprecationInfo>,
    pub sync: SyncFlags,
}

impl ImageFlags {
    /// OR the booleans, require matching deprecations.
    pub fn merge(self, other: ImageFlags) -> Result<ImageFlags, DeprecationConflict> {
        Ok(ImageFlags {
            used: self.used || other.used,
            deprecation: merge_deprecation(self.deprecation, other.deprecation)?,
            sync: self.sync.or(other.sync),
        })
    }
}

/// One icon concept and all of its variant files.
#[derive(Debug, Clone, Serialize)]
pub struct LogicalImage {
    pub id: String,
    /// Variant → files, sorted. More than one file per variant is only
    /// possible when extensions differ.
    pub files: BTreeMap<ImageVariant, Vec<PathBuf>>,
    /// No backing file: kept alive by a `deprecated:` rule.
    pub phantom: bool,
    /// Belongs to the configured vendor icon set.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub vendor: bool,
    pub flags: ImageFlags,
}

impl LogicalImage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            files: BTreeMap::new(),
            phantom: false,
            vendor: false,
            flags: ImageFlags::default(),
        }
    }

    /// A phantom entry for a deprecated icon whose file is gone.
    pub fn phantom(id: impl Into<String>, flags: ImageFlags) -> Self {
        Self {
            phantom: true,
            flags,
            ..Self::new(id)
        }
    }

    /// Record a variant file. The same variant with the same extension twice
    /// is an error; different extensions are kept side by side.
    pub fn add_file(&mut self, variant: ImageVariant, file: PathBuf) -> Result<(), CatalogError> {
        let files = self.files.entry(variant).or_default();
        let ext = file.extension().map(|e| e.to_ascii_lowercase());
        if let Some(existing) = files
            .iter()
            .find(|f| f.extension().map(|e| e.to_ascii_lowercase()) == ext)
        {
            return Err(CatalogError::DuplicateFile {
                id: self.id.clone(),
                variant,
                first: existing.clone(),
                second: file,
            });
        }
        files.push(file);
        files.sort();
        Ok(())
    }

    /// Merge flags from another file of this image.
    pub fn merge_flags(&mut self, flags: ImageFlags) -> Result<(), CatalogError> {
        let current = std::mem::take(&mut self.flags);
        self.flags = current
            .merge(flags)
            .map_err(|c| CatalogError::InconsistentDeprecation {
                id: self.id.clone(),
                first: Box::new(c.first),
                second: Box::new(c.second),
            })?;
        Ok(())
    }

    /// First file of a variant.
    pub fn file(&self, variant: ImageVariant) -> Option<&Path> {
        self.files
            .get(&variant)
            .and_then(|f| f.first())
            .map(PathBuf::as_path)
    }

    /// The single basic file. Several basic files (differing extensions) are
    /// reported rather than resolved.
    pub fn basic_file(&self) -> Result<Option<&Path>, CatalogError> {
        match self.files.get(&ImageVariant::Basic) {
            Some(files) if files.len() > 1 => Err(CatalogError::MultipleBasic {
                id: self.id.clone(),
                files: files.clone(),
            }),
            Some(files) => Ok(files.first().map(PathBuf::as_path)),
            None => Ok(None),
        }
    }

    pub fn scheduled_for_removal(&self) -> bool {
        self.flags
            .deprecation
            .as_ref()
            .is_some_and(DeprecationInfo::scheduled_for_removal)
    }
}

/// Concurrent id → image map populated by directory workers.
#[derive(Debug, Default)]
pub struct ImageCatalog {
    images: DashMap<String, LogicalImage>,
}

impl ImageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one variant file under `id`, merging its flags into the image.
    pub fn add_image(
        &self,
        id: &str,
        variant: ImageVariant,
        file: PathBuf,
        flags: ImageFlags,
        vendor: bool,
    ) -> Result<(), CatalogError> {
        let mut image = self
            .images
            .entry(id.to_string())
            .or_insert_with(|| LogicalImage::new(id));
        image.add_file(variant, file)?;
        image.merge_flags(flags)?;
        image.vendor |= vendor;
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    /// Insert an image unless the id is taken. Returns whether it was inserted.
    pub fn insert_if_absent(&self, image: LogicalImage) -> bool {
        match self.images.entry(image.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(image);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Freeze into a list sorted by id.
    pub fn into_sorted(self) -> Vec<LogicalImage> {
        let mut images: Vec<LogicalImage> = self.images.into_iter().map(|(_, v)| v).collect();
        images.sort_by(|a, b| a.id.cmp(&b.id));
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deprecated(comment: &str) -> Option<DeprecationInfo> {
        Some(DeprecationInfo {
            comment: Some(comment.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn scheduled_for_removal_from_comment() {
        assert!(deprecated("to be removed in 2025").unwrap().scheduled_for_removal());
        assert!(!deprecated("use the new one").unwrap().scheduled_for_removal());
        assert!(!DeprecationInfo::default().scheduled_for_removal());
    }

    #[test]
    fn merge_deprecation_prefers_present_value() {
        let d = deprecated("x");
        assert_eq!(merge_deprecation(d.clone(), None).unwrap(), d);
        assert_eq!(merge_deprecation(None, d.clone()).unwrap(), d);
        assert_eq!(merge_deprecation(d.clone(), d.clone()).unwrap(), d);
    }

    #[test]
    fn merge_deprecation_conflict() {
        assert!(merge_deprecation(deprecated("a"), deprecated("b")).is_err());
    }

    #[test]
    fn flags_merge_ors_booleans() {
        let a = ImageFlags {
            used: true,
            ..Default::default()
        };
        let b = ImageFlags {
            sync: SyncFlags {
                skip_sync: true,
                force_sync: false,
            },
            ..Default::default()
        };
        let merged = a.merge(b).unwrap();
        assert!(merged.used);
        assert!(merged.sync.skip_sync);
    }

    #[test]
    fn catalog_groups_variants_under_one_id() {
        let catalog = ImageCatalog::new();
        let flags = ImageFlags::default();
        catalog
            .add_image("c", ImageVariant::Basic, "/r/c.svg".into(), flags.clone(), false)
            .unwrap();
        catalog
            .add_image("c", ImageVariant::Dark, "/r/c_dark.svg".into(), flags, false)
            .unwrap();

        let images = catalog.into_sorted();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].file(ImageVariant::Dark), Some(Path::new("/r/c_dark.svg")));
        assert_eq!(images[0].basic_file().unwrap(), Some(Path::new("/r/c.svg")));
    }

    #[test]
    fn same_variant_same_extension_is_error() {
        let mut image = LogicalImage::new("c");
        image.add_file(ImageVariant::Basic, "/a/c.svg".into()).unwrap();
        let err = image.add_file(ImageVariant::Basic, "/b/c.svg".into());
        assert!(matches!(err, Err(CatalogError::DuplicateFile { .. })));
    }

    #[test]
    fn two_basic_extensions_are_signaled() {
        let mut image = LogicalImage::new("c");
        image.add_file(ImageVariant::Basic, "/a/c.svg".into()).unwrap();
        image.add_file(ImageVariant::Basic, "/a/c.png".into()).unwrap();
        assert!(matches!(
            image.basic_file(),
            Err(CatalogError::MultipleBasic { .. })
        ));
    }

    #[test]
    fn conflicting_flags_are_error() {
        let catalog = ImageCatalog::new();
        let a = ImageFlags {
            deprecation: deprecated("a"),
            ..Default::default()
        };
        let b = ImageFlags {
            deprecation: deprecated("b"),
            ..Default::default()
        };
        catalog
            .add_image("c", ImageVariant::Basic, "/r/c.svg".into(), a, false)
            .unwrap();
        let err = catalog.add_image("c", ImageVariant::Dark, "/r/c_dark.svg".into(), b, false);
        assert!(matches!(err, Err(CatalogError::InconsistentDeprecation { .. })));
    }

    #[test]
    fn into_sorted_orders_by_id() {
        let catalog = ImageCatalog::new();
        for id in ["b", "a/z", "a"] {
            catalog.insert_if_absent(LogicalImage::new(id));
        }
        let ids: Vec<String> = catalog.into_sorted().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "a/z", "b"]);
    }

    #[test]
    fn insert_if_absent_keeps_first() {
        let catalog = ImageCatalog::new();
        assert!(catalog.insert_if_absent(LogicalImage::new("a")));
        assert!(!catalog.insert_if_absent(LogicalImage::phantom("a", ImageFlags::default())));
        assert!(!catalog.into_sorted()[0].phantom);
    }
}
