//! Resource tree collection.
//!
//! Walks resource roots, applies the rule chain at every directory and groups
//! image files into [`LogicalImage`]s keyed by canonical id.
//!
//! ## Per-root flow
//!
//! ```text
//! root/
//! ├── META-INF/            # always excluded (plus configured extras)
//! └── icons/               # anchor: deepest common ancestor of all image dirs
//!     ├── icon-robots.txt
//!     ├── a.svg
//!     └── nested/
//!         ├── c.svg
//!         └── c_dark.svg
//! ```
//!
//! 1. Find the anchor so unrelated subtrees are never scanned.
//! 2. Fork rules from the root down to the anchor.
//! 3. Walk the anchor top-down. Skipped directories are pruned whole, and
//!    their rule files are never read. Subdirectories fan out in parallel
//!    above the configured depth.
//! 4. After a directory's whole subtree is in the catalog, run its phantom
//!    pass: every wildcard-free `deprecated:` entry of its own rule file
//!    whose icon is missing becomes a phantom image.
//! 5. Apply merge roots and the mapping file ([`crate::merge`]).
//!
//! A root that is missing or not a directory contributes nothing. A root
//! named `compatibilityResources` is never scanned.

use crate::catalog::{CatalogError, ImageCatalog, LogicalImage};
use crate::merge::{self, MappingEntry, MergeError, MergeRoot};
use crate::rules::{RuleError, RuleOptions, RuleSet};
use crate::variant::{canonical_id, extension_of, to_slash};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Top-level directories of a resource root that never hold icons.
pub const ALWAYS_EXCLUDED_DIRS: &[&str] = &[
    "META-INF",
    "intentionDescriptions",
    "inspectionDescriptions",
    "fileTemplates",
];

/// Root name that is never scanned for images.
pub const COMPAT_ROOT_NAME: &str = "compatibilityResources";

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Rule error: {0}")]
    Rules(#[from] RuleError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("Phantom icon '{id}' is declared by two rule files: {} and {}", first.display(), second.display())]
    DuplicatePhantom {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Image id '{id}' exists in two resource roots: {} and {}", first.display(), second.display())]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Collector settings, usually built from [`crate::config::CollectConfig`].
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub rule_file: String,
    /// Lower-case extensions without the dot.
    pub image_extensions: Vec<String>,
    /// Extra top-level directories to exclude.
    pub excluded_dirs: Vec<String>,
    /// Subdirectories of directories shallower than this are walked in parallel.
    pub parallel_depth: usize,
    pub ignore_skip: bool,
    pub purge_compat_rule_files: bool,
    /// Vendor icon set directory; images below it are flagged `vendor`.
    pub android_icons: Option<PathBuf>,
}

impl Default for CollectOptions {
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

/// The collected, merged and sorted catalog of one run.
#[derive(Debug, Default, Serialize)]
pub struct Catalog {
    pub images: Vec<LogicalImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<MappingEntry>,
    /// Relative directory → `name:` value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub directory_names: BTreeMap<String, String>,
    /// Every rule file the walk loaded, sorted.
    pub rule_files: Vec<PathBuf>,
    pub phantom_count: usize,
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&LogicalImage> {
        self.images
            .binary_search_by(|i| i.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.images[idx])
    }
}

pub struct Collector {
    options: CollectOptions,
}

impl Collector {
    pub fn new(options: CollectOptions) -> Self {
        Self { options }
    }

    /// Collect every root, sequentially, into one catalog.
    pub fn collect(&self, roots: &[PathBuf]) -> Result<Catalog, CollectError> {
        let mut images: BTreeMap<String, (LogicalImage, PathBuf)> = BTreeMap::new();
        let mut catalog = Catalog::default();

        for root in roots {
            let Some(result) = self.collect_root(root)? else {
                continue;
            };
            info!(
                "Collected {} image(s) from {}",
                result.images.len(),
                root.display()
            );
            for image in result.images {
                match images.get(&image.id) {
                    Some((_, first)) => {
                        return Err(CollectError::DuplicateId {
                            id: image.id,
                            first: first.clone(),
                            second: root.clone(),
                        });
                    }
                    None => {
                        images.insert(image.id.clone(), (image, root.clone()));
                    }
                }
            }
            catalog.mappings.extend(result.mappings);
            catalog.directory_names.extend(result.directory_names);
            catalog.rule_files.extend(result.rule_files);
        }

        catalog.images = images.into_values().map(|(image, _)| image).collect();
        catalog.phantom_count = catalog.images.iter().filter(|i| i.phantom).count();
        catalog.mappings.sort();
        catalog.rule_files.sort();
        Ok(catalog)
    }

    fn collect_root(&self, root: &Path) -> Result<Option<RootResult>, CollectError> {
        if !root.is_dir() {
            debug!("Skipping missing resource root {}", root.display());
            return Ok(None);
        }
        if root.file_name().is_some_and(|n| n == COMPAT_ROOT_NAME) {
            if self.options.purge_compat_rule_files {
                self.purge_rule_files(root)?;
            }
            return Ok(None);
        }

        let scan = RootScan::new(&self.options, root);
        let Some(anchor) = scan.find_anchor() else {
            debug!("No images below {}", root.display());
            return Ok(None);
        };
        debug!("Scan anchor for {}: {}", root.display(), anchor.display());

        // Fork the chain from the root down to the anchor's parent.
        let mut rules = RuleSet::root(RuleOptions {
            file_name: self.options.rule_file.clone(),
            ignore_skip: self.options.ignore_skip,
        });
        let mut declared_above = Vec::new();
        let mut pruned = false;
        let ancestors: Vec<&Path> = anchor
            .ancestors()
            .skip(1)
            .take_while(|a| a.starts_with(root))
            .collect();
        for dir in ancestors.into_iter().rev() {
            if rules.is_dir_skipped(dir) {
                pruned = true;
                break;
            }
            let forked = rules.fork(dir, root)?;
            if forked.declared_in(dir) {
                scan.register_node(dir, &forked);
                declared_above.push(Arc::clone(&forked));
            }
            rules = forked;
        }

        if !pruned {
            scan.walk_dir(&anchor, &rules, 0)?;
        }
        for node in declared_above.iter().rev() {
            scan.phantom_pass(node)?;
        }

        scan.finish()
    }

    fn purge_rule_files(&self, root: &Path) -> Result<(), CollectError> {
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if entry.file_type().is_file() && entry.file_name() == self.options.rule_file.as_str() {
                fs::remove_file(path).map_err(|source| CollectError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!("Removed stray rule file {}", path.display());
            }
        }
        Ok(())
    }
}

struct RootResult {
    images: Vec<LogicalImage>,
    mappings: Vec<MappingEntry>,
    directory_names: BTreeMap<String, String>,
    rule_files: Vec<PathBuf>,
}

/// Shared state of one root's walk. Directory workers populate it
/// concurrently.
struct RootScan<'a> {
    options: &'a CollectOptions,
    root: PathBuf,
    catalog: ImageCatalog,
    /// Relative dir → `mergeAdd` snapshot.
    merge_roots: DashMap<String, Vec<String>>,
    /// Phantom id → declaring rule file.
    phantoms: DashMap<String, PathBuf>,
    rule_files: DashSet<PathBuf>,
    directory_names: DashMap<String, String>,
}

impl<'a> RootScan<'a> {
    fn new(options: &'a CollectOptions, root: &Path) -> Self {
        Self {
            options,
            root: root.to_path_buf(),
            catalog: ImageCatalog::new(),
            merge_roots: DashMap::new(),
            phantoms: DashMap::new(),
            rule_files: DashSet::new(),
            directory_names: DashMap::new(),
        }
    }

    fn is_image(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.options.image_extensions.contains(&ext))
    }

    fn is_excluded_top_level(&self, dir: &Path) -> bool {
        if dir.parent() != Some(self.root.as_path()) {
            return false;
        }
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        ALWAYS_EXCLUDED_DIRS.iter().any(|d| *d == name)
            || self.options.excluded_dirs.iter().any(|d| *d == name)
    }

    /// Deepest directory that is an ancestor of every directory holding an
    /// image file, outside excluded top-level directories.
    fn find_anchor(&self) -> Option<PathBuf> {
        let mut anchor: Option<PathBuf> = None;
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.is_excluded_top_level(e.path())));
        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() || !self.is_image(entry.path()) {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            anchor = Some(match anchor {
                None => dir.to_path_buf(),
                Some(current) => common_ancestor(&current, dir),
            });
        }
        anchor
    }

    fn relative(&self, dir: &Path) -> String {
        dir.strip_prefix(&self.root)
            .map(to_slash)
            .unwrap_or_default()
    }

    /// Record what a freshly created rule node declares for its directory.
    fn register_node(&self, dir: &Path, rules: &RuleSet) {
        if let Some(source) = rules.source() {
            self.rule_files.insert(source.to_path_buf());
        }
        if let Some(name) = rules.display_name() {
            self.directory_names
                .insert(self.relative(dir), name.to_string());
        }
        if rules.merge_to_root() {
            let rel = self.relative(dir);
            debug!("Merge root: '{rel}'");
            self.merge_roots.insert(rel, rules.merge_add().to_vec());
        }
    }

    fn walk_dir(&self, dir: &Path, parent_rules: &Arc<RuleSet>, depth: usize) -> Result<(), CollectError> {
        if parent_rules.is_dir_skipped(dir) {
            debug!("Skipping {}", dir.display());
            return Ok(());
        }
        let rules = parent_rules.fork(dir, &self.root)?;
        let declared = rules.declared_in(dir);
        if declared {
            self.register_node(dir, &rules);
        }

        let Ok(entries) = fs::read_dir(dir) else {
            return Ok(());
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
        paths.sort();

        let mut subdirs = Vec::new();
        for path in paths {
            if path.is_dir() {
                if !self.is_excluded_top_level(&path) {
                    subdirs.push(path);
                }
                continue;
            }
            if !self.is_image(&path) || rules.is_skipped(&path) {
                continue;
            }
            self.add_file(&rules, path)?;
        }

        if depth < self.options.parallel_depth {
            subdirs
                .par_iter()
                .try_for_each(|sub| self.walk_dir(sub, &rules, depth + 1))?;
        } else {
            for sub in &subdirs {
                self.walk_dir(sub, &rules, depth + 1)?;
            }
        }

        if declared {
            self.phantom_pass(&rules)?;
        }
        Ok(())
    }

    fn add_file(&self, rules: &RuleSet, path: PathBuf) -> Result<(), CollectError> {
        let Some((id, variant)) = canonical_id(&path, &self.root) else {
            return Ok(());
        };
        let flags = rules.image_flags(&path)?;
        let vendor = self
            .options
            .android_icons
            .as_deref()
            .is_some_and(|dir| path.starts_with(dir));
        self.catalog.add_image(&id, variant, path, flags, vendor)?;
        Ok(())
    }

    /// Synthesize phantom images for a node's own deprecated icons.
    ///
    /// Runs only once the declaring directory's whole subtree is in the
    /// catalog, so an icon that exists anywhere below is never a phantom.
    fn phantom_pass(&self, rules: &RuleSet) -> Result<(), CollectError> {
        let source = rules.source().map(Path::to_path_buf).unwrap_or_default();
        for own in rules.own_deprecated() {
            let Some((id, _)) = canonical_id(&own.path, &self.root) else {
                continue;
            };
            match self.phantoms.entry(id.clone()) {
                Entry::Occupied(existing) => {
                    if *existing.get() != source {
                        return Err(CollectError::DuplicatePhantom {
                            id,
                            first: existing.get().clone(),
                            second: source,
                        });
                    }
                }
                Entry::Vacant(slot) => {
                    if own.path.exists() || self.catalog.contains(&id) {
                        continue;
                    }
                    let flags = rules.image_flags(&own.path)?;
                    if self.catalog.insert_if_absent(LogicalImage::phantom(id.clone(), flags)) {
                        debug!("Phantom icon '{id}' from {}", source.display());
                        slot.insert(source.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<RootResult>, CollectError> {
        let mut merge_roots: Vec<MergeRoot> = self
            .merge_roots
            .into_iter()
            .map(|(prefix, merge_add)| MergeRoot { prefix, merge_add })
            .collect();
        merge_roots.sort_by(|a, b| a.prefix.cmp(&b.prefix));

        let mapping = match merge::find_mapping_file(&self.root)? {
            Some(path) => Some(merge::load_mapping(&path)?),
            None => None,
        };
        let merged = merge::merge_images(
            self.catalog.into_sorted(),
            &merge_roots,
            mapping.as_deref(),
        )?;

        let mut rule_files: Vec<PathBuf> = self.rule_files.into_iter().collect();
        rule_files.sort();
        Ok(Some(RootResult {
            images: merged.images,
            mappings: merged.mappings,
            directory_names: self.directory_names.into_iter().collect(),
            rule_files,
        }))
    }
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::variant::ImageVariant;
    use tempfile::TempDir;

    fn collect(root: &Path) -> Result<Catalog, CollectError> {
        Collector::new(CollectOptions::default()).collect(&[root.to_path_buf()])
    }

    // =========================================================================
    // Anchor
    // =========================================================================

    #[test]
    fn common_ancestor_of_siblings() {
        assert_eq!(
            common_ancestor(Path::new("/r/icons/a"), Path::new("/r/icons/b/c")),
            PathBuf::from("/r/icons")
        );
    }

    #[test]
    fn anchor_ignores_excluded_top_level_dirs() {
        let tmp = TempDir::new().unwrap();
        touch_icon(&tmp.path().join("META-INF/pluginIcon.svg"));
        touch_icon(&tmp.path().join("icons/actions/a.svg"));
        touch_icon(&tmp.path().join("icons/general/b.svg"));

        let options = CollectOptions::default();
        let scan = RootScan::new(&options, tmp.path());
        assert_eq!(scan.find_anchor(), Some(tmp.path().join("icons")));
    }

    #[test]
    fn configured_excluded_dirs_are_not_scanned() {
        let tmp = TempDir::new().unwrap();
        touch_icon(&tmp.path().join("generated/x.svg"));
        touch_icon(&tmp.path().join("icons/a.svg"));

        let options = CollectOptions {
            excluded_dirs: vec!["generated".into()],
            ..Default::default()
        };
        let catalog = Collector::new(options)
            .collect(&[tmp.path().to_path_buf()])
            .unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["icons/a"]);
    }

    #[test]
    fn ids_are_relative_to_root_not_anchor() {
        let tmp = TempDir::new().unwrap();
        touch_icon(&tmp.path().join("icons/actions/close.svg"));
        let catalog = collect(tmp.path()).unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["icons/actions/close"]);
    }

    // =========================================================================
    // Roots
    // =========================================================================

    #[test]
    fn missing_root_is_empty() {
        let catalog = collect(Path::new("/nonexistent/resources")).unwrap();
        assert!(catalog.images.is_empty());
    }

    #[test]
    fn compat_root_is_not_scanned_but_purged_on_request() {
        let tmp = TempDir::new().unwrap();
        let compat = tmp.path().join(COMPAT_ROOT_NAME);
        touch_icon(&compat.join("icons/a.svg"));
        write_rules(&compat.join("icons"), "used: a.svg\n");

        let catalog = collect(&compat).unwrap();
        assert!(catalog.images.is_empty());
        assert!(compat.join("icons").join(crate::rules::RULE_FILE_NAME).exists());

        let options = CollectOptions {
            purge_compat_rule_files: true,
            ..Default::default()
        };
        Collector::new(options).collect(&[compat.clone()]).unwrap();
        assert!(!compat.join("icons").join(crate::rules::RULE_FILE_NAME).exists());
    }

    #[test]
    fn duplicate_id_across_roots_is_error() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch_icon(&a.path().join("icons/x.svg"));
        touch_icon(&b.path().join("icons/x.svg"));
        let err = Collector::new(CollectOptions::default())
            .collect(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, CollectError::DuplicateId { .. }));
    }

    // =========================================================================
    // Walk
    // =========================================================================

    #[test]
    fn skip_prunes_subtree_and_variants_group() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "skip: excluded/*\n");
        touch_icon(&root.join("a.svg"));
        touch_icon(&root.join("excluded/b.svg"));
        touch_icon(&root.join("nested/c.svg"));
        touch_icon(&root.join("nested/c_dark.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["a", "nested/c"]);
        let c = catalog.get("nested/c").unwrap();
        assert!(c.file(ImageVariant::Basic).is_some());
        assert!(c.file(ImageVariant::Dark).is_some());
        assert_eq!(catalog.rule_files, vec![root.join(crate::rules::RULE_FILE_NAME)]);
    }

    #[test]
    fn skipped_directory_rule_file_is_never_read() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "skip: broken\n");
        write_rules(&root.join("broken"), "not a directive\n");
        touch_icon(&root.join("broken/x.svg"));
        touch_icon(&root.join("a.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["a"]);
        assert_eq!(catalog.rule_files.len(), 1);
    }

    #[test]
    fn skipped_directory_spares_suffixed_siblings() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "skip: general\n");
        touch_icon(&root.join("general/a.svg"));
        touch_icon(&root.join("general_dark/b.svg"));
        touch_icon(&root.join("other/c.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["general_dark/b", "other/c"]);
    }

    #[test]
    fn stacked_suffixes_group_under_the_skipped_id() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "skip: hidden.svg\n");
        touch_icon(&root.join("close.svg"));
        touch_icon(&root.join("close_dark@2x.svg"));
        touch_icon(&root.join("hidden_dark@2x.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["close"]);
        let close = catalog.get("close").unwrap();
        assert_eq!(
            close.file(ImageVariant::Retina),
            Some(root.join("close_dark@2x.svg").as_path())
        );
    }

    #[test]
    fn deep_trees_walk_sequentially_below_parallel_depth() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch_icon(&root.join("a/b/c/d/e/deep.svg"));
        touch_icon(&root.join("a/top.svg"));
        let options = CollectOptions {
            parallel_depth: 1,
            ..Default::default()
        };
        let catalog = Collector::new(options)
            .collect(&[root.to_path_buf()])
            .unwrap();
        assert_eq!(catalog_ids(&catalog), vec!["a/b/c/d/e/deep", "a/top"]);
    }

    #[test]
    fn vendor_icons_are_flagged() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch_icon(&root.join("icons/android/a.svg"));
        touch_icon(&root.join("icons/b.svg"));
        let options = CollectOptions {
            android_icons: Some(root.join("icons/android")),
            ..Default::default()
        };
        let catalog = Collector::new(options)
            .collect(&[root.to_path_buf()])
            .unwrap();
        assert!(catalog.get("icons/android/a").unwrap().vendor);
        assert!(!catalog.get("icons/b").unwrap().vendor);
    }

    #[test]
    fn directory_names_are_exported() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(&root.join("icons/actions"), "name: Actions\n");
        touch_icon(&root.join("icons/actions/run.svg"));
        touch_icon(&root.join("icons/general/add.svg"));
        let catalog = collect(root).unwrap();
        assert_eq!(
            catalog.directory_names.get("icons/actions").map(String::as_str),
            Some("Actions")
        );
    }

    // =========================================================================
    // Phantoms
    // =========================================================================

    #[test]
    fn phantom_for_missing_deprecated_icon() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "deprecated: old_icon.svg->new/icon.svg;to be removed\n");
        touch_icon(&root.join("new/icon.svg"));

        let catalog = collect(root).unwrap();
        let old = catalog.get("old_icon").unwrap();
        assert!(old.phantom);
        assert!(old.scheduled_for_removal());
        assert_eq!(
            old.flags.deprecation.as_ref().unwrap().replacement_reference.as_deref(),
            Some("new/icon")
        );
        assert_eq!(catalog.phantom_count, 1);
    }

    #[test]
    fn no_phantom_when_icon_exists_deeper() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "deprecated: sub/real.svg\n");
        touch_icon(&root.join("sub/real_dark.svg"));

        let catalog = collect(root).unwrap();
        let real = catalog.get("sub/real").unwrap();
        assert!(!real.phantom);
        assert!(real.flags.deprecation.is_some());
    }

    #[test]
    fn inherited_rule_does_not_duplicate_phantom() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "deprecated: old_icon.svg;to be removed\n");
        touch_icon(&root.join("deeper/x.svg"));
        touch_icon(&root.join("deeper/more/y.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(catalog.phantom_count, 1);
    }

    #[test]
    fn same_phantom_from_two_rule_files_is_error() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "deprecated: sub/gone.svg\n");
        write_rules(&root.join("sub"), "deprecated: gone.svg\n");
        touch_icon(&root.join("sub/present.svg"));

        let err = collect(root).unwrap_err();
        assert!(matches!(err, CollectError::DuplicatePhantom { ref id, .. } if id == "sub/gone"));
    }

    #[test]
    fn phantom_declared_above_anchor() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(root, "deprecated: icons/gone.svg\n");
        touch_icon(&root.join("icons/a/x.svg"));
        touch_icon(&root.join("icons/b/y.svg"));

        let catalog = collect(root).unwrap();
        assert!(catalog.get("icons/gone").unwrap().phantom);
    }

    // =========================================================================
    // Merge
    // =========================================================================

    #[test]
    fn merge_root_is_scoped_to_declaring_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_rules(&root.join("icons/new"), "merge\nmergeAdd: /keep.svg\n");
        touch_icon(&root.join("icons/new/close.svg"));
        touch_icon(&root.join("icons/new/keep.svg"));
        touch_icon(&root.join("icons/new/inner/deep.svg"));
        touch_icon(&root.join("icons/new2/open.svg"));

        let catalog = collect(root).unwrap();
        assert_eq!(
            catalog_ids(&catalog),
            vec!["icons/close", "icons/inner/deep", "icons/new/keep", "icons/new2/open"]
        );
    }
}
