//! Hierarchical icon rules.
//!
//! Any directory of a resource tree may carry a rule file (default name
//! `icon-robots.txt`, see [`loader`] for the grammar). Rules cascade down the
//! tree:
//!
//! ```text
//! icons/icon-robots.txt              ← applies to all of icons/
//! icons/actions/icon-robots.txt      ← applies to icons/actions/, on top of the above
//! icons/actions/big/                 ← no rule file: shares the actions/ node
//! ```
//!
//! A [`RuleSet`] is one immutable node of that chain. Children hold an
//! `Arc` to their parent and own only their own pattern lists; a directory
//! without a rule file reuses its parent's node, so the chain only grows
//! where rule files exist.
//!
//! ## Combining rules
//!
//! - **skip**: any matching `skip:` in the chain skips the path.
//! - **used**: OR of every node's `used:` match.
//! - **deprecated**: the first matching `deprecated:` per node; two nodes
//!   matching with different data is a fatal inconsistency.
//! - **merge** / **mergeAdd**: local to the directory that declares them,
//!   never inherited (see [`RuleSet::declared_in`]).
//!
//! Patterns are matched against the path both as written and with the
//! variant suffix stripped, so `skip: close.svg` also covers
//! `close@2x_dark.svg`.

pub mod glob;
pub mod loader;

use crate::catalog::{DeprecationInfo, ImageFlags, SyncFlags, merge_deprecation};
use crate::variant::{canonical_id, strip_variant_suffix, to_slash};
use loader::{Directive, DirectiveLine};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default name of the per-directory rule file.
pub const RULE_FILE_NAME: &str = "icon-robots.txt";

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rule file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: unknown directive: {content}", path.display())]
    UnknownDirective {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("{}:{line}: empty value for '{directive}'", path.display())]
    EmptyValue {
        path: PathBuf,
        line: usize,
        directive: &'static str,
    },
    #[error("{}:{line}: malformed deprecated directive: {reason}", path.display())]
    MalformedDeprecation {
        path: PathBuf,
        line: usize,
        reason: &'static str,
    },
    #[error("{}:{line}: invalid pattern '{pattern}': {source}", path.display())]
    InvalidPattern {
        path: PathBuf,
        line: usize,
        pattern: String,
        source: regex::Error,
    },
    #[error("{} is deprecated inconsistently by nested rules: {first:?} vs {second:?}", file.display())]
    InconsistentDeprecation {
        file: PathBuf,
        first: Box<DeprecationInfo>,
        second: Box<DeprecationInfo>,
    },
}

/// Settings shared by every node of one chain.
#[derive(Debug, Clone)]
pub struct RuleOptions {
    /// Name of the rule file looked up in each directory.
    pub file_name: String,
    /// Sanity-check mode: disable all `skip:` matching.
    pub ignore_skip: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            file_name: RULE_FILE_NAME.to_string(),
            ignore_skip: false,
        }
    }
}

/// A deprecated icon named without wildcards: a phantom candidate when its
/// file does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnDeprecated {
    pub path: PathBuf,
    pub info: DeprecationInfo,
}

#[derive(Debug)]
struct DeprecatedRule {
    pattern: Regex,
    info: DeprecationInfo,
}

/// One node of the rule chain.
#[derive(Debug)]
pub struct RuleSet {
    parent: Option<Arc<RuleSet>>,
    options: Arc<RuleOptions>,
    /// Directory whose rule file created this node; `None` for the empty root.
    dir: Option<PathBuf>,
    source: Option<PathBuf>,
    skip: Vec<Regex>,
    used: Vec<Regex>,
    force_sync: Vec<Regex>,
    skip_sync: Vec<Regex>,
    deprecated: Vec<DeprecatedRule>,
    merge_to_root: bool,
    merge_add: Vec<String>,
    own_deprecated: Vec<OwnDeprecated>,
    display_name: Option<String>,
}

/// A path prepared for matching: as written and suffix-stripped.
///
/// Only file names carry variant suffixes. A directory keeps its name as is,
/// so `general_dark/` is a different directory from `general/`.
struct Candidate {
    raw: String,
    normalized: String,
}

impl Candidate {
    fn dir(path: &Path) -> Self {
        let raw = to_slash(path);
        Self {
            normalized: raw.clone(),
            raw,
        }
    }

    fn file(path: &Path) -> Self {
        let raw = to_slash(path);
        let normalized = match path.file_name() {
            Some(name) => {
                let stripped = strip_variant_suffix(&name.to_string_lossy());
                match path.parent() {
                    Some(parent) => format!("{}/{stripped}", to_slash(parent)),
                    None => stripped,
                }
            }
            None => raw.clone(),
        };
        Self { raw, normalized }
    }

    fn matches(&self, re: &Regex) -> bool {
        re.is_match(&self.normalized) || re.is_match(&self.raw)
    }
}

impl RuleSet {
    /// The empty node every chain starts from.
    pub fn root(options: RuleOptions) -> Arc<Self> {
        Arc::new(Self::empty(None, Arc::new(options), None, None))
    }

    fn empty(
        parent: Option<Arc<RuleSet>>,
        options: Arc<RuleOptions>,
        dir: Option<PathBuf>,
        source: Option<PathBuf>,
    ) -> Self {
        Self {
            parent,
            options,
            dir,
            source,
            skip: Vec::new(),
            used: Vec::new(),
            force_sync: Vec::new(),
            skip_sync: Vec::new(),
            deprecated: Vec::new(),
            merge_to_root: false,
            merge_add: Vec::new(),
            own_deprecated: Vec::new(),
            display_name: None,
        }
    }

    /// Rules in effect for `dir`.
    ///
    /// Without a rule file in `dir` this is `self`, unchanged. Otherwise the
    /// file is parsed and a child node is created whose patterns are anchored
    /// at `dir` (or at `tree_root` for patterns starting with `/`).
    pub fn fork(self: &Arc<Self>, dir: &Path, tree_root: &Path) -> Result<Arc<Self>, RuleError> {
        let file = dir.join(&self.options.file_name);
        if !file.is_file() {
            return Ok(Arc::clone(self));
        }
        let directives = loader::parse_rule_file(&file)?;
        debug!(
            "Loaded {} rule(s) from {}",
            directives.len(),
            file.display()
        );
        let node = Self::from_directives(Arc::clone(self), dir, tree_root, file, directives)?;
        Ok(Arc::new(node))
    }

    /// Build a child node from already-parsed directives.
    pub fn from_directives(
        parent: Arc<RuleSet>,
        dir: &Path,
        tree_root: &Path,
        source: PathBuf,
        directives: Vec<DirectiveLine>,
    ) -> Result<Self, RuleError> {
        let options = Arc::clone(&parent.options);
        let mut node = Self::empty(
            Some(parent),
            options,
            Some(dir.to_path_buf()),
            Some(source.clone()),
        );

        let dir_slash = to_slash(dir);
        let root_slash = to_slash(tree_root);
        let anchor = |value: &str| -> String {
            if value.starts_with('/') {
                format!("{root_slash}{value}")
            } else {
                format!("{dir_slash}/{value}")
            }
        };
        let compile = |line: usize, value: &str| -> Result<Regex, RuleError> {
            glob::compile(&anchor(value)).map_err(|e| RuleError::InvalidPattern {
                path: source.clone(),
                line,
                pattern: value.to_string(),
                source: e,
            })
        };

        for DirectiveLine { line, directive } in directives {
            match directive {
                Directive::Skip(v) => node.skip.push(compile(line, &v)?),
                Directive::Used(v) => node.used.push(compile(line, &v)?),
                Directive::ForceSync(v) => node.force_sync.push(compile(line, &v)?),
                Directive::SkipSync(v) => node.skip_sync.push(compile(line, &v)?),
                Directive::Merge => node.merge_to_root = true,
                Directive::MergeAdd(v) => node.merge_add.push(v),
                Directive::Name(v) => node.display_name = Some(v),
                Directive::Deprecated(d) => {
                    let replacement_full = d.replacement.as_deref().map(|r| anchor(r));
                    let replacement_reference = replacement_full
                        .as_deref()
                        .and_then(|full| canonical_id(Path::new(full), tree_root))
                        .map(|(id, _)| id);
                    let replacement = replacement_full.map(|full| {
                        full.strip_prefix(&root_slash)
                            .map(String::from)
                            .unwrap_or(full)
                    });
                    let info = DeprecationInfo {
                        comment: d.comment,
                        replacement,
                        replacement_context_type: d.context_type,
                        replacement_reference,
                    };
                    if !glob::has_wildcard(&d.pattern) && !d.pattern.starts_with('/') {
                        node.own_deprecated.push(OwnDeprecated {
                            path: dir.join(&d.pattern),
                            info: info.clone(),
                        });
                    }
                    node.deprecated.push(DeprecatedRule {
                        pattern: compile(line, &d.pattern)?,
                        info,
                    });
                }
            }
        }
        Ok(node)
    }

    fn chain(&self) -> impl Iterator<Item = &RuleSet> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }

    /// Whether the image file `path` is excluded by a `skip:` rule anywhere
    /// up the chain. Variant suffixes are ignored.
    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skipped(&Candidate::file(path))
    }

    /// Whether the directory `dir` is excluded by a `skip:` rule. Directory
    /// names are matched verbatim.
    pub fn is_dir_skipped(&self, dir: &Path) -> bool {
        self.skipped(&Candidate::dir(dir))
    }

    fn skipped(&self, candidate: &Candidate) -> bool {
        if self.options.ignore_skip {
            return false;
        }
        self.chain()
            .any(|node| node.skip.iter().any(|re| candidate.matches(re)))
    }

    /// Used/deprecated/sync flags for `file`, combined over the whole chain.
    pub fn image_flags(&self, file: &Path) -> Result<ImageFlags, RuleError> {
        let candidate = Candidate::file(file);
        let mut flags = ImageFlags::default();
        for node in self.chain() {
            flags.used |= node.used.iter().any(|re| candidate.matches(re));
            let local = node
                .deprecated
                .iter()
                .find(|rule| candidate.matches(&rule.pattern))
                .map(|rule| rule.info.clone());
            flags.deprecation = merge_deprecation(local, flags.deprecation.take()).map_err(
                |conflict| RuleError::InconsistentDeprecation {
                    file: file.to_path_buf(),
                    first: Box::new(conflict.first),
                    second: Box::new(conflict.second),
                },
            )?;
            flags.sync = flags.sync.or(node.local_sync_flags(&candidate));
        }
        Ok(flags)
    }

    fn local_sync_flags(&self, candidate: &Candidate) -> SyncFlags {
        SyncFlags {
            skip_sync: self.skip_sync.iter().any(|re| candidate.matches(re)),
            force_sync: self.force_sync.iter().any(|re| candidate.matches(re)),
        }
    }

    /// `forceSync:`/`skipSync:` flags for `file` over the whole chain.
    pub fn sync_flags(&self, file: &Path) -> SyncFlags {
        let candidate = Candidate::file(file);
        self.chain()
            .fold(SyncFlags::default(), |acc, node| {
                acc.or(node.local_sync_flags(&candidate))
            })
    }

    /// True when this node was created by the rule file of `dir`.
    ///
    /// `merge`/`mergeAdd` only apply to the declaring directory; nested
    /// directories without their own rule file share the node but are not
    /// its declaring directory.
    pub fn declared_in(&self, dir: &Path) -> bool {
        self.dir.as_deref() == Some(dir)
    }

    pub fn merge_to_root(&self) -> bool {
        self.merge_to_root
    }

    pub fn merge_add(&self) -> &[String] {
        &self.merge_add
    }

    pub fn own_deprecated(&self) -> &[OwnDeprecated] {
        &self.own_deprecated
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Rule file that created this node.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<RuleSet>> {
        self.parent.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_rules;
    use tempfile::TempDir;

    fn root_rules() -> Arc<RuleSet> {
        RuleSet::root(RuleOptions::default())
    }

    #[test]
    fn fork_without_rule_file_returns_same_node() {
        let tmp = TempDir::new().unwrap();
        let root = root_rules();
        let forked = root.fork(tmp.path(), tmp.path()).unwrap();
        assert!(Arc::ptr_eq(&root, &forked));
    }

    #[test]
    fn fork_with_rule_file_creates_child() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "skip: excluded/*\n");
        let root = root_rules();
        let forked = root.fork(tmp.path(), tmp.path()).unwrap();
        assert!(!Arc::ptr_eq(&root, &forked));
        assert!(forked.declared_in(tmp.path()));
        assert!(forked.is_skipped(&tmp.path().join("excluded/b.svg")));
        assert!(!forked.is_skipped(&tmp.path().join("a.svg")));
    }

    #[test]
    fn unknown_directive_names_file_and_line() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "used: a.svg\nsomething: else\n");
        let err = root_rules().fork(tmp.path(), tmp.path()).unwrap_err();
        assert!(matches!(err, RuleError::UnknownDirective { line: 2, .. }));
        assert!(err.to_string().contains(RULE_FILE_NAME));
    }

    #[test]
    fn skip_inherited_by_child_without_skip_rules() {
        let tmp = TempDir::new().unwrap();
        let child_dir = tmp.path().join("sub");
        write_rules(tmp.path(), "skip: sub/*_old.svg\n");
        write_rules(&child_dir, "used: *.svg\n");

        let parent = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        let child = parent.fork(&child_dir, tmp.path()).unwrap();
        for name in ["a_old.svg", "a.svg", "b_old@2x.svg"] {
            let file = child_dir.join(name);
            assert_eq!(child.is_skipped(&file), parent.is_skipped(&file), "{name}");
        }
    }

    #[test]
    fn skip_rule_covers_all_variants() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "skip: close.svg\n");
        let rules = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        assert!(rules.is_skipped(&tmp.path().join("close@2x_dark.svg")));
        assert!(rules.is_skipped(&tmp.path().join("close_dark.svg")));
        assert!(!rules.is_skipped(&tmp.path().join("closed.svg")));
    }

    #[test]
    fn directory_names_keep_their_suffixes() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "skip: general\n");
        let rules = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        assert!(rules.is_dir_skipped(&tmp.path().join("general")));
        for name in ["general_dark", "general@2x", "general_stroke"] {
            assert!(!rules.is_dir_skipped(&tmp.path().join(name)), "{name}");
        }
    }

    #[test]
    fn ignore_skip_disables_skip_rules() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "skip: *.svg\n");
        let root = RuleSet::root(RuleOptions {
            ignore_skip: true,
            ..Default::default()
        });
        let rules = root.fork(tmp.path(), tmp.path()).unwrap();
        assert!(!rules.is_skipped(&tmp.path().join("a.svg")));
    }

    #[test]
    fn root_anchored_pattern() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("a/b");
        write_rules(&sub, "skip: /top/*.svg\n");
        let rules = root_rules().fork(&sub, tmp.path()).unwrap();
        assert!(rules.is_skipped(&tmp.path().join("top/x.svg")));
        assert!(!rules.is_skipped(&sub.join("top/x.svg")));
    }

    #[test]
    fn used_is_ored_up_the_chain() {
        let tmp = TempDir::new().unwrap();
        let child_dir = tmp.path().join("sub");
        write_rules(tmp.path(), "used: sub/a.svg\n");
        write_rules(&child_dir, "used: b.svg\n");

        let parent = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        let child = parent.fork(&child_dir, tmp.path()).unwrap();
        assert!(child.image_flags(&child_dir.join("a.svg")).unwrap().used);
        assert!(child.image_flags(&child_dir.join("b.svg")).unwrap().used);
        assert!(!parent.image_flags(&child_dir.join("b.svg")).unwrap().used);
        assert!(!child.image_flags(&child_dir.join("c.svg")).unwrap().used);
    }

    #[test]
    fn deprecation_with_replacement_reference() {
        let tmp = TempDir::new().unwrap();
        write_rules(
            tmp.path(),
            "deprecated: old_icon.svg->new/icon@2x.svg;to be removed\n",
        );
        let rules = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        let flags = rules.image_flags(&tmp.path().join("old_icon.svg")).unwrap();
        let info = flags.deprecation.unwrap();
        assert_eq!(info.replacement.as_deref(), Some("/new/icon@2x.svg"));
        assert_eq!(info.replacement_reference.as_deref(), Some("new/icon"));
        assert!(info.scheduled_for_removal());
    }

    #[test]
    fn own_deprecated_only_for_plain_relative_patterns() {
        let tmp = TempDir::new().unwrap();
        write_rules(
            tmp.path(),
            "deprecated: gone.svg\ndeprecated: legacy/*.svg\ndeprecated: /abs.svg\n",
        );
        let rules = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        let own = rules.own_deprecated();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].path, tmp.path().join("gone.svg"));
    }

    #[test]
    fn identical_deprecation_in_parent_and_child_is_fine() {
        let tmp = TempDir::new().unwrap();
        let child_dir = tmp.path().join("sub");
        write_rules(tmp.path(), "deprecated: sub/a.svg;old\n");
        write_rules(&child_dir, "deprecated: a.svg;old\n");
        let child = root_rules()
            .fork(tmp.path(), tmp.path())
            .unwrap()
            .fork(&child_dir, tmp.path())
            .unwrap();
        let flags = child.image_flags(&child_dir.join("a.svg")).unwrap();
        assert_eq!(flags.deprecation.unwrap().comment.as_deref(), Some("old"));
    }

    #[test]
    fn conflicting_deprecation_in_parent_and_child_is_error() {
        let tmp = TempDir::new().unwrap();
        let child_dir = tmp.path().join("sub");
        write_rules(tmp.path(), "deprecated: sub/a.svg;old\n");
        write_rules(&child_dir, "deprecated: a.svg;different\n");
        let child = root_rules()
            .fork(tmp.path(), tmp.path())
            .unwrap()
            .fork(&child_dir, tmp.path())
            .unwrap();
        let err = child.image_flags(&child_dir.join("a.svg")).unwrap_err();
        assert!(matches!(err, RuleError::InconsistentDeprecation { .. }));
    }

    #[test]
    fn sync_flags_from_chain() {
        let tmp = TempDir::new().unwrap();
        let child_dir = tmp.path().join("sub");
        write_rules(tmp.path(), "forceSync: sub/*.svg\n");
        write_rules(&child_dir, "skipSync: b.svg\n");
        let child = root_rules()
            .fork(tmp.path(), tmp.path())
            .unwrap()
            .fork(&child_dir, tmp.path())
            .unwrap();
        let flags = child.sync_flags(&child_dir.join("b.svg"));
        assert!(flags.force_sync);
        assert!(flags.skip_sync);
        assert!(!child.sync_flags(&child_dir.join("a.svg")).skip_sync);
    }

    #[test]
    fn merge_and_name_are_recorded_on_the_node() {
        let tmp = TempDir::new().unwrap();
        write_rules(tmp.path(), "merge\nmergeAdd: /keep.svg\nname: Expui\n");
        let rules = root_rules().fork(tmp.path(), tmp.path()).unwrap();
        assert!(rules.merge_to_root());
        assert_eq!(rules.merge_add(), ["/keep.svg".to_string()]);
        assert_eq!(rules.display_name(), Some("Expui"));
        assert!(!rules.declared_in(&tmp.path().join("nested")));
    }
}
