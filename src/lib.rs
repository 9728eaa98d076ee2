//! # Icon Pipeline
//!
//! Build-time asset tooling for icon resource trees. Icons live as `.svg` and
//! `.png` files across one or more resource roots; variant files of one icon
//! (`@2x`, `_dark`, `@2x_dark`, `_stroke`) are grouped under a canonical id,
//! and per-directory rule files decide what is collected and how.
//!
//! # Architecture: Two Independent Stages
//!
//! ```text
//! 1. Collect     roots/     →  catalog      (rule-filtered logical images)
//! 2. Precompile  icon dirs  →  db/*.db      (rasterized bitmaps per scale and theme)
//! ```
//!
//! Collection never renders and precompilation never reads rule files. Each
//! stage is usable on its own from the CLI and from tests.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`variant`] | Variant suffix parsing and canonical id computation |
//! | [`rules`] | `icon-robots.txt` parsing and the hierarchical [`rules::RuleSet`] |
//! | [`catalog`] | Logical images, flags, and the concurrent catalog |
//! | [`collect`] | Stage 1: anchor discovery, parallel walk, phantom synthesis |
//! | [`merge`] | Mapping files and merge-root id promotion |
//! | [`hashing`] | Content normalization, 32-bit cache keys, SHA-256 checksums |
//! | [`store`] | Binary record headers and the append-only store files |
//! | [`render`] | The [`render::Rasterizer`] seam and its resvg implementation |
//! | [`precompile`] | Stage 2: grouping, keying, rendering, writing stores |
//! | [`config`] | Layered `icon-pipeline.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Persistent Rule Chains
//!
//! A directory without a rule file shares its parent's [`rules::RuleSet`]
//! node; a directory with one gets a child node pointing at the parent.
//! Nodes are immutable once built and shared through `Arc`, so parallel
//! directory workers read the chain without locking. Questions about a file
//! walk the chain toward the root: skip and used are OR-ed, deprecations must
//! agree.
//!
//! ## Root-Relative Ids
//!
//! Canonical ids are relative to the resource root, not to the directory
//! where icons were first found. A root containing `icons/actions/close.svg`
//! yields `icons/actions/close`, which is what the generated accessors and
//! mapping files refer to.
//!
//! ## Explicit Vendor Icon Set
//!
//! The vendor icon directory (`collect.android_icons`) is configuration passed
//! to the collector and precompiler, never process-wide state.

pub mod catalog;
pub mod collect;
pub mod config;
pub mod hashing;
pub mod merge;
pub mod output;
pub mod precompile;
pub mod render;
pub mod rules;
pub mod store;
pub mod variant;

#[cfg(test)]
pub(crate) mod test_helpers;
