//! Precompiled icon cache generation.
//!
//! Walks compiled resource directories (no rule files consulted), groups SVG
//! files by canonical name and renders every group into one store per
//! display scale and theme.
//!
//! ## Phases
//!
//! 1. **Group** (sequential): `close.svg`, `close@2x.svg`, `close_dark.svg`,
//!    `close@2x_dark.svg` form one group. The light-1x file is mandatory.
//!    Groups are sorted by light-1x path.
//! 2. **Key** (sequential, sorted): hash the normalized light-1x content. A
//!    repeated key with an equal SHA-256 checksum is the same icon seen
//!    twice and is skipped; a different checksum is a fatal collision. Sorting
//!    first makes the representative of a duplicate independent of scan order.
//! 3. **Render** (parallel): each group at each scale and theme. Scales >= 2
//!    use the 2x document when there is one, rendered at half the scale.
//! 4. **Write** (sequential, sorted): append records, then close every
//!    store, even when a write failed.
//!
//! Phases 3 and 4 alternate over batches of keyed groups in sorted order, so
//! only one batch of bitmaps is held in memory at a time.

use crate::hashing::{self, HashError, HashFn, KeyHasher};
use crate::render::{Bitmap, Rasterizer, RenderError};
use crate::store::{StoreError, StoreSet, StoreStats, Theme};
use crate::variant::{ImageVariant, extension_of, parse_stem};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PrecompileError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Icon '{}' has no light 1x file (found: {files:?})", group.display())]
    MissingLight1x { group: PathBuf, files: Vec<PathBuf> },
    #[error("Product icon {} is a {variant} variant, expected a light 1x file", path.display())]
    ProductIconVariant { path: PathBuf, variant: ImageVariant },
    #[error("Cache key collision {key:#010x} between {} and {}", first.display(), second.display())]
    Collision {
        key: u32,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("{} renders as {width}x{height}, icons must be square", path.display())]
    NonSquare {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("{source} ({} more error(s) while closing stores)", suppressed.len())]
    Suppressed {
        source: Box<PrecompileError>,
        suppressed: Vec<StoreError>,
    },
}

/// Precompiler settings, usually built from [`crate::config::CacheConfig`].
#[derive(Debug, Clone)]
pub struct PrecompileOptions {
    pub format_version: u32,
    pub scales: Vec<f32>,
    pub dark_suffix: String,
    pub require_square: bool,
    /// Vendor icon set, exempt from the square check.
    pub android_icons: Option<PathBuf>,
}

impl Default for PrecompileOptions {
    fn default() -> Self {
        Self {
            format_version: 3,
            scales: vec![1.0, 1.25, 1.5, 2.0, 2.5],
            dark_suffix: "-d".to_string(),
            require_square: false,
            android_icons: None,
        }
    }
}

/// The variant files of one icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconGroup {
    pub light_1x: PathBuf,
    pub light_2x: Option<PathBuf>,
    pub dark_1x: Option<PathBuf>,
    pub dark_2x: Option<PathBuf>,
}

impl IconGroup {
    pub fn single(file: PathBuf) -> Self {
        Self {
            light_1x: file,
            light_2x: None,
            dark_1x: None,
            dark_2x: None,
        }
    }

    /// Document and effective scale for one store, or `None` when the theme
    /// has no document (dark without dark files).
    pub fn document_for(&self, scale: f32, theme: Theme) -> Option<(&Path, f32)> {
        let (one, two) = match theme {
            Theme::Light => (Some(self.light_1x.as_path()), self.light_2x.as_deref()),
            Theme::Dark => (self.dark_1x.as_deref(), self.dark_2x.as_deref()),
        };
        match (one, two) {
            (_, Some(two)) if scale >= 2.0 => Some((two, scale / 2.0)),
            (Some(one), _) => Some((one, scale)),
            (None, Some(two)) => Some((two, scale / 2.0)),
            (None, None) => None,
        }
    }
}

/// Totals printed after a run.
#[derive(Debug, Clone, Default)]
pub struct PrecompileStats {
    pub icons: usize,
    pub duplicates: usize,
    pub stores: Vec<StoreStats>,
    pub elapsed: Duration,
}

/// Read a tasks file: one directory per line, blank lines ignored.
pub fn read_tasks_file(path: &Path) -> Result<Vec<PathBuf>, PrecompileError> {
    let content = fs::read_to_string(path).map_err(|source| PrecompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

#[derive(Default)]
struct GroupBuilder {
    light_1x: Option<PathBuf>,
    light_2x: Option<PathBuf>,
    dark_1x: Option<PathBuf>,
    dark_2x: Option<PathBuf>,
    files: Vec<PathBuf>,
}

/// Group every `.svg` below `dirs` by directory and canonical name.
///
/// Missing directories contribute nothing. A file reached through two
/// listed directories is counted once.
pub fn group_icons(dirs: &[PathBuf]) -> Result<Vec<IconGroup>, PrecompileError> {
    let files: BTreeSet<PathBuf> = dirs
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(Result::ok))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| extension_of(p).as_deref() == Some("svg"))
        .collect();

    let mut builders: BTreeMap<(PathBuf, String), GroupBuilder> = BTreeMap::new();
    for file in files {
        let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let parsed = parse_stem(&stem);
        // Stroke icons are standalone icons under their full name.
        let (base, variant) = match parsed.variant {
            ImageVariant::Stroke => (stem.as_str(), ImageVariant::Basic),
            v => (parsed.base, v),
        };
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let builder = builders.entry((dir, base.to_string())).or_default();
        let slot = match variant {
            ImageVariant::Retina => &mut builder.light_2x,
            ImageVariant::Dark => &mut builder.dark_1x,
            ImageVariant::RetinaDark => &mut builder.dark_2x,
            ImageVariant::Basic | ImageVariant::Stroke => &mut builder.light_1x,
        };
        *slot = Some(file.clone());
        builder.files.push(file);
    }

    let mut groups = Vec::with_capacity(builders.len());
    for ((dir, base), b) in builders {
        let Some(light_1x) = b.light_1x else {
            return Err(PrecompileError::MissingLight1x {
                group: dir.join(base),
                files: b.files,
            });
        };
        groups.push(IconGroup {
            light_1x,
            light_2x: b.light_2x,
            dark_1x: b.dark_1x,
            dark_2x: b.dark_2x,
        });
    }
    Ok(groups)
}

/// A product icon compiled on its own. Its file must be a light-1x document.
fn product_group(path: &Path) -> Result<IconGroup, PrecompileError> {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match parse_stem(&stem).variant {
        ImageVariant::Basic | ImageVariant::Stroke => Ok(IconGroup::single(path.to_path_buf())),
        variant => Err(PrecompileError::ProductIconVariant {
            path: path.to_path_buf(),
            variant,
        }),
    }
}

/// Groups rendered before their records are written.
pub const DEFAULT_RENDER_BATCH: usize = 64;

/// One rendered record waiting to be written.
struct Rendered {
    scale: f32,
    theme: Theme,
    bitmap: Bitmap,
}

pub struct Precompiler {
    options: PrecompileOptions,
    hash_fn: HashFn,
    render_batch: usize,
}

impl Precompiler {
    pub fn new(options: PrecompileOptions) -> Self {
        Self {
            options,
            hash_fn: hashing::fast_key,
            render_batch: DEFAULT_RENDER_BATCH,
        }
    }

    /// Replace the cache key function.
    pub fn with_hash_fn(mut self, hash_fn: HashFn) -> Self {
        self.hash_fn = hash_fn;
        self
    }

    /// Number of groups rendered before their records are written (at least 1).
    pub fn with_render_batch(mut self, groups: usize) -> Self {
        self.render_batch = groups.max(1);
        self
    }

    /// Build every store under `db_dir` from the icons below `dirs` plus
    /// standalone `product_icons`.
    pub fn run(
        &self,
        db_dir: &Path,
        dirs: &[PathBuf],
        product_icons: &[PathBuf],
        rasterizer: &dyn Rasterizer,
    ) -> Result<PrecompileStats, PrecompileError> {
        let start = Instant::now();

        let mut groups = group_icons(dirs)?;
        for path in product_icons {
            groups.push(product_group(path)?);
        }
        groups.sort_by(|a, b| a.light_1x.cmp(&b.light_1x));
        info!("Found {} icon group(s)", groups.len());

        let (keyed, duplicates) = self.assign_keys(groups)?;

        let mut stores = StoreSet::create(
            db_dir,
            self.options.format_version,
            &self.options.scales,
            &self.options.dark_suffix,
        )?;
        let outcome = self.render_and_write(&keyed, rasterizer, &mut stores);
        let stores = finish(outcome, stores)?;

        Ok(PrecompileStats {
            icons: keyed.len(),
            duplicates,
            stores,
            elapsed: start.elapsed(),
        })
    }

    /// Sequential key phase over sorted groups.
    fn assign_keys(&self, groups: Vec<IconGroup>) -> Result<(Vec<(u32, IconGroup)>, usize), PrecompileError> {
        let mut hasher = KeyHasher::with_hash_fn(self.hash_fn);
        let mut seen: HashMap<u32, (PathBuf, String)> = HashMap::new();
        let mut keyed = Vec::with_capacity(groups.len());
        let mut duplicates = 0;

        for group in groups {
            let path = &group.light_1x;
            let content = fs::read(path).map_err(|source| PrecompileError::Io {
                path: path.clone(),
                source,
            })?;
            let normalized = hashing::normalize(&content);
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let checksum = hashing::checksum(&normalized);

            match hasher.hash(&normalized, &file_name) {
                Ok(key) => {
                    seen.insert(key, (path.clone(), checksum));
                    keyed.push((key, group));
                }
                Err(HashError::DuplicateKey(key)) => {
                    let Some((first, first_checksum)) = seen.get(&key) else {
                        continue;
                    };
                    if *first_checksum != checksum {
                        return Err(PrecompileError::Collision {
                            key,
                            first: first.clone(),
                            second: path.clone(),
                        });
                    }
                    trace!(
                        "{} duplicates {}, skipping",
                        path.display(),
                        first.display()
                    );
                    duplicates += 1;
                }
            }
        }
        Ok((keyed, duplicates))
    }

    /// Render one batch in parallel, write it in order, then move on.
    fn render_and_write(
        &self,
        keyed: &[(u32, IconGroup)],
        rasterizer: &dyn Rasterizer,
        stores: &mut StoreSet,
    ) -> Result<(), PrecompileError> {
        for batch in keyed.chunks(self.render_batch) {
            let rendered: Vec<(u32, Vec<Rendered>)> = batch
                .par_iter()
                .map(|(key, group)| self.render_group(group, rasterizer).map(|r| (*key, r)))
                .collect::<Result<_, _>>()?;
            write_records(stores, &rendered)?;
        }
        Ok(())
    }

    fn render_group(&self, group: &IconGroup, rasterizer: &dyn Rasterizer) -> Result<Vec<Rendered>, PrecompileError> {
        let mut out = Vec::new();
        for &scale in &self.options.scales {
            for theme in Theme::ALL {
                let Some((document, effective)) = group.document_for(scale, theme) else {
                    continue;
                };
                let bitmap = rasterizer.render(document, effective)?;
                if document == group.light_1x && !bitmap.is_square() && self.square_required(document) {
                    return Err(PrecompileError::NonSquare {
                        path: document.to_path_buf(),
                        width: bitmap.width,
                        height: bitmap.height,
                    });
                }
                out.push(Rendered {
                    scale,
                    theme,
                    bitmap,
                });
            }
        }
        debug!("Rendered {} ({} records)", group.light_1x.display(), out.len());
        Ok(out)
    }

    fn square_required(&self, document: &Path) -> bool {
        self.options.require_square
            && !self
                .options
                .android_icons
                .as_deref()
                .is_some_and(|dir| document.starts_with(dir))
    }
}

fn write_records(stores: &mut StoreSet, rendered: &[(u32, Vec<Rendered>)]) -> Result<(), PrecompileError> {
    for (key, records) in rendered {
        for r in records {
            let Some(store) = stores.get_mut(r.scale, r.theme) else {
                continue;
            };
            store.append(*key, r.bitmap.width, r.bitmap.height, &r.bitmap.pixels)?;
        }
    }
    Ok(())
}

/// Close every store and combine the outcome. The first error stays primary;
/// close failures are attached to it.
fn finish(outcome: Result<(), PrecompileError>, stores: StoreSet) -> Result<Vec<StoreStats>, PrecompileError> {
    let (stats, mut close_errors) = stores.close_all();
    let primary = match outcome {
        Ok(()) if close_errors.is_empty() => return Ok(stats),
        Ok(()) => PrecompileError::Store(close_errors.remove(0)),
        Err(e) => e,
    };
    if close_errors.is_empty() {
        Err(primary)
    } else {
        Err(PrecompileError::Suppressed {
            source: Box::new(primary),
            suppressed: close_errors,
        })
    }
}
