use clap::{Parser, Subcommand};
use icon_pipeline::collect::Collector;
use icon_pipeline::precompile::{self, Precompiler};
use icon_pipeline::render::SvgRasterizer;
use icon_pipeline::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "icon-pipeline")]
#[command(about = "Collect icon resource trees and precompile them into bitmap caches")]
#[command(long_about = "\
Collect icon resource trees and precompile them into bitmap caches

Resource roots are walked for .svg and .png files. Variant files of one icon
share a canonical id:

  root/actions/close.svg          → actions/close (basic)
  root/actions/close@2x.svg       → actions/close (retina)
  root/actions/close_dark.svg     → actions/close (dark)
  root/actions/close@2x_dark.svg  → actions/close (retina dark)

Per-directory icon-robots.txt files control the walk:

  skip: build/*              # exclude files and subtrees
  used: *_legacy.svg         # mark as used
  deprecated: old.svg->/new.svg;to be removed
  merge                      # promote child icons into the parent root
  name: Actions              # display name for code generation

Precompiled stores are named icon-v<version>-<scale>[-d].db, one light and one
dark store per scale.

Run 'icon-pipeline gen-config' to generate a documented icon-pipeline.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (optional)
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect resource roots into a catalog of logical images
    Collect {
        /// Resource roots, processed in order
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Write the catalog as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Report icons hidden by skip rules
    Check {
        /// Resource roots, processed in order
        #[arg(required = true)]
        roots: Vec<PathBuf>,
    },
    /// Render icons into the binary bitmap stores
    Precompile {
        /// Output directory for the store files
        db_dir: PathBuf,
        /// File listing one icon directory per line
        tasks_file: PathBuf,
        /// Extra icon files compiled on their own
        product_icons: Vec<PathBuf>,
    },
    /// Print a stock icon-pipeline.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let pipeline_config = config::load_config(&cli.config)?;
    init_thread_pool(&pipeline_config.processing);

    match cli.command {
        Command::Collect {
            roots,
            output: json_path,
        } => {
            let catalog = Collector::new(pipeline_config.collect_options()).collect(&roots)?;
            if let Some(path) = json_path {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let json = serde_json::to_string_pretty(&catalog)?;
                std::fs::write(&path, json)?;
            }
            output::print_catalog_summary(&catalog);
        }
        Command::Check { roots } => {
            let filtered = Collector::new(pipeline_config.collect_options()).collect(&roots)?;
            let mut sanity = pipeline_config.collect_options();
            sanity.ignore_skip = true;
            sanity.purge_compat_rule_files = false;
            let unfiltered = Collector::new(sanity).collect(&roots)?;
            output::print_check(&filtered, &unfiltered);
        }
        Command::Precompile {
            db_dir,
            tasks_file,
            product_icons,
        } => {
            let dirs = precompile::read_tasks_file(&tasks_file)?;
            println!("==> Precompiling {} director(ies) into {}", dirs.len(), db_dir.display());
            let stats = Precompiler::new(pipeline_config.precompile_options()).run(
                &db_dir,
                &dirs,
                &product_icons,
                &SvgRasterizer::new(),
            )?;
            output::print_precompile_stats(&stats);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
