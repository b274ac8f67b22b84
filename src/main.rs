use clap::{Parser, Subcommand};
use sitebatch::catalog::{DataDir, PageCatalog};
use sitebatch::config::{self, BuildConfig};
use sitebatch::executor::CommandExecutor;
use sitebatch::manifest::ChangeManifest;
use sitebatch::memory::ProcStatusProbe;
use sitebatch::{build, logging, output, publish};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitebatch")]
#[command(about = "Incremental, chunked build orchestrator for large static sites")]
#[command(long_about = "\
Incremental, chunked build orchestrator for large static sites

Pages are collected from hand-curated core routes and JSON content
collections, split into bounded batches, and built in priority order.
A manifest of content fingerprints lets unchanged pages be skipped, and
is saved after every batch so an interrupted build resumes where it
stopped.

Project layout (paths configurable):

  project/
  ├── sitebatch.toml                 # Config (optional, stock defaults otherwise)
  ├── app/                           # Route templates
  │   ├── page.tsx                   # /
  │   ├── about/page.tsx             # /about
  │   └── blog/[slug]/page.tsx       # /blog/{slug}
  ├── data/                          # Content collections (JSON arrays)
  │   ├── blog-posts.json
  │   ├── cruises.json
  │   └── essex-county-cities.json
  ├── .build-cache/manifest.json     # Change manifest (removed by --clean)
  └── docs/                          # Published site

Build order: core, cruises, packages, destinations, blog, essex-county,
travel-from.

Run 'sitebatch gen-config' to generate a documented sitebatch.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Ignore the manifest and rebuild every page
    #[arg(long, global = true)]
    force: bool,

    /// Discard all cached build state and exit
    #[arg(long, global = true)]
    clean: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Build changed pages in batches, then run the site build and publish (default)
    Build,
    /// Show which pages would be built, without building anything
    Plan,
    /// Print a stock sitebatch.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    logging::init()?;
    let config = config::load_config(&cli.config)?;

    if cli.clean {
        let removed = publish::clean(&config)?;
        output::print_clean(&removed);
        return Ok(());
    }

    init_thread_pool(&config.processing);

    match cli.command.unwrap_or(Command::Build) {
        Command::Plan => plan_command(&config, cli.force),
        Command::Build | Command::GenConfig => build_command(&config, cli.force),
    }
}

fn load_catalog(config: &BuildConfig) -> PageCatalog {
    PageCatalog::load(
        &DataDir::new(&config.data_dir),
        &config.app_dir,
        &config.catalog,
    )
}

fn plan_command(config: &BuildConfig, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(config);
    let manifest = ChangeManifest::load(&config.manifest_path());
    let plans: Vec<build::BatchPlan> =
        build::plan(&catalog, &manifest, config.batching.chunk_size, force).collect();
    output::print_plan(&plans);
    Ok(())
}

fn build_command(config: &BuildConfig, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(config);
    let mut manifest = ChangeManifest::load(&config.manifest_path());
    let mut executor = CommandExecutor::from_config(&config.executor, &config.memory);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = build::run_build(
        config,
        &catalog,
        &mut manifest,
        &mut executor,
        ProcStatusProbe,
        force,
        Some(tx),
    );
    printer.join().map_err(|_| "output thread panicked")?;

    match result {
        Ok(summary) => {
            output::print_summary(&summary);
            Ok(())
        }
        Err(failure) => {
            output::print_summary(&failure.summary);
            Err(failure.into())
        }
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
