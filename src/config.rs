//! Build configuration.
//!
//! Loaded from a single TOML file (`sitebatch.toml` by default). The file is
//! sparse: stock defaults form the base layer and user values are deep-merged
//! on top, so a config only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! cache_dir = ".build-cache"   # Holds manifest.json
//! app_dir = "app"              # Route templates (page.tsx files)
//! data_dir = "data"            # Content collections (*.json)
//!
//! [catalog]
//! core_routes = ["/", "/flights", "/cruises", "/packages", "/destinations", "/contact", "/about"]
//!
//! [catalog.templates]          # Dynamic route templates, relative to app_dir
//! cruises = "cruises/[destination]"
//! packages = "packages/[type]"
//! destinations = "destinations/[slug]"
//! blog = "blog/[slug]"
//! essex_county_city = "locations/essex-county/[city]"
//! essex_county_service = "locations/essex-county/[city]/[service]"
//! travel_from_city = ""        # Empty: no shared template
//! travel_from_service = ""
//!
//! [batching]
//! chunk_size = 100             # Pages per batch
//!
//! [memory]
//! ceiling_mb = 8192
//! high_water_percent = 80      # Warn + relieve pressure above this share of the ceiling
//! sample_interval_ms = 1000
//!
//! [processing]
//! max_threads = 4              # Hashing workers (omit for auto = CPU cores)
//!
//! [executor]
//! command = ["next", "build"]  # Whole-project build, run once after all batches
//! batch_command = []           # Optional per-batch renderer (page ids on stdin)
//! cache_dirs = [".next"]       # Removed by --clean
//!
//! [executor.env]
//! NODE_ENV = "production"
//!
//! [publish]
//! build_dir = ".next-build"
//! publish_dir = "docs"         # Empty string disables publishing
//! static_dirs = ["public"]
//! after = []                   # Optional post-publish command
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sitebatch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding `manifest.json`.
    pub cache_dir: PathBuf,
    /// Root of the route templates hashed as page sources.
    pub app_dir: PathBuf,
    /// Directory of JSON content collections.
    pub data_dir: PathBuf,
    pub catalog: CatalogConfig,
    pub batching: BatchingConfig,
    pub memory: MemoryConfig,
    pub processing: ProcessingConfig,
    pub executor: ExecutorConfig,
    pub publish: PublishConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".build-cache"),
            app_dir: PathBuf::from("app"),
            data_dir: PathBuf::from("data"),
            catalog: CatalogConfig::default(),
            batching: BatchingConfig::default(),
            memory: MemoryConfig::default(),
            processing: ProcessingConfig::default(),
            executor: ExecutorConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batching.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "batching.chunk_size must be at least 1".into(),
            ));
        }
        if self.memory.ceiling_mb == 0 {
            return Err(ConfigError::Validation(
                "memory.ceiling_mb must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.memory.high_water_percent) {
            return Err(ConfigError::Validation(
                "memory.high_water_percent must be 1-100".into(),
            ));
        }
        if self.memory.sample_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "memory.sample_interval_ms must be non-zero".into(),
            ));
        }
        if self.catalog.core_routes.iter().any(|r| !r.starts_with('/')) {
            return Err(ConfigError::Validation(
                "catalog.core_routes entries must start with '/'".into(),
            ));
        }
        Ok(())
    }

    /// Location of the persisted change manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("manifest.json")
    }
}

/// Hand-curated pages that always lead the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Routes of the `core` group, in build order.
    pub core_routes: Vec<String>,
    pub templates: TemplateConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            core_routes: [
                "/",
                "/flights",
                "/cruises",
                "/packages",
                "/destinations",
                "/contact",
                "/about",
            ]
            .iter()
            .map(|r| r.to_string())
            .collect(),
            templates: TemplateConfig::default(),
        }
    }
}

/// Dynamic route templates per page kind, as directories under `app_dir`
/// holding a `page.tsx`.
///
/// A page with its own `page.tsx` uses that. Otherwise the template below is
/// used if it exists, and failing that the nearest ancestor route's
/// `page.tsx`. An empty value means the kind has no shared template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    pub cruises: String,
    pub packages: String,
    pub destinations: String,
    pub blog: String,
    pub essex_county_city: String,
    pub essex_county_service: String,
    pub travel_from_city: String,
    pub travel_from_service: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cruises: "cruises/[destination]".into(),
            packages: "packages/[type]".into(),
            destinations: "destinations/[slug]".into(),
            blog: "blog/[slug]".into(),
            essex_county_city: "locations/essex-county/[city]".into(),
            essex_county_service: "locations/essex-county/[city]/[service]".into(),
            // travel-from-{city} routes are concrete directories; service
            // pages resolve to their city's page.tsx
            travel_from_city: String::new(),
            travel_from_service: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchingConfig {
    /// Maximum pages per batch. Also the manifest checkpoint interval.
    pub chunk_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

/// Memory supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Soft memory ceiling in megabytes. Never enforced, only watched.
    pub ceiling_mb: u64,
    /// Percentage of `ceiling_mb` at which pressure is signalled.
    pub high_water_percent: u64,
    /// Sampling period of the background monitor.
    pub sample_interval_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ceiling_mb: 8192,
            high_water_percent: 80,
            sample_interval_ms: 1000,
        }
    }
}

impl MemoryConfig {
    /// The high-water mark in megabytes.
    pub fn high_water_mb(&self) -> u64 {
        (self.ceiling_mb / 100)
            .saturating_mul(self.high_water_percent)
            .saturating_add((self.ceiling_mb % 100).saturating_mul(self.high_water_percent) / 100)
    }
}

/// Parallel hashing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of threads used to fingerprint pages within a batch.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// External site generator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Whole-project build, run once after every batch has been scheduled.
    /// Empty disables it.
    pub command: Vec<String>,
    /// Per-batch renderer. Empty means manifest bookkeeping only.
    pub batch_command: Vec<String>,
    /// Generator-owned caches discarded by `--clean`.
    pub cache_dirs: Vec<PathBuf>,
    /// Extra environment for both commands.
    pub env: BTreeMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec!["next".to_string(), "build".to_string()],
            batch_command: Vec::new(),
            cache_dirs: vec![PathBuf::from(".next")],
            env: BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())]),
        }
    }
}

/// Final copy of the generator's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Where the executor writes its output.
    pub build_dir: PathBuf,
    /// Destination, replaced wholesale. Empty disables publishing.
    pub publish_dir: PathBuf,
    /// Directories whose contents are merged into the publish dir.
    pub static_dirs: Vec<PathBuf>,
    /// Command run after the copy. Empty disables it.
    pub after: Vec<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(".next-build"),
            publish_dir: PathBuf::from("docs"),
            static_dirs: vec![PathBuf::from("public")],
            after: Vec::new(),
        }
    }
}

impl PublishConfig {
    pub fn is_enabled(&self) -> bool {
        !self.publish_dir.as_os_str().is_empty()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BuildConfig::default())?)
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
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to stock defaults when absent.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitebatch configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding the change manifest (manifest.json).
cache_dir = ".build-cache"

# Root of the route templates. A page's template is hashed as one of its sources.
app_dir = "app"

# Directory of JSON content collections (cruises.json, blog-posts.json, ...).
data_dir = "data"

# ---------------------------------------------------------------------------
# Catalog
# ---------------------------------------------------------------------------
[catalog]
# Hand-curated core routes, built first and in this order.
core_routes = ["/", "/flights", "/cruises", "/packages", "/destinations", "/contact", "/about"]

# Dynamic route templates, as directories under app_dir holding a page.tsx.
# A page with its own page.tsx uses that; otherwise the template below, and
# failing that the nearest ancestor route's page.tsx. "" means no template.
[catalog.templates]
cruises = "cruises/[destination]"
packages = "packages/[type]"
destinations = "destinations/[slug]"
blog = "blog/[slug]"
essex_county_city = "locations/essex-county/[city]"
essex_county_service = "locations/essex-county/[city]/[service]"
travel_from_city = ""
travel_from_service = ""

# ---------------------------------------------------------------------------
# Batching
# ---------------------------------------------------------------------------
[batching]
# Maximum pages per batch. The manifest is saved after every batch.
chunk_size = 100

# ---------------------------------------------------------------------------
# Memory supervision (advisory only; nothing is ever aborted)
# ---------------------------------------------------------------------------
[memory]
ceiling_mb = 8192
# Warn and ask the executor to relieve pressure above this share of the ceiling.
high_water_percent = 80
sample_interval_ms = 1000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Threads used to hash page sources within a batch.
# Omit to auto-detect (= number of CPU cores).
# max_threads = 4

# ---------------------------------------------------------------------------
# Executor (the actual site generator)
# ---------------------------------------------------------------------------
[executor]
# Whole-project build, run once after all batches. Empty disables it.
command = ["next", "build"]
# Optional per-batch renderer. Receives page ids on stdin, one per line, and
# reports failures as `failed<TAB>page-id<TAB>message` lines on stdout.
batch_command = []
# Generator caches removed by --clean.
cache_dirs = [".next"]

[executor.env]
NODE_ENV = "production"

# ---------------------------------------------------------------------------
# Publish
# ---------------------------------------------------------------------------
[publish]
# Executor output directory.
build_dir = ".next-build"
# Destination (replaced on every publish). Set to "" to skip publishing.
publish_dir = "docs"
# Directories whose contents are merged into the publish directory.
static_dirs = ["public"]
# Command run after publishing, e.g. ["node", "scripts/fix-image-paths.js"].
after = []
"##
}
