//! Page catalog: every candidate output page, grouped and ordered.
//!
//! The catalog is built once per run by [`PageCatalog::load`] and passed down
//! the pipeline as an immutable value. Pages come from two places:
//!
//! - **Core routes**: a hand-curated list from config, kept in the given order.
//! - **Content collections**: JSON arrays read through a [`ContentProvider`].
//!   Each record becomes one or more pages, in the collection's own order.
//!
//! ```text
//! core          /  /flights  /cruises ...           (config)
//! cruises       /cruises/{slug}                     (cruises.json)
//! packages      /packages/{slug}                    (vacation-packages.json)
//! destinations  /destinations/{slug}                (seo-destinations.json)
//! blog          /blog/{slug}                        (blog-posts.json)
//! essex-county  /locations/essex-county/{city}[/{service}]
//! travel-from   /travel-from-{city}[/{service}]     (cities × services)
//! ```
//!
//! ## Sources
//!
//! Every page lists the inputs that determine its output as [`SourceRef`]s:
//! the route template it renders through and the content records it shows.
//! The change manifest hashes these to decide whether a page is stale.
//!
//! A page's template is resolved in order: its own `page.tsx`, the dynamic
//! template configured for its kind ([`TemplateConfig`]), then the nearest
//! ancestor route's `page.tsx`. Resolving to an existing file keeps the
//! fingerprint computable, so an unchanged page is not rebuilt every run.
//!
//! ## Fail-soft loading
//!
//! A collection that cannot be read or parsed empties only the groups that
//! depend on it. The failure is logged and every other group still builds.

use crate::config::{CatalogConfig, TemplateConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Page {0} has no source references")]
    NoSources(String),
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Expected a JSON array in {0}")]
    NotAnArray(PathBuf),
    #[error("Record {index} in {collection} has neither `slug` nor `id`")]
    MissingKey { collection: Collection, index: usize },
}

// ============================================================================
// Groups and collections
// ============================================================================

/// Logical page category. Declaration order is build priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    Core,
    Cruises,
    Packages,
    Destinations,
    Blog,
    EssexCounty,
    TravelFrom,
}

/// Coarse value tier of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Core,
    HighTraffic,
    SeoLongTail,
    Content,
    LocalSeo,
}

impl Group {
    /// Build order: highest-value pages first, long-tail local SEO last.
    pub const PRIORITY: [Group; 7] = [
        Group::Core,
        Group::Cruises,
        Group::Packages,
        Group::Destinations,
        Group::Blog,
        Group::EssexCounty,
        Group::TravelFrom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Group::Core => "core",
            Group::Cruises => "cruises",
            Group::Packages => "packages",
            Group::Destinations => "destinations",
            Group::Blog => "blog",
            Group::EssexCounty => "essex-county",
            Group::TravelFrom => "travel-from",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            Group::Core => Tier::Core,
            Group::Cruises | Group::Packages => Tier::HighTraffic,
            Group::Destinations => Tier::SeoLongTail,
            Group::Blog => Tier::Content,
            Group::EssexCounty | Group::TravelFrom => Tier::LocalSeo,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A content data collection backing one or more groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Cities,
    Services,
    Cruises,
    Packages,
    BlogPosts,
    Destinations,
}

impl Collection {
    /// File stem of the collection in the data directory.
    pub fn stem(self) -> &'static str {
        match self {
            Collection::Cities => "essex-county-cities",
            Collection::Services => "essex-county-services",
            Collection::Cruises => "cruises",
            Collection::Packages => "vacation-packages",
            Collection::BlogPosts => "blog-posts",
            Collection::Destinations => "seo-destinations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

// ============================================================================
// Page records
// ============================================================================

/// One input that determines a page's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A file read at hash time (usually a route template).
    File(PathBuf),
    /// A content record, already digested when the catalog was built.
    Record {
        collection: Collection,
        key: String,
        digest: String,
    },
}

/// One buildable output page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    id: String,
    group: Group,
    source_refs: Vec<SourceRef>,
}

impl PageRecord {
    /// A page must have at least one source; otherwise there is nothing to hash.
    pub fn new(
        id: impl Into<String>,
        group: Group,
        source_refs: Vec<SourceRef>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        if source_refs.is_empty() {
            return Err(CatalogError::NoSources(id));
        }
        Ok(Self {
            id,
            group,
            source_refs,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn source_refs(&self) -> &[SourceRef] {
        &self.source_refs
    }
}

// ============================================================================
// Content provider
// ============================================================================

/// A content record reduced to what the catalog needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// URL key (`slug`, else `id`).
    pub key: String,
    /// SHA-256 of the record's canonical JSON.
    pub digest: String,
}

/// Read-only access to content collections.
pub trait ContentProvider {
    /// Records of `collection` in their natural order.
    fn load(&self, collection: Collection) -> Result<Vec<ContentRecord>, ContentError>;
}

/// Reads `<root>/<stem>.json` files holding arrays of objects.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.stem()))
    }
}

impl ContentProvider for DataDir {
    fn load(&self, collection: Collection) -> Result<Vec<ContentRecord>, ContentError> {
        let path = self.path_of(collection);
        let content = std::fs::read_to_string(&path).map_err(|source| ContentError::Io {
            path: path.clone(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| ContentError::Json {
                path: path.clone(),
                source,
            })?;
        let items = value
            .as_array()
            .ok_or_else(|| ContentError::NotAnArray(path.clone()))?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let key = item
                    .get("slug")
                    .or_else(|| item.get("id"))
                    .and_then(|v| v.as_str())
                    .ok_or(ContentError::MissingKey { collection, index })?;
                Ok(ContentRecord {
                    key: key.to_string(),
                    digest: record_digest(item),
                })
            })
            .collect()
    }
}

/// SHA-256 of a record's JSON serialization.
///
/// `serde_json::Value` objects keep keys sorted, so the digest does not depend
/// on key order in the source file.
pub fn record_digest(value: &serde_json::Value) -> String {
    let digest = Sha256::digest(value.to_string().as_bytes());
    format!("{:x}", digest)
}

// ============================================================================
// Catalog
// ============================================================================

/// All candidate pages, grouped, in build order.
#[derive(Debug, Clone, Default)]
pub struct PageCatalog {
    groups: Vec<(Group, Vec<PageRecord>)>,
}

impl PageCatalog {
    /// Build the catalog from core routes and content collections.
    ///
    /// Never fails: unreadable collections leave their groups empty.
    pub fn load(provider: &impl ContentProvider, app_dir: &Path, config: &CatalogConfig) -> Self {
        let cities = load_collection(provider, Collection::Cities);
        let services = load_collection(provider, Collection::Services);
        let templates = &config.templates;

        let mut groups = Vec::with_capacity(Group::PRIORITY.len());
        for group in Group::PRIORITY {
            let pages = match group {
                Group::Core => core_pages(app_dir, &config.core_routes),
                Group::Cruises => slug_pages(
                    provider,
                    app_dir,
                    group,
                    Collection::Cruises,
                    "cruises",
                    &templates.cruises,
                ),
                Group::Packages => slug_pages(
                    provider,
                    app_dir,
                    group,
                    Collection::Packages,
                    "packages",
                    &templates.packages,
                ),
                Group::Destinations => slug_pages(
                    provider,
                    app_dir,
                    group,
                    Collection::Destinations,
                    "destinations",
                    &templates.destinations,
                ),
                Group::Blog => slug_pages(
                    provider,
                    app_dir,
                    group,
                    Collection::BlogPosts,
                    "blog",
                    &templates.blog,
                ),
                Group::EssexCounty | Group::TravelFrom => match (&cities, &services) {
                    (Some(cities), Some(services)) => {
                        local_pages(app_dir, group, templates, cities, services)
                    }
                    _ => Vec::new(),
                },
            };
            groups.push((group, pages));
        }

        Self::from_groups(groups)
    }

    /// Assemble a catalog from pre-built groups.
    ///
    /// Groups are reordered by priority. Pages with an id already seen are
    /// dropped with a warning; the first occurrence wins.
    pub fn from_groups(groups: impl IntoIterator<Item = (Group, Vec<PageRecord>)>) -> Self {
        let mut by_group: Vec<(Group, Vec<PageRecord>)> = Group::PRIORITY
            .iter()
            .map(|&g| (g, Vec::new()))
            .collect();
        let mut incoming: Vec<(Group, Vec<PageRecord>)> = groups.into_iter().collect();
        incoming.sort_by_key(|(g, _)| *g);

        let mut seen = HashSet::new();
        for (group, pages) in incoming {
            let slot = by_group
                .iter_mut()
                .find(|(g, _)| *g == group)
                .map(|(_, pages)| pages);
            let Some(slot) = slot else { continue };
            for page in pages {
                if page.group != group {
                    tracing::warn!(page = page.id(), expected = %group, actual = %page.group, "page filed under the wrong group, skipped");
                    continue;
                }
                if !seen.insert(page.id.clone()) {
                    tracing::warn!(page = page.id(), %group, "duplicate page id, skipped");
                    continue;
                }
                slot.push(page);
            }
        }

        Self { groups: by_group }
    }

    /// Pages of `group` in catalog order.
    pub fn pages(&self, group: Group) -> &[PageRecord] {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, pages)| pages.as_slice())
            .unwrap_or(&[])
    }

    /// All groups in priority order, including empty ones.
    pub fn groups(&self) -> impl Iterator<Item = (Group, &[PageRecord])> {
        self.groups.iter().map(|(g, pages)| (*g, pages.as_slice()))
    }

    pub fn total_pages(&self) -> usize {
        self.groups.iter().map(|(_, pages)| pages.len()).sum()
    }
}

fn load_collection(
    provider: &impl ContentProvider,
    collection: Collection,
) -> Option<Vec<ContentRecord>> {
    match provider.load(collection) {
        Ok(records) => Some(records),
        Err(err) => {
            tracing::warn!(%collection, error = %err, "content collection unavailable, dependent groups left empty");
            None
        }
    }
}

/// Route template for a page.
///
/// When nothing exists on disk the dynamic template path (or the concrete
/// one, without a dynamic template) is returned anyway; hashing it fails and
/// the page is treated as changed.
fn route_template(app_dir: &Path, route: &str, dynamic: &str) -> PathBuf {
    let dir = route_dir(app_dir, route);
    let concrete = dir.join("page.tsx");
    if concrete.is_file() {
        return concrete;
    }
    let template = (!dynamic.is_empty()).then(|| app_dir.join(dynamic).join("page.tsx"));
    if let Some(template) = template.as_ref().filter(|t| t.is_file()) {
        return template.clone();
    }
    let ancestor = dir
        .ancestors()
        .skip(1)
        .take_while(|d| *d != app_dir)
        .map(|d| d.join("page.tsx"))
        .find(|p| p.is_file());
    if let Some(ancestor) = ancestor {
        tracing::debug!(route, template = %ancestor.display(), "no route template, using ancestor page");
        return ancestor;
    }
    template.unwrap_or(concrete)
}

fn route_dir(app_dir: &Path, route: &str) -> PathBuf {
    route
        .split('/')
        .filter(|seg| !seg.is_empty())
        .fold(app_dir.to_path_buf(), |dir, seg| dir.join(seg))
}

fn record_ref(collection: Collection, record: &ContentRecord) -> SourceRef {
    SourceRef::Record {
        collection,
        key: record.key.clone(),
        digest: record.digest.clone(),
    }
}

fn core_pages(app_dir: &Path, routes: &[String]) -> Vec<PageRecord> {
    routes
        .iter()
        .map(|route| PageRecord {
            id: route.clone(),
            group: Group::Core,
            source_refs: vec![SourceRef::File(route_dir(app_dir, route).join("page.tsx"))],
        })
        .collect()
}

fn slug_pages(
    provider: &impl ContentProvider,
    app_dir: &Path,
    group: Group,
    collection: Collection,
    prefix: &str,
    dynamic: &str,
) -> Vec<PageRecord> {
    let Some(records) = load_collection(provider, collection) else {
        return Vec::new();
    };
    records
        .iter()
        .map(|record| {
            let id = format!("/{}/{}", prefix, record.key);
            PageRecord {
                source_refs: vec![
                    SourceRef::File(route_template(app_dir, &id, dynamic)),
                    record_ref(collection, record),
                ],
                id,
                group,
            }
        })
        .collect()
}

fn local_pages(
    app_dir: &Path,
    group: Group,
    templates: &TemplateConfig,
    cities: &[ContentRecord],
    services: &[ContentRecord],
) -> Vec<PageRecord> {
    let (city_dynamic, service_dynamic) = match group {
        Group::TravelFrom => (&templates.travel_from_city, &templates.travel_from_service),
        _ => (
            &templates.essex_county_city,
            &templates.essex_county_service,
        ),
    };

    let mut pages = Vec::with_capacity(cities.len() * (services.len() + 1));
    for city in cities {
        let city_id = match group {
            Group::TravelFrom => format!("/travel-from-{}", city.key),
            _ => format!("/locations/essex-county/{}", city.key),
        };

        pages.push(PageRecord {
            source_refs: vec![
                SourceRef::File(route_template(app_dir, &city_id, city_dynamic)),
                record_ref(Collection::Cities, city),
            ],
            id: city_id.clone(),
            group,
        });

        for service in services {
            let id = format!("{}/{}", city_id, service.key);
            pages.push(PageRecord {
                source_refs: vec![
                    SourceRef::File(route_template(app_dir, &id, service_dynamic)),
                    record_ref(Collection::Cities, city),
                    record_ref(Collection::Services, service),
                ],
                id,
                group,
            });
        }
    }
    pages
}
