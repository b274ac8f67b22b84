//! Change manifest for incremental builds.
//!
//! Rendering hundreds of pages is the slow part of a site build. This module
//! remembers, per page, a fingerprint of everything the page was built from,
//! so the next run can skip pages whose inputs have not changed.
//!
//! # Fingerprints
//!
//! A page's fingerprint is a SHA-256 over its [`SourceRef`]s, in order:
//! file contents for template files, the precomputed digest for content
//! records. Each ref is tagged and length-prefixed so different splits of
//! the same bytes never collide. Content-based rather than mtime-based, so it
//! survives `git checkout` (which resets modification times).
//!
//! # Change detection is conservative
//!
//! A page needs building when:
//! 1. it has no manifest entry, or
//! 2. any of its source files cannot be read, or
//! 3. its fingerprint differs from the recorded one.
//!
//! Only an exact fingerprint match skips the page. A false "rebuild" costs a
//! little time; a false "skip" ships a stale page.
//!
//! # Storage
//!
//! `<cache_dir>/manifest.json`, rewritten after every batch. Saves go through
//! a temp file in the same directory followed by a rename, so a crash never
//! leaves a half-written manifest. A missing, corrupt, or wrong-version file
//! loads as an empty manifest, which only costs a full rebuild.

use crate::catalog::{PageCatalog, PageRecord, SourceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the manifest format. Bump this to invalidate all existing
/// manifests when the format or fingerprint computation changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error writing {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the manifest knows about one previously built page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub content_hash: String,
    pub built_at: DateTime<Utc>,
}

/// On-disk manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub last_build_at: Option<DateTime<Utc>>,
    pub pages: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            last_build_at: None,
            pages: BTreeMap::new(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of checking one page against the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Fingerprint matches the recorded entry.
    Unchanged,
    /// Needs building. Carries the fresh fingerprint when one could be computed.
    Changed { fingerprint: Option<String> },
}

impl ChangeStatus {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeStatus::Changed { .. })
    }
}

/// The manifest together with where it lives.
#[derive(Debug)]
pub struct ChangeManifest {
    path: PathBuf,
    manifest: Manifest,
}

impl ChangeManifest {
    /// Load the manifest at `path`. Never fails.
    ///
    /// A missing file is a first build. An unreadable, corrupt, or
    /// wrong-version file is logged and treated the same way.
    pub fn load(path: &Path) -> Self {
        let manifest = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Manifest>(&content) {
                Ok(m) if m.version == MANIFEST_VERSION => m,
                Ok(m) => {
                    tracing::warn!(path = %path.display(), found = m.version, expected = MANIFEST_VERSION, "manifest version mismatch, starting fresh");
                    Manifest::empty()
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "manifest is corrupt, starting fresh");
                    Manifest::empty()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Manifest::empty(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "manifest unreadable, starting fresh");
                Manifest::empty()
            }
        };
        Self {
            path: path.to_path_buf(),
            manifest,
        }
    }

    /// An empty manifest that will be saved to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            manifest: Manifest::empty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn entry(&self, page_id: &str) -> Option<&ManifestEntry> {
        self.manifest.pages.get(page_id)
    }

    pub fn len(&self) -> usize {
        self.manifest.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.pages.is_empty()
    }

    /// Whether `page` needs building.
    pub fn has_changed(&self, page: &PageRecord) -> bool {
        self.evaluate(page).is_changed()
    }

    /// Compare a page's current fingerprint with its recorded one.
    pub fn evaluate(&self, page: &PageRecord) -> ChangeStatus {
        let fingerprint = match fingerprint(page) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::debug!(page = page.id(), error = %err, "source unreadable, treating page as changed");
                return ChangeStatus::Changed { fingerprint: None };
            }
        };
        match self.manifest.pages.get(page.id()) {
            Some(entry) if entry.content_hash == fingerprint => ChangeStatus::Unchanged,
            _ => ChangeStatus::Changed {
                fingerprint: Some(fingerprint),
            },
        }
    }

    /// Upsert the entry for a successfully built page.
    pub fn record(&mut self, page: &PageRecord, hash: String, built_at: DateTime<Utc>) {
        self.manifest.pages.insert(
            page.id().to_string(),
            ManifestEntry {
                content_hash: hash,
                built_at,
            },
        );
    }

    /// Mark the end of a successful run.
    pub fn mark_build_complete(&mut self, at: DateTime<Utc>) {
        self.manifest.last_build_at = Some(at);
    }

    /// Drop entries for pages that are no longer in the catalog.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, catalog: &PageCatalog) -> usize {
        let live: HashSet<&str> = catalog
            .groups()
            .flat_map(|(_, pages)| pages.iter().map(|p| p.id()))
            .collect();
        let before = self.manifest.pages.len();
        self.manifest.pages.retain(|id, _| live.contains(id.as_str()));
        before - self.manifest.pages.len()
    }

    /// Atomically write the manifest to disk. Safe to call repeatedly.
    pub fn save(&self) -> Result<(), ManifestError> {
        let io_err = |source: io::Error| ManifestError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.manifest)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

/// SHA-256 over a page's source refs, in order.
pub fn fingerprint(page: &PageRecord) -> io::Result<String> {
    let mut hasher = Sha256::new();
    for source in page.source_refs() {
        match source {
            SourceRef::File(path) => {
                let bytes = std::fs::read(path)?;
                hasher.update(b"file\0");
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
            SourceRef::Record { digest, .. } => {
                hasher.update(b"record\0");
                hasher.update((digest.len() as u64).to_le_bytes());
                hasher.update(digest.as_bytes());
            }
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}
