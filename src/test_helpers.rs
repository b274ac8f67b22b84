//! Shared test utilities for the sitebatch test suite.
//!
//! In-memory stand-ins for the three seams the orchestrator talks through:
//! content collections ([`MemoryContent`]), memory readings ([`FixedProbe`]),
//! and the site generator ([`ScriptedExecutor`]).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let a = write_page(&tmp, "/a", Group::Core, "a.tsx", "v1");
//! let catalog = PageCatalog::from_groups([(Group::Core, vec![a])]);
//!
//! let mut executor = ScriptedExecutor::new().failing_pages(&["/a"]);
//! ```

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::catalog::{
    Collection, ContentError, ContentProvider, ContentRecord, Group, PageRecord, SourceRef,
};
use crate::executor::{BatchOutcome, BuildExecutor, BuildRequest, ExecutorError, PageFailure};
use crate::memory::MemoryProbe;

// =========================================================================
// Pages
// =========================================================================

/// A page whose only source is a single file.
pub fn file_page(id: &str, group: Group, path: impl Into<PathBuf>) -> PageRecord {
    PageRecord::new(id, group, vec![SourceRef::File(path.into())]).unwrap()
}

/// Write `content` to `<tmp>/<name>` and return a page sourced from it.
pub fn write_page(tmp: &TempDir, id: &str, group: Group, name: &str, content: &str) -> PageRecord {
    let path = tmp.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    file_page(id, group, path)
}

// =========================================================================
// Content
// =========================================================================

/// Content collections held in memory. Unlisted collections load as empty.
#[derive(Debug, Default)]
pub struct MemoryContent {
    collections: HashMap<Collection, Vec<ContentRecord>>,
    failing: HashSet<Collection>,
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records keyed by `keys`; each digest is derived from its key.
    pub fn with(mut self, collection: Collection, keys: &[&str]) -> Self {
        let records = keys
            .iter()
            .map(|key| ContentRecord {
                key: key.to_string(),
                digest: format!("{:x}", Sha256::digest(key.as_bytes())),
            })
            .collect();
        self.collections.insert(collection, records);
        self
    }

    /// Make `collection` fail to load.
    pub fn failing(mut self, collection: Collection) -> Self {
        self.failing.insert(collection);
        self
    }
}

impl ContentProvider for MemoryContent {
    fn load(&self, collection: Collection) -> Result<Vec<ContentRecord>, ContentError> {
        if self.failing.contains(&collection) {
            return Err(ContentError::NotAnArray(PathBuf::from(format!(
                "{}.json",
                collection.stem()
            ))));
        }
        Ok(self
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }
}

// =========================================================================
// Memory
// =========================================================================

/// A probe reporting a settable value. Clones share state.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    value: Arc<AtomicU64>,
    available: Arc<AtomicBool>,
    samples: Arc<AtomicUsize>,
}

impl FixedProbe {
    pub fn new(mb: u64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(mb)),
            available: Arc::new(AtomicBool::new(true)),
            samples: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A probe that can never measure anything.
    pub fn unavailable() -> Self {
        let probe = Self::new(0);
        probe.available.store(false, Ordering::SeqCst);
        probe
    }

    pub fn set(&self, mb: u64) {
        self.value.store(mb, Ordering::SeqCst);
    }

    /// Number of readings taken so far.
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl MemoryProbe for FixedProbe {
    fn used_mb(&self) -> Option<u64> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.available
            .load(Ordering::SeqCst)
            .then(|| self.value.load(Ordering::SeqCst))
    }
}

// =========================================================================
// Executor
// =========================================================================

/// An executor that records what it was asked to build.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    /// `(group, batch number, page ids)` for every `build_batch` call.
    pub requests: Vec<(Group, usize, Vec<String>)>,
    pub finished: bool,
    pub relief_calls: usize,
    failing: HashSet<String>,
    fatal_on_call: Option<usize>,
    fail_finish: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these pages as failed whenever they are requested.
    pub fn failing_pages(mut self, ids: &[&str]) -> Self {
        self.failing.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    /// Return a fatal error from the `n`th (one-based) `build_batch` call.
    pub fn fatal_on_call(mut self, n: usize) -> Self {
        self.fatal_on_call = Some(n);
        self
    }

    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Every page id requested, across all calls, in order.
    pub fn built_ids(&self) -> Vec<String> {
        self.requests
            .iter()
            .flat_map(|(_, _, ids)| ids.iter().cloned())
            .collect()
    }
}

impl BuildExecutor for ScriptedExecutor {
    fn build_batch(&mut self, request: &BuildRequest<'_>) -> Result<BatchOutcome, ExecutorError> {
        let ids: Vec<String> = request.pages.iter().map(|p| p.id().to_string()).collect();
        self.requests.push((request.group, request.batch, ids));
        if self.fatal_on_call == Some(self.requests.len()) {
            return Err(ExecutorError::Other("scripted crash".into()));
        }
        let failures = request
            .pages
            .iter()
            .filter(|p| self.failing.contains(p.id()))
            .map(|p| PageFailure {
                page_id: p.id().to_string(),
                message: "scripted failure".into(),
            })
            .collect();
        Ok(BatchOutcome { failures })
    }

    fn finish(&mut self) -> Result<(), ExecutorError> {
        if self.fail_finish {
            return Err(ExecutorError::Other("scripted finish failure".into()));
        }
        self.finished = true;
        Ok(())
    }

    fn relieve_pressure(&mut self) {
        self.relief_calls += 1;
    }
}
