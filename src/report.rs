//! Run statistics and manifest checkpointing.
//!
//! [`ReportCollector`] owns the counters for a run. The build loop tells it
//! what happened to each page and when a batch ends; at a batch boundary it
//! saves the manifest, which is what makes an interrupted run resumable.
//!
//! Every page of a processed batch lands in exactly one bucket:
//!
//! | Bucket    | Meaning                                        |
//! |-----------|------------------------------------------------|
//! | `built`   | changed, executor succeeded, manifest updated  |
//! | `skipped` | unchanged since the last successful build      |
//! | `failed`  | changed, executor reported a failure           |

use crate::catalog::Group;
use crate::manifest::{ChangeManifest, ManifestError};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Counters for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub group: Group,
    pub pages: usize,
    pub built: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl GroupStats {
    pub fn new(group: Group, pages: usize) -> Self {
        Self {
            group,
            pages,
            built: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn add(&mut self, batch: &BatchStats) {
        self.built += batch.built;
        self.skipped += batch.skipped;
        self.failed += batch.failed;
    }
}

impl fmt::Display for GroupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "built={} skipped={}", self.built, self.skipped)?;
        if self.failed > 0 {
            write!(f, " failed={}", self.failed)?;
        }
        Ok(())
    }
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub built: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    /// Every group in priority order, including empty ones.
    pub groups: Vec<GroupStats>,
    pub total_pages: usize,
    pub built: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_seconds: f64,
    pub peak_memory_mb: u64,
}

/// Accumulates statistics over a run.
#[derive(Debug)]
pub struct ReportCollector {
    started: Instant,
    groups: Vec<GroupStats>,
    batch: BatchStats,
}

impl Default for ReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCollector {
    /// Start the run clock.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            groups: Vec::new(),
            batch: BatchStats::default(),
        }
    }

    /// Open a new group. Subsequent page counts go to it.
    pub fn begin_group(&mut self, group: Group, pages: usize) {
        self.groups.push(GroupStats::new(group, pages));
        self.batch = BatchStats::default();
    }

    pub fn page_built(&mut self) {
        self.batch.built += 1;
    }

    pub fn page_skipped(&mut self) {
        self.batch.skipped += 1;
    }

    pub fn page_failed(&mut self) {
        self.batch.failed += 1;
    }

    /// Close the current batch and checkpoint the manifest.
    ///
    /// Returns the batch's counters. The counters are folded into the group
    /// even if the save fails, so the group stays accurate for error reports.
    pub fn batch_finished(
        &mut self,
        manifest: &ChangeManifest,
    ) -> Result<BatchStats, ManifestError> {
        let batch = std::mem::take(&mut self.batch);
        if let Some(current) = self.groups.last_mut() {
            current.add(&batch);
        }
        manifest.save()?;
        Ok(batch)
    }

    /// Counters of the group currently open.
    pub fn current_group(&self) -> Option<&GroupStats> {
        self.groups.last()
    }

    /// Produce the summary. `peak_memory_mb` comes from the memory supervisor.
    pub fn finish(self, peak_memory_mb: u64) -> BuildSummary {
        let sum = |f: fn(&GroupStats) -> usize| self.groups.iter().map(f).sum::<usize>();
        BuildSummary {
            total_pages: sum(|g| g.pages),
            built: sum(|g| g.built),
            skipped: sum(|g| g.skipped),
            failed: sum(|g| g.failed),
            duration_seconds: self.started.elapsed().as_secs_f64(),
            peak_memory_mb,
            groups: self.groups,
        }
    }
}
