//! Incremental build orchestration.
//!
//! Ties the components together for one run:
//!
//! ```text
//! PageCatalog ─▶ schedule ─▶ evaluate ─▶ BuildExecutor ─▶ record ─▶ save
//!                (per group,  (manifest,   (changed pages   (successes  (every
//!                 per batch)   rayon)       only)            only)       batch)
//!
//!                       MemorySupervisor samples in the background
//! ```
//!
//! Groups run in priority order and batches strictly one after another. The
//! only parallelism inside a batch is fingerprint hashing, whose results are
//! consumed in catalog order so logs and manifest updates stay deterministic.
//!
//! ## Failure policy
//!
//! - A page the executor reports as failed is logged, counted, and left out
//!   of the manifest so the next run retries it. Its siblings still complete.
//! - An executor, publish, or manifest-save error aborts the run. The
//!   manifest on disk keeps its last per-batch checkpoint, so the next run
//!   resumes after the last completed batch. The returned [`BuildFailure`]
//!   still carries the counts so far and the memory peak.
//! - Memory pressure is only a hint: the executor is asked to relieve it and
//!   the run carries on.
//!
//! Progress is reported through an optional [`BuildEvent`] channel so the
//! caller decides how to display it.

use crate::catalog::{Group, PageCatalog, PageRecord};
use crate::config::BuildConfig;
use crate::executor::{BuildExecutor, BuildRequest, ExecutorError};
use crate::manifest::{ChangeManifest, ChangeStatus, ManifestError, fingerprint};
use crate::memory::{MemoryProbe, MemorySupervisor};
use crate::publish::{self, PublishError, PublishReport};
use crate::report::{BatchStats, BuildSummary, GroupStats, ReportCollector};
use crate::schedule::{self, Batch};
use chrono::Utc;
use rayon::prelude::*;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// A run that stopped on a fatal error, with what it got done before that.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct BuildFailure {
    #[source]
    pub error: BuildError,
    /// Groups reached before the failure, and the memory peak of the run.
    pub summary: BuildSummary,
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    RunStarted {
        total_pages: usize,
        force: bool,
    },
    GroupStarted {
        group: Group,
        pages: usize,
        batches: usize,
    },
    PageFailed {
        group: Group,
        page_id: String,
        message: String,
    },
    BatchFinished {
        group: Group,
        /// One-based.
        batch: usize,
        batches: usize,
        stats: BatchStats,
    },
    MemoryPressure {
        peak_mb: u64,
    },
    GroupFinished {
        stats: GroupStats,
    },
    Published {
        report: PublishReport,
    },
}

fn emit(events: &Option<Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = events {
        // Receiver gone means nobody is listening; the build goes on.
        let _ = tx.send(event);
    }
}

/// Run a full incremental build.
///
/// With `force`, every page is treated as changed. Publishing runs when
/// `config.publish` is enabled. The memory supervisor is stopped and its
/// peak reported on both outcomes.
pub fn run_build(
    config: &BuildConfig,
    catalog: &PageCatalog,
    manifest: &mut ChangeManifest,
    executor: &mut impl BuildExecutor,
    probe: impl MemoryProbe,
    force: bool,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BuildFailure> {
    let supervisor = MemorySupervisor::start(&config.memory, probe);
    let mut report = ReportCollector::new();

    let result = drive(
        config,
        catalog,
        manifest,
        executor,
        &supervisor,
        &mut report,
        force,
        &events,
    );
    let summary = report.finish(supervisor.stop());

    match result {
        Ok(()) => {
            tracing::info!(
                built = summary.built,
                skipped = summary.skipped,
                failed = summary.failed,
                peak_memory_mb = summary.peak_memory_mb,
                "build complete"
            );
            Ok(summary)
        }
        Err(error) => {
            tracing::error!(
                %error,
                built = summary.built,
                peak_memory_mb = summary.peak_memory_mb,
                "build aborted"
            );
            Err(BuildFailure { error, summary })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn drive(
    config: &BuildConfig,
    catalog: &PageCatalog,
    manifest: &mut ChangeManifest,
    executor: &mut impl BuildExecutor,
    supervisor: &MemorySupervisor,
    report: &mut ReportCollector,
    force: bool,
    events: &Option<Sender<BuildEvent>>,
) -> Result<(), BuildError> {
    let chunk_size = config.batching.chunk_size;

    tracing::info!(
        total_pages = catalog.total_pages(),
        manifest_entries = manifest.len(),
        force,
        "starting build"
    );
    emit(
        events,
        BuildEvent::RunStarted {
            total_pages: catalog.total_pages(),
            force,
        },
    );

    for (group, pages) in catalog.groups() {
        let batches = schedule::batch_count(pages.len(), chunk_size);
        report.begin_group(group, pages.len());
        tracing::debug!(%group, tier = ?group.tier(), pages = pages.len(), batches, "group started");
        emit(
            events,
            BuildEvent::GroupStarted {
                group,
                pages: pages.len(),
                batches,
            },
        );

        for batch in schedule::group_batches(catalog, group, chunk_size) {
            let stats = run_batch(&batch, manifest, executor, report, force, events)?;
            emit(
                events,
                BuildEvent::BatchFinished {
                    group,
                    batch: batch.number(),
                    batches: batch.count,
                    stats,
                },
            );

            if supervisor.take_pressure() {
                executor.relieve_pressure();
                emit(
                    events,
                    BuildEvent::MemoryPressure {
                        peak_mb: supervisor.peak_mb(),
                    },
                );
            }
        }

        if let Some(stats) = report.current_group() {
            tracing::info!(%group, built = stats.built, skipped = stats.skipped, failed = stats.failed, "group done");
            emit(events, BuildEvent::GroupFinished { stats: *stats });
        }
    }

    executor.finish()?;

    if config.publish.is_enabled() {
        let published = publish::publish(&config.publish)?;
        emit(events, BuildEvent::Published { report: published });
    }

    let pruned = manifest.prune(catalog);
    if pruned > 0 {
        tracing::info!(pruned, "dropped manifest entries for removed pages");
    }
    manifest.mark_build_complete(Utc::now());
    manifest.save()?;
    Ok(())
}

/// Evaluate, build, and record one batch, then checkpoint the manifest.
fn run_batch(
    batch: &Batch<'_>,
    manifest: &mut ChangeManifest,
    executor: &mut impl BuildExecutor,
    report: &mut ReportCollector,
    force: bool,
    events: &Option<Sender<BuildEvent>>,
) -> Result<BatchStats, BuildError> {
    let statuses = evaluate_batch(manifest, batch.pages, force);

    let mut changed: Vec<(&PageRecord, Option<String>)> = Vec::new();
    for (page, status) in batch.pages.iter().zip(statuses) {
        match status {
            ChangeStatus::Unchanged => report.page_skipped(),
            ChangeStatus::Changed { fingerprint } => changed.push((page, fingerprint)),
        }
    }

    if !changed.is_empty() {
        let request = BuildRequest {
            group: batch.group,
            batch: batch.number(),
            pages: changed.iter().map(|(page, _)| *page).collect(),
        };
        let outcome = executor.build_batch(&request)?;

        let built_at = Utc::now();
        for (page, hash) in changed {
            if let Some(failure) = outcome.failure(page.id()) {
                tracing::warn!(page = page.id(), error = %failure.message, "page build failed");
                report.page_failed();
                emit(
                    events,
                    BuildEvent::PageFailed {
                        group: batch.group,
                        page_id: failure.page_id.clone(),
                        message: failure.message.clone(),
                    },
                );
                continue;
            }
            match hash {
                Some(hash) => manifest.record(page, hash, built_at),
                None => {
                    tracing::debug!(page = page.id(), "built without a fingerprint, will rebuild next run")
                }
            }
            report.page_built();
        }
    }

    Ok(report.batch_finished(manifest)?)
}

/// Change status of every page in the batch, in page order.
fn evaluate_batch(manifest: &ChangeManifest, pages: &[PageRecord], force: bool) -> Vec<ChangeStatus> {
    pages
        .par_iter()
        .map(|page| {
            if !force {
                return manifest.evaluate(page);
            }
            match fingerprint(page) {
                Ok(hash) => ChangeStatus::Changed {
                    fingerprint: Some(hash),
                },
                Err(err) => {
                    tracing::debug!(page = page.id(), error = %err, "source unreadable");
                    ChangeStatus::Changed { fingerprint: None }
                }
            }
        })
        .collect()
}

// ============================================================================
// Dry run
// ============================================================================

/// What a build would do with one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub group: Group,
    /// One-based.
    pub batch: usize,
    pub batches: usize,
    pub to_build: Vec<String>,
    pub to_skip: usize,
}

/// Evaluate every batch without building anything or touching the manifest.
pub fn plan<'a>(
    catalog: &'a PageCatalog,
    manifest: &'a ChangeManifest,
    chunk_size: usize,
    force: bool,
) -> impl Iterator<Item = BatchPlan> + 'a {
    schedule::schedule(catalog, chunk_size).map(move |batch| {
        let statuses = evaluate_batch(manifest, batch.pages, force);
        let to_build: Vec<String> = batch
            .pages
            .iter()
            .zip(&statuses)
            .filter(|(_, status)| status.is_changed())
            .map(|(page, _)| page.id().to_string())
            .collect();
        BatchPlan {
            group: batch.group,
            batch: batch.number(),
            batches: batch.count,
            to_skip: batch.pages.len() - to_build.len(),
            to_build,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FixedProbe, ScriptedExecutor, file_page, write_page};
    use std::path::PathBuf;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir, chunk_size: usize) -> BuildConfig {
        let mut config = BuildConfig::default();
        config.cache_dir = tmp.path().join(".build-cache");
        config.batching.chunk_size = chunk_size;
        config.memory.ceiling_mb = 1000;
        config.memory.sample_interval_ms = 5;
        config.publish.publish_dir = PathBuf::new();
        config
    }

    fn run(
        config: &BuildConfig,
        catalog: &PageCatalog,
        executor: &mut ScriptedExecutor,
        force: bool,
    ) -> Result<BuildSummary, BuildFailure> {
        let mut manifest = ChangeManifest::load(&config.manifest_path());
        run_build(config, catalog, &mut manifest, executor, FixedProbe::new(100), force, None)
    }

    /// core = [A, B], blog = [C]
    fn small_catalog(tmp: &TempDir) -> PageCatalog {
        PageCatalog::from_groups([
            (
                Group::Core,
                vec![
                    write_page(tmp, "A", Group::Core, "a.tsx", "a"),
                    write_page(tmp, "B", Group::Core, "b.tsx", "b"),
                ],
            ),
            (Group::Blog, vec![write_page(tmp, "C", Group::Blog, "c.tsx", "c")]),
        ])
    }

    // =========================================================================
    // Incremental behaviour
    // =========================================================================

    #[test]
    fn skips_pages_already_in_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let mut manifest = ChangeManifest::load(&config.manifest_path());
        let a = &catalog.pages(Group::Core)[0];
        manifest.record(a, fingerprint(a).unwrap(), Utc::now());
        manifest.save().unwrap();

        let mut executor = ScriptedExecutor::new();
        let summary = run(&config, &catalog, &mut executor, false).unwrap();

        assert_eq!(summary.built, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_pages, 3);
        assert_eq!(
            executor.requests,
            vec![
                (Group::Core, 1, vec!["B".to_string()]),
                (Group::Blog, 1, vec!["C".to_string()]),
            ]
        );
        assert!(executor.finished);

        let saved = ChangeManifest::load(&config.manifest_path());
        assert_eq!(saved.len(), 3);
        assert!(saved.manifest().last_build_at.is_some());
    }

    #[test]
    fn second_run_builds_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let first = run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap();
        assert_eq!(first.built, 3);

        let mut executor = ScriptedExecutor::new();
        let second = run(&config, &catalog, &mut executor, false).unwrap();
        assert_eq!(second.built, 0);
        assert_eq!(second.skipped, 3);
        assert!(executor.requests.is_empty());
        // the whole-project build still runs
        assert!(executor.finished);
    }

    #[test]
    fn edited_source_is_rebuilt() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap();

        std::fs::write(tmp.path().join("b.tsx"), "b v2").unwrap();
        let mut executor = ScriptedExecutor::new();
        let summary = run(&config, &catalog, &mut executor, false).unwrap();
        assert_eq!(executor.built_ids(), vec!["B"]);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn force_rebuilds_everything() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap();

        let mut executor = ScriptedExecutor::new();
        let summary = run(&config, &catalog, &mut executor, true).unwrap();
        assert_eq!(summary.built, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(executor.built_ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn unreadable_source_builds_every_time() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = PageCatalog::from_groups([(
            Group::Core,
            vec![file_page("/gone", Group::Core, tmp.path().join("missing.tsx"))],
        )]);

        for _ in 0..2 {
            let mut executor = ScriptedExecutor::new();
            let summary = run(&config, &catalog, &mut executor, false).unwrap();
            assert_eq!(summary.built, 1);
            assert_eq!(executor.built_ids(), vec!["/gone"]);
        }
        assert!(ChangeManifest::load(&config.manifest_path()).is_empty());
    }

    // =========================================================================
    // Batching
    // =========================================================================

    #[test]
    fn batches_follow_chunk_size_and_priority() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 2);
        let blog: Vec<PageRecord> = (0..5)
            .map(|i| write_page(&tmp, &format!("/blog/{i}"), Group::Blog, &format!("b{i}"), "x"))
            .collect();
        let core = vec![write_page(&tmp, "/", Group::Core, "root", "x")];
        let catalog = PageCatalog::from_groups([(Group::Blog, blog), (Group::Core, core)]);

        let mut executor = ScriptedExecutor::new();
        run(&config, &catalog, &mut executor, false).unwrap();

        let shape: Vec<(Group, usize, usize)> = executor
            .requests
            .iter()
            .map(|(g, n, ids)| (*g, *n, ids.len()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Group::Core, 1, 1),
                (Group::Blog, 1, 2),
                (Group::Blog, 2, 2),
                (Group::Blog, 3, 1),
            ]
        );
    }

    #[test]
    fn empty_groups_report_zero() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        let summary = run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap();

        assert_eq!(summary.groups.len(), Group::PRIORITY.len());
        let packages = summary
            .groups
            .iter()
            .find(|g| g.group == Group::Packages)
            .unwrap();
        assert_eq!(*packages, GroupStats::new(Group::Packages, 0));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn failed_page_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let mut executor = ScriptedExecutor::new().failing_pages(&["B"]);
        let summary = run(&config, &catalog, &mut executor, false).unwrap();
        assert_eq!(summary.built, 2);
        assert_eq!(summary.failed, 1);

        let saved = ChangeManifest::load(&config.manifest_path());
        assert!(saved.entry("A").is_some());
        assert!(saved.entry("B").is_none());
        assert!(saved.entry("C").is_some());

        // retried next time
        let mut executor = ScriptedExecutor::new();
        run(&config, &catalog, &mut executor, false).unwrap();
        assert_eq!(executor.built_ids(), vec!["B"]);
    }

    #[test]
    fn executor_crash_keeps_completed_batches() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let mut executor = ScriptedExecutor::new().fatal_on_call(2);
        let err = run(&config, &catalog, &mut executor, false).unwrap_err();
        assert!(matches!(err.error, BuildError::Executor(_)));
        assert!(!executor.finished);
        // core completed, blog was cut short by the crash
        assert_eq!(err.summary.built, 2);

        let saved = ChangeManifest::load(&config.manifest_path());
        assert_eq!(saved.len(), 2);
        assert!(saved.entry("C").is_none());
        assert!(saved.manifest().last_build_at.is_none());

        // resume: only the blog batch remains
        let mut executor = ScriptedExecutor::new();
        let summary = run(&config, &catalog, &mut executor, false).unwrap();
        assert_eq!(executor.built_ids(), vec!["C"]);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn finish_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let mut executor = ScriptedExecutor::new().failing_finish();
        let err = run(&config, &catalog, &mut executor, false).unwrap_err();
        assert!(matches!(err.error, BuildError::Executor(_)));
        let saved = ChangeManifest::load(&config.manifest_path());
        assert_eq!(saved.len(), 3);
        assert!(saved.manifest().last_build_at.is_none());
    }

    #[test]
    fn manifest_save_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp, 10);
        std::fs::write(tmp.path().join("blocked"), "file").unwrap();
        config.cache_dir = tmp.path().join("blocked");
        let catalog = small_catalog(&tmp);

        let err = run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap_err();
        assert!(matches!(err.error, BuildError::Manifest(_)));
    }

    #[test]
    fn failed_run_still_reports_counts_and_peak() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        let mut manifest = ChangeManifest::load(&config.manifest_path());
        let mut executor = ScriptedExecutor::new().failing_finish();

        let err = run_build(
            &config,
            &catalog,
            &mut manifest,
            &mut executor,
            FixedProbe::new(42),
            false,
            None,
        )
        .unwrap_err();

        assert!(matches!(err.error, BuildError::Executor(_)));
        assert_eq!(err.summary.peak_memory_mb, 42);
        assert_eq!(err.summary.built, 3);
        assert_eq!(err.summary.total_pages, 3);
        assert_eq!(err.summary.groups.len(), Group::PRIORITY.len());
        assert_eq!(err.to_string(), err.error.to_string());
    }

    #[test]
    fn removed_pages_are_pruned() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        run(&config, &catalog, &mut ScriptedExecutor::new(), false).unwrap();

        let smaller = PageCatalog::from_groups([(
            Group::Core,
            vec![catalog.pages(Group::Core)[0].clone()],
        )]);
        run(&config, &smaller, &mut ScriptedExecutor::new(), false).unwrap();
        let saved = ChangeManifest::load(&config.manifest_path());
        assert_eq!(saved.len(), 1);
        assert!(saved.entry("A").is_some());
    }

    // =========================================================================
    // Events and memory
    // =========================================================================

    #[test]
    fn events_arrive_in_order() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);
        let (tx, rx) = mpsc::channel();
        let mut manifest = ChangeManifest::load(&config.manifest_path());
        let mut executor = ScriptedExecutor::new().failing_pages(&["C"]);

        run_build(
            &config,
            &catalog,
            &mut manifest,
            &mut executor,
            FixedProbe::new(10),
            false,
            Some(tx),
        )
        .unwrap();
        let events: Vec<BuildEvent> = rx.iter().collect();

        assert_eq!(
            events[0],
            BuildEvent::RunStarted {
                total_pages: 3,
                force: false
            }
        );
        assert_eq!(
            events[1],
            BuildEvent::GroupStarted {
                group: Group::Core,
                pages: 2,
                batches: 1
            }
        );
        assert!(matches!(
            events[2],
            BuildEvent::BatchFinished {
                group: Group::Core,
                batch: 1,
                batches: 1,
                stats: BatchStats {
                    built: 2,
                    skipped: 0,
                    failed: 0
                }
            }
        ));
        assert!(matches!(events[3], BuildEvent::GroupFinished { .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            BuildEvent::PageFailed { page_id, .. } if page_id == "C"
        )));
        let finished = events
            .iter()
            .filter(|e| matches!(e, BuildEvent::GroupFinished { .. }))
            .count();
        assert_eq!(finished, Group::PRIORITY.len());
    }

    #[test]
    fn memory_pressure_asks_executor_for_relief() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp, 10);
        config.memory.sample_interval_ms = 60_000;
        let catalog = small_catalog(&tmp);
        let mut manifest = ChangeManifest::load(&config.manifest_path());
        let mut executor = ScriptedExecutor::new();
        let (tx, rx) = mpsc::channel();

        // 900 of 1000 MB is above the 80% mark from the first sample
        let summary = run_build(
            &config,
            &catalog,
            &mut manifest,
            &mut executor,
            FixedProbe::new(900),
            false,
            Some(tx),
        )
        .unwrap();

        assert_eq!(executor.relief_calls, 1);
        assert_eq!(summary.peak_memory_mb, 900);
        assert_eq!(summary.built, 3);
        assert!(rx
            .iter()
            .any(|e| e == BuildEvent::MemoryPressure { peak_mb: 900 }));
    }

    // =========================================================================
    // Plan
    // =========================================================================

    #[test]
    fn plan_reports_without_side_effects() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, 10);
        let catalog = small_catalog(&tmp);

        let mut manifest = ChangeManifest::load(&config.manifest_path());
        let a = &catalog.pages(Group::Core)[0];
        manifest.record(a, fingerprint(a).unwrap(), Utc::now());

        let plans: Vec<BatchPlan> = plan(&catalog, &manifest, 10, false).collect();
        assert_eq!(
            plans,
            vec![
                BatchPlan {
                    group: Group::Core,
                    batch: 1,
                    batches: 1,
                    to_build: vec!["B".into()],
                    to_skip: 1
                },
                BatchPlan {
                    group: Group::Blog,
                    batch: 1,
                    batches: 1,
                    to_build: vec!["C".into()],
                    to_skip: 0
                },
            ]
        );
        assert!(!config.manifest_path().exists());

        let forced: usize = plan(&catalog, &manifest, 10, true)
            .map(|p| p.to_build.len())
            .sum();
        assert_eq!(forced, 3);
    }
}
