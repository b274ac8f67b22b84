//! # Sitebatch
//!
//! An incremental, chunked build orchestrator for large generated static
//! sites. A travel site with a few hundred hand-written routes and thousands
//! of data-driven SEO pages cannot afford to render everything on every
//! deploy, nor to render everything in one process without running out of
//! memory. Sitebatch decides which pages actually need building, feeds them
//! to the site generator in bounded batches, and checkpoints progress so an
//! interrupted build resumes where it stopped.
//!
//! # Architecture: One Pass, Many Checkpoints
//!
//! ```text
//! 1. Catalog    data/*.json + routes  →  PageCatalog      (every candidate page, grouped)
//! 2. Schedule   PageCatalog           →  batches          (priority order, ≤ chunk_size)
//! 3. Evaluate   batch + manifest      →  changed pages    (fingerprint comparison)
//! 4. Execute    changed pages         →  BuildExecutor    (per-batch renderer, optional)
//! 5. Record     successes             →  manifest.json    (saved after every batch)
//! 6. Finish     whole-project build   →  publish dir      (copy + post-publish hook)
//! ```
//!
//! A background memory supervisor samples process memory for the whole run
//! and signals pressure between batches.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Page records, groups, content collections, and the immutable [`catalog::PageCatalog`] |
//! | [`manifest`] | Durable change manifest: fingerprints, change detection, atomic save |
//! | [`schedule`] | Lazy, deterministic batching in group priority order |
//! | [`memory`] | Background memory sampling, peak tracking, pressure signal |
//! | [`executor`] | The [`executor::BuildExecutor`] seam and the subprocess-backed implementation |
//! | [`report`] | Per-group counters, per-batch checkpointing, final summary |
//! | [`build`] | Orchestration glue, progress events, dry-run planning |
//! | [`publish`] | Copying build output to the publish directory; `--clean` |
//! | [`config`] | `sitebatch.toml` loading, merging, and validation |
//! | [`output`] | Stable CLI output lines and summary block |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Conservative Change Detection
//!
//! A page is skipped only when its fingerprint provably matches the last
//! successful build; any uncertainty means "rebuild". A false rebuild costs
//! time, a false skip ships a stale page.
//!
//! ## Checkpoint Every Batch
//!
//! The manifest is saved (atomically, via temp file and rename) after every
//! batch. Saving per page would be I/O bound; saving once per run would lose
//! all progress to a crash. Per batch bounds the lost work to one chunk.
//!
//! ## Priority Order
//!
//! Groups build in a fixed order from core routes down to long-tail local
//! SEO pages, so a time-boxed or interrupted build always has the pages that
//! matter most done first.
//!
//! ## No Global State
//!
//! The catalog is loaded once through a [`catalog::ContentProvider`] and
//! passed down as a value. Tests build catalogs from in-memory fixtures.

pub mod build;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod memory;
pub mod output;
pub mod publish;
pub mod report;
pub mod schedule;

#[cfg(test)]
pub(crate) mod test_helpers;
