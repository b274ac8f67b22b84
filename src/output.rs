//! CLI output formatting.
//!
//! Progress lines and the summary block are the only human-facing output of
//! a build, and scripts parse them. Treat the formats below as stable.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Building 1043 pages
//! core (7 pages, 1 batches)
//!     batch 1/1: built=2 skipped=5 failed=0
//! core: built=2 skipped=5
//! cruises (130 pages, 2 batches)
//!     batch 1/2: built=100 skipped=0 failed=0
//!     failed /cruises/alaska: missing hero image
//!     batch 2/2: built=29 skipped=0 failed=1
//!     memory pressure: peak 6650 MB
//! cruises: built=129 skipped=0 failed=1
//! ...
//! Published 1043 files (12 static)
//! ```
//!
//! ## Summary
//!
//! ```text
//! Summary
//!     core: built=2 skipped=5
//!     cruises: built=129 skipped=0 failed=1
//!     packages: built=0 skipped=0
//! Total pages: 137
//! Built: 131
//! Skipped (cached): 5
//! Failed: 1
//! Duration: 42.7s
//! Peak memory: 6650 MB
//! ```
//!
//! ## Plan
//!
//! ```text
//! core batch 1/1: build=2 skip=5
//!     /flights
//!     /about
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::build::{BatchPlan, BuildEvent};
use crate::report::BuildSummary;
use std::path::PathBuf;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Seconds with one decimal, or minutes and seconds past a minute.
fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else {
        let whole = seconds.round() as u64;
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::RunStarted { total_pages, force } => {
            let suffix = if *force { " (forced)" } else { "" };
            vec![format!("Building {} pages{}", total_pages, suffix)]
        }
        BuildEvent::GroupStarted {
            group,
            pages,
            batches,
        } => vec![format!("{} ({} pages, {} batches)", group, pages, batches)],
        BuildEvent::PageFailed {
            page_id, message, ..
        } => vec![format!("{}failed {}: {}", indent(1), page_id, message)],
        BuildEvent::BatchFinished {
            batch,
            batches,
            stats,
            ..
        } => vec![format!(
            "{}batch {}/{}: built={} skipped={} failed={}",
            indent(1),
            batch,
            batches,
            stats.built,
            stats.skipped,
            stats.failed
        )],
        BuildEvent::MemoryPressure { peak_mb } => {
            vec![format!("{}memory pressure: peak {} MB", indent(1), peak_mb)]
        }
        BuildEvent::GroupFinished { stats } => vec![format!("{}: {}", stats.group, stats)],
        BuildEvent::Published { report } => vec![format!(
            "Published {} files ({} static)",
            report.build_files + report.static_files,
            report.static_files
        )],
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run summary block.
pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = vec!["Summary".to_string()];
    for stats in &summary.groups {
        lines.push(format!("{}{}: {}", indent(1), stats.group, stats));
    }
    lines.push(format!("Total pages: {}", summary.total_pages));
    lines.push(format!("Built: {}", summary.built));
    lines.push(format!("Skipped (cached): {}", summary.skipped));
    lines.push(format!("Failed: {}", summary.failed));
    lines.push(format!(
        "Duration: {}",
        format_duration(summary.duration_seconds)
    ));
    lines.push(format!("Peak memory: {} MB", summary.peak_memory_mb));
    lines
}

/// Print the summary block to stdout.
pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Format a dry-run plan: one header per batch, then the pages to build.
pub fn format_plan(plans: &[BatchPlan]) -> Vec<String> {
    let mut lines = Vec::new();
    for plan in plans {
        lines.push(format!(
            "{} batch {}/{}: build={} skip={}",
            plan.group,
            plan.batch,
            plan.batches,
            plan.to_build.len(),
            plan.to_skip
        ));
        for id in &plan.to_build {
            lines.push(format!("{}{}", indent(1), id));
        }
    }
    let build: usize = plans.iter().map(|p| p.to_build.len()).sum();
    let skip: usize = plans.iter().map(|p| p.to_skip).sum();
    lines.push(format!("Would build {} pages, skip {}", build, skip));
    lines
}

pub fn print_plan(plans: &[BatchPlan]) {
    for line in format_plan(plans) {
        println!("{}", line);
    }
}

// ============================================================================
// Clean
// ============================================================================

pub fn format_clean(removed: &[PathBuf]) -> Vec<String> {
    if removed.is_empty() {
        return vec!["Nothing to clean".to_string()];
    }
    removed
        .iter()
        .map(|dir| format!("Removed {}", dir.display()))
        .collect()
}

pub fn print_clean(removed: &[PathBuf]) {
    for line in format_clean(removed) {
        println!("{}", line);
    }
}
