//! Memory supervision.
//!
//! A background thread samples process memory on a fixed interval while
//! batches run. It keeps the peak observed value and, when usage crosses the
//! high-water mark, logs a warning and raises a pressure flag that the build
//! loop drains between batches.
//!
//! Supervision is advisory. Nothing here aborts a batch or kills the process:
//! staying under the ceiling is about OOM risk, never about correctness.
//!
//! ```text
//! main thread    batch 1 ── batch 2 ── batch 3 ──────── stop() → peak
//!                        ▲          ▲
//!                  take_pressure()  │
//! sampler        ·  ·  ·  ·  ·  ·  ·  ·  ·  ·  ·  ·  ·  (every interval)
//! ```
//!
//! The thread is joined on [`MemorySupervisor::stop`] or on drop, so it ends
//! on every exit path including errors.

use crate::config::MemoryConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// A source of memory usage readings.
pub trait MemoryProbe: Send + 'static {
    /// Current usage in megabytes, or `None` when it cannot be measured.
    fn used_mb(&self) -> Option<u64>;
}

/// Resident set size from `/proc/self/status`.
///
/// Returns `None` on platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn used_mb(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss_mb(&status)
    }
}

/// Extract `VmRSS` (reported in kB) as megabytes.
fn parse_vm_rss_mb(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb / 1024)
}

/// State shared between the sampler thread and its owner.
#[derive(Debug, Default)]
struct Shared {
    peak_mb: AtomicU64,
    pressure: AtomicBool,
}

/// Handle to the running sampler thread.
#[derive(Debug)]
pub struct MemorySupervisor {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MemorySupervisor {
    /// Take a first sample on the calling thread, then spawn the sampler.
    pub fn start(config: &MemoryConfig, probe: impl MemoryProbe) -> Self {
        let shared = Arc::new(Shared::default());
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = Duration::from_millis(config.sample_interval_ms.max(1));
        let mut sampler = Sampler {
            probe,
            shared: Arc::clone(&shared),
            high_water_mb: config.high_water_mb(),
            ceiling_mb: config.ceiling_mb,
            above: false,
        };
        sampler.sample();

        let handle = std::thread::Builder::new()
            .name("memory-supervisor".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => sampler.sample(),
                        // Stop requested or owner dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                sampler.sample();
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "could not start memory supervisor, peak memory reflects startup only");
                None
            }
        };

        Self {
            shared,
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Highest usage seen so far. Never decreases.
    pub fn peak_mb(&self) -> u64 {
        self.shared.peak_mb.load(Ordering::Relaxed)
    }

    /// Whether the high-water mark was crossed since the last call.
    pub fn take_pressure(&self) -> bool {
        self.shared.pressure.swap(false, Ordering::AcqRel)
    }

    /// Stop sampling, join the thread, and return the final peak.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.peak_mb()
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("memory supervisor thread panicked");
            }
            tracing::debug!(peak_mb = self.peak_mb(), "memory supervisor stopped");
        }
    }
}

impl Drop for MemorySupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Sampler<P> {
    probe: P,
    shared: Arc<Shared>,
    high_water_mb: u64,
    ceiling_mb: u64,
    /// Whether the previous sample was above the high-water mark.
    above: bool,
}

impl<P: MemoryProbe> Sampler<P> {
    fn sample(&mut self) {
        let Some(used_mb) = self.probe.used_mb() else {
            return;
        };
        self.shared.peak_mb.fetch_max(used_mb, Ordering::Relaxed);

        let above = used_mb >= self.high_water_mb;
        if above && !self.above {
            tracing::warn!(
                used_mb,
                ceiling_mb = self.ceiling_mb,
                "high memory usage, requesting relief"
            );
            self.shared.pressure.store(true, Ordering::Release);
        }
        self.above = above;
    }
}
