// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker-pool sizing and bounded parallel execution.
//
// The sizing policy is a pure function of device resources; the pool itself
// is a semaphore in front of tokio's blocking thread pool, so CPU-bound
// transcoding work never occupies more than the configured number of
// threads at once.

use std::sync::Arc;

use pressfit_core::DeviceProfile;
use pressfit_core::error::{PressfitError, Result};
use tokio::sync::Semaphore;
use tracing::debug;

/// Map device resources to a worker-pool size.
///
/// Memory is the dominant constraint — each in-flight page or image holds a
/// decoded pixel buffer. Devices under 3 GB are capped at 2 workers, under
/// 6 GB at 4, and everything else at 6, never exceeding the core count.
pub fn worker_count(cores: usize, total_ram_mb: u64) -> usize {
    let cap = if total_ram_mb < 3000 {
        2
    } else if total_ram_mb < 6000 {
        4
    } else {
        6
    };
    cores.max(1).min(cap)
}

/// Detect the current device's resources.
///
/// Returns `None` when either query fails; callers must then fall back to a
/// single worker rather than guessing.
pub fn detect_device() -> Option<DeviceProfile> {
    let cores = std::thread::available_parallelism().ok()?.get();
    let total_ram_mb = total_memory_mb()?;
    Some(DeviceProfile {
        cores,
        total_ram_mb,
    })
}

#[cfg(target_os = "linux")]
fn total_memory_mb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn total_memory_mb() -> Option<u64> {
    None
}

/// Bounded pool for CPU-bound transcoding closures.
///
/// Cheaply cloneable; clones share the same permit set, so a job can hand
/// the pool to every spawned task and still bound total concurrency.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    /// Pool with a fixed number of workers (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Pool sized from the current device, defaulting to a single worker
    /// when detection fails.
    pub fn from_device() -> Self {
        let workers = match detect_device() {
            Some(device) => worker_count(device.cores, device.total_ram_mb),
            None => 1,
        };
        debug!(workers, "sized worker pool from device resources");
        Self::new(workers)
    }

    /// Configured pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run a CPU-bound closure on the blocking thread pool, waiting for a
    /// permit first so at most `workers` closures execute at once.
    pub async fn run<T, F>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| PressfitError::Worker(format!("pool closed: {err}")))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|err| PressfitError::Worker(format!("blocking task failed: {err}")))
    }
}
