// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job orchestration — strategy dispatch, worker-pool wiring, and the
// authoritative final size check.

use std::sync::Arc;

use pressfit_core::error::{PressfitError, Result};
use pressfit_core::{CompressionStrategy, EngineConfig};
use tracing::{info, instrument};

use crate::preserve::TextPreservingCompressor;
use crate::raster::RasterCompressor;
use crate::render::PageRenderer;
use crate::workers::WorkerPool;

/// A successfully compressed document.
#[derive(Debug, Clone)]
pub struct CompressedDocument {
    /// Serialised output bytes.
    pub bytes: Vec<u8>,
    /// Strategy that produced the output.
    pub strategy: CompressionStrategy,
    /// Uniform JPEG quality applied to embedded images, when one was
    /// chosen. `None` for identity results and for rasterised output,
    /// where each page settles on its own quality.
    pub quality: Option<u8>,
}

/// One compression invocation: source bytes in, compressed document out.
///
/// Owns nothing beyond its configuration; created per call and discarded
/// after the result is produced. Never share a job's source document with
/// another concurrent job.
pub struct CompressionJob {
    strategy: CompressionStrategy,
    budget_bytes: u64,
    pool: WorkerPool,
    config: EngineConfig,
}

impl CompressionJob {
    /// Job with default configuration and a device-sized worker pool.
    pub fn new(strategy: CompressionStrategy, budget_bytes: u64) -> Self {
        Self {
            strategy,
            budget_bytes,
            pool: WorkerPool::from_device(),
            config: EngineConfig::default(),
        }
    }

    /// Fix the worker-pool size instead of deriving it from the device.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = WorkerPool::new(workers);
        self
    }

    /// Replace the engine configuration. A `worker_override` in the
    /// config also resizes the pool.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        if let Some(workers) = config.worker_override {
            self.pool = WorkerPool::new(workers);
        }
        self.config = config;
        self
    }

    /// Run the job to completion.
    ///
    /// `renderer` is only consulted by the rasterising strategy; passing
    /// `None` makes that strategy fail with `RendererUnavailable` while
    /// the text-preserving strategy still works.
    #[instrument(skip_all, fields(strategy = %self.strategy, budget_bytes = self.budget_bytes))]
    pub async fn run(
        &self,
        source: &[u8],
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<CompressedDocument> {
        info!(
            input_bytes = source.len(),
            workers = self.pool.workers(),
            "compression job started"
        );

        let output = match self.strategy {
            CompressionStrategy::Rasterize => {
                let renderer = renderer.ok_or(PressfitError::RendererUnavailable)?;
                RasterCompressor::new(self.pool.clone(), self.config.clone())
                    .compress(source, self.budget_bytes, renderer)
                    .await?
            }
            CompressionStrategy::PreserveText => {
                TextPreservingCompressor::new(self.pool.clone(), self.config.clone())
                    .compress(source, self.budget_bytes)
                    .await?
            }
        };

        // Authoritative final measurement — per-unit failures along the way
        // may have left the strategies optimistic, so the assembled bytes
        // are measured once more before anything is reported as success.
        let final_bytes = output.bytes.len() as u64;
        if final_bytes > self.budget_bytes {
            return Err(PressfitError::BudgetExceeded {
                achieved_bytes: final_bytes,
                budget_bytes: self.budget_bytes,
            });
        }

        info!(output_bytes = final_bytes, "compression job finished");
        Ok(output)
    }
}
