// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterising compression — replaces every page with a single JPEG whose
// quality is searched against an equal share of the byte budget.
//
// Pages render and encode in parallel up to the pool limit, but commits
// into the output document are serial and strictly index-ordered, so the
// result is identical whatever the worker count.

use std::sync::Arc;

use lopdf::{Document, ObjectId};
use pressfit_core::error::{PressfitError, Result};
use pressfit_core::{CompressionStrategy, EngineConfig};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::assemble::RasterDocumentBuilder;
use crate::job::CompressedDocument;
use crate::quality::search_sync;
use crate::render::{PageRenderer, encode_jpeg};
use crate::workers::WorkerPool;

/// Page-level compression strategy.
pub struct RasterCompressor {
    pool: WorkerPool,
    config: EngineConfig,
}

/// One page's finished rendition.
struct PageJpeg {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

impl RasterCompressor {
    pub fn new(pool: WorkerPool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    /// Rasterise `source` into a new document under `budget_bytes`.
    ///
    /// The output always has the source's page count: a page whose render
    /// or encode fails is carried over unchanged instead of dropped, and
    /// the final size check decides whether the job succeeded.
    #[instrument(skip_all, fields(budget_bytes, input_bytes = source.len()))]
    pub async fn compress(
        &self,
        source: &[u8],
        budget_bytes: u64,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<CompressedDocument> {
        let doc = Document::load_mem(source).map_err(|err| {
            PressfitError::PdfError(format!("cannot open source document: {err}"))
        })?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let page_count = page_ids.len();

        if page_count == 0 {
            info!("source has no pages, emitting empty document");
            let bytes = RasterDocumentBuilder::new().finish()?;
            return Ok(CompressedDocument {
                bytes,
                strategy: CompressionStrategy::Rasterize,
                quality: None,
            });
        }

        let per_page_budget = budget_bytes / page_count as u64;
        info!(
            page_count,
            per_page_budget,
            workers = self.pool.workers(),
            "rasterising document"
        );

        // Parallel production. Every worker gets its own copy of the source
        // bytes reference and opens its own render state — document handles
        // are never shared across threads.
        let shared = Arc::new(source.to_vec());
        let mut tasks = JoinSet::new();
        for index in 0..page_count {
            let pool = self.pool.clone();
            let renderer = Arc::clone(&renderer);
            let source = Arc::clone(&shared);
            let (lo, hi) = (self.config.page_quality_min, self.config.page_quality_max);
            tasks.spawn(async move {
                let outcome = pool
                    .run(move || {
                        transcode_page(renderer.as_ref(), &source, index, per_page_budget, lo, hi)
                    })
                    .await;
                (index, outcome)
            });
        }

        let mut transcoded: Vec<Option<PageJpeg>> = (0..page_count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined
                .map_err(|err| PressfitError::Worker(format!("page task aborted: {err}")))?;
            match outcome {
                Ok(Ok(page)) => transcoded[index] = Some(page),
                // Per-page failures are tolerated; the original page is
                // carried over at commit time so the page count holds.
                Ok(Err(err)) => {
                    warn!(page = index + 1, %err, "page transcode failed, keeping original page");
                }
                Err(err) => return Err(err),
            }
        }

        // Serial commit, strictly in page order.
        let mut builder = RasterDocumentBuilder::new();
        for (index, slot) in transcoded.into_iter().enumerate() {
            match slot {
                Some(page) => builder.push_jpeg_page(page.jpeg, page.width, page.height),
                None => builder.push_cloned_page(&doc, page_ids[index])?,
            }
        }
        let bytes = builder.finish()?;

        // The per-page search is a heuristic; the assembled document is
        // what must fit.
        if bytes.len() as u64 > budget_bytes {
            return Err(PressfitError::BudgetExceeded {
                achieved_bytes: bytes.len() as u64,
                budget_bytes,
            });
        }

        Ok(CompressedDocument {
            bytes,
            strategy: CompressionStrategy::Rasterize,
            quality: None,
        })
    }
}

/// Render one page and search its JPEG quality against the per-page share
/// of the budget. Falls back to the lowest quality in range when nothing
/// fits.
fn transcode_page(
    renderer: &dyn PageRenderer,
    source: &[u8],
    index: usize,
    per_page_budget: u64,
    quality_min: u8,
    quality_max: u8,
) -> Result<PageJpeg> {
    let page = renderer.render_page(source, index)?;
    let (width, height) = (page.width, page.height);
    let rgb = page.into_rgb()?;

    let searched = search_sync(quality_min, quality_max, per_page_budget, |quality| {
        encode_jpeg(&rgb, quality).ok()
    });
    let (quality, jpeg) = match searched {
        Some(hit) => hit,
        None => (quality_min, encode_jpeg(&rgb, quality_min)?),
    };

    debug!(
        page = index + 1,
        quality,
        bytes = jpeg.len(),
        "page transcoded"
    );
    Ok(PageJpeg {
        jpeg,
        width,
        height,
    })
}
