// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-preserving compression — re-encodes embedded raster images at a
// single document-wide JPEG quality found by binary search, leaving text
// and vector content untouched.

use std::sync::Arc;

use lopdf::{Document, ObjectId};
use pressfit_core::error::{PressfitError, Result};
use pressfit_core::{CompressionStrategy, EngineConfig};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{ImageStream, apply_recompressed, catalog_image_streams, strip_image_payloads};
use crate::job::CompressedDocument;
use crate::quality::QualitySearch;
use crate::render::encode_jpeg;
use crate::workers::WorkerPool;

/// Image-level compression strategy.
pub struct TextPreservingCompressor {
    pool: WorkerPool,
    config: EngineConfig,
}

impl TextPreservingCompressor {
    pub fn new(pool: WorkerPool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    /// Compress `source` under `budget_bytes` without touching text.
    ///
    /// Fast path: input that already fits is returned byte-identical.
    /// Otherwise a document-wide quality search runs over the catalogued
    /// image streams; if even the text-only floor exceeds the budget the
    /// job fails immediately with the floor size.
    #[instrument(skip_all, fields(budget_bytes, input_bytes = source.len()))]
    pub async fn compress(&self, source: &[u8], budget_bytes: u64) -> Result<CompressedDocument> {
        if source.len() as u64 <= budget_bytes {
            debug!("input already within budget, returning unchanged");
            return Ok(CompressedDocument {
                bytes: source.to_vec(),
                strategy: CompressionStrategy::PreserveText,
                quality: None,
            });
        }

        let doc = Document::load_mem(source).map_err(|err| {
            PressfitError::PdfError(format!("cannot open source document: {err}"))
        })?;

        // Nothing smaller than the text-only floor is reachable without
        // touching text or vector content.
        let floor = text_floor_bytes(&doc)?;
        if floor.len() as u64 > budget_bytes {
            return Err(PressfitError::TextOnlyFloorExceeded {
                floor_bytes: floor.len() as u64,
                budget_bytes,
            });
        }

        let targets = catalog_image_streams(&doc);
        drop(doc);
        info!(
            images = targets.len(),
            floor_bytes = floor.len(),
            workers = self.pool.workers(),
            "searching document-wide image quality"
        );

        let shared = Arc::new(source.to_vec());
        let mut search = QualitySearch::new(
            self.config.image_quality_min,
            self.config.image_quality_max,
            budget_bytes,
        );
        while let Some(quality) = search.next_probe() {
            match self.recompress_at(&shared, &targets, quality).await {
                Ok(bytes) => {
                    debug!(quality, bytes = bytes.len(), "trial assembled");
                    search.record(quality, Some(bytes));
                }
                Err(err) => {
                    warn!(quality, %err, "trial failed");
                    search.record(quality, None);
                }
            }
        }

        if let Some((quality, bytes)) = search.into_best() {
            return Ok(CompressedDocument {
                bytes,
                strategy: CompressionStrategy::PreserveText,
                quality: Some(quality),
            });
        }

        // Last resort: the lowest quality in range.
        let min_quality = self.config.image_quality_min.max(1);
        match self.recompress_at(&shared, &targets, min_quality).await {
            Ok(bytes) if bytes.len() as u64 <= budget_bytes => Ok(CompressedDocument {
                bytes,
                strategy: CompressionStrategy::PreserveText,
                quality: Some(min_quality),
            }),
            Ok(bytes) => Err(PressfitError::BudgetExceeded {
                achieved_bytes: bytes.len() as u64,
                budget_bytes,
            }),
            Err(err) => {
                warn!(%err, "minimum-quality recompression failed");
                Err(PressfitError::BudgetExceeded {
                    achieved_bytes: source.len() as u64,
                    budget_bytes,
                })
            }
        }
    }

    /// One search trial: re-encode every catalogued stream at `quality` in
    /// parallel, then commit the replacements serially onto a fresh parse
    /// of the source.
    async fn recompress_at(
        &self,
        source: &Arc<Vec<u8>>,
        targets: &[ImageStream],
        quality: u8,
    ) -> Result<Vec<u8>> {
        let mut tasks = JoinSet::new();
        for target in targets {
            let pool = self.pool.clone();
            let id = target.id;
            let stream = target.clone();
            tasks.spawn(async move {
                let outcome = pool.run(move || reencode_stream(&stream, quality)).await;
                (id, outcome)
            });
        }

        let mut replacements = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = joined
                .map_err(|err| PressfitError::Worker(format!("image task aborted: {err}")))?;
            match outcome {
                Ok(Ok(reencoded)) => replacements.push(reencoded),
                // One bad image never sinks the trial; the stream stays as
                // it was and the final size check has the last word.
                Ok(Err(err)) => {
                    warn!(object = ?id, %err, "image recompression failed, leaving stream unmodified");
                }
                Err(err) => return Err(err),
            }
        }

        let mut doc = Document::load_mem(source).map_err(|err| {
            PressfitError::PdfError(format!("cannot reopen source document: {err}"))
        })?;
        for item in replacements {
            apply_recompressed(&mut doc, item.id, item.jpeg, item.width, item.height);
        }
        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            PressfitError::PdfError(format!("failed to serialise trial document: {err}"))
        })?;
        Ok(output)
    }
}

/// The document with every image payload removed — the smallest rendition
/// that still carries all text and vector content.
pub fn text_only_floor(source: &[u8]) -> Result<Vec<u8>> {
    let doc = Document::load_mem(source).map_err(|err| {
        PressfitError::PdfError(format!("cannot open source document: {err}"))
    })?;
    text_floor_bytes(&doc)
}

fn text_floor_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut stripped = doc.clone();
    strip_image_payloads(&mut stripped);
    stripped.compress();

    let mut output = Vec::new();
    stripped.save_to(&mut output).map_err(|err| {
        PressfitError::PdfError(format!("failed to serialise text-only rendition: {err}"))
    })?;
    Ok(output)
}

struct ReencodedImage {
    id: ObjectId,
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

fn reencode_stream(stream: &ImageStream, quality: u8) -> Result<ReencodedImage> {
    let decoded = stream.decode()?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let jpeg = encode_jpeg(&rgb, quality)?;
    Ok(ReencodedImage {
        id: stream.id,
        jpeg,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport;

    fn compressor() -> TextPreservingCompressor {
        TextPreservingCompressor::new(WorkerPool::new(2), EngineConfig::default())
    }

    #[tokio::test]
    async fn identity_when_input_fits_budget() {
        let source = testsupport::document_with_noise_image(20, 20);
        let budget = source.len() as u64 + 1024;

        let out = compressor().compress(&source, budget).await.unwrap();
        assert_eq!(out.bytes, source);
        assert_eq!(out.quality, None);
    }

    #[tokio::test]
    async fn recompresses_images_to_fit_budget() {
        // 100x100 noise is ~30KB raw; a 20KB budget forces recompression.
        let source = testsupport::document_with_noise_image(100, 100);
        let budget = 20_000u64;
        assert!(source.len() as u64 > budget);

        let out = compressor().compress(&source, budget).await.unwrap();
        assert!(out.bytes.len() as u64 <= budget);
        assert!(out.quality.is_some());

        // The output still parses and keeps its page.
        let doc = Document::load_mem(&out.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn fails_with_floor_size_when_text_alone_is_too_big() {
        let source = testsupport::document_with_noise_image(50, 50);
        let err = compressor().compress(&source, 64).await.unwrap_err();
        match err {
            PressfitError::TextOnlyFloorExceeded {
                floor_bytes,
                budget_bytes,
            } => {
                assert!(floor_bytes > 64);
                assert_eq!(budget_bytes, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn outcome_does_not_depend_on_worker_count() {
        let source = testsupport::document_with_noise_image(64, 64);
        let budget = 9_000u64;

        let solo = TextPreservingCompressor::new(WorkerPool::new(1), EngineConfig::default())
            .compress(&source, budget)
            .await;
        let pooled = TextPreservingCompressor::new(WorkerPool::new(4), EngineConfig::default())
            .compress(&source, budget)
            .await;

        match (solo, pooled) {
            (Ok(a), Ok(b)) => {
                assert_eq!(a.quality, b.quality);
                assert_eq!(a.bytes, b.bytes);
            }
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            (a, b) => panic!("outcomes diverged: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    #[test]
    fn text_only_floor_strips_image_payloads() {
        let source = testsupport::document_with_noise_image(100, 100);
        let floor = text_only_floor(&source).unwrap();
        assert!(floor.len() < source.len());

        let doc = Document::load_mem(&floor).unwrap();
        let images = catalog_image_streams(&doc);
        assert!(images.iter().all(|s| s.payload_len() == 0));
    }
}
