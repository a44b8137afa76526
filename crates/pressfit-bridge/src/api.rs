// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression entry point consumed by the host bridge.

use std::sync::Arc;

use pressfit_core::error::PressfitError;
use pressfit_core::{CompressReply, CompressionStrategy};
use pressfit_document::render::PageRenderer;
use pressfit_document::{CompressionJob, preserve};
use tracing::{error, info, instrument, warn};

/// Compress the PDF at `file_path` to fit under `size_limit_kb`, writing
/// the result to `output_path`.
///
/// Uses the build's default page renderer for the rasterising strategy
/// (PDFium when the `pdfium` feature is enabled). Every failure is folded
/// into the structured reply; this function never panics across the
/// boundary.
pub async fn compress_pdf(
    file_path: &str,
    output_path: &str,
    size_limit_kb: u64,
    strategy: CompressionStrategy,
) -> CompressReply {
    compress_pdf_with_renderer(default_renderer(), file_path, output_path, size_limit_kb, strategy)
        .await
}

/// Like [`compress_pdf`], with an explicit page renderer.
#[instrument(skip_all, fields(file_path, output_path, size_limit_kb, strategy = %strategy))]
pub async fn compress_pdf_with_renderer(
    renderer: Option<Arc<dyn PageRenderer>>,
    file_path: &str,
    output_path: &str,
    size_limit_kb: u64,
    strategy: CompressionStrategy,
) -> CompressReply {
    let budget_bytes = size_limit_kb.saturating_mul(1024);

    let source = match tokio::fs::read(file_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "cannot read source document");
            return CompressReply::Error {
                message: format!("cannot read {file_path}: {err}"),
            };
        }
    };

    let job = CompressionJob::new(strategy, budget_bytes);
    match job.run(&source, renderer).await {
        Ok(done) => match tokio::fs::write(output_path, &done.bytes).await {
            Ok(()) => {
                info!(
                    output_bytes = done.bytes.len(),
                    quality = ?done.quality,
                    "compressed document written"
                );
                CompressReply::Success {
                    path: output_path.to_string(),
                }
            }
            Err(err) => {
                error!(%err, "cannot write output document");
                CompressReply::Error {
                    message: format!("cannot write {output_path}: {err}"),
                }
            }
        },
        Err(err @ PressfitError::BudgetExceeded { .. })
            if strategy == CompressionStrategy::PreserveText =>
        {
            text_only_fallback(&source, output_path, budget_bytes, err).await
        }
        Err(err) => {
            error!(%err, "compression failed");
            CompressReply::Error {
                message: err.to_string(),
            }
        }
    }
}

/// Budget unmet even at minimum image quality: leave the text-only
/// rendition at the output path so the caller still gets the most useful
/// document producible, but report the failure.
async fn text_only_fallback(
    source: &[u8],
    output_path: &str,
    budget_bytes: u64,
    err: PressfitError,
) -> CompressReply {
    match preserve::text_only_floor(source) {
        Ok(floor) if floor.len() as u64 <= budget_bytes => {
            if let Err(write_err) = tokio::fs::write(output_path, &floor).await {
                return CompressReply::Error {
                    message: format!("{err}; text-only fallback could not be written: {write_err}"),
                };
            }
            warn!(
                floor_bytes = floor.len(),
                "wrote text-only rendition after unmet budget"
            );
            CompressReply::Error {
                message: format!(
                    "{err}; a text-only rendition ({} bytes) was written to {output_path}",
                    floor.len()
                ),
            }
        }
        _ => CompressReply::Error {
            message: err.to_string(),
        },
    }
}

/// The renderer this build ships with, if any.
fn default_renderer() -> Option<Arc<dyn PageRenderer>> {
    #[cfg(feature = "pdfium")]
    {
        Some(Arc::new(pressfit_document::PdfiumRenderer))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        None
    }
}
