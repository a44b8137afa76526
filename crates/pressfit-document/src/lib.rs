// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressfit-document — Budget-constrained PDF compression for the Pressfit engine.
//
// Provides the two compression strategies (full-page rasterisation and
// text-preserving image recompression), the quality binary search they share,
// the image-stream catalog, and the bounded worker pool that runs the
// parallel transcoding work.

pub mod assemble;
pub mod catalog;
pub mod job;
pub mod preserve;
pub mod quality;
pub mod raster;
pub mod render;
pub mod workers;

#[cfg(test)]
mod testsupport;

// Re-export the primary types so callers can use `pressfit_document::CompressionJob` etc.
pub use job::{CompressedDocument, CompressionJob};
pub use preserve::TextPreservingCompressor;
pub use quality::QualitySearch;
pub use raster::RasterCompressor;
pub use render::{PageRenderer, RenderedPage};
pub use workers::WorkerPool;

#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
