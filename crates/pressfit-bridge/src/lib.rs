// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressfit-bridge — Host-facing boundary of the Pressfit engine.
//
// Three operations make up the complete surface the host sees: compress a
// document under a byte budget, publish bytes into the exports directory,
// and sweep expired exports. Every compress outcome is a structured reply;
// nothing escapes as an unhandled fault.

pub mod api;
pub mod exports;
pub mod telemetry;

pub use api::{compress_pdf, compress_pdf_with_renderer};
pub use exports::{cleanup_exported_files, exports_dir, save_to_exports, save_to_exports_message};
pub use telemetry::init_tracing;

// Re-export the types hosts need to call the API without naming the inner crates.
pub use pressfit_core::{CompressReply, CompressionStrategy};
pub use pressfit_document::{PageRenderer, RenderedPage};
