// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pressfit.

use thiserror::Error;

/// Top-level error type for all Pressfit operations.
#[derive(Debug, Error)]
pub enum PressfitError {
    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Rasterisation --
    #[error("page rasterisation failed: {0}")]
    RenderError(String),

    #[error("no page rasteriser available in this build")]
    RendererUnavailable,

    // -- Budget --
    #[error(
        "size limit unmet: closest achievable output is {achieved_bytes} bytes \
         against a budget of {budget_bytes} bytes"
    )]
    BudgetExceeded {
        achieved_bytes: u64,
        budget_bytes: u64,
    },

    #[error(
        "cannot meet size limit: text content alone is {floor_bytes} bytes \
         against a budget of {budget_bytes} bytes"
    )]
    TextOnlyFloorExceeded { floor_bytes: u64, budget_bytes: u64 },

    // -- Concurrency --
    #[error("worker task failed: {0}")]
    Worker(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PressfitError>;
