// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pressfit compression engine.

use serde::{Deserialize, Serialize};

/// Which compression strategy a job applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionStrategy {
    /// Replace every page with a single budget-searched JPEG rendition.
    /// Text becomes part of the bitmap.
    Rasterize,
    /// Re-encode embedded raster images only, leaving text and vector
    /// content untouched.
    PreserveText,
}

impl CompressionStrategy {
    /// Map the host bridge's `preserveText` integer onto a strategy.
    /// Zero selects rasterisation; any other value preserves text.
    pub fn from_preserve_flag(flag: i64) -> Self {
        if flag == 0 {
            Self::Rasterize
        } else {
            Self::PreserveText
        }
    }
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rasterize => write!(f, "rasterize"),
            Self::PreserveText => write!(f, "preserve-text"),
        }
    }
}

/// Device resources used to size the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Logical CPU cores available to the process.
    pub cores: usize,
    /// Total physical memory in megabytes.
    pub total_ram_mb: u64,
}

/// Structured reply returned across the host bridge.
///
/// Serialises as `{"status": "success", "path": ...}` or
/// `{"status": "error", "message": ...}` so the host can inspect the
/// outcome without parsing free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CompressReply {
    Success { path: String },
    Error { message: String },
}

impl CompressReply {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
