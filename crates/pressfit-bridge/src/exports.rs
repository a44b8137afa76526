// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Exports directory — where compressed documents are published for the
// user, plus the best-effort sweep of expired files.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use pressfit_core::error::Result;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Directory where exported documents are published.
///
/// Honours `PRESSFIT_EXPORT_DIR`, then falls back to a conventional
/// data-directory location.
pub fn exports_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PRESSFIT_EXPORT_DIR") {
        return PathBuf::from(dir);
    }
    dirs_fallback().join("pressfit").join("exports")
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    PathBuf::from("/tmp")
}

/// Write `data` into the exports directory, creating it if absent.
/// Returns the absolute path of the written file.
///
/// An existing file with the same name is never overwritten; a short
/// unique suffix is inserted before the extension instead.
pub fn save_to_exports(file_name: &str, data: &[u8]) -> Result<PathBuf> {
    save_into(&exports_dir(), file_name, data)
}

/// Host-string adapter for [`save_to_exports`]: the absolute path on
/// success, `"Error: <reason>"` on failure.
pub fn save_to_exports_message(file_name: &str, data: &[u8]) -> String {
    match save_to_exports(file_name, data) {
        Ok(path) => path.display().to_string(),
        Err(err) => {
            error!(%err, "export failed");
            format!("Error: {err}")
        }
    }
}

/// Delete exported files older than `expiration_minutes`.
///
/// Best-effort by design: failures are logged and never propagated, and
/// there is no return value for the host to act on.
pub fn cleanup_exported_files(expiration_minutes: u64) {
    let deleted = cleanup_dir(
        &exports_dir(),
        Duration::from_secs(expiration_minutes * 60),
    );
    debug!(deleted, expiration_minutes, "export cleanup complete");
}

fn save_into(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut target = dir.join(file_name);
    if target.exists() {
        target = dir.join(unique_name(file_name));
    }
    std::fs::write(&target, data)?;

    info!(path = %target.display(), bytes = data.len(), "file exported");
    Ok(target)
}

/// `report.pdf` → `report_1a2b3c4d.pdf`
fn unique_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let tag = Uuid::new_v4().simple().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{}.{ext}", &tag[..8]),
        None => format!("{stem}_{}", &tag[..8]),
    }
}

fn cleanup_dir(dir: &Path, expiration: Duration) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(%err, "exports directory unavailable, nothing to clean");
            return 0;
        }
    };

    let mut deleted = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > expiration)
            .unwrap_or(false);
        if !expired {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                deleted += 1;
                debug!(path = %path.display(), "deleted expired export");
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to delete expired export");
            }
        }
    }
    deleted
}
