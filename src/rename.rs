//! Rename propagation: rewrite wikilink references across the whole vault
//! when a note changes its title.
//!
//! The rewrite runs as background blocking work over a captured file list.
//! Guarantees:
//!   - every file gets a `.bak` sibling before its first rewrite, written
//!     with the same atomic discipline as the rewrite itself;
//!   - cancellation is cooperative and only checked between files, so a
//!     single file is never left half-written;
//!   - one unreadable/unwritable file never aborts the vault-wide pass —
//!     it is recorded and the loop continues;
//!   - a superseded job's completion is dropped by request-id comparison,
//!     the same discipline the graph orchestrator uses.
//!
//! After a finished rename the caller is expected to rebuild the link index
//! from scratch and request an immediate graph rebuild.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

use crate::error::{EngineError, Result};
use crate::filenames::safe_filename;
use crate::vault::atomic_write_text;
use crate::wikilinks::rewrite_targets;

#[derive(Debug, Clone)]
pub struct RenameResult {
    pub old_id: String,
    pub new_id: String,
    pub total_files: usize,
    pub changed_files: usize,
    pub error_files: Vec<PathBuf>,
    /// Set when the user canceled mid-run. Informational, not a failure:
    /// files processed before the cancel point are already rewritten.
    pub canceled: bool,
}

pub type ProgressFn = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;
pub type FinishedFn = Arc<dyn Fn(RenameResult) + Send + Sync>;
pub type FailedFn = Arc<dyn Fn(String) + Send + Sync>;

pub struct RenameService {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Handle,
    req_id: AtomicU64,
    cancel: Mutex<Option<Arc<AtomicBool>>>,
    on_progress: ProgressFn,
    on_finished: FinishedFn,
    on_failed: FailedFn,
}

impl RenameService {
    pub fn new(
        runtime: Handle,
        on_progress: ProgressFn,
        on_finished: FinishedFn,
        on_failed: FailedFn,
    ) -> RenameService {
        RenameService {
            inner: Arc::new(Inner {
                runtime,
                req_id: AtomicU64::new(0),
                cancel: Mutex::new(None),
                on_progress,
                on_finished,
                on_failed,
            }),
        }
    }

    /// Kick off a vault-wide rewrite of `old_title` → `new_title`.
    ///
    /// Validation failures surface synchronously; everything after that is
    /// reported through the callbacks. Starting a new rename supersedes any
    /// in-flight one: the older job's completion will be discarded.
    pub fn start(&self, old_title: &str, new_title: &str, files: Vec<PathBuf>) -> Result<u64> {
        if old_title.trim().is_empty() || new_title.trim().is_empty() {
            return Err(EngineError::InvalidRename(
                "old and new titles must be non-empty".to_string(),
            ));
        }

        let old_id = safe_filename(old_title);
        let new_id = safe_filename(new_title);
        if old_id == new_id {
            return Err(EngineError::InvalidRename(format!(
                "titles are identical after canonicalization: {:?}",
                old_id
            )));
        }

        let my_id = self.inner.req_id.fetch_add(1, Ordering::SeqCst) + 1;

        let cancel = Arc::new(AtomicBool::new(false));
        match self.inner.cancel.lock() {
            Ok(mut slot) => *slot = Some(Arc::clone(&cancel)),
            Err(e) => log::warn!("Rename cancel state poisoned: {}", e),
        }

        // stable processing order: by file name, case-insensitive
        let mut files = files;
        files.sort_by_key(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

        let inner = Arc::clone(&self.inner);
        let runtime = self.inner.runtime.clone();
        runtime.spawn(async move {
            let progress_inner = Arc::clone(&inner);
            let worker = tokio::task::spawn_blocking(move || {
                run_rewrite(&old_id, &new_id, &files, &cancel, |done, total, name| {
                    // progress from a superseded job is noise, drop it
                    if my_id == progress_inner.req_id.load(Ordering::SeqCst) {
                        (progress_inner.on_progress)(done, total, name);
                    }
                })
            })
            .await;

            if my_id != inner.req_id.load(Ordering::SeqCst) {
                log::debug!("Rename job {} superseded, dropping result", my_id);
                return;
            }

            match worker {
                Ok(result) => {
                    log::info!(
                        "Rename rewrite finished: total={} changed={} canceled={} errors={}",
                        result.total_files,
                        result.changed_files,
                        result.canceled,
                        result.error_files.len()
                    );
                    (inner.on_finished)(result);
                }
                Err(e) => (inner.on_failed)(format!("rename worker failed: {}", e)),
            }
        });

        Ok(my_id)
    }

    /// Request cancellation of the current rename. Takes effect before the
    /// next file; the file being written when the flag flips completes
    /// normally.
    pub fn cancel(&self) {
        if let Ok(slot) = self.inner.cancel.lock() {
            if let Some(flag) = slot.as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// The blocking rewrite loop. Separated from the service so the exact
/// cancellation and partial-failure semantics are directly testable.
pub(crate) fn run_rewrite(
    old_id: &str,
    new_id: &str,
    files: &[PathBuf],
    cancel: &AtomicBool,
    progress: impl Fn(usize, usize, &str),
) -> RenameResult {
    let total_files = files.len();
    let mut changed_files = 0;
    let mut error_files: Vec<PathBuf> = Vec::new();
    let mut done = 0;
    let mut canceled = false;

    for path in files {
        if cancel.load(Ordering::SeqCst) {
            canceled = true;
            break;
        }

        done += 1;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match rewrite_one(path, old_id, new_id) {
            Ok(changed) => {
                if changed {
                    changed_files += 1;
                }
            }
            Err(e) => {
                log::warn!("Rename rewrite: {} failed: {}", path.display(), e);
                error_files.push(path.clone());
            }
        }

        progress(done, total_files, &file_name);
    }

    RenameResult {
        old_id: old_id.to_string(),
        new_id: new_id.to_string(),
        total_files,
        changed_files,
        error_files,
        canceled,
    }
}

fn rewrite_one(path: &Path, old_id: &str, new_id: &str) -> Result<bool> {
    let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;

    // Backup once before the first rewrite of this file; a later rename of
    // the same note must not clobber the user's pre-rename copy.
    let backup = backup_path(path);
    if !backup.exists() {
        atomic_write_text(&backup, &text)?;
    }

    let (new_text, changed) = rewrite_targets(&text, old_id, new_id);
    if changed {
        atomic_write_text(path, &new_text)?;
    }
    Ok(changed)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{}.bak", file_name))
}
