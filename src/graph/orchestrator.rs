//! Graph build orchestration.
//!
//! Owns request sequencing for graph rebuilds: debounces bursts of requests,
//! tags each dispatched build with a monotonically increasing request id, and
//! drops any result whose id is no longer current. A stale result is not an
//! error — it is the expected outcome of a newer request superseding an older
//! one, and it must never visually overwrite a fresher graph.
//!
//! The build+layout pipeline runs as one unit of blocking background work on
//! the tokio runtime. It consumes an immutable `GraphContext` and produces an
//! immutable snapshot+layout pair; it never touches live engine state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::builder::build_snapshot;
use super::layout::{layout_snapshot, DEFAULT_SEED};
use super::{GraphContext, GraphSnapshot, LayoutResult};

/// Quiet period after the last edit before a rebuild fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1200);

pub type ContextFn = Arc<dyn Fn() -> Option<GraphContext> + Send + Sync>;
pub type BuiltFn = Arc<dyn Fn(GraphSnapshot, LayoutResult) + Send + Sync>;
pub type FailedFn = Arc<dyn Fn(String) + Send + Sync>;

pub struct GraphOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Handle,
    debounce: Duration,
    layout_seed: u64,
    req_id: AtomicU64,
    pending_debounce: Mutex<Option<JoinHandle<()>>>,
    get_context: ContextFn,
    on_built: BuiltFn,
    on_failed: FailedFn,
}

impl GraphOrchestrator {
    pub fn new(
        runtime: Handle,
        debounce: Duration,
        get_context: ContextFn,
        on_built: BuiltFn,
        on_failed: FailedFn,
    ) -> GraphOrchestrator {
        GraphOrchestrator {
            inner: Arc::new(Inner {
                runtime,
                debounce,
                layout_seed: DEFAULT_SEED,
                req_id: AtomicU64::new(0),
                pending_debounce: Mutex::new(None),
                get_context,
                on_built,
                on_failed,
            }),
        }
    }

    /// Ask for a graph rebuild.
    ///
    /// `immediate` cancels any pending debounce and builds right away (used
    /// after renames and vault switches). Otherwise the debounce window
    /// restarts; rapid edits coalesce into a single build whose context is
    /// captured when the window finally fires, so the latest state wins.
    pub fn request(&self, immediate: bool) {
        if immediate {
            self.stop();
            Inner::build_now(&self.inner);
        } else {
            let inner = Arc::clone(&self.inner);
            let handle = self.inner.runtime.spawn(async move {
                tokio::time::sleep(inner.debounce).await;
                Inner::build_now(&inner);
            });
            self.inner.replace_debounce(Some(handle));
        }
    }

    /// Cancel a pending debounce. Safe to call on vault close/switch; builds
    /// already in flight will simply be dropped as stale if a newer request
    /// follows.
    pub fn stop(&self) {
        self.inner.replace_debounce(None);
    }

    /// Id of the most recently dispatched build (0 = none yet).
    pub fn current_request(&self) -> u64 {
        self.inner.req_id.load(Ordering::SeqCst)
    }
}

impl Drop for GraphOrchestrator {
    fn drop(&mut self) {
        self.inner.replace_debounce(None);
    }
}

impl Inner {
    fn replace_debounce(&self, next: Option<JoinHandle<()>>) {
        match self.pending_debounce.lock() {
            Ok(mut pending) => {
                if let Some(prev) = std::mem::replace(&mut *pending, next) {
                    prev.abort();
                }
            }
            Err(e) => log::warn!("Graph debounce state poisoned: {}", e),
        }
    }

    fn build_now(inner: &Arc<Inner>) {
        let ctx = match (inner.get_context)() {
            Some(ctx) => ctx,
            None => return, // no vault open
        };

        let my_id = inner.req_id.fetch_add(1, Ordering::SeqCst) + 1;
        let seed = inner.layout_seed;
        let inner = Arc::clone(inner);
        let runtime = inner.runtime.clone();

        runtime.spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let snapshot = build_snapshot(&ctx);
                let layout = layout_snapshot(&snapshot, seed);
                (snapshot, layout)
            })
            .await;

            // A newer request was dispatched while we were computing:
            // discard silently.
            if my_id != inner.req_id.load(Ordering::SeqCst) {
                log::debug!("Graph build {} is stale, dropping result", my_id);
                return;
            }

            match result {
                Ok((snapshot, layout)) => (inner.on_built)(snapshot, layout),
                Err(e) => (inner.on_failed)(format!("graph build worker failed: {}", e)),
            }
        });
    }
}
