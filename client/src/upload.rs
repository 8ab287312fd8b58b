//! Debounced write-back of dirty territory tiles.
//!
//! Every local edit re-arms a single debounce timer. When it fires, all dirty
//! tiles are grouped per faction, PNG-encoded and sent as one batch per
//! faction. A failed batch leaves its tiles dirty; the next edit or the
//! teardown flush retries them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::tile_cache::{self, SharedTileCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Nothing to upload.
    Idle,
    /// Dirty tiles exist and wait for the debounce timer (or a retry).
    Pending,
    /// A flush is sending batches.
    Uploading,
}

/// Result of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub batches: usize,
    pub uploaded: usize,
    pub failed_factions: Vec<String>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed_factions.is_empty()
    }
}

#[derive(Default)]
struct TimerState {
    timer: Option<JoinHandle<()>>,
    uploading: bool,
    closed: bool,
}

struct Inner {
    api: ApiClient,
    snapshot_id: String,
    cache: SharedTileCache,
    debounce: Duration,
    state: Mutex<TimerState>,
    /// Serializes flushes so two uploads never overlap.
    flush_gate: tokio::sync::Mutex<()>,
}

pub struct UploadScheduler {
    inner: Arc<Inner>,
}

impl UploadScheduler {
    pub fn new(
        api: ApiClient,
        snapshot_id: impl Into<String>,
        cache: SharedTileCache,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                snapshot_id: snapshot_id.into(),
                cache,
                debounce,
                state: Mutex::new(TimerState::default()),
                flush_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn snapshot_id(&self) -> &str {
        &self.inner.snapshot_id
    }

    pub fn phase(&self) -> UploadPhase {
        if self.inner.lock_state().uploading {
            return UploadPhase::Uploading;
        }
        if tile_cache::lock(&self.inner.cache).has_dirty() {
            UploadPhase::Pending
        } else {
            UploadPhase::Idle
        }
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner
            .lock_state()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Restart the debounce timer after a local edit. Any armed timer is
    /// cancelled first, so a burst of edits produces a single flush.
    pub fn schedule(&self) {
        let mut state = self.inner.lock_state();
        if state.closed {
            return;
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available, dirty tiles wait for an explicit flush");
            return;
        };

        let inner = Arc::clone(&self.inner);
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // Detach the flush so re-arming the timer can never cancel an
            // upload that is already running.
            tokio::spawn(async move {
                inner.flush().await;
            });
        }));
    }

    /// Cancel the timer and upload everything that is dirty right now.
    pub async fn flush_now(&self) -> FlushReport {
        self.inner.cancel_timer();
        self.inner.flush().await
    }

    /// Wait for a running flush to finish and hold off new ones until the
    /// guard is dropped.
    pub async fn exclusive(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.flush_gate.lock().await
    }

    /// Stop scheduling and force one final upload of every dirty tile.
    pub async fn shutdown(&self) -> FlushReport {
        self.inner.lock_state().closed = true;
        let report = self.flush_now().await;
        if !report.is_clean() {
            warn!(
                snapshot_id = %self.inner.snapshot_id,
                failed = ?report.failed_factions,
                "tiles still dirty after teardown flush"
            );
        }
        report
    }
}

impl Drop for UploadScheduler {
    fn drop(&mut self) {
        let closed = {
            let mut state = self.inner.lock_state();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            std::mem::replace(&mut state.closed, true)
        };
        if closed || !tile_cache::lock(&self.inner.cache).has_dirty() {
            return;
        }

        warn!(
            snapshot_id = %self.inner.snapshot_id,
            "upload scheduler dropped with unsaved tiles, flushing in background"
        );
        match Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                runtime.spawn(async move {
                    inner.flush().await;
                });
            }
            Err(_) => error!("no async runtime available, unsaved tiles are lost"),
        }
    }
}

/// Resets the uploading flag even if the flush future is dropped midway.
struct UploadingGuard<'a>(&'a Inner);

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock_state().uploading = false;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.lock_state().timer.take() {
            timer.abort();
        }
    }

    async fn flush(&self) -> FlushReport {
        let _gate = self.flush_gate.lock().await;

        let batches = tile_cache::lock(&self.cache).prepare_batches();
        let mut report = FlushReport::default();
        if batches.is_empty() {
            return report;
        }

        self.lock_state().uploading = true;
        let _uploading = UploadingGuard(self);

        for batch in batches {
            report.batches += 1;
            let upload = batch.to_upload();
            match self.api.upload_tiles_batch(&self.snapshot_id, &upload).await {
                Ok(()) => {
                    let mut cache = tile_cache::lock(&self.cache);
                    for tile in &batch.tiles {
                        cache.clear_dirty_if_unchanged(&tile.key, tile.revision);
                    }
                    report.uploaded += batch.tiles.len();
                    info!(
                        snapshot_id = %self.snapshot_id,
                        faction_id = %batch.faction_id,
                        tiles = batch.tiles.len(),
                        "uploaded territory tiles"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        snapshot_id = %self.snapshot_id,
                        faction_id = %batch.faction_id,
                        tiles = batch.tiles.len(),
                        "failed to upload territory tiles"
                    );
                    report.failed_factions.push(batch.faction_id);
                }
            }
        }

        report
    }
}
