use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use super::event::ProgressStep;

/// How long the transient "saved" acknowledgment stays up.
const SAVED_ACK_TTL_SECS: u64 = 3;

/// Point-in-time view of an in-flight reply, cheap to clone for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplySnapshot {
    pub streaming: bool,
    pub thinking: bool,
    pub partial: String,
    pub progress: Vec<ProgressStep>,
    pub saved: bool,
}

/// Change notifications published to subscribed surfaces.
#[derive(Debug, Clone)]
pub enum ReplyUpdate {
    Started,
    Thinking(bool),
    /// The full accumulated partial content, republished on every append.
    Partial(String),
    Progress(Vec<ProgressStep>),
    /// Transient save acknowledgment; `false` when it expires.
    Saved(bool),
    Finished,
}

struct ReplyInner {
    snapshot: ReplySnapshot,
    // Lets a fresh ack outlive an older one's expiry timer.
    saved_generation: u64,
}

/// The shared state container the pipeline writes and the chat surface
/// observes, either by `subscribe()` or by polling `snapshot()`. Replaces
/// the ambient globals of the original client.
pub struct ReplyState {
    inner: Mutex<ReplyInner>,
    tx: broadcast::Sender<ReplyUpdate>,
}

impl Default for ReplyState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyState {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(ReplyInner {
                snapshot: ReplySnapshot::default(),
                saved_generation: 0,
            }),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplyUpdate> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ReplySnapshot {
        self.lock().snapshot.clone()
    }

    /// Clears per-turn state and raises the streaming flag.
    pub fn begin(&self) {
        {
            let mut inner = self.lock();
            inner.snapshot.streaming = true;
            inner.snapshot.thinking = false;
            inner.snapshot.partial.clear();
            inner.snapshot.progress.clear();
        }
        let _ = self.tx.send(ReplyUpdate::Started);
    }

    pub fn set_thinking(&self, active: bool) {
        self.lock().snapshot.thinking = active;
        let _ = self.tx.send(ReplyUpdate::Thinking(active));
    }

    /// Appends to the running content buffer and republishes it whole.
    pub fn append_content(&self, chunk: &str) {
        let partial = {
            let mut inner = self.lock();
            inner.snapshot.partial.push_str(chunk);
            inner.snapshot.partial.clone()
        };
        let _ = self.tx.send(ReplyUpdate::Partial(partial));
    }

    /// Inserts the step, or replaces an earlier entry with the same
    /// `(tool, file)` key in place, preserving its position.
    pub fn upsert_progress(&self, step: ProgressStep) {
        let progress = {
            let mut inner = self.lock();
            let steps = &mut inner.snapshot.progress;
            match steps.iter_mut().find(|s| s.key() == step.key()) {
                Some(existing) => *existing = step,
                None => steps.push(step),
            }
            steps.clone()
        };
        let _ = self.tx.send(ReplyUpdate::Progress(progress));
    }

    /// Drops all per-turn state once the assistant message is finalized.
    pub fn finish(&self) {
        {
            let mut inner = self.lock();
            inner.snapshot.streaming = false;
            inner.snapshot.thinking = false;
            inner.snapshot.partial.clear();
            inner.snapshot.progress.clear();
        }
        let _ = self.tx.send(ReplyUpdate::Finished);
    }

    /// Raises the "saved" acknowledgment and schedules its expiry. A newer
    /// ack supersedes an older timer via the generation counter.
    pub fn mark_saved(self: &Arc<Self>) {
        let generation = {
            let mut inner = self.lock();
            inner.snapshot.saved = true;
            inner.saved_generation += 1;
            inner.saved_generation
        };
        let _ = self.tx.send(ReplyUpdate::Saved(true));

        let state = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(SAVED_ACK_TTL_SECS)).await;
            let expired = {
                let mut inner = state.lock();
                if inner.saved_generation == generation {
                    inner.snapshot.saved = false;
                    true
                } else {
                    false
                }
            };
            if expired {
                let _ = state.tx.send(ReplyUpdate::Saved(false));
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReplyInner> {
        // A poisoned lock only means a writer panicked; the data is still a
        // valid snapshot.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
