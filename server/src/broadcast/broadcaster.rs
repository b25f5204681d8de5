use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use shared::types::{ChangeAction, ChangeEvent};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::session::{SessionError, SessionId, ViewerSink};

/// Outcome of a single fan-out. Informational only; a broadcast never fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions registered when the broadcast began.
    pub attempted: usize,
    pub delivered: usize,
    /// Sessions that errored or timed out. All of them have been evicted.
    pub failed: usize,
}

/// Resolves once its session has left the active set, whether through
/// `unregister`, eviction after a failed send, or `shutdown`.
pub type Removal = oneshot::Receiver<()>;

struct Session {
    sink: Arc<dyn ViewerSink>,
    // Dropped with the map entry, which resolves the session's `Removal`.
    _removed: oneshot::Sender<()>,
}

enum Queued {
    Event(ChangeEvent),
    Flush(oneshot::Sender<()>),
}

/// Live change feed: the set of connected viewers and the fan-out to them.
///
/// Membership changes take the write lock; a broadcast takes the read lock
/// just long enough to snapshot the set, so viewers connecting mid-broadcast
/// are neither blocked nor sent the in-flight event.
///
/// Broadcasts are serialized by `dispatch`, which is held until every send of
/// the current event has finished or timed out. Two events broadcast one
/// after the other therefore reach each viewer in that order.
///
/// Events handed to [`Broadcaster::notify`] go through a queue owned by a
/// single delivery task, so a caller that is dropped after notifying cannot
/// lose the event.
pub struct Broadcaster {
    sessions: RwLock<HashMap<SessionId, Session>>,
    dispatch: Mutex<()>,
    queue: mpsc::UnboundedSender<Queued>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("send_timeout", &self.send_timeout)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl Broadcaster {
    /// Build a broadcaster and spawn its delivery task on the current Tokio
    /// runtime. The task exits once the last handle is dropped.
    pub fn start(send_timeout: Duration) -> Arc<Self> {
        let (queue, pending) = mpsc::unbounded_channel();
        let broadcaster = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            dispatch: Mutex::new(()),
            queue,
            next_id: AtomicU64::new(1),
            send_timeout,
        });
        tokio::spawn(deliver_queued(Arc::downgrade(&broadcaster), pending));
        broadcaster
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Add a freshly accepted viewer. It receives every event whose broadcast
    /// starts after this returns.
    pub async fn register(&self, sink: Arc<dyn ViewerSink>) -> SessionId {
        self.register_with_removal(sink).await.0
    }

    /// [`Broadcaster::register`], plus a [`Removal`] the connection task can
    /// wait on to learn that the broadcaster dropped it.
    pub async fn register_with_removal(
        &self,
        sink: Arc<dyn ViewerSink>,
    ) -> (SessionId, Removal) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (removed, removal) = oneshot::channel();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            Session {
                sink,
                _removed: removed,
            },
        );
        info!("Viewer {} registered ({} connected)", id, sessions.len());
        (id, removal)
    }

    /// Remove a viewer. Safe to call for unknown or already removed ids.
    /// Returns whether the viewer was still registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id).is_some();
        if removed {
            info!("Viewer {} unregistered ({} connected)", id, sessions.len());
        } else {
            debug!("Viewer {} was not registered", id);
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Hook for the command layer; call only after the mutation committed.
    ///
    /// Queues the event and returns immediately. Queued events are broadcast
    /// one at a time in the order they were notified.
    pub fn notify(&self, event: ChangeEvent) {
        if let Err(mpsc::error::SendError(Queued::Event(event))) =
            self.queue.send(Queued::Event(event))
        {
            error!(
                "Delivery task is gone, dropping {} event for '{}'",
                event.action(),
                event.subject_name()
            );
        }
    }

    /// Wait until every event notified before this call has been broadcast.
    pub async fn flush(&self) {
        let (done, flushed) = oneshot::channel();
        if self.queue.send(Queued::Flush(done)).is_ok() {
            let _ = flushed.await;
        }
    }

    /// Deliver `event` to every viewer registered when the call begins.
    pub async fn broadcast(&self, event: &ChangeEvent) -> BroadcastReport {
        let wire = match event.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                error!(
                    "Dropping {} event for '{}': failed to serialize: {}",
                    event.action(),
                    event.subject_name(),
                    e
                );
                return BroadcastReport::default();
            }
        };

        self.broadcast_text(event.action(), event.subject_name(), &wire)
            .await
    }

    async fn broadcast_text(
        &self,
        action: ChangeAction,
        subject: &str,
        wire: &str,
    ) -> BroadcastReport {
        let _dispatch = self.dispatch.lock().await;

        let targets: Vec<(SessionId, Arc<dyn ViewerSink>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (*id, Arc::clone(&session.sink)))
            .collect();

        if targets.is_empty() {
            debug!("No viewers connected, dropping {} event for '{}'", action, subject);
            return BroadcastReport::default();
        }

        let send_timeout = self.send_timeout;
        let outcomes = join_all(targets.iter().map(|(id, sink)| async move {
            let outcome = match timeout(send_timeout, sink.send_text(wire)).await {
                Ok(result) => result,
                Err(_) => Err(SessionError::TimedOut(send_timeout)),
            };
            (*id, outcome)
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: targets.len(),
            ..BroadcastReport::default()
        };
        let mut failed = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Delivery of {} event to {} failed: {}", action, id, e);
                    failed.push(id);
                }
            }
        }
        report.failed = failed.len();

        for id in failed {
            self.evict(id).await;
        }

        info!(
            "Broadcast {} event for '{}' to {}/{} viewers",
            action, subject, report.delivered, report.attempted
        );
        report
    }

    /// Unregister and close a viewer whose send failed.
    async fn evict(&self, id: SessionId) {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(session) = removed {
            info!("Evicted viewer {}", id);
            if timeout(self.send_timeout, session.sink.close()).await.is_err() {
                debug!("Close of evicted viewer {} timed out", id);
            }
        }
    }

    /// Deliver everything already queued, then unregister and close every
    /// viewer.
    pub async fn shutdown(&self) {
        self.flush().await;

        let drained: Vec<(SessionId, Session)> = self.sessions.write().await.drain().collect();

        info!("Closing {} viewer connections", drained.len());

        let send_timeout = self.send_timeout;
        join_all(drained.iter().map(|(id, session)| async move {
            if timeout(send_timeout, session.sink.close()).await.is_err() {
                debug!("Close of viewer {} timed out", id);
            }
        }))
        .await;
    }
}

async fn deliver_queued(
    broadcaster: Weak<Broadcaster>,
    mut pending: mpsc::UnboundedReceiver<Queued>,
) {
    while let Some(queued) = pending.recv().await {
        let Some(broadcaster) = broadcaster.upgrade() else {
            break;
        };
        match queued {
            Queued::Event(event) => {
                broadcaster.broadcast(&event).await;
            }
            Queued::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Notification queue closed");
}
