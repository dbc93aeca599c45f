//! Online/offline and connection-lifecycle observation.
//!
//! The monitor watches two independent signals: a runtime online/offline
//! flag and the persistent connection's open/close events. Transitions to
//! online (or a re-opened connection) trigger resynchronization of any
//! collection that is not already `Synced`. No debounce or backoff is
//! applied, so rapid flapping can trigger repeated sync attempts — a
//! known simplification.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::session::Session;

/// Lifecycle events of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
}

/// Background task feeding connectivity transitions into the session.
pub struct ConnectivityMonitor {
    task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    /// Spawn the monitor. It runs until both signal sources are dropped
    /// or [`shutdown`](Self::shutdown) is called.
    pub fn spawn(
        session: Arc<Session>,
        mut online: watch::Receiver<bool>,
        mut connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let is_online = *online.borrow_and_update();
                        if is_online {
                            tracing::info!("Runtime online; resynchronizing");
                            session.resync_if_stale().await;
                        } else {
                            tracing::info!("Runtime offline");
                        }
                    }
                    event = connection_events.recv() => {
                        match event {
                            Some(ConnectionEvent::Opened) => {
                                tracing::info!("Persistent connection opened");
                                session.connection_opened().await;
                            }
                            Some(ConnectionEvent::Closed) => {
                                tracing::warn!("Persistent connection closed");
                                session.connection_closed().await;
                            }
                            None => break,
                        }
                    }
                }
            }
            tracing::debug!("Connectivity monitor stopped");
        });
        Self { task }
    }

    /// Stop observing. Pending resyncs are not interrupted elsewhere.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
