//! Client-side synchronization and collaborative-editing core.
//!
//! This crate keeps a local cache of server-owned entities (projects,
//! storyboard shots) consistent under concurrent multi-user edits:
//!
//! - [`EntityCache`] — keyed in-memory store with whole-entity replacement.
//! - [`SyncStatus`] — per-collection load state machine with request
//!   coalescing.
//! - [`ProjectStore`] / [`ShotStore`] — optimistic mutation engines with
//!   rollback-by-reload on remote failure.
//! - [`LockCoordinator`] — per-entity exclusive edit locks negotiated over
//!   the persistent connection.
//! - [`ConnectivityMonitor`] — online/offline and connection lifecycle
//!   observer that triggers resynchronization.
//! - [`Session`] — the service object wiring the pieces together and
//!   dispatching inbound pushes.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod locks;
pub mod persistence;
pub mod projects;
pub mod session;
pub mod shots;
pub mod status;
pub mod transport;

pub use api::{CreateProject, CreateShot, ProjectApi, ShotApi};
pub use cache::{CachedEntity, EntityCache};
pub use config::ClientConfig;
pub use connectivity::{ConnectionEvent, ConnectivityMonitor};
pub use locks::{LockCoordinator, LockTransport};
pub use persistence::{PersistedState, StateFile, ViewMode};
pub use projects::ProjectStore;
pub use session::Session;
pub use shots::ShotStore;
pub use status::SyncStatus;
