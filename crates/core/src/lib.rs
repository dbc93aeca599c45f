//! Callsheet domain types shared by the sync layer and any future tooling.
//!
//! This crate has zero internal dependencies so that the sync engine,
//! transport implementations, and tests can all reference the same entity
//! types, error taxonomy, and collaboration wire protocol.

pub mod collaboration;
pub mod error;
pub mod project;
pub mod shot;
pub mod types;

pub use collaboration::{ClientMessage, EditLock, ServerMessage};
pub use error::SyncError;
pub use project::{Project, ProjectPatch};
pub use shot::{Shot, ShotPatch};
