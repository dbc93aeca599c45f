//! Concrete transports: the REST client and the persistent socket.

pub mod rest;
pub mod socket;

pub use rest::RestClient;
pub use socket::{SocketClient, SocketEvents};
