//! # Service Layer
//!
//! High-level facade over the codec, session state and handlers: one call
//! per client request, routed between the login handshake and authenticated
//! packet processing.

pub mod bancho;

pub use bancho::{BanchoService, RequestResponse};
