//! # Protocol Layer
//!
//! Server packet construction, per-packet-type client handlers, and the
//! login handshake. Built on the [`crate::core`] codec and mutating
//! [`crate::session`] state.

pub mod builders;
pub mod handlers;
pub mod login;

#[cfg(test)]
mod tests;
