//! # Error Types
//!
//! Comprehensive error handling for the bancho protocol core.
//!
//! This module defines all error variants that can occur while decoding
//! client packets, mutating session state, or talking to the account store.
//!
//! ## Error Categories
//! - **Decode Errors**: truncated or malformed binary input; fatal for the
//!   current request only, the remainder of the body is discarded
//! - **Storage Errors**: account store connectivity failures (propagated,
//!   never retried inside the core)
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! Registry consistency problems (double-add, remove-when-absent) are *not*
//! errors: they are idempotent no-ops logged with the diagnostics below.
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Diagnostic message constants to reduce allocations in logging paths.
/// Static strings are borrowed, avoiding heap allocations for common cases.
pub mod constants {
    /// Registry consistency diagnostics (logged, never fatal)
    pub const DIAG_DOUBLE_ADD: &str = "player added to session registry while already present";
    pub const DIAG_REMOVE_ABSENT: &str = "player removed from session registry while not present";

    /// Decode diagnostics
    pub const DIAG_UNKNOWN_PACKET: &str = "unknown client packet id, payload skipped";

    /// Login diagnostics
    pub const DIAG_STALE_SESSION: &str = "stale session force-logged-out during re-login";
}

/// Primary error type for all protocol and session operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated packet: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid UTF-8 in string field: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("invalid field value: {0}")]
    InvalidField(&'static str),

    #[error("account storage unavailable: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
