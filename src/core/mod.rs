//! # Core Protocol Components
//!
//! Low-level packet handling: the binary cursor, the packet type
//! registries, wire composite types, and both codec directions.
//!
//! ## Wire Format
//! ```text
//! [TypeId(2, LE)] [Pad(1)] [Length(4, LE)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Payload length is validated against the remaining buffer before any
//!   slicing (truncated input is an error, never a zero-fill)
//! - A 1MB per-packet ceiling prevents memory exhaustion from hostile
//!   length fields

pub mod codec;
pub mod cursor;
pub mod packet;
pub mod types;
pub mod writer;
