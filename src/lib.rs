//! # bancho-protocol
//!
//! Bancho-style game server core: the binary packet codec and the in-memory
//! player-session model it serializes against.
//!
//! The client speaks its binary protocol over HTTP: packets arrive as POST
//! bodies and the server replies with packet streams that drive client-side
//! UI (login result, chat, presence, stats, multiplayer state). This crate
//! implements the protocol transport and session state machine; HTTP
//! routing, SQL storage and asset serving stay outside, behind the
//! [`storage::AccountStore`] boundary and the [`service::BanchoService`]
//! request seam.
//!
//! ## Components
//! - **[`core`]**: binary cursor, packet type registries, wire composites,
//!   and both codec directions
//! - **[`session`]**: player entity and state machine, session registry,
//!   channels, privileges, per-mode stats
//! - **[`protocol`]**: server packet builders, per-packet client handlers,
//!   login handshake
//! - **[`service`]**: the per-request entry point a transport layer calls
//! - **[`storage`]**: the synchronous account-store collaborator boundary
//!
//! ## Wire Format
//! ```text
//! [TypeId(2, LE)] [Pad(1)] [PayloadLength(4, LE)] [Payload(N)]
//! ```
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use bancho_protocol::config::BanchoConfig;
//! use bancho_protocol::service::BanchoService;
//! use bancho_protocol::storage::MemoryAccountStore;
//!
//! let store = Arc::new(MemoryAccountStore::new());
//! let service = BanchoService::new(BanchoConfig::default(), store)
//!     .expect("default config is valid");
//!
//! // a request without a token runs the login handshake
//! let response = service
//!     .handle_request(
//!         None,
//!         bytes::Bytes::from_static(b"who\nhash\nb20230101|0|0|p:a:b:c:d:|0\n"),
//!         std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
//!     )
//!     .expect("login produces a response");
//! assert!(response.token.is_some());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod session;
pub mod storage;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use service::{BanchoService, RequestResponse};
pub use session::{Player, SessionRegistry};
