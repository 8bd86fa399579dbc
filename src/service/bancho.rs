//! # Request-Cycle Service
//!
//! The seam an HTTP layer calls once per client request: a request without a
//! session token runs the login handshake; a request with one resolves the
//! player, feeds the body through the packet codec and handlers, and drains
//! the player's outbound queue into the response body.

use bytes::Bytes;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::BanchoConfig;
use crate::core::codec::PacketReader;
use crate::error::Result;
use crate::protocol::builders;
use crate::protocol::handlers::{handle_packet, HandlerContext};
use crate::protocol::login::login;
use crate::session::channel::ChannelMap;
use crate::session::player::{Player, PlayerOptions};
use crate::session::privileges::Privileges;
use crate::session::registry::SessionRegistry;
use crate::storage::AccountStore;

/// What the transport sends back: an optional token for the response header
/// (present on login cycles) and the response body packet stream.
#[derive(Debug, Clone)]
pub struct RequestResponse {
    pub token: Option<String>,
    pub body: Bytes,
}

/// The assembled session server: owns the registry, channel directory and
/// resident bot, and borrows the account store.
pub struct BanchoService {
    config: BanchoConfig,
    registry: SessionRegistry,
    channels: ChannelMap,
    store: Arc<dyn AccountStore>,
}

impl BanchoService {
    /// Build the service, validate the configuration, and register the
    /// resident bot session.
    pub fn new(config: BanchoConfig, store: Arc<dyn AccountStore>) -> Result<Self> {
        config.validate_strict()?;

        let service = Self {
            config,
            registry: SessionRegistry::new(),
            channels: ChannelMap::with_defaults(),
            store,
        };
        service.register_bot();
        Ok(service)
    }

    fn register_bot(&self) {
        let bot = Arc::new(Player::new(
            self.config.bot_id,
            self.config.bot_name.clone(),
            Privileges::UNRESTRICTED,
            PlayerOptions {
                token: Some(Player::generate_token()),
                bot_client: true,
                ..PlayerOptions::default()
            },
        ));
        self.registry.add(bot);
        info!(bot = %self.config.bot_name, id = self.config.bot_id, "bot session registered");
    }

    pub fn config(&self) -> &BanchoConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    /// Handle one client request.
    ///
    /// `token` is the session token header when present; `ip` is the client
    /// address extracted by the transport.
    pub fn handle_request(
        &self,
        token: Option<&str>,
        body: Bytes,
        ip: IpAddr,
    ) -> Result<RequestResponse> {
        let Some(token) = token else {
            // No token: the client is performing a login
            let response = login(
                &body,
                ip,
                self.store.as_ref(),
                &self.registry,
                &self.channels,
                &self.config,
            )?;
            return Ok(RequestResponse {
                token: Some(response.token),
                body: response.body,
            });
        };

        let Some(player) = self.registry.get_by_token(token) else {
            // Unknown token, most likely a server restart: ask the client to
            // reconnect.
            debug!("request with unknown token, sending restart");
            let mut body = bytes::BytesMut::new();
            use bytes::BufMut;
            body.put_slice(&builders::notification("Server has restarted."));
            body.put_slice(&builders::server_restarted(0));
            return Ok(RequestResponse {
                token: None,
                body: body.freeze(),
            });
        };

        player.touch();

        let ctx = HandlerContext {
            registry: &self.registry,
            channels: &self.channels,
            store: self.store.as_ref(),
            config: &self.config,
        };

        for item in PacketReader::new(body) {
            match item {
                Ok(packet) => handle_packet(&player, packet, &ctx)?,
                Err(e) => {
                    // Fatal for this request only; the remainder was discarded
                    warn!(player = %player.name, error = %e, "malformed packet stream");
                    break;
                }
            }
        }

        Ok(RequestResponse {
            token: None,
            body: player.dequeue().unwrap_or_default(),
        })
    }
}
