//! # Login Handshake
//!
//! A stateless transform: raw POST body + request metadata → either a
//! rejection (sentinel user-id packet, sentinel token) or a freshly
//! constructed player registered into the session registry, paired with the
//! initial response byte stream.
//!
//! ## Request Format
//! ```text
//! username\npassword_md5\nversion|utc_offset|display_city|client_hashes|pm_private\n
//! ```
//! where `client_hashes` is `path:adapters:adapters_md5:uninstall_md5:disk_md5:`.
//!
//! Validation short-circuits on the first failure; every failure is answered
//! with a well-formed packet stream, never a transport error.

use bytes::{BufMut, Bytes, BytesMut};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{BanchoConfig, PROTOCOL_VERSION, REJECTION_TOKEN};
use crate::error::{constants, Result};
use crate::protocol::builders;
use crate::session::channel::ChannelMap;
use crate::session::player::{
    make_safe_name, Clan, ClientDetails, ClientHashes, ClientVersion, Player, PlayerOptions,
    ReleaseStream, VersionDate,
};
use crate::session::registry::SessionRegistry;
use crate::storage::AccountStore;
use crate::utils::time::unix_time;

/// Adapter string reported by clients running under a compatibility layer;
/// such clients legitimately have no adapter list.
const WINE_ADAPTERS: &str = "runningunderwine";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^b(\d{8})(?:\.(\d))?(beta|cuttingedge|dev|tourney)?$")
        .expect("version pattern compiles")
});

/// Login rejection reasons with their wire sentinel codes.
///
/// Several codes exist in the protocol without a trigger in this core
/// (old client, banned, needs-supporter, password-reset, verification);
/// they are constructable and encodable all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    MalformedRequest,
    InvalidVersion,
    EmptyAdapters,
    AlreadyLoggedIn,
    AuthenticationFailed,
    OldClient,
    Banned,
    BannedAlt,
    ServerError,
    NeedsSupporter,
    PasswordReset,
    RequiresVerification,
}

impl LoginFailure {
    /// Sentinel carried in the user-id packet.
    pub fn code(self) -> i32 {
        match self {
            LoginFailure::AuthenticationFailed
            | LoginFailure::EmptyAdapters
            | LoginFailure::AlreadyLoggedIn => -1,
            LoginFailure::OldClient => -2,
            LoginFailure::Banned => -3,
            LoginFailure::BannedAlt => -4,
            LoginFailure::MalformedRequest
            | LoginFailure::InvalidVersion
            | LoginFailure::ServerError => -5,
            LoginFailure::NeedsSupporter => -6,
            LoginFailure::PasswordReset => -7,
            LoginFailure::RequiresVerification => -8,
        }
    }

    /// User-facing notification bundled with the rejection, where one helps.
    pub fn message(self) -> Option<&'static str> {
        match self {
            LoginFailure::MalformedRequest => Some("Malformed login request."),
            LoginFailure::InvalidVersion => Some("Invalid client version."),
            LoginFailure::EmptyAdapters => Some("Please restart your client and try again."),
            LoginFailure::AlreadyLoggedIn => Some("User already logged in."),
            LoginFailure::OldClient => Some("Please update your client to log in."),
            LoginFailure::PasswordReset => Some("Your password has been reset."),
            _ => None,
        }
    }

    /// Encode the rejection as a complete response stream.
    pub fn response(self) -> LoginResponse {
        let mut body = BytesMut::new();
        body.put_slice(&builders::user_id(self.code()));
        if let Some(message) = self.message() {
            body.put_slice(&builders::notification(message));
        }

        LoginResponse {
            token: REJECTION_TOKEN.to_string(),
            body: body.freeze(),
        }
    }
}

/// Parsed client info line.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub version_str: String,
    pub utc_offset: i8,
    pub display_city: bool,
    pub hashes: ClientHashes,
    pub adapters: Vec<String>,
    pub running_under_wine: bool,
    pub pm_private: bool,
}

/// Parsed login request body.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password_md5: String,
    pub client_info: ClientInfo,
}

/// The handshake result handed back to the transport: the token goes into
/// the response header, the body is the packet stream.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub body: Bytes,
}

impl LoginResponse {
    /// Whether this response carries a usable session.
    pub fn is_success(&self) -> bool {
        self.token != REJECTION_TOKEN
    }
}

/// Parse the three-line login body. `None` means a malformed request.
pub fn parse_login_body(body: &[u8]) -> Option<LoginRequest> {
    let text = std::str::from_utf8(body).ok()?;
    let mut lines = text.split('\n');

    let username = lines.next()?.trim_end_matches('\r').to_string();
    let password_md5 = lines.next()?.trim_end_matches('\r').to_string();
    let info_line = lines.next()?.trim_end_matches('\r');

    if username.is_empty() || password_md5.is_empty() {
        return None;
    }

    let mut fields = info_line.split('|');
    let version_str = fields.next()?.to_string();
    let utc_offset: i8 = fields.next()?.parse().ok()?;
    let display_city = fields.next()? == "1";
    let hash_block = fields.next()?;
    let pm_private = fields.next()? == "1";

    let mut hashes = hash_block.split(':');
    let path_md5 = hashes.next()?.to_string();
    let adapters_raw = hashes.next()?;
    let adapters_md5 = hashes.next()?.to_string();
    let uninstall_md5 = hashes.next()?.to_string();
    let disk_signature_md5 = hashes.next()?.to_string();

    let running_under_wine = adapters_raw == WINE_ADAPTERS;
    let adapters = if running_under_wine {
        Vec::new()
    } else {
        adapters_raw
            .split('.')
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect()
    };

    Some(LoginRequest {
        username,
        password_md5,
        client_info: ClientInfo {
            version_str,
            utc_offset,
            display_city,
            hashes: ClientHashes {
                path_md5,
                adapters_md5,
                uninstall_md5,
                disk_signature_md5,
            },
            adapters,
            running_under_wine,
            pm_private,
        },
    })
}

/// Parse a client version string: literal `b`, 8-digit date, optional `.`
/// plus revision digit, optional release-stream suffix.
pub fn parse_client_version(version: &str) -> Option<ClientVersion> {
    let captures = VERSION_PATTERN.captures(version)?;

    let digits = captures.get(1)?.as_str();
    let year: u16 = digits[0..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let revision = match captures.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };

    let stream = match captures.get(3) {
        Some(m) => ReleaseStream::from_suffix(m.as_str())?,
        None => ReleaseStream::Stable,
    };

    Some(ClientVersion {
        date: VersionDate { year, month, day },
        revision,
        stream,
    })
}

/// Run the full handshake for one unauthenticated request.
///
/// Returns `Err` only for storage connectivity failures; every protocol
/// outcome, rejections included, is an `Ok` response.
pub fn login(
    body: &[u8],
    ip: IpAddr,
    store: &dyn AccountStore,
    registry: &SessionRegistry,
    channels: &ChannelMap,
    config: &BanchoConfig,
) -> Result<LoginResponse> {
    // 1. parse + version check, before touching any collaborator
    let Some(request) = parse_login_body(body) else {
        debug!("rejected login: malformed body");
        return Ok(LoginFailure::MalformedRequest.response());
    };

    let Some(version) = parse_client_version(&request.client_info.version_str) else {
        debug!(version = %request.client_info.version_str, "rejected login: bad version");
        return Ok(LoginFailure::InvalidVersion.response());
    };

    // 2. hardware fingerprint sanity
    if request.client_info.adapters.is_empty() && !request.client_info.running_under_wine {
        debug!(user = %request.username, "rejected login: empty adapters");
        return Ok(LoginFailure::EmptyAdapters.response());
    }

    // 3. duplicate session policy; tournament clients may run in parallel
    if let Some(existing) = registry.get_by_name(&request.username) {
        if version.stream != ReleaseStream::Tourney {
            let idle = unix_time().saturating_sub(existing.last_received_time());
            if idle < config.relogin_grace.as_secs() {
                debug!(user = %request.username, idle, "rejected login: already logged in");
                return Ok(LoginFailure::AlreadyLoggedIn.response());
            }

            warn!(user = %existing.name, idle, "{}", constants::DIAG_STALE_SESSION);
            existing.logout(registry, channels);
        }
    }

    // 4. account resolution
    let safe_name = make_safe_name(&request.username);
    let Some(account) = store.find_by_normalized_name(&safe_name)? else {
        debug!(user = %request.username, "rejected login: unknown account");
        return Ok(LoginFailure::AuthenticationFailed.response());
    };

    let stats = store.load_stats(account.id)?;

    let token = Player::generate_token();
    let now = unix_time();

    let player = Arc::new(Player::new(
        account.id,
        account.name.clone(),
        account.privileges,
        PlayerOptions {
            token: Some(token.clone()),
            clan: account
                .clan_id
                .zip(account.clan_tag.clone())
                .map(|(id, tag)| Clan { id, tag }),
            utc_offset: request.client_info.utc_offset,
            pm_private: request.client_info.pm_private,
            silence_end: account.silence_end,
            donor_end: account.donor_end,
            tournament_client: version.stream == ReleaseStream::Tourney,
            client_details: Some(ClientDetails {
                version,
                hashes: request.client_info.hashes.clone(),
                adapters: request.client_info.adapters.clone(),
                running_under_wine: request.client_info.running_under_wine,
                ip,
            }),
            login_time: now,
            ..PlayerOptions::default()
        },
    ));
    player.replace_stats(stats);

    let mut response = BytesMut::new();
    response.put_slice(&builders::protocol_version(PROTOCOL_VERSION));
    response.put_slice(&builders::user_id(player.id));
    response.put_slice(&builders::bancho_privileges(player.client_privileges()));
    response.put_slice(&builders::notification(&config.welcome_message));

    if !config.menu_icon_url.is_empty() {
        response.put_slice(&builders::main_menu_icon(
            &config.menu_icon_url,
            &config.menu_onclick_url,
        ));
    }

    for channel in channels.auto_join() {
        channel.join(player.id);
        player.note_channel_joined(&channel.name);
        response.put_slice(&builders::channel_join_success(&channel.name));
    }
    for channel in channels.all() {
        response.put_slice(&builders::channel_info(
            &channel.name,
            &channel.topic,
            channel.member_count() as u16,
        ));
    }
    response.put_slice(&builders::channel_info_end());

    if player.is_silenced() {
        response.put_slice(&builders::silence_end(player.remaining_silence() as i32));
    }

    response.put_slice(&builders::friends_list(
        &player.friends().into_iter().collect::<Vec<_>>(),
    ));

    response.put_slice(&builders::user_presence(&player));
    response.put_slice(&builders::user_stats(&player));

    if player.is_restricted() {
        response.put_slice(&builders::account_restricted());
        response.put_slice(&builders::notification(
            "Your account is currently restricted.",
        ));
    } else {
        let mut announcement = BytesMut::new();
        announcement.put_slice(&builders::user_presence(&player));
        announcement.put_slice(&builders::user_stats(&player));
        registry.broadcast(&announcement, &[player.id]);
    }

    // presence of everyone already online, bot sessions included
    for other in registry.snapshot() {
        if other.bot_client {
            response.put_slice(&builders::bot_presence(&other));
            response.put_slice(&builders::bot_stats(&other));
        } else {
            response.put_slice(&builders::user_presence(&other));
            response.put_slice(&builders::user_stats(&other));
        }
    }

    registry.add(player.clone());

    info!(user = %player.name, id = player.id, %ip, "login complete");

    Ok(LoginResponse {
        token,
        body: response.freeze(),
    })
}
