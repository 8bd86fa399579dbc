//! # Player Sessions
//!
//! The authoritative mutable record of one connected session: identity,
//! privileges, live status, relationships (spectating, channels, match),
//! moderation state and the outbound byte queue.
//!
//! ## Concurrency
//! Each player's mutable fields sit behind their own short-lived locks, so
//! interleaved requests for the same session cannot corrupt the record.
//! Cross-player relationships (spectator ↔ spectating) are stored by stable
//! numeric id and resolved through the session registry, never as direct
//! references, which keeps the object graph acyclic.
//!
//! ## Lifecycle
//! ```text
//! unauthenticated → (handshake) → online → (logout | restriction | timeout) → removed
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::builders;
use crate::session::channel::ChannelMap;
use crate::session::privileges::{ClientPrivileges, Privileges};
use crate::session::registry::SessionRegistry;
use crate::session::stats::{GameMode, ModeData, Mods};
use crate::storage::{AccountStore, AuditEntry};
use crate::utils::time::unix_time;

/// Normalize a display name for case/format-insensitive lookup:
/// lowercased, spaces replaced with underscores.
pub fn make_safe_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// The client's current in-game action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Action {
    #[default]
    Idle = 0,
    Afk = 1,
    Playing = 2,
    Editing = 3,
    Modding = 4,
    Multiplayer = 5,
    Watching = 6,
    Unknown = 7,
    Testing = 8,
    Submitting = 9,
    Paused = 10,
    Lobby = 11,
    Multiplaying = 12,
    OsuDirect = 13,
}

impl Action {
    pub fn from_u8(value: u8) -> Option<Self> {
        use Action::*;

        Some(match value {
            0 => Idle,
            1 => Afk,
            2 => Playing,
            3 => Editing,
            4 => Modding,
            5 => Multiplayer,
            6 => Watching,
            7 => Unknown,
            8 => Testing,
            9 => Submitting,
            10 => Paused,
            11 => Lobby,
            12 => Multiplaying,
            13 => OsuDirect,
            _ => return None,
        })
    }
}

/// Client-side filter for which users' presence the player receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceFilter {
    #[default]
    Nil = 0,
    All = 1,
    Friends = 2,
}

impl PresenceFilter {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => PresenceFilter::Nil,
            1 => PresenceFilter::All,
            2 => PresenceFilter::Friends,
            _ => return None,
        })
    }
}

/// Current user status, mutated only by the owning session's own packets.
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub action: Action,
    pub action_info: String,
    pub map_md5: String,
    pub mods: Mods,
    pub mode: GameMode,
    pub map_id: i32,
}

/// Named release stream carried in the client version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseStream {
    #[default]
    Stable,
    Beta,
    CuttingEdge,
    Tourney,
    Dev,
}

impl ReleaseStream {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "beta" => ReleaseStream::Beta,
            "cuttingedge" => ReleaseStream::CuttingEdge,
            "tourney" => ReleaseStream::Tourney,
            "dev" => ReleaseStream::Dev,
            _ => return None,
        })
    }
}

/// Release date encoded in the client version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// Parsed client version: `b` + 8-digit date + optional revision + optional
/// stream suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientVersion {
    pub date: VersionDate,
    pub revision: Option<u8>,
    pub stream: ReleaseStream,
}

/// The `:`-delimited client hash block sent at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHashes {
    pub path_md5: String,
    pub adapters_md5: String,
    pub uninstall_md5: String,
    pub disk_signature_md5: String,
}

/// Everything the client reports about itself during the handshake.
#[derive(Debug, Clone)]
pub struct ClientDetails {
    pub version: ClientVersion,
    pub hashes: ClientHashes,
    pub adapters: Vec<String>,
    pub running_under_wine: bool,
    pub ip: IpAddr,
}

/// Clan affiliation, used for the tag prefix on the full display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clan {
    pub id: i32,
    pub tag: String,
}

/// Reported location, broadcast as part of presence.
#[derive(Debug, Clone)]
pub struct Geolocation {
    pub latitude: f32,
    pub longitude: f32,
    pub country_code: u8,
    pub country_acronym: String,
}

impl Default for Geolocation {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            country_code: 0,
            country_acronym: "xx".to_string(),
        }
    }
}

/// Optional construction parameters for [`Player::new`].
///
/// Every field has a documented default, replacing the untyped extras bag a
/// session record tends to accrete.
#[derive(Debug, Clone, Default)]
pub struct PlayerOptions {
    /// Session token. `None` constructs the player offline (empty token).
    pub token: Option<String>,
    /// Clan affiliation. Default: none.
    pub clan: Option<Clan>,
    /// Reported location. Default: null island, country "xx".
    pub geolocation: Geolocation,
    /// Client UTC offset in hours. Default: 0.
    pub utc_offset: i8,
    /// Block private messages from non-friends. Default: false.
    pub pm_private: bool,
    /// UNIX timestamp the player's silence ends at. Default: 0 (not silenced).
    pub silence_end: u64,
    /// UNIX timestamp the player's donor perks end at. Default: 0.
    pub donor_end: u64,
    /// Bot/system account: outbound writes are discarded. Default: false.
    pub bot_client: bool,
    /// Tournament client: exempt from the duplicate-login check. Default: false.
    pub tournament_client: bool,
    /// Client fingerprint from the handshake. Default: none.
    pub client_details: Option<ClientDetails>,
    /// UNIX timestamp of login. Default: 0 (set by the handshake).
    pub login_time: u64,
}

/// Server-side representation of one player session.
pub struct Player {
    pub id: i32,
    pub name: String,
    /// Always equals `make_safe_name(name)`.
    pub safe_name: String,

    pub clan: Option<Clan>,
    pub geolocation: Geolocation,
    pub utc_offset: i8,
    pub bot_client: bool,
    pub tournament_client: bool,
    pub client_details: Option<ClientDetails>,
    pub login_time: u64,
    pub donor_end: u64,

    token: RwLock<String>,
    privileges: RwLock<Privileges>,
    /// Memoized client-facing projection; cleared at every privilege
    /// mutation site.
    client_privileges: Mutex<Option<ClientPrivileges>>,

    status: Mutex<Status>,
    stats: RwLock<HashMap<GameMode, ModeData>>,

    channels: Mutex<Vec<String>>,
    spectators: Mutex<Vec<i32>>,
    spectating: Mutex<Option<i32>>,
    match_id: Mutex<Option<i16>>,
    friends: Mutex<HashSet<i32>>,
    blocks: Mutex<HashSet<i32>>,

    away_message: Mutex<Option<String>>,
    presence_filter: Mutex<PresenceFilter>,
    pm_private: AtomicBool,
    in_lobby: AtomicBool,
    silence_end: AtomicU64,
    last_received_time: AtomicU64,

    queue: Mutex<BytesMut>,
}

impl Player {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        privileges: Privileges,
        options: PlayerOptions,
    ) -> Self {
        let name = name.into();
        let safe_name = make_safe_name(&name);

        Self {
            id,
            name,
            safe_name,
            clan: options.clan,
            geolocation: options.geolocation,
            utc_offset: options.utc_offset,
            bot_client: options.bot_client,
            tournament_client: options.tournament_client,
            client_details: options.client_details,
            login_time: options.login_time,
            donor_end: options.donor_end,
            token: RwLock::new(options.token.unwrap_or_default()),
            privileges: RwLock::new(privileges),
            client_privileges: Mutex::new(None),
            status: Mutex::new(Status::default()),
            stats: RwLock::new(HashMap::new()),
            channels: Mutex::new(Vec::new()),
            spectators: Mutex::new(Vec::new()),
            spectating: Mutex::new(None),
            match_id: Mutex::new(None),
            friends: Mutex::new(HashSet::new()),
            blocks: Mutex::new(HashSet::new()),
            away_message: Mutex::new(None),
            presence_filter: Mutex::new(PresenceFilter::default()),
            pm_private: AtomicBool::new(options.pm_private),
            in_lobby: AtomicBool::new(false),
            silence_end: AtomicU64::new(options.silence_end),
            last_received_time: AtomicU64::new(options.login_time),
            queue: Mutex::new(BytesMut::new()),
        }
    }

    /// Generate a fresh session token.
    pub fn generate_token() -> String {
        Uuid::new_v4().to_string()
    }

    // --- identity & connectivity ---

    pub fn token(&self) -> String {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write() = token;
    }

    /// A player is online exactly while they hold a non-empty token.
    pub fn is_online(&self) -> bool {
        !self.token.read().is_empty()
    }

    /// Profile URL.
    pub fn url(&self, domain: &str) -> String {
        format!("https://{domain}/u/{}", self.id)
    }

    /// Avatar URL.
    pub fn avatar_url(&self, domain: &str) -> String {
        format!("https://a.{domain}/{}", self.id)
    }

    /// Chat embed for this player's profile.
    pub fn embed(&self, domain: &str) -> String {
        format!("[{} {}]", self.url(domain), self.name)
    }

    /// Display name with the clan tag prefix.
    pub fn full_name(&self) -> String {
        match &self.clan {
            Some(clan) => format!("[{}] {}", clan.tag, self.name),
            None => self.name.clone(),
        }
    }

    // --- privileges ---

    pub fn privileges(&self) -> Privileges {
        *self.privileges.read()
    }

    /// The client-facing privilege projection, memoized until the next
    /// privilege mutation.
    pub fn client_privileges(&self) -> ClientPrivileges {
        let mut cached = self.client_privileges.lock();
        match *cached {
            Some(value) => value,
            None => {
                let value = ClientPrivileges::from(self.privileges());
                *cached = Some(value);
                value
            }
        }
    }

    fn invalidate_client_privileges(&self) {
        *self.client_privileges.lock() = None;
    }

    /// A player is restricted exactly while the unrestricted bit is absent.
    pub fn is_restricted(&self) -> bool {
        !self.privileges().intersects(Privileges::UNRESTRICTED)
    }

    /// Replace the privilege bitset, persisting before mutating so a storage
    /// failure leaves the session untouched.
    pub fn update_privileges(&self, store: &dyn AccountStore, new: Privileges) -> Result<()> {
        store.update_privileges(self.id, new)?;
        *self.privileges.write() = new;
        self.invalidate_client_privileges();
        Ok(())
    }

    /// Add bits to the privilege bitset and notify the live session.
    pub fn add_privileges(&self, store: &dyn AccountStore, add: Privileges) -> Result<()> {
        let new = self.privileges() | add;
        store.update_privileges(self.id, new)?;
        *self.privileges.write() = new;
        self.invalidate_client_privileges();

        if self.is_online() {
            self.enqueue(&builders::bancho_privileges(self.client_privileges()));
        }
        Ok(())
    }

    /// Remove bits from the privilege bitset and notify the live session.
    pub fn remove_privileges(&self, store: &dyn AccountStore, remove: Privileges) -> Result<()> {
        let new = self.privileges() & !remove;
        store.update_privileges(self.id, new)?;
        *self.privileges.write() = new;
        self.invalidate_client_privileges();

        if self.is_online() {
            self.enqueue(&builders::bancho_privileges(self.client_privileges()));
        }
        Ok(())
    }

    /// Restrict the player: drop the unrestricted bit, write an audit log
    /// entry, and log the session out if it is online.
    pub fn restrict(
        &self,
        actor_id: i32,
        reason: &str,
        store: &dyn AccountStore,
        registry: &SessionRegistry,
        channels: &ChannelMap,
    ) -> Result<()> {
        self.remove_privileges(store, Privileges::UNRESTRICTED)?;

        store.insert_audit_log(AuditEntry {
            actor_id,
            target_id: self.id,
            action: "restrict".to_string(),
            reason: reason.to_string(),
            timestamp: unix_time(),
        })?;

        warn!(player = %self.name, id = self.id, actor_id, reason, "player restricted");

        if self.is_online() {
            self.logout(registry, channels);
        }
        Ok(())
    }

    // --- moderation ---

    pub fn silence_end(&self) -> u64 {
        self.silence_end.load(Ordering::Acquire)
    }

    pub fn set_silence_end(&self, end: u64) {
        self.silence_end.store(end, Ordering::Release);
    }

    /// Seconds of silence left; 0 when not silenced.
    pub fn remaining_silence(&self) -> u64 {
        self.silence_end().saturating_sub(unix_time())
    }

    pub fn is_silenced(&self) -> bool {
        self.remaining_silence() != 0
    }

    // --- live status ---

    pub fn status(&self) -> Status {
        self.status.lock().clone()
    }

    pub fn set_status(&self, status: Status) {
        *self.status.lock() = status;
    }

    /// The stats record for the mode the player is currently in.
    pub fn gamemode_stats(&self) -> ModeData {
        let mode = self.status.lock().mode;
        self.stats.read().get(&mode).cloned().unwrap_or_default()
    }

    /// Refresh all per-mode stats, e.g. from storage at login.
    pub fn replace_stats(&self, stats: HashMap<GameMode, ModeData>) {
        *self.stats.write() = stats;
    }

    pub fn presence_filter(&self) -> PresenceFilter {
        *self.presence_filter.lock()
    }

    pub fn set_presence_filter(&self, filter: PresenceFilter) {
        *self.presence_filter.lock() = filter;
    }

    pub fn away_message(&self) -> Option<String> {
        self.away_message.lock().clone()
    }

    pub fn set_away_message(&self, message: Option<String>) {
        *self.away_message.lock() = message;
    }

    pub fn pm_private(&self) -> bool {
        self.pm_private.load(Ordering::Acquire)
    }

    pub fn set_pm_private(&self, value: bool) {
        self.pm_private.store(value, Ordering::Release);
    }

    pub fn in_lobby(&self) -> bool {
        self.in_lobby.load(Ordering::Acquire)
    }

    pub fn set_in_lobby(&self, value: bool) {
        self.in_lobby.store(value, Ordering::Release);
    }

    /// Record inbound activity; read by the duplicate-login grace check.
    pub fn touch(&self) {
        self.last_received_time.store(unix_time(), Ordering::Release);
    }

    pub fn last_received_time(&self) -> u64 {
        self.last_received_time.load(Ordering::Acquire)
    }

    // --- relationships ---

    pub fn joined_channels(&self) -> Vec<String> {
        self.channels.lock().clone()
    }

    pub fn note_channel_joined(&self, name: &str) {
        let mut channels = self.channels.lock();
        if !channels.iter().any(|c| c == name) {
            channels.push(name.to_string());
        }
    }

    pub fn note_channel_left(&self, name: &str) {
        self.channels.lock().retain(|c| c != name);
    }

    pub fn spectators(&self) -> Vec<i32> {
        self.spectators.lock().clone()
    }

    pub fn spectating(&self) -> Option<i32> {
        *self.spectating.lock()
    }

    pub fn match_id(&self) -> Option<i16> {
        *self.match_id.lock()
    }

    pub fn set_match_id(&self, id: Option<i16>) {
        *self.match_id.lock() = id;
    }

    pub fn friends(&self) -> HashSet<i32> {
        self.friends.lock().clone()
    }

    pub fn add_friend(&self, id: i32) {
        self.friends.lock().insert(id);
    }

    pub fn remove_friend(&self, id: i32) {
        self.friends.lock().remove(&id);
    }

    pub fn blocks(&self) -> HashSet<i32> {
        self.blocks.lock().clone()
    }

    /// Link `spectator` to `host`, keeping both sides of the relationship in
    /// step under the two locks.
    pub fn link_spectator(host: &Player, spectator: &Player) {
        let mut spectators = host.spectators.lock();
        let mut spectating = spectator.spectating.lock();

        if !spectators.contains(&spectator.id) {
            spectators.push(spectator.id);
        }
        *spectating = Some(host.id);
    }

    /// Detach `spectator` from `host`; both sides update together. Returns
    /// whether the link existed.
    pub fn unlink_spectator(host: &Player, spectator: &Player) -> bool {
        let mut spectators = host.spectators.lock();
        let mut spectating = spectator.spectating.lock();

        *spectating = None;
        let before = spectators.len();
        spectators.retain(|id| *id != spectator.id);
        before != spectators.len()
    }

    // --- transport ---

    /// Append bytes to the outbound queue. Bot accounts discard writes.
    pub fn enqueue(&self, data: &[u8]) {
        if self.bot_client {
            return;
        }
        self.queue.lock().put_slice(data);
    }

    /// Drain the outbound queue; returns `None` when nothing is pending.
    pub fn dequeue(&self) -> Option<Bytes> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return None;
        }
        Some(queue.split().freeze())
    }

    // --- lifecycle ---

    /// Log the session out: clear the token, drop the match, detach from a
    /// spectated host, leave joined channels in order, deregister, and
    /// announce the logout to everyone else (unless restricted).
    pub fn logout(&self, registry: &SessionRegistry, channels: &ChannelMap) {
        self.set_token(String::new());

        if self.match_id.lock().take().is_some() {
            debug!(player = %self.name, "left match on logout");
        }

        if let Some(host_id) = self.spectating() {
            if let Some(host) = registry.get_by_id(host_id) {
                Player::unlink_spectator(&host, self);
                host.enqueue(&builders::spectator_left(self.id));
                for fellow_id in host.spectators() {
                    if let Some(fellow) = registry.get_by_id(fellow_id) {
                        fellow.enqueue(&builders::fellow_spectator_left(self.id));
                    }
                }
            }
        }

        loop {
            let name = self.channels.lock().first().cloned();
            let Some(name) = name else { break };

            self.note_channel_left(&name);
            if let Some(channel) = channels.get(&name) {
                channel.leave(self.id);
                let info = builders::channel_info(
                    &channel.name,
                    &channel.topic,
                    channel.member_count() as u16,
                );
                for member_id in channel.member_ids() {
                    if let Some(member) = registry.get_by_id(member_id) {
                        member.enqueue(&info);
                    }
                }
            }
        }

        registry.remove(self);

        if !self.is_restricted() {
            registry.broadcast(&builders::logout(self.id), &[self.id]);
        }

        info!(player = %self.name, id = self.id, "logged out");
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("online", &self.is_online())
            .finish()
    }
}

/// Default geolocation for sessions without a resolvable address.
pub fn localhost_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
