//! # Configuration Management
//!
//! Centralized configuration for the bancho protocol core.
//!
//! This module provides structured configuration for the session server:
//! public identity (domain, bot account), protocol constants, and login
//! policy knobs such as the re-login grace window.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Bancho protocol version advertised to clients at login.
pub const PROTOCOL_VERSION: i32 = 19;

/// Max allowed single-packet payload size (1 MB; replay bundles are the
/// largest legitimate payloads and stay well under this).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Session token header name used by the client.
pub const TOKEN_HEADER: &str = "cho-token";

/// Token value returned with every login rejection. Never resolves to a
/// session.
pub const REJECTION_TOKEN: &str = "no";

/// Main configuration structure for the session server core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BanchoConfig {
    /// Public domain, used to derive profile and avatar URLs
    /// (e.g., "bancho.example.com")
    pub domain: String,

    /// Message pushed as a notification after a successful login
    pub welcome_message: String,

    /// Main menu icon image URL (empty disables the icon)
    pub menu_icon_url: String,

    /// URL opened when the main menu icon is clicked
    pub menu_onclick_url: String,

    /// Display name of the resident bot account
    pub bot_name: String,

    /// User id of the resident bot account
    pub bot_id: i32,

    /// How long a previous session may stay idle before a duplicate login
    /// replaces it instead of being rejected
    #[serde(with = "duration_serde")]
    pub relogin_grace: Duration,

    /// Enables extra diagnostics (registry consistency warnings and the like)
    pub debug: bool,
}

impl Default for BanchoConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            welcome_message: "Welcome back!".to_string(),
            menu_icon_url: String::new(),
            menu_onclick_url: String::new(),
            bot_name: "BanchoBot".to_string(),
            bot_id: 1,
            relogin_grace: Duration::from_secs(10),
            debug: false,
        }
    }
}

impl BanchoConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(domain) = std::env::var("BANCHO_DOMAIN") {
            config.domain = domain;
        }

        if let Ok(message) = std::env::var("BANCHO_WELCOME_MESSAGE") {
            config.welcome_message = message;
        }

        if let Ok(name) = std::env::var("BANCHO_BOT_NAME") {
            config.bot_name = name;
        }

        if let Ok(grace) = std::env::var("BANCHO_RELOGIN_GRACE_MS") {
            if let Ok(val) = grace.parse::<u64>() {
                config.relogin_grace = Duration::from_millis(val);
            }
        }

        if let Ok(debug) = std::env::var("BANCHO_DEBUG") {
            config.debug = matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.domain.is_empty() {
            errors.push("domain must not be empty".to_string());
        }

        if self.bot_name.is_empty() {
            errors.push("bot_name must not be empty".to_string());
        }

        if self.bot_id <= 0 {
            errors.push("bot_id must be a positive user id".to_string());
        }

        if self.relogin_grace > Duration::from_secs(300) {
            errors.push("relogin_grace above 5 minutes defeats the duplicate-login check".to_string());
        }

        if !self.menu_icon_url.is_empty() && self.menu_onclick_url.is_empty() {
            errors.push("menu_onclick_url required when menu_icon_url is set".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Serde helpers for Duration fields (stored as milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
