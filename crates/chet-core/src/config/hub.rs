//! Chat hub configuration.

use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Chat hub (WebSocket engine) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Channels that exist for the lifetime of the process.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Maximum messages kept per channel; the oldest is evicted first.
    #[serde(default = "default_channel_history")]
    pub channel_history_capacity: usize,
    /// Maximum messages kept per private session.
    #[serde(default = "default_private_history")]
    pub private_history_capacity: usize,
    /// Maximum display name length, in characters.
    #[serde(default = "default_max_name_chars")]
    pub max_name_chars: usize,
    /// Maximum message body length, in characters.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
    /// Maximum size of an inline image data URL, in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Maximum size of a single inbound frame, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Per-session outbound queue depth.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Take the network origin from `X-Forwarded-For`, but only on
    /// requests whose peer address is listed in `trusted_proxies`.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// Reverse proxies allowed to set `X-Forwarded-For`.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
    /// Shared secrets for role elevation.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Shared secrets compared against the credentials supplied at join time.
///
/// An unset secret never matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Grants the `owner` role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Grants the `admin` role.
    #[serde(default)]
    pub admin: Option<String>,
    /// Grants the `vip` role.
    #[serde(default)]
    pub vip: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            channel_history_capacity: default_channel_history(),
            private_history_capacity: default_private_history(),
            max_name_chars: default_max_name_chars(),
            max_body_chars: default_max_body_chars(),
            max_image_bytes: default_max_image_bytes(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_buffer: default_outbound_buffer(),
            trust_forwarded_for: false,
            trusted_proxies: Vec::new(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl HubConfig {
    /// Rejects configurations the hub cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.channels.is_empty() {
            return Err(AppError::configuration("hub.channels must not be empty"));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.trim().is_empty() {
                return Err(AppError::configuration("hub.channels contains an empty name"));
            }
            if !seen.insert(channel.as_str()) {
                return Err(AppError::configuration(format!(
                    "hub.channels lists '{channel}' more than once"
                )));
            }
        }

        let sizes = [
            ("channel_history_capacity", self.channel_history_capacity),
            ("private_history_capacity", self.private_history_capacity),
            ("max_name_chars", self.max_name_chars),
            ("max_body_chars", self.max_body_chars),
            ("max_frame_bytes", self.max_frame_bytes),
            ("outbound_buffer", self.outbound_buffer),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(AppError::configuration(format!(
                    "hub.{field} must be greater than zero"
                )));
            }
        }

        Ok(())
    }

    /// Whether `peer` may attribute a request to another origin through
    /// `X-Forwarded-For`.
    pub fn trusts_proxy(&self, peer: &IpAddr) -> bool {
        self.trust_forwarded_for && self.trusted_proxies.contains(peer)
    }
}

fn default_channels() -> Vec<String> {
    ["general", "random", "gaming", "memes"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_channel_history() -> usize {
    50
}

fn default_private_history() -> usize {
    100
}

fn default_max_name_chars() -> usize {
    30
}

fn default_max_body_chars() -> usize {
    2000
}

fn default_max_image_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_frame_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_outbound_buffer() -> usize {
    256
}
