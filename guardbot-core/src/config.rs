// guardbot-core/src/config.rs

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::EnvFilter;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, UserMarker};

use guardbot_common::Error;
use guardbot_common::models::settings::SlowModeSettings;

use crate::services::guild_logger::CorrelatorTunables;

/// Process configuration, read from the environment (a `.env` file is
/// honored when present).
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Private channel attachment proxies are uploaded to.
    pub attachment_hold_channel: Option<Id<ChannelMarker>>,
    pub correlator: CorrelatorTunables,
    pub slow_mode_threshold: u32,
    pub slow_mode_reset_secs: u64,
    pub slow_mode_mute_secs: u64,
    /// Users exempt from slow mode everywhere, on top of moderators and
    /// the bot itself.
    pub slow_mode_exempt: HashSet<Id<UserMarker>>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            attachment_hold_channel: None,
            correlator: CorrelatorTunables::default(),
            slow_mode_threshold: 3,
            slow_mode_reset_secs: 5,
            slow_mode_mute_secs: 5,
            slow_mode_exempt: HashSet::new(),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(raw) = read_env("GUARDBOT_HOLD_CHANNEL") {
            let id: u64 = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_HOLD_CHANNEL: bad id '{raw}'")))?;
            config.attachment_hold_channel = Id::new_checked(id);
        }
        if let Some(raw) = read_env("GUARDBOT_AUDIT_LOOKBACK") {
            config.correlator.entry_limit = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_AUDIT_LOOKBACK: '{raw}'")))?;
        }
        if let Some(raw) = read_env("GUARDBOT_AUDIT_DELAY_MS") {
            let millis: u64 = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_AUDIT_DELAY_MS: '{raw}'")))?;
            config.correlator.delay = Duration::from_millis(millis);
        }
        if let Some(raw) = read_env("GUARDBOT_SLOWMODE_THRESHOLD") {
            config.slow_mode_threshold = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_SLOWMODE_THRESHOLD: '{raw}'")))?;
        }
        if let Some(raw) = read_env("GUARDBOT_SLOWMODE_RESET_SECS") {
            config.slow_mode_reset_secs = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_SLOWMODE_RESET_SECS: '{raw}'")))?;
        }
        if let Some(raw) = read_env("GUARDBOT_SLOWMODE_MUTE_SECS") {
            config.slow_mode_mute_secs = raw
                .parse()
                .map_err(|_| Error::Parse(format!("GUARDBOT_SLOWMODE_MUTE_SECS: '{raw}'")))?;
        }
        if let Some(raw) = read_env("GUARDBOT_SLOWMODE_EXEMPT") {
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse::<u64>().ok().and_then(Id::new_checked) {
                    Some(id) => {
                        config.slow_mode_exempt.insert(id);
                    }
                    None => warn!("GUARDBOT_SLOWMODE_EXEMPT: ignoring bad user id '{}'", part),
                }
            }
        }

        Ok(config)
    }

    /// Slow-mode settings for a channel using the configured defaults.
    pub fn slow_mode_settings(&self, channel: Id<ChannelMarker>) -> SlowModeSettings {
        SlowModeSettings {
            channel_id: channel,
            threshold: self.slow_mode_threshold,
            threshold_reset_secs: self.slow_mode_reset_secs,
            mute_secs: self.slow_mode_mute_secs,
            exempt_users: self.slow_mode_exempt.clone(),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Install the process-wide tracing subscriber. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
