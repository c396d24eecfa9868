// guardbot-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};

use crate::error::Error;
use crate::models::settings::{LoggingSettings, RoleCategory, SlowModeSettings};

#[async_trait]
pub trait LoggingSettingsRepository: Send + Sync {
    /// Settings for a guild, falling back to defaults when none are stored.
    async fn get_settings(&self, guild: Id<GuildMarker>) -> Result<LoggingSettings, Error>;

    async fn save_settings(&self, settings: &LoggingSettings) -> Result<(), Error>;

    /// Guilds that have stored settings (used for fan-out of guild-less
    /// events such as username changes).
    async fn guilds_with_settings(&self) -> Result<Vec<Id<GuildMarker>>, Error>;
}

#[async_trait]
pub trait SlowModeSettingsRepository: Send + Sync {
    async fn get_config(&self, channel: Id<ChannelMarker>)
        -> Result<Option<SlowModeSettings>, Error>;

    async fn save_config(&self, config: &SlowModeSettings) -> Result<(), Error>;

    async fn delete_config(&self, channel: Id<ChannelMarker>) -> Result<(), Error>;
}

#[async_trait]
pub trait RoleCategoryRepository: Send + Sync {
    async fn create_category(&self, category: &RoleCategory) -> Result<(), Error>;

    async fn list_categories(&self, guild: Id<GuildMarker>) -> Result<Vec<RoleCategory>, Error>;

    async fn category_exists(&self, guild: Id<GuildMarker>, name: &str) -> Result<bool, Error>;
}
