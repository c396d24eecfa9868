// guardbot-common/src/models/settings.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

/// The named logging switches a guild can flip. Enumerated explicitly so
/// settings wizards iterate a closed list instead of reflecting over
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogToggle {
    MessageUpdate,
    MessageDelete,
    MemberJoin,
    MemberLeave,
    MemberBan,
    MemberUnban,
}

impl LogToggle {
    pub const ALL: [LogToggle; 6] = [
        LogToggle::MessageUpdate,
        LogToggle::MessageDelete,
        LogToggle::MemberJoin,
        LogToggle::MemberLeave,
        LogToggle::MemberBan,
        LogToggle::MemberUnban,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LogToggle::MessageUpdate => "logging for edited messages",
            LogToggle::MessageDelete => "logging for deleted messages",
            LogToggle::MemberJoin => "logging for members joining",
            LogToggle::MemberLeave => "logging for members leaving (includes kicks)",
            LogToggle::MemberBan => "logging for banning members",
            LogToggle::MemberUnban => "logging for removing bans",
        }
    }
}

/// Per-guild logging configuration. Every toggle defaults to on; a guild
/// without a mod log channel produces no records at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub guild_id: Id<GuildMarker>,
    pub mod_log_channel: Option<Id<ChannelMarker>>,
    /// Falls back to the mod log channel when unset.
    pub user_log_channel: Option<Id<ChannelMarker>>,
    pub ignored_channels: HashSet<Id<ChannelMarker>>,
    pub log_message_update: bool,
    pub log_message_delete: bool,
    pub log_member_join: bool,
    pub log_member_leave: bool,
    pub log_member_ban: bool,
    pub log_member_unban: bool,
}

impl LoggingSettings {
    pub fn new(guild_id: Id<GuildMarker>) -> Self {
        Self {
            guild_id,
            mod_log_channel: None,
            user_log_channel: None,
            ignored_channels: HashSet::new(),
            log_message_update: true,
            log_message_delete: true,
            log_member_join: true,
            log_member_leave: true,
            log_member_ban: true,
            log_member_unban: true,
        }
    }

    pub fn enabled(&self, toggle: LogToggle) -> bool {
        match toggle {
            LogToggle::MessageUpdate => self.log_message_update,
            LogToggle::MessageDelete => self.log_message_delete,
            LogToggle::MemberJoin => self.log_member_join,
            LogToggle::MemberLeave => self.log_member_leave,
            LogToggle::MemberBan => self.log_member_ban,
            LogToggle::MemberUnban => self.log_member_unban,
        }
    }

    pub fn set(&mut self, toggle: LogToggle, value: bool) {
        match toggle {
            LogToggle::MessageUpdate => self.log_message_update = value,
            LogToggle::MessageDelete => self.log_message_delete = value,
            LogToggle::MemberJoin => self.log_member_join = value,
            LogToggle::MemberLeave => self.log_member_leave = value,
            LogToggle::MemberBan => self.log_member_ban = value,
            LogToggle::MemberUnban => self.log_member_unban = value,
        }
    }

    pub fn toggle(&mut self, toggle: LogToggle) {
        self.set(toggle, !self.enabled(toggle));
    }

    pub fn ignores(&self, channel: Id<ChannelMarker>) -> bool {
        self.ignored_channels.contains(&channel)
    }
}

/// Per-channel slow mode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowModeSettings {
    pub channel_id: Id<ChannelMarker>,
    /// Messages allowed inside one reset window before muting.
    pub threshold: u32,
    pub threshold_reset_secs: u64,
    pub mute_secs: u64,
    /// Users never counted or muted, on top of moderators and the bot.
    pub exempt_users: HashSet<Id<UserMarker>>,
}

impl SlowModeSettings {
    pub fn with_defaults(channel_id: Id<ChannelMarker>) -> Self {
        Self {
            channel_id,
            threshold: 3,
            threshold_reset_secs: 5,
            mute_secs: 5,
            exempt_users: HashSet::new(),
        }
    }
}

/// A named self-assignable role category, the output of the category
/// wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCategory {
    pub guild_id: Id<GuildMarker>,
    pub name: String,
    /// How many roles a member may hold from this category; 0 = unlimited.
    pub allowed_roles: u32,
}
