// guardbot-common/src/models/event.rs

use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

/// One attachment on a chat message, as delivered by the platform.
#[derive(Debug, Clone)]
pub struct AttachmentInfo {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// A chat message as delivered by the event source, already parsed.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub guild_id: Option<Id<GuildMarker>>,
    pub channel_id: Id<ChannelMarker>,
    pub channel_name: String,
    pub message_id: Id<MessageMarker>,
    pub author_id: Id<UserMarker>,
    pub author_name: String,
    pub author_is_bot: bool,
    /// Whether the author may manage messages in the channel. Resolved by
    /// the event source so the core never touches the permission engine.
    pub author_can_manage_messages: bool,
    pub content: String,
    pub attachments: Vec<AttachmentInfo>,
    pub jump_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Every moderation-relevant event the platform can deliver. The union is
/// closed on purpose: adding an event kind forces every dispatch site to
/// handle it.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageCreated(MessageInfo),
    MessageUpdated(MessageInfo),
    MessageDeleted {
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        channel_name: String,
        message_id: Id<MessageMarker>,
    },
    MessagesBulkDeleted {
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        channel_name: String,
        message_ids: Vec<Id<MessageMarker>>,
    },
    MemberJoined {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        username: String,
        account_created: DateTime<Utc>,
    },
    MemberLeft {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        username: String,
        /// Guilds the bot still shares with the user after this event.
        mutual_guilds_remaining: usize,
    },
    MemberBanned {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        username: String,
    },
    MemberUnbanned {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        username: String,
    },
    NicknameChanged {
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        username: String,
        old_nickname: Option<String>,
        new_nickname: Option<String>,
    },
    UsernameChanged {
        user_id: Id<UserMarker>,
        old_name: String,
        new_name: String,
        /// Guilds shared with the bot that should receive the log record.
        member_of: Vec<Id<GuildMarker>>,
    },
}

impl ChatEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::MessageCreated(_) => "message.create",
            ChatEvent::MessageUpdated(_) => "message.update",
            ChatEvent::MessageDeleted { .. } => "message.delete",
            ChatEvent::MessagesBulkDeleted { .. } => "message.bulk_delete",
            ChatEvent::MemberJoined { .. } => "member.join",
            ChatEvent::MemberLeft { .. } => "member.leave",
            ChatEvent::MemberBanned { .. } => "member.ban",
            ChatEvent::MemberUnbanned { .. } => "member.unban",
            ChatEvent::NicknameChanged { .. } => "member.nickname_change",
            ChatEvent::UsernameChanged { .. } => "user.name_change",
        }
    }
}
