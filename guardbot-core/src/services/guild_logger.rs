// guardbot-core/src/services/guild_logger.rs
//
// Logs moderation-relevant events and attributes them to the acting
// moderator by correlating against the platform's audit trail.
//
// IMPORTANT: a guild's checkpoint must only be read and written while
// holding that guild's checkpoint cell, otherwise concurrent correlation
// attempts for the same guild race on it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use uuid::Uuid;

use guardbot_common::models::audit::{AuditActionType, AuditLogEntry};
use guardbot_common::models::event::{ChatEvent, MessageInfo};
use guardbot_common::models::log::{LogAudience, LogColor, LogRecord};
use guardbot_common::traits::audit::AuditLogReader;
use guardbot_common::traits::log_sink::LogSink;
use guardbot_common::traits::repository_traits::LoggingSettingsRepository;

use crate::cache::message_history::CachedMessage;
use crate::cache::MessageHistory;

/// How many audit-log entries a correlation attempt looks back over.
pub const LOG_ENTRY_CHECK_LIMIT: usize = 5;

/// How long after the triggering event the audit log is consulted, giving
/// the platform time to write the entry.
pub const CORRELATION_DELAY: Duration = Duration::from_secs(1);

/// The look-back window is a heuristic, not a documented contract, so it
/// stays tunable.
#[derive(Debug, Clone)]
pub struct CorrelatorTunables {
    pub entry_limit: usize,
    pub delay: Duration,
}

impl Default for CorrelatorTunables {
    fn default() -> Self {
        Self {
            entry_limit: LOG_ENTRY_CHECK_LIMIT,
            delay: CORRELATION_DELAY,
        }
    }
}

type CheckpointCell = Arc<Mutex<Option<AuditLogEntry>>>;

/// A cheap-to-clone handle; clones share the checkpoint map and
/// collaborators, so spawned correlation tasks carry the whole service.
#[derive(Clone)]
pub struct GuildLogger {
    history: Arc<MessageHistory>,
    settings: Arc<dyn LoggingSettingsRepository>,
    audit: Arc<dyn AuditLogReader>,
    sink: Arc<dyn LogSink>,
    self_user: Id<UserMarker>,
    tunables: CorrelatorTunables,
    /// Per guild, the newest audit entry already considered. Partitioned
    /// by guild id; each cell serializes that guild's correlations.
    checkpoints: Arc<DashMap<Id<GuildMarker>, CheckpointCell>>,
}

impl GuildLogger {
    pub fn new(
        history: Arc<MessageHistory>,
        settings: Arc<dyn LoggingSettingsRepository>,
        audit: Arc<dyn AuditLogReader>,
        sink: Arc<dyn LogSink>,
        self_user: Id<UserMarker>,
        tunables: CorrelatorTunables,
    ) -> Self {
        Self {
            history,
            settings,
            audit,
            sink,
            self_user,
            tunables,
            checkpoints: Arc::new(DashMap::new()),
        }
    }

    /// Single entry point for the coordinator. Never propagates an error;
    /// every failure is logged and contained here.
    pub async fn handle_event(&self, event: &ChatEvent) {
        match event {
            ChatEvent::MessageCreated(message) => self.on_message_created(message).await,
            ChatEvent::MessageUpdated(message) => self.on_message_updated(message).await,
            ChatEvent::MessageDeleted {
                guild_id,
                channel_id,
                channel_name,
                message_id,
            } => {
                self.on_message_deleted(*guild_id, *channel_id, channel_name, *message_id)
                    .await
            }
            ChatEvent::MessagesBulkDeleted {
                guild_id,
                channel_id,
                channel_name,
                message_ids,
            } => {
                self.on_bulk_delete(*guild_id, *channel_id, channel_name, message_ids)
                    .await
            }
            ChatEvent::MemberJoined {
                guild_id,
                user_id,
                username,
                account_created,
            } => {
                self.on_member_joined(*guild_id, *user_id, username, *account_created)
                    .await
            }
            ChatEvent::MemberLeft {
                guild_id,
                user_id,
                username,
                ..
            } => self.on_member_left(*guild_id, *user_id, username).await,
            ChatEvent::MemberBanned {
                guild_id,
                user_id,
                username,
            } => self.on_member_banned(*guild_id, *user_id, username).await,
            ChatEvent::MemberUnbanned {
                guild_id,
                user_id,
                username,
            } => self.on_member_unbanned(*guild_id, *user_id, username).await,
            ChatEvent::NicknameChanged {
                guild_id,
                user_id,
                username,
                old_nickname,
                new_nickname,
            } => {
                self.on_nickname_changed(
                    *guild_id,
                    *user_id,
                    username,
                    old_nickname.clone(),
                    new_nickname.clone(),
                )
                .await
            }
            ChatEvent::UsernameChanged {
                user_id,
                old_name,
                new_name,
                member_of,
            } => {
                self.on_username_changed(*user_id, old_name, new_name, member_of)
                    .await
            }
        }
    }

    // --- correlation -----------------------------------------------------

    /// Walk the most recent audit entries looking for one that explains
    /// the observed action against `target`. The newest entry is staged as
    /// the guild's next checkpoint when `stage` is set, and committed
    /// whatever the match outcome so future scans stay bounded.
    ///
    /// Concurrent identical actions by different moderators inside the
    /// look-back window can still be attributed to the wrong actor; this
    /// is a heuristic.
    async fn find_moderator(
        &self,
        guild: Id<GuildMarker>,
        expected: AuditActionType,
        target: u64,
        stage: bool,
        filter: Option<AuditActionType>,
    ) -> Option<AuditLogEntry> {
        let cell = self.checkpoints.entry(guild).or_default().clone();
        let mut checkpoint = cell.lock().await;

        let entries = match self
            .audit
            .fetch_recent_entries(guild, self.tunables.entry_limit, filter)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                // correlation stays uncertain; not an error state
                warn!(guild = guild.get(), "audit log fetch failed: {}", e);
                return None;
            }
        };

        let mut staged = checkpoint.clone();
        let mut found = None;
        for (i, entry) in entries.iter().take(self.tunables.entry_limit).enumerate() {
            if i == 0 && stage {
                staged = Some(entry.clone());
            }
            if let Some(current) = checkpoint.as_ref() {
                if current.id == entry.id {
                    // Already seen. A bumped repeat count means the same
                    // moderator acted again since the last poll.
                    if entry.action == expected
                        && entry.target_id == target
                        && entry.repeat_count != current.repeat_count
                    {
                        found = Some(entry.clone());
                    }
                    break;
                }
            }
            if entry.action == expected && entry.target_id == target {
                found = Some(entry.clone());
                break;
            }
        }
        if stage {
            *checkpoint = staged;
        }
        found
    }

    fn is_self(&self, entry: &AuditLogEntry) -> bool {
        entry.actor_id == self.self_user
    }

    async fn log(&self, record: LogRecord, audience: LogAudience) {
        if let Err(e) = self.sink.log(record, audience).await {
            warn!("failed to deliver log record: {}", e);
        }
    }

    // --- message flows ---------------------------------------------------

    async fn on_message_created(&self, message: &MessageInfo) {
        let Some(guild) = message.guild_id else {
            return;
        };
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if settings.ignores(message.channel_id) {
            return;
        }
        self.history.store(message).await;
    }

    async fn on_message_updated(&self, message: &MessageInfo) {
        let Some(guild) = message.guild_id else {
            return;
        };
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_message_update {
            self.history.update(message).await;
            return;
        }
        if settings.ignores(message.channel_id) {
            return;
        }

        let Some(old) = self.history.peek(message.message_id).await else {
            return;
        };
        let record = LogRecord::new(
            guild,
            format!("#{}: Message was modified!", message.channel_name),
            LogColor::LightBlue,
        )
        .description(format!("Old message was:\n{}", old.content))
        .field("Author", old.author_name.clone(), true)
        .field("Message URL", format!("[Link]({})", old.jump_url), false)
        .user(old.author_id, old.author_name.clone());
        self.log(record, LogAudience::User).await;

        self.history.update(message).await;
    }

    async fn on_message_deleted(
        &self,
        guild: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        channel_name: &str,
        message_id: Id<MessageMarker>,
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_message_delete || settings.ignores(channel_id) {
            return;
        }

        // Content and attachments are captured now; attribution runs after
        // the audit trail has had time to catch up.
        let Some(old) = self.history.take(message_id).await else {
            return;
        };
        let attachments = self.history.resolve_attachments(message_id).await;

        let logger = self.clone();
        let channel_name = channel_name.to_string();
        tokio::spawn(async move {
            sleep(logger.tunables.delay).await;
            logger
                .log_deleted_message(guild, &channel_name, old, attachments)
                .await;
        });
    }

    async fn log_deleted_message(
        &self,
        guild: Id<GuildMarker>,
        channel_name: &str,
        old: CachedMessage,
        attachments: Option<String>,
    ) {
        let moderator = self
            .find_moderator(
                guild,
                AuditActionType::MessageDelete,
                old.author_id.get(),
                true,
                None,
            )
            .await;

        if let Some(entry) = &moderator {
            if self.is_self(entry) {
                // our own deletions are logged by whichever command issued
                // them
                return;
            }
        }

        let mut record = LogRecord::new(
            guild,
            format!("#{}: Message was deleted!", channel_name),
            if moderator.is_some() {
                LogColor::Yellow
            } else {
                LogColor::LightBlue
            },
        )
        .description(format!("Old message was:\n{}", old.content));
        if let Some(attachments) = attachments {
            record = record.field("Attachment(s)", attachments, false);
        }
        record = record.field("Author", old.author_name.clone(), true);
        if let Some(entry) = &moderator {
            record = record.field("Deleted by", format!("<@{}>", entry.actor_id.get()), true);
        }
        record = record
            .field("Message URL", format!("[Link]({})", old.jump_url), false)
            .user(old.author_id, old.author_name.clone());

        let audience = if moderator.is_some() {
            LogAudience::Moderator
        } else {
            LogAudience::User
        };
        self.log(record, audience).await;
    }

    async fn on_bulk_delete(
        &self,
        guild: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        channel_name: &str,
        message_ids: &[Id<MessageMarker>],
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_message_delete || settings.ignores(channel_id) {
            return;
        }

        let mut transcript = format!("#{}\n", channel_name);
        let mut any_logged = false;
        for id in message_ids {
            let Some(message) = self.history.take(*id).await else {
                continue;
            };
            any_logged = true;
            transcript.push_str(&format!("{}:\n{}\n\n", message.author_name, message.content));
            if let Some(attachments) = self.history.resolve_attachments(*id).await {
                transcript.push_str(&format!("Attachment(s):\n{}\n", attachments));
            }
        }
        if !any_logged {
            return;
        }
        transcript.push_str(&format!("Logged on {}", Utc::now()));

        let record = LogRecord::new(
            guild,
            format!("#{}: Bulk delete", channel_name),
            LogColor::LightBlue,
        )
        .field(
            "Amount of deleted messages",
            message_ids.len().to_string(),
            false,
        )
        .payload(transcript.into_bytes());
        self.log(record, LogAudience::User).await;
    }

    // --- member flows ----------------------------------------------------

    async fn on_member_joined(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
        account_created: DateTime<Utc>,
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_member_join {
            return;
        }

        let record = LogRecord::new(guild, "User joined", LogColor::Green)
            .field("User", username, false)
            .field(
                "Account created",
                account_created
                    .format("%d-%m-%Y %I:%M %p %Z")
                    .to_string(),
                false,
            )
            .user(user, username);
        self.log(record, LogAudience::User).await;
    }

    async fn on_member_left(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_member_leave {
            return;
        }

        let logger = self.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            sleep(logger.tunables.delay).await;
            let moderator = logger
                .find_moderator(guild, AuditActionType::MemberKick, user.get(), false, None)
                .await;

            match moderator {
                Some(entry) if logger.is_self(&entry) => {
                    // our own kicks are logged by the kick command itself
                }
                Some(entry) => {
                    logger
                        .log_kick(guild, user, &username, &entry)
                        .await;
                }
                None => {
                    let record = LogRecord::new(guild, "User left", LogColor::Red)
                        .field("User", username.clone(), true)
                        .user(user, username);
                    logger.log(record, LogAudience::User).await;
                }
            }
        });
    }

    async fn log_kick(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
        entry: &AuditLogEntry,
    ) {
        let mut record = LogRecord::new(guild, "User kicked", LogColor::Red)
            .field("Case ID", Uuid::new_v4().to_string(), false)
            .field("User", username, true)
            .field("Moderator", format!("<@{}>", entry.actor_id.get()), true);
        if let Some(reason) = &entry.reason {
            record = record.field("Reason", reason.clone(), false);
        }
        record = record.user(user, username);
        self.log(record, LogAudience::Moderator).await;
    }

    async fn on_member_banned(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_member_ban {
            return;
        }

        let logger = self.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            sleep(logger.tunables.delay).await;
            let moderator = logger
                .find_moderator(guild, AuditActionType::MemberBanAdd, user.get(), false, None)
                .await;

            if let Some(entry) = &moderator {
                if logger.is_self(entry) {
                    return;
                }
            }

            let mut record = LogRecord::new(guild, "User banned", LogColor::Red)
                .field("Case ID", Uuid::new_v4().to_string(), false)
                .field("User", username.clone(), true);
            if let Some(entry) = &moderator {
                record = record.field("Moderator", format!("<@{}>", entry.actor_id.get()), true);
                if let Some(reason) = &entry.reason {
                    record = record.field("Reason", reason.clone(), false);
                }
            }
            record = record.user(user, username);
            logger.log(record, LogAudience::Moderator).await;
        });
    }

    async fn on_member_unbanned(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
    ) {
        let settings = match self.settings.get_settings(guild).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild = guild.get(), "failed to load logging settings: {}", e);
                return;
            }
        };
        if !settings.log_member_unban {
            return;
        }

        let logger = self.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            sleep(logger.tunables.delay).await;
            let moderator = logger
                .find_moderator(
                    guild,
                    AuditActionType::MemberBanRemove,
                    user.get(),
                    true,
                    None,
                )
                .await;

            let mut record = LogRecord::new(guild, "User ban revoked", LogColor::Green)
                .field("User", username.clone(), true);
            if let Some(entry) = &moderator {
                record = record.field("Moderator", format!("<@{}>", entry.actor_id.get()), true);
            }
            record = record.user(user, username);
            logger.log(record, LogAudience::Moderator).await;
        });
    }

    async fn on_nickname_changed(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        username: &str,
        old_nickname: Option<String>,
        new_nickname: Option<String>,
    ) {
        let logger = self.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            sleep(logger.tunables.delay).await;
            let moderator = logger
                .find_moderator(
                    guild,
                    AuditActionType::MemberUpdate,
                    user.get(),
                    false,
                    Some(AuditActionType::MemberUpdate),
                )
                .await;

            let self_change = match &moderator {
                None => true,
                Some(entry) => entry.actor_id == user,
            };

            let mut record = LogRecord::new(
                guild,
                if self_change {
                    "User has changed nickname"
                } else {
                    "Moderator has changed nickname"
                },
                LogColor::LightBlue,
            )
            .field("User", username.clone(), false)
            .field(
                "Old nickname",
                old_nickname.unwrap_or_else(|| "None".to_string()),
                true,
            )
            .field(
                "New nickname",
                new_nickname.unwrap_or_else(|| "None".to_string()),
                true,
            );
            if !self_change {
                if let Some(entry) = &moderator {
                    record =
                        record.field("Moderator", format!("<@{}>", entry.actor_id.get()), false);
                }
            }
            record = record.user(user, username);
            let audience = if self_change {
                LogAudience::User
            } else {
                LogAudience::Moderator
            };
            logger.log(record, audience).await;
        });
    }

    async fn on_username_changed(
        &self,
        user: Id<UserMarker>,
        old_name: &str,
        new_name: &str,
        member_of: &[Id<GuildMarker>],
    ) {
        let guilds = match self.settings.guilds_with_settings().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!("failed to list guilds with logging settings: {}", e);
                return;
            }
        };
        for guild in guilds {
            if !member_of.contains(&guild) {
                continue;
            }
            let record = LogRecord::new(guild, "User has changed username", LogColor::LightBlue)
                .field("Old username", old_name, false)
                .field("New username", new_name, false)
                .user(user, new_name);
            self.log(record, LogAudience::User).await;
        }
    }
}
