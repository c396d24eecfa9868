// tests/helpers.rs (shared in-memory test doubles)
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use guardbot_common::Error;
use guardbot_common::models::audit::{AuditActionType, AuditLogEntry};
use guardbot_common::models::event::{AttachmentInfo, MessageInfo};
use guardbot_common::models::log::{LogAudience, LogRecord};
use guardbot_common::models::settings::{LoggingSettings, RoleCategory, SlowModeSettings};
use guardbot_common::traits::audit::AuditLogReader;
use guardbot_common::traits::chat_api::{ChatApi, ProxiedAttachment, WriteOverride};
use guardbot_common::traits::log_sink::LogSink;
use guardbot_common::traits::repository_traits::{
    LoggingSettingsRepository, RoleCategoryRepository, SlowModeSettingsRepository,
};

pub fn guild(n: u64) -> Id<GuildMarker> {
    Id::new(n)
}

pub fn channel(n: u64) -> Id<ChannelMarker> {
    Id::new(n)
}

pub fn user(n: u64) -> Id<UserMarker> {
    Id::new(n)
}

pub fn message_id(n: u64) -> Id<MessageMarker> {
    Id::new(n)
}

/// A plain guild message from `author` with the given text.
pub fn message(id: u64, author: u64, channel_id: u64, content: &str) -> MessageInfo {
    MessageInfo {
        guild_id: Some(guild(1)),
        channel_id: channel(channel_id),
        channel_name: "general".to_string(),
        message_id: message_id(id),
        author_id: user(author),
        author_name: format!("user-{author}"),
        author_is_bot: false,
        author_can_manage_messages: false,
        content: content.to_string(),
        attachments: Vec::new(),
        jump_url: format!("https://chat.example/1/{channel_id}/{id}"),
        timestamp: Utc::now(),
    }
}

pub fn attachment(filename: &str, size: u64) -> AttachmentInfo {
    AttachmentInfo {
        filename: filename.to_string(),
        url: format!("https://cdn.example/{filename}"),
        size,
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: Id<ChannelMarker>,
    pub content: String,
    pub id: Id<MessageMarker>,
}

#[derive(Debug, Clone)]
pub struct OverrideChange {
    pub channel: Id<ChannelMarker>,
    pub user: Id<UserMarker>,
    pub state: WriteOverride,
    pub reason: String,
}

/// Records every outbound platform call; failures are switchable per
/// concern to exercise the fail-open paths.
#[derive(Default)]
pub struct MockChatApi {
    next_id: AtomicU64,
    pub sent: Mutex<Vec<SentMessage>>,
    pub deleted: Mutex<Vec<(Id<ChannelMarker>, Id<MessageMarker>)>>,
    pub bulk_deleted: Mutex<Vec<(Id<ChannelMarker>, Vec<Id<MessageMarker>>)>>,
    pub overrides: Mutex<HashMap<(Id<ChannelMarker>, Id<UserMarker>), WriteOverride>>,
    pub override_log: Mutex<Vec<OverrideChange>>,
    pub snapshot_calls: AtomicUsize,
    pub fail_overrides: AtomicBool,
    pub fail_uploads: AtomicBool,
    /// url -> bytes served by fetch_attachment.
    pub attachment_bytes: Mutex<HashMap<String, Vec<u8>>>,
    pub uploads: Mutex<Vec<ProxiedAttachment>>,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    fn assign_id(&self) -> Id<MessageMarker> {
        Id::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn serve_attachment(&self, url: &str, bytes: Vec<u8>) {
        self.attachment_bytes
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
    }

    pub fn preset_override(
        &self,
        channel: Id<ChannelMarker>,
        user: Id<UserMarker>,
        state: WriteOverride,
    ) {
        self.overrides.lock().unwrap().insert((channel, user), state);
    }

    pub fn sent_containing(&self, needle: &str) -> Option<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.content.contains(needle))
            .cloned()
    }

    pub fn override_changes(&self, reason: &str) -> Vec<OverrideChange> {
        self.override_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.reason == reason)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn send_message(
        &self,
        channel: Id<ChannelMarker>,
        content: &str,
    ) -> Result<Id<MessageMarker>, Error> {
        let id = self.assign_id();
        self.sent.lock().unwrap().push(SentMessage {
            channel,
            content: content.to_string(),
            id,
        });
        Ok(id)
    }

    async fn delete_message(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
    ) -> Result<(), Error> {
        self.deleted.lock().unwrap().push((channel, message));
        Ok(())
    }

    async fn bulk_delete_messages(
        &self,
        channel: Id<ChannelMarker>,
        messages: &[Id<MessageMarker>],
    ) -> Result<(), Error> {
        self.bulk_deleted
            .lock()
            .unwrap()
            .push((channel, messages.to_vec()));
        Ok(())
    }

    async fn write_override(
        &self,
        channel: Id<ChannelMarker>,
        user: Id<UserMarker>,
    ) -> Result<WriteOverride, Error> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_overrides.load(Ordering::SeqCst) {
            return Err(Error::Permission("missing manage permissions".to_string()));
        }
        Ok(self
            .overrides
            .lock()
            .unwrap()
            .get(&(channel, user))
            .copied()
            .unwrap_or(WriteOverride::Missing))
    }

    async fn set_write_override(
        &self,
        channel: Id<ChannelMarker>,
        user: Id<UserMarker>,
        state: WriteOverride,
        reason: &str,
    ) -> Result<(), Error> {
        if self.fail_overrides.load(Ordering::SeqCst) {
            return Err(Error::Permission("missing manage permissions".to_string()));
        }
        {
            let mut overrides = self.overrides.lock().unwrap();
            if state == WriteOverride::Missing {
                overrides.remove(&(channel, user));
            } else {
                overrides.insert((channel, user), state);
            }
        }
        self.override_log.lock().unwrap().push(OverrideChange {
            channel,
            user,
            state,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.attachment_bytes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("download failed: {url}")))
    }

    async fn upload_attachment(
        &self,
        channel: Id<ChannelMarker>,
        filename: &str,
        _bytes: Vec<u8>,
    ) -> Result<ProxiedAttachment, Error> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Platform("upload rejected".to_string()));
        }
        let id = self.assign_id();
        let proxied = ProxiedAttachment {
            message_id: id,
            filename: filename.to_string(),
            url: format!("https://hold.example/{}/{}/{}", channel.get(), id.get(), filename),
        };
        self.uploads.lock().unwrap().push(proxied.clone());
        Ok(proxied)
    }
}

/// Serves a fixed list of audit entries, newest first.
#[derive(Default)]
pub struct MockAuditLog {
    pub entries: Mutex<Vec<AuditLogEntry>>,
    pub fail: AtomicBool,
    pub fetches: AtomicUsize,
}

impl MockAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entries(&self, entries: Vec<AuditLogEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn entry(
        id: u64,
        action: AuditActionType,
        target: u64,
        actor: u64,
    ) -> AuditLogEntry {
        AuditLogEntry {
            id,
            action,
            target_id: target,
            actor_id: user(actor),
            reason: None,
            repeat_count: None,
        }
    }
}

#[async_trait]
impl AuditLogReader for MockAuditLog {
    async fn fetch_recent_entries(
        &self,
        _guild: Id<GuildMarker>,
        limit: usize,
        filter: Option<AuditActionType>,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Platform("audit log unavailable".to_string()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter.map_or(true, |f| e.action == f))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<(LogRecord, LogAudience)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(&self, title: &str) -> Vec<(LogRecord, LogAudience)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.title == title)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn log(&self, record: LogRecord, audience: LogAudience) -> Result<(), Error> {
        self.records.lock().unwrap().push((record, audience));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLoggingSettings {
    pub stored: Mutex<HashMap<Id<GuildMarker>, LoggingSettings>>,
}

impl MemoryLoggingSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, settings: LoggingSettings) {
        self.stored
            .lock()
            .unwrap()
            .insert(settings.guild_id, settings);
    }

    pub fn get(&self, guild: Id<GuildMarker>) -> Option<LoggingSettings> {
        self.stored.lock().unwrap().get(&guild).cloned()
    }
}

#[async_trait]
impl LoggingSettingsRepository for MemoryLoggingSettings {
    async fn get_settings(&self, guild: Id<GuildMarker>) -> Result<LoggingSettings, Error> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .get(&guild)
            .cloned()
            .unwrap_or_else(|| LoggingSettings::new(guild)))
    }

    async fn save_settings(&self, settings: &LoggingSettings) -> Result<(), Error> {
        self.insert(settings.clone());
        Ok(())
    }

    async fn guilds_with_settings(&self) -> Result<Vec<Id<GuildMarker>>, Error> {
        Ok(self.stored.lock().unwrap().keys().copied().collect())
    }
}

#[derive(Default)]
pub struct MemorySlowModeSettings {
    pub stored: Mutex<HashMap<Id<ChannelMarker>, SlowModeSettings>>,
}

impl MemorySlowModeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: SlowModeSettings) {
        self.stored
            .lock()
            .unwrap()
            .insert(config.channel_id, config);
    }
}

#[async_trait]
impl SlowModeSettingsRepository for MemorySlowModeSettings {
    async fn get_config(
        &self,
        channel: Id<ChannelMarker>,
    ) -> Result<Option<SlowModeSettings>, Error> {
        Ok(self.stored.lock().unwrap().get(&channel).cloned())
    }

    async fn save_config(&self, config: &SlowModeSettings) -> Result<(), Error> {
        self.insert(config.clone());
        Ok(())
    }

    async fn delete_config(&self, channel: Id<ChannelMarker>) -> Result<(), Error> {
        self.stored.lock().unwrap().remove(&channel);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRoleCategories {
    pub stored: Mutex<Vec<RoleCategory>>,
}

impl MemoryRoleCategories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleCategoryRepository for MemoryRoleCategories {
    async fn create_category(&self, category: &RoleCategory) -> Result<(), Error> {
        self.stored.lock().unwrap().push(category.clone());
        Ok(())
    }

    async fn list_categories(&self, guild: Id<GuildMarker>) -> Result<Vec<RoleCategory>, Error> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.guild_id == guild)
            .cloned()
            .collect())
    }

    async fn category_exists(&self, guild: Id<GuildMarker>, name: &str) -> Result<bool, Error> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.guild_id == guild && c.name == name))
    }
}
