// guardbot-core/src/cache/message_history.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use guardbot_common::models::event::{AttachmentInfo, MessageInfo};

use crate::cache::attachment_proxy::AttachmentProxyCache;

/// How many messages the history keeps before evicting the oldest.
pub const MESSAGE_CACHE_SIZE: usize = 2000;

/// A chat message retained so it can still be logged after deletion.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub message_id: Id<MessageMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub channel_id: Id<ChannelMarker>,
    pub author_id: Id<UserMarker>,
    pub author_name: String,
    pub content: String,
    pub attachments: Vec<AttachmentInfo>,
    pub jump_url: String,
}

impl CachedMessage {
    fn from_message(message: &MessageInfo) -> Self {
        Self {
            message_id: message.message_id,
            guild_id: message.guild_id,
            channel_id: message.channel_id,
            author_id: message.author_id,
            author_name: message.author_name.clone(),
            content: message.content.clone(),
            attachments: message.attachments.clone(),
            jump_url: message.jump_url.clone(),
        }
    }
}

#[derive(Default)]
struct HistoryInner {
    entries: HashMap<Id<MessageMarker>, CachedMessage>,
    order: VecDeque<Id<MessageMarker>>,
}

/// Bounded, insertion-ordered store of recent messages. Receive, update,
/// delete and bulk-delete events may race on it, so every mutation goes
/// through one lock.
pub struct MessageHistory {
    inner: Mutex<HistoryInner>,
    proxies: Arc<AttachmentProxyCache>,
    capacity: usize,
}

impl MessageHistory {
    pub fn new(proxies: Arc<AttachmentProxyCache>) -> Self {
        Self::with_capacity(proxies, MESSAGE_CACHE_SIZE)
    }

    pub fn with_capacity(proxies: Arc<AttachmentProxyCache>, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HistoryInner::default()),
            proxies,
            capacity,
        }
    }

    /// Store a freshly received message. Command invocations and bot
    /// chatter never need recovery and are skipped.
    pub async fn store(&self, message: &MessageInfo) {
        if message.author_is_bot || message.content.starts_with('!') {
            return;
        }

        let evicted = {
            let mut inner = self.inner.lock().await;
            let entry = CachedMessage::from_message(message);
            if inner.entries.insert(message.message_id, entry).is_none() {
                inner.order.push_back(message.message_id);
            }
            let mut evicted = Vec::new();
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    evicted.push(oldest);
                }
            }
            evicted
        };
        for id in evicted {
            debug!(message_id = id.get(), "evicting oldest cached message");
            self.proxies.evict(id).await;
        }

        if !message.attachments.is_empty() {
            let proxies = Arc::clone(&self.proxies);
            let message = message.clone();
            tokio::spawn(async move {
                proxies.proxy_attachments(&message).await;
            });
        }
    }

    /// Replace the cached content of an already-stored message, keeping
    /// its place in the insertion order. Unknown messages are not added.
    pub async fn update(&self, message: &MessageInfo) {
        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(&message.message_id) {
            inner
                .entries
                .insert(message.message_id, CachedMessage::from_message(message));
        }
    }

    /// Look at a cached message without consuming it (update logging).
    pub async fn peek(&self, id: Id<MessageMarker>) -> Option<CachedMessage> {
        self.inner.lock().await.entries.get(&id).cloned()
    }

    /// Remove and return a cached message (delete logging).
    pub async fn take(&self, id: Id<MessageMarker>) -> Option<CachedMessage> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entries.remove(&id);
        if entry.is_some() {
            inner.order.retain(|k| *k != id);
        }
        entry
    }

    /// Proxied attachment links for a message, if any were cached.
    pub async fn resolve_attachments(&self, id: Id<MessageMarker>) -> Option<String> {
        self.proxies.resolve(id).await
    }
}
