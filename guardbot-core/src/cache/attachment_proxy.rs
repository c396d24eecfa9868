// guardbot-core/src/cache/attachment_proxy.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};

use guardbot_common::models::event::MessageInfo;
use guardbot_common::traits::chat_api::{ChatApi, ProxiedAttachment};

/// How many proxy links the cache keeps before evicting the oldest.
pub const ATTACHMENT_CACHE_SIZE: usize = 500;

/// Attachments at or above this size are never re-hosted.
pub const MAX_PROXY_BYTES: u64 = 8 << 20;

/// Substituted for any link in a chain that failed to proxy or was lost.
pub const BROKEN_CHAIN_PLACEHOLDER: &str = "The message either contained an attachment larger \
     than 8MB and could not be uploaded again, or failed to create a proxy.";

#[derive(Default)]
struct ProxyInner {
    /// Original or proxy message id -> the next link, `None` for a link
    /// that could not be created.
    entries: HashMap<Id<MessageMarker>, Option<ProxiedAttachment>>,
    order: VecDeque<Id<MessageMarker>>,
}

/// Re-hosts message attachments into a private hold channel so they
/// survive deletion of the original message. A message with several
/// attachments becomes a chain: the original id links to the first proxy
/// message, whose id links to the next.
pub struct AttachmentProxyCache {
    api: Arc<dyn ChatApi>,
    hold_channel: Id<ChannelMarker>,
    inner: Mutex<ProxyInner>,
    capacity: usize,
}

impl AttachmentProxyCache {
    pub fn new(api: Arc<dyn ChatApi>, hold_channel: Id<ChannelMarker>) -> Self {
        Self::with_capacity(api, hold_channel, ATTACHMENT_CACHE_SIZE)
    }

    pub fn with_capacity(
        api: Arc<dyn ChatApi>,
        hold_channel: Id<ChannelMarker>,
        capacity: usize,
    ) -> Self {
        Self {
            api,
            hold_channel,
            inner: Mutex::new(ProxyInner::default()),
            capacity,
        }
    }

    /// Re-host every attachment of a message. Oversized attachments and
    /// failed transfers are recorded as broken links so a later lookup
    /// reports the placeholder instead of silently missing them.
    pub async fn proxy_attachments(&self, message: &MessageInfo) {
        if message.author_is_bot {
            return;
        }

        for attachment in &message.attachments {
            if attachment.size >= MAX_PROXY_BYTES {
                warn!(
                    filename = %attachment.filename,
                    size = attachment.size,
                    "attachment too large to proxy"
                );
                self.chain(message.message_id, None).await;
                continue;
            }

            let uploaded = match self.api.fetch_attachment(&attachment.url).await {
                Ok(bytes) => {
                    match self
                        .api
                        .upload_attachment(self.hold_channel, &attachment.filename, bytes)
                        .await
                    {
                        Ok(proxied) => Some(proxied),
                        Err(e) => {
                            info!("failed to upload attachment proxy: {}", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    info!("failed to retrieve attachment: {}", e);
                    None
                }
            };
            self.chain(message.message_id, uploaded).await;
        }
    }

    /// Append a link to the chain rooted at `id`, evicting the oldest
    /// chains while over capacity.
    async fn chain(&self, id: Id<MessageMarker>, link: Option<ProxiedAttachment>) {
        let deletions = {
            let mut inner = self.inner.lock().await;

            let mut deletions = Vec::new();
            while inner.order.len() >= self.capacity {
                if let Some(oldest) = inner.order.front().copied() {
                    deletions.extend(detach_chain(&mut inner, oldest));
                }
            }

            // walk to the tail of the chain before inserting
            let mut key = id;
            while let Some(Some(existing)) = inner.entries.get(&key) {
                key = existing.message_id;
            }
            if inner.entries.insert(key, link).is_none() {
                inner.order.push_back(key);
            }
            deletions
        };
        self.delete_hold_messages(deletions).await;
    }

    /// Drop the chain rooted at `id` and delete its hold messages. Called
    /// when the history evicts a message that no longer needs proxies.
    pub async fn evict(&self, id: Id<MessageMarker>) {
        let deletions = {
            let mut inner = self.inner.lock().await;
            detach_chain(&mut inner, id)
        };
        self.delete_hold_messages(deletions).await;
    }

    /// Consume the chain rooted at `id` and render its links as
    /// `[name](url)` lines. Broken links become the placeholder. The hold
    /// messages stay alive because the returned URLs must keep working in
    /// the log. Returns `None` when nothing was ever cached for `id`.
    pub async fn resolve(&self, id: Id<MessageMarker>) -> Option<String> {
        let mut inner = self.inner.lock().await;
        if !inner.entries.contains_key(&id) {
            return None;
        }

        let mut lines = String::new();
        let mut key = id;
        while let Some(entry) = inner.entries.remove(&key) {
            inner.order.retain(|k| *k != key);
            match entry {
                Some(link) => {
                    lines.push_str(&format!("[{}]({})\n", link.filename, link.url));
                    key = link.message_id;
                }
                None => {
                    lines.push_str(BROKEN_CHAIN_PLACEHOLDER);
                    lines.push('\n');
                    break;
                }
            }
        }
        Some(lines)
    }

    async fn delete_hold_messages(&self, deletions: Vec<Id<MessageMarker>>) {
        for message in deletions {
            if let Err(e) = self.api.delete_message(self.hold_channel, message).await {
                info!("failed to delete attachment proxy message: {}", e);
            }
        }
    }
}

/// Remove a whole chain from the cache, returning the hold messages that
/// back it so the caller can delete them outside the lock.
fn detach_chain(
    inner: &mut ProxyInner,
    root: Id<MessageMarker>,
) -> Vec<Id<MessageMarker>> {
    let mut deletions = Vec::new();
    let mut key = root;
    while let Some(entry) = inner.entries.remove(&key) {
        inner.order.retain(|k| *k != key);
        match entry {
            Some(link) => {
                deletions.push(link.message_id);
                key = link.message_id;
            }
            None => break,
        }
    }
    deletions
}
