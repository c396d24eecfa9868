// guardbot-common/src/traits/chat_api.rs

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker, UserMarker};

use crate::error::Error;

/// The write-permission override a member holds on one channel. `Missing`
/// means no override object exists at all, `Neutral` means an override
/// exists but leaves the write bit untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOverride {
    Missing,
    Allow,
    Deny,
    Neutral,
}

/// A re-hosted attachment living in the hold channel.
#[derive(Debug, Clone)]
pub struct ProxiedAttachment {
    pub message_id: Id<MessageMarker>,
    pub filename: String,
    pub url: String,
}

/// Outbound command surface of the chat platform. The core never talks to
/// the wire protocol directly; everything goes through this seam.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        channel: Id<ChannelMarker>,
        content: &str,
    ) -> Result<Id<MessageMarker>, Error>;

    async fn delete_message(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
    ) -> Result<(), Error>;

    /// Best-effort bulk delete; partial failures surface as one error.
    async fn bulk_delete_messages(
        &self,
        channel: Id<ChannelMarker>,
        messages: &[Id<MessageMarker>],
    ) -> Result<(), Error>;

    /// Current write-permission override for a member on a channel.
    async fn write_override(
        &self,
        channel: Id<ChannelMarker>,
        user: Id<UserMarker>,
    ) -> Result<WriteOverride, Error>;

    /// Set the member's write-permission override. `WriteOverride::Missing`
    /// deletes the override object entirely.
    async fn set_write_override(
        &self,
        channel: Id<ChannelMarker>,
        user: Id<UserMarker>,
        state: WriteOverride,
        reason: &str,
    ) -> Result<(), Error>;

    /// Download the raw bytes of an attachment.
    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, Error>;

    /// Upload bytes as a file to a channel, returning the hosting message.
    async fn upload_attachment(
        &self,
        channel: Id<ChannelMarker>,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ProxiedAttachment, Error>;
}
