// guardbot-core/src/sequences/mod.rs
//
// Multi-turn conversation engine. Every interactive command runs as a
// `Sequence` owned by one user in one channel; the shared inbound
// dispatcher feeds accepted messages to it until it completes, errors,
// is stopped, or expires.

pub mod log_settings;
pub mod role_categories;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use guardbot_common::Error;
use guardbot_common::models::event::MessageInfo;
use guardbot_common::traits::chat_api::ChatApi;

/// A session expires after this long without an accepted message.
pub const SEQUENCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Error reports and confirmations self-delete after this long.
pub const EPHEMERAL_TTL: Duration = Duration::from_secs(60);

/// What a wizard step decided about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    /// Keep the session alive and wait for the next message.
    Continue,
    /// The wizard finished; destroy the session.
    Done,
}

/// One interactive wizard. Step errors are expected control flow: the
/// engine destroys the session and reports them, so implementations
/// return `Err` for bad input instead of panicking or sentinel values.
#[async_trait]
pub trait Sequence: Send {
    /// Sends the opening prompt, right after the session is registered.
    async fn begin(&mut self, ctx: &SequenceContext) -> Result<(), Error>;

    /// Handles one accepted message from the owner.
    async fn on_message(
        &mut self,
        message: &MessageInfo,
        ctx: &SequenceContext,
    ) -> Result<SequenceStep, Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceOptions {
    /// Bulk-delete every collected message when the session ends.
    pub cleanup_messages: bool,
    /// Announce the session and its STOP/expiry rules when it starts.
    pub announce_start: bool,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            cleanup_messages: true,
            announce_start: true,
        }
    }
}

/// Per-session handle passed to wizard steps for sending prompts. Sent
/// prompts are tracked for cleanup when the session has cleanup enabled.
pub struct SequenceContext {
    api: Arc<dyn ChatApi>,
    pub owner: Id<UserMarker>,
    pub channel: Id<ChannelMarker>,
    pub guild: Option<Id<GuildMarker>>,
    cleanup: Option<Mutex<Vec<Id<MessageMarker>>>>,
}

impl SequenceContext {
    /// Send a prompt and track it for end-of-session cleanup.
    pub async fn send(&self, content: &str) -> Result<Id<MessageMarker>, Error> {
        let id = self.api.send_message(self.channel, content).await?;
        self.track(id).await;
        Ok(id)
    }

    /// Send a message that self-deletes after [`EPHEMERAL_TTL`] instead of
    /// lingering until cleanup (confirmations).
    pub async fn send_ephemeral(&self, content: &str) -> Result<(), Error> {
        let id = self.api.send_message(self.channel, content).await?;
        spawn_delayed_delete(Arc::clone(&self.api), self.channel, id);
        Ok(())
    }

    /// A mention of the session owner for prompt texts.
    pub fn owner_mention(&self) -> String {
        format!("<@{}>", self.owner.get())
    }

    async fn track(&self, id: Id<MessageMarker>) {
        if let Some(cleanup) = &self.cleanup {
            cleanup.lock().await.push(id);
        }
    }
}

struct ActiveSession {
    channel: Id<ChannelMarker>,
    guild: Option<Id<GuildMarker>>,
    ctx: Arc<SequenceContext>,
    handler: Arc<Mutex<Box<dyn Sequence>>>,
    expiry: JoinHandle<()>,
}

/// Registry of live sessions. A cheap-to-clone handle over shared state;
/// the owner-uniqueness check and the insert happen under one lock so two
/// commands racing for the same owner cannot both create a session.
#[derive(Clone)]
pub struct SequenceManager {
    api: Arc<dyn ChatApi>,
    timeout: Duration,
    sessions: Arc<Mutex<HashMap<Id<UserMarker>, ActiveSession>>>,
}

impl SequenceManager {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self::with_timeout(api, SEQUENCE_TIMEOUT)
    }

    pub fn with_timeout(api: Arc<dyn ChatApi>, timeout: Duration) -> Self {
        Self {
            api,
            timeout,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a wizard for `owner` in `channel`. Returns `Ok(false)` when
    /// the owner already has an active session (session creation is a
    /// no-op then). An error from the opening prompt destroys the session
    /// and is passed back to the caller.
    pub async fn start(
        &self,
        owner: Id<UserMarker>,
        channel: Id<ChannelMarker>,
        guild: Option<Id<GuildMarker>>,
        handler: Box<dyn Sequence>,
        options: SequenceOptions,
    ) -> Result<bool, Error> {
        let ctx = Arc::new(SequenceContext {
            api: Arc::clone(&self.api),
            owner,
            channel,
            guild,
            cleanup: options.cleanup_messages.then(|| Mutex::new(Vec::new())),
        });
        let handler = Arc::new(Mutex::new(handler));
        {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(&owner) {
                debug!(owner = owner.get(), "session already active, not starting another");
                return Ok(false);
            }
            sessions.insert(
                owner,
                ActiveSession {
                    channel,
                    guild,
                    ctx: Arc::clone(&ctx),
                    handler: Arc::clone(&handler),
                    expiry: self.spawn_expiry(owner),
                },
            );
        }
        info!(owner = owner.get(), channel = channel.get(), "sequence started");

        let opening = async {
            if options.announce_start {
                ctx.send(&announcement(owner)).await?;
            }
            handler.lock().await.begin(&ctx).await
        };
        if let Err(e) = opening.await {
            info!("a sequence was terminated due to an error during initialization: {}", e);
            self.destroy(owner).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Offer an inbound message to the owner's session, if any. Accepts
    /// only when author and channel match exactly.
    pub async fn offer_message(&self, message: &MessageInfo) {
        let owner = message.author_id;
        let (ctx, handler) = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&owner) else {
                return;
            };
            if session.channel != message.channel_id {
                return;
            }
            // accepted: the pending expiry no longer applies
            session.expiry.abort();
            (Arc::clone(&session.ctx), Arc::clone(&session.handler))
        };

        ctx.track(message.message_id).await;

        if message.content == "STOP" {
            self.destroy(owner).await;
            return;
        }

        let result = handler.lock().await.on_message(message, &ctx).await;
        match result {
            Ok(SequenceStep::Continue) => {
                let mut sessions = self.sessions.lock().await;
                if let Some(session) = sessions.get_mut(&owner) {
                    session.expiry = self.spawn_expiry(owner);
                }
            }
            Ok(SequenceStep::Done) => {
                self.destroy(owner).await;
            }
            Err(e) => {
                info!("a sequence was terminated due to an error: {}", e);
                self.destroy(owner).await;
                self.report_failure(ctx.channel, owner, &e).await;
            }
        }
    }

    /// Tear down the owner's session when they leave the guild that owns
    /// it, or no longer share any guild with the bot.
    pub async fn handle_member_left(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
        mutual_guilds_remaining: usize,
    ) {
        let owns_session = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(&user)
                .map(|s| s.guild == Some(guild) || mutual_guilds_remaining == 0)
                .unwrap_or(false)
        };
        if owns_session {
            self.destroy(user).await;
        }
    }

    /// Destroy a session: cancel its timer, unregister it, and bulk-delete
    /// the collected messages (best-effort).
    pub async fn destroy(&self, owner: Id<UserMarker>) {
        let Some(session) = self.sessions.lock().await.remove(&owner) else {
            return;
        };
        session.expiry.abort();
        if let Some(cleanup) = &session.ctx.cleanup {
            let messages = std::mem::take(&mut *cleanup.lock().await);
            if !messages.is_empty() {
                if let Err(e) = self
                    .api
                    .bulk_delete_messages(session.channel, &messages)
                    .await
                {
                    warn!("failed to clean up sequence messages: {}", e);
                }
            }
        }
        debug!(owner = owner.get(), "sequence destroyed");
    }

    pub async fn is_active(&self, owner: Id<UserMarker>) -> bool {
        self.sessions.lock().await.contains_key(&owner)
    }

    fn spawn_expiry(&self, owner: Id<UserMarker>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            sleep(manager.timeout).await;
            info!(owner = owner.get(), "sequence expired");
            manager.destroy(owner).await;
        })
    }

    async fn report_failure(
        &self,
        channel: Id<ChannelMarker>,
        owner: Id<UserMarker>,
        error: &Error,
    ) {
        let text = format!(
            "<@{}> The sequence has been terminated due to an error; see the message below for more information.\n```text\n{}\n```",
            owner.get(),
            error
        );
        match self.api.send_message(channel, &text).await {
            Ok(id) => spawn_delayed_delete(Arc::clone(&self.api), channel, id),
            Err(e) => warn!("failed to report sequence error: {}", e),
        }
    }
}

fn announcement(owner: Id<UserMarker>) -> String {
    format!(
        "<@{}> You are now in a sequence. The bot will ignore all further commands as you first \
         need to complete the sequence.\n\
         To complete the sequence answer the questions or tasks given by the bot in this channel; \
         any message you send here will be used as input.\n\n\
         A sequence automatically expires after not receiving a message for 5 minutes.\n\
         You can also kill a sequence by sending \"STOP\" (case sensitive).",
        owner.get()
    )
}

fn spawn_delayed_delete(
    api: Arc<dyn ChatApi>,
    channel: Id<ChannelMarker>,
    message: Id<MessageMarker>,
) {
    tokio::spawn(async move {
        sleep(EPHEMERAL_TTL).await;
        let _ = api.delete_message(channel, message).await;
    });
}
