// guardbot-core/src/services/slow_mode.rs
//
// Per-channel spam rate limiting. A member exceeding the message
// threshold inside one reset window loses write permission for the
// configured mute time, then gets their previous override state back
// exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, UserMarker};

use guardbot_common::Error;
use guardbot_common::models::event::MessageInfo;
use guardbot_common::models::settings::SlowModeSettings;
use guardbot_common::traits::chat_api::{ChatApi, WriteOverride};
use guardbot_common::traits::repository_traits::SlowModeSettingsRepository;

/// How long a disable waits for in-flight reset/restore tasks before
/// force-cancelling them.
pub const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(6);

/// Rolling state for one member in one rate-limited channel.
struct RateWindow {
    count: u32,
    muted: bool,
    /// Override state captured when the window was created, restored
    /// exactly when the mute ends.
    prior: WriteOverride,
    /// The reset task, replaced by the restore task on mute.
    timer: Option<JoinHandle<()>>,
}

/// One controller per channel with slow mode enabled. A cheap-to-clone
/// handle; the window map is the single point of mutation for the
/// channel, so counting, muting, and restoring are serialized per member.
#[derive(Clone)]
pub struct SlowModeChannel {
    api: Arc<dyn ChatApi>,
    self_user: Id<UserMarker>,
    config: Arc<SlowModeSettings>,
    windows: Arc<Mutex<HashMap<Id<UserMarker>, RateWindow>>>,
}

impl SlowModeChannel {
    fn new(api: Arc<dyn ChatApi>, self_user: Id<UserMarker>, config: SlowModeSettings) -> Self {
        Self {
            api,
            self_user,
            config: Arc::new(config),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SlowModeSettings {
        &self.config
    }

    async fn on_message(&self, message: &MessageInfo) {
        if message.author_is_bot
            || message.author_id == self.self_user
            || message.author_can_manage_messages
            || self.config.exempt_users.contains(&message.author_id)
        {
            return;
        }

        let user = message.author_id;
        let mut windows = self.windows.lock().await;
        if let Some(window) = windows.get_mut(&user) {
            if window.muted {
                return;
            }
            window.count += 1;
            if window.count >= self.config.threshold {
                self.mute(&mut windows, user).await;
            }
            return;
        }

        // First message in an idle window: snapshot the override state
        // now so the restore can reproduce it exactly. If the snapshot
        // cannot be read the member is left alone (fail-open).
        let prior = match self.api.write_override(self.config.channel_id, user).await {
            Ok(prior) => prior,
            Err(e) => {
                warn!(
                    user = user.get(),
                    channel = self.config.channel_id.get(),
                    "could not snapshot permission override: {}",
                    e
                );
                return;
            }
        };
        windows.insert(
            user,
            RateWindow {
                count: 1,
                muted: false,
                prior,
                timer: Some(self.spawn_reset(user)),
            },
        );
        if self.config.threshold <= 1 {
            self.mute(&mut windows, user).await;
        }
    }

    /// Revoke write permission and swap the reset task for a restore
    /// task. On failure the member stays unmuted and the reset task keeps
    /// running (fail-open); the failure is reported, not retried.
    async fn mute(
        &self,
        windows: &mut HashMap<Id<UserMarker>, RateWindow>,
        user: Id<UserMarker>,
    ) {
        let Some(window) = windows.get_mut(&user) else {
            return;
        };
        match self
            .api
            .set_write_override(
                self.config.channel_id,
                user,
                WriteOverride::Deny,
                "slow mode: mute",
            )
            .await
        {
            Ok(()) => {
                window.muted = true;
                if let Some(reset) = window.timer.take() {
                    reset.abort();
                }
                window.timer = Some(self.spawn_restore(user));
                info!(
                    user = user.get(),
                    channel = self.config.channel_id.get(),
                    "muted for spamming"
                );
            }
            Err(e) => {
                warn!(
                    user = user.get(),
                    channel = self.config.channel_id.get(),
                    "failed to mute: {}",
                    e
                );
            }
        }
    }

    fn spawn_reset(&self, user: Id<UserMarker>) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(channel.config.threshold_reset_secs)).await;
            let mut windows = channel.windows.lock().await;
            if windows.get(&user).is_some_and(|w| !w.muted) {
                windows.remove(&user);
            }
        })
    }

    fn spawn_restore(&self, user: Id<UserMarker>) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(channel.config.mute_secs)).await;
            channel.restore(user).await;
        })
    }

    /// Reapply the snapshot exactly and drop the window.
    async fn restore(&self, user: Id<UserMarker>) {
        let prior = {
            let mut windows = self.windows.lock().await;
            match windows.remove(&user) {
                Some(window) => window.prior,
                None => return,
            }
        };
        if let Err(e) = self
            .api
            .set_write_override(
                self.config.channel_id,
                user,
                prior,
                "slow mode: remove mute",
            )
            .await
        {
            warn!(
                user = user.get(),
                channel = self.config.channel_id.get(),
                "failed to restore permission override: {}",
                e
            );
        }
    }

    /// Two-phase shutdown: wait for in-flight reset/restore tasks up to
    /// [`GRACEFUL_SHUTDOWN`], then force-cancel the stragglers.
    async fn shut_down(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut windows = self.windows.lock().await;
            windows
                .values_mut()
                .filter_map(|window| window.timer.take())
                .collect()
        };
        let deadline = Instant::now() + GRACEFUL_SHUTDOWN;
        for mut handle in handles {
            if timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        self.windows.lock().await.clear();
    }
}

/// Registry of active slow-mode controllers, at most one per channel.
#[derive(Clone)]
pub struct SlowModeRegistry {
    api: Arc<dyn ChatApi>,
    self_user: Id<UserMarker>,
    repository: Arc<dyn SlowModeSettingsRepository>,
    channels: Arc<Mutex<HashMap<Id<ChannelMarker>, SlowModeChannel>>>,
}

impl SlowModeRegistry {
    pub fn new(
        api: Arc<dyn ChatApi>,
        self_user: Id<UserMarker>,
        repository: Arc<dyn SlowModeSettingsRepository>,
    ) -> Self {
        Self {
            api,
            self_user,
            repository,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Enable slow mode on a channel using its stored configuration, or
    /// the defaults when none is stored. Fails when the channel already
    /// has a controller.
    pub async fn enable(&self, channel: Id<ChannelMarker>) -> Result<(), Error> {
        let config = match self.repository.get_config(channel).await {
            Ok(Some(config)) => config,
            Ok(None) => SlowModeSettings::with_defaults(channel),
            Err(e) => {
                warn!(
                    channel = channel.get(),
                    "failed to load slow mode config, using defaults: {}", e
                );
                SlowModeSettings::with_defaults(channel)
            }
        };
        self.enable_with(config).await
    }

    /// Enable slow mode with an explicit configuration.
    pub async fn enable_with(&self, config: SlowModeSettings) -> Result<(), Error> {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(&config.channel_id) {
            return Err(Error::Platform(format!(
                "slow mode already enabled on channel {}",
                config.channel_id
            )));
        }
        info!(
            channel = config.channel_id.get(),
            threshold = config.threshold,
            "slow mode enabled"
        );
        channels.insert(
            config.channel_id,
            SlowModeChannel::new(Arc::clone(&self.api), self.self_user, config),
        );
        Ok(())
    }

    /// Disable a channel's controller: unhook it so no further messages
    /// are processed, then drain its timers. Returns false when the
    /// channel had no controller.
    pub async fn disable(&self, channel: Id<ChannelMarker>) -> bool {
        let controller = self.channels.lock().await.remove(&channel);
        match controller {
            Some(controller) => {
                controller.shut_down().await;
                info!(channel = channel.get(), "slow mode disabled");
                true
            }
            None => false,
        }
    }

    pub async fn is_enabled(&self, channel: Id<ChannelMarker>) -> bool {
        self.channels.lock().await.contains_key(&channel)
    }

    /// Route a channel message to its controller, if any.
    pub async fn handle_message(&self, message: &MessageInfo) {
        let controller = {
            let channels = self.channels.lock().await;
            channels.get(&message.channel_id).cloned()
        };
        if let Some(controller) = controller {
            debug!(
                channel = message.channel_id.get(),
                user = message.author_id.get(),
                "slow mode counting message"
            );
            controller.on_message(message).await;
        }
    }
}
