// guardbot-core/src/coordinator.rs

use tracing::debug;

use guardbot_common::models::event::ChatEvent;

use crate::sequences::SequenceManager;
use crate::services::guild_logger::GuildLogger;
use crate::services::slow_mode::SlowModeRegistry;

/// Receives every platform event and fans it out to the interested
/// components. Each component guards its own state; delivery itself needs
/// no lock. Nothing called from here may propagate an error back into the
/// dispatcher (components contain their own failures).
pub struct ModerationCoordinator {
    guild_logger: GuildLogger,
    sequences: SequenceManager,
    slow_mode: SlowModeRegistry,
}

impl ModerationCoordinator {
    pub fn new(
        guild_logger: GuildLogger,
        sequences: SequenceManager,
        slow_mode: SlowModeRegistry,
    ) -> Self {
        Self {
            guild_logger,
            sequences,
            slow_mode,
        }
    }

    pub async fn dispatch(&self, event: ChatEvent) {
        debug!(event_type = event.event_type(), "dispatching event");

        match &event {
            ChatEvent::MessageCreated(message) => {
                self.sequences.offer_message(message).await;
                self.slow_mode.handle_message(message).await;
            }
            ChatEvent::MemberLeft {
                guild_id,
                user_id,
                mutual_guilds_remaining,
                ..
            } => {
                self.sequences
                    .handle_member_left(*guild_id, *user_id, *mutual_guilds_remaining)
                    .await;
            }
            _ => {}
        }

        self.guild_logger.handle_event(&event).await;
    }

    pub fn sequences(&self) -> &SequenceManager {
        &self.sequences
    }

    pub fn slow_mode(&self) -> &SlowModeRegistry {
        &self.slow_mode
    }

    pub fn guild_logger(&self) -> &GuildLogger {
        &self.guild_logger
    }
}
