// guardbot-core/src/sequences/log_settings.rs

use std::sync::Arc;

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};

use guardbot_common::Error;
use guardbot_common::models::event::MessageInfo;
use guardbot_common::models::settings::{LogToggle, LoggingSettings};
use guardbot_common::traits::repository_traits::LoggingSettingsRepository;

use crate::sequences::{Sequence, SequenceContext, SequenceStep};

enum State {
    Menu,
    AwaitModChannel,
    AwaitUserChannel,
}

/// Wizard adjusting a guild's logging settings: pick an action from a
/// numbered menu, then either toggle a switch or mention a log channel.
pub struct LogSettingsSequence {
    repository: Arc<dyn LoggingSettingsRepository>,
    settings: LoggingSettings,
    state: State,
}

impl LogSettingsSequence {
    pub fn new(repository: Arc<dyn LoggingSettingsRepository>, guild: Id<GuildMarker>) -> Self {
        Self {
            repository,
            settings: LoggingSettings::new(guild),
            state: State::Menu,
        }
    }

    fn menu(settings: &LoggingSettings) -> String {
        let mut menu = String::from("Enter the number of the action you'd like to perform:\n\n");
        menu.push_str(&format!(
            "0. Set the mod logging channel. Currently: {}\n",
            settings
                .mod_log_channel
                .map(|c| format!("<#{}>", c.get()))
                .unwrap_or_else(|| {
                    "None (required before other settings take effect)".to_string()
                })
        ));
        menu.push_str(&format!(
            "1. Set the user logging channel. Currently: {}\n",
            settings
                .user_log_channel
                .map(|c| format!("<#{}>", c.get()))
                .unwrap_or_else(|| "using the mod logging channel".to_string())
        ));
        for (i, toggle) in LogToggle::ALL.iter().enumerate() {
            let verb = if settings.enabled(*toggle) {
                "Disable"
            } else {
                "Enable"
            };
            menu.push_str(&format!("{}. {} {}\n", i + 2, verb, toggle.label()));
        }
        menu
    }

    async fn save_and_confirm(&self, ctx: &SequenceContext) -> Result<(), Error> {
        self.repository.save_settings(&self.settings).await?;
        ctx.send_ephemeral(&format!(
            "{} Settings successfully saved.",
            ctx.owner_mention()
        ))
        .await
    }
}

#[async_trait]
impl Sequence for LogSettingsSequence {
    async fn begin(&mut self, ctx: &SequenceContext) -> Result<(), Error> {
        self.settings = self
            .repository
            .get_settings(self.settings.guild_id)
            .await?;
        ctx.send(&Self::menu(&self.settings)).await?;
        Ok(())
    }

    async fn on_message(
        &mut self,
        message: &MessageInfo,
        ctx: &SequenceContext,
    ) -> Result<SequenceStep, Error> {
        match self.state {
            State::Menu => {
                let choice: usize = message.content.trim().parse()?;
                match choice {
                    0 => {
                        self.state = State::AwaitModChannel;
                        ctx.send(&format!(
                            "{} Please mention the channel you want to be used as moderator log.",
                            ctx.owner_mention()
                        ))
                        .await?;
                        Ok(SequenceStep::Continue)
                    }
                    1 => {
                        self.state = State::AwaitUserChannel;
                        ctx.send(&format!(
                            "{} Please mention the channel you want to be used as user log.",
                            ctx.owner_mention()
                        ))
                        .await?;
                        Ok(SequenceStep::Continue)
                    }
                    n if n - 2 < LogToggle::ALL.len() => {
                        self.settings.toggle(LogToggle::ALL[n - 2]);
                        self.save_and_confirm(ctx).await?;
                        Ok(SequenceStep::Done)
                    }
                    _ => Err(Error::UserInput(format!(
                        "please answer with a number between 0 and {}",
                        LogToggle::ALL.len() + 1
                    ))),
                }
            }
            State::AwaitModChannel => {
                self.settings.mod_log_channel = Some(parse_channel_mention(&message.content)?);
                self.save_and_confirm(ctx).await?;
                Ok(SequenceStep::Done)
            }
            State::AwaitUserChannel => {
                self.settings.user_log_channel = Some(parse_channel_mention(&message.content)?);
                self.save_and_confirm(ctx).await?;
                Ok(SequenceStep::Done)
            }
        }
    }
}

/// Parse a `<#1234>` channel mention.
fn parse_channel_mention(content: &str) -> Result<Id<ChannelMarker>, Error> {
    let raw = content
        .trim()
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| Error::UserInput("please mention exactly one channel".to_string()))?;
    let id: u64 = raw
        .parse()
        .map_err(|_| Error::UserInput("please mention exactly one channel".to_string()))?;
    Id::new_checked(id)
        .ok_or_else(|| Error::UserInput("please mention exactly one channel".to_string()))
}
