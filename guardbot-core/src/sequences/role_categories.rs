// guardbot-core/src/sequences/role_categories.rs

use std::sync::Arc;

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use guardbot_common::Error;
use guardbot_common::models::event::MessageInfo;
use guardbot_common::models::settings::RoleCategory;
use guardbot_common::traits::repository_traits::RoleCategoryRepository;

use crate::sequences::{Sequence, SequenceContext, SequenceStep};

enum State {
    AwaitName,
    AwaitLimit { name: String },
}

/// Wizard creating a self-assignable role category: asks for a unique
/// name, then for the number of roles a member may take from it.
pub struct AddCategorySequence {
    repository: Arc<dyn RoleCategoryRepository>,
    guild: Id<GuildMarker>,
    state: State,
}

impl AddCategorySequence {
    pub fn new(repository: Arc<dyn RoleCategoryRepository>, guild: Id<GuildMarker>) -> Self {
        Self {
            repository,
            guild,
            state: State::AwaitName,
        }
    }
}

#[async_trait]
impl Sequence for AddCategorySequence {
    async fn begin(&mut self, ctx: &SequenceContext) -> Result<(), Error> {
        ctx.send("Please enter a unique category name.").await?;
        Ok(())
    }

    async fn on_message(
        &mut self,
        message: &MessageInfo,
        ctx: &SequenceContext,
    ) -> Result<SequenceStep, Error> {
        match &self.state {
            State::AwaitName => {
                let name = message.content.trim().to_string();
                if name.is_empty() {
                    return Err(Error::UserInput("the category name cannot be empty".to_string()));
                }
                if self.repository.category_exists(self.guild, &name).await? {
                    return Err(Error::UserInput(
                        "the name you provided is already being used".to_string(),
                    ));
                }
                self.state = State::AwaitLimit { name };
                ctx.send(
                    "Please enter how many roles a user can have from this category. \
                     Use 0 for unlimited.",
                )
                .await?;
                Ok(SequenceStep::Continue)
            }
            State::AwaitLimit { name } => {
                let allowed_roles: u32 = message.content.trim().parse()?;
                self.repository
                    .create_category(&RoleCategory {
                        guild_id: self.guild,
                        name: name.clone(),
                        allowed_roles,
                    })
                    .await?;
                ctx.send_ephemeral(&format!(
                    "{} Successfully added new category.",
                    ctx.owner_mention()
                ))
                .await?;
                Ok(SequenceStep::Done)
            }
        }
    }
}
