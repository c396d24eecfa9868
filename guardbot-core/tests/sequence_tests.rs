// tests/sequence_tests.rs

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use guardbot_common::Error;
use guardbot_common::models::event::MessageInfo;
use guardbot_common::models::settings::{LoggingSettings, RoleCategory};
use guardbot_common::traits::chat_api::ChatApi;
use guardbot_common::traits::repository_traits::{LoggingSettingsRepository, RoleCategoryRepository};

use guardbot_core::sequences::log_settings::LogSettingsSequence;
use guardbot_core::sequences::role_categories::AddCategorySequence;
use guardbot_core::sequences::{
    Sequence, SequenceContext, SequenceManager, SequenceOptions, SequenceStep,
};

use helpers::{
    channel, guild, message, user, MemoryLoggingSettings, MemoryRoleCategories, MockChatApi,
};

/// A wizard that records every answer; "done" completes it and "boom"
/// fails the step.
struct EchoSequence {
    answers: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Sequence for EchoSequence {
    async fn begin(&mut self, ctx: &SequenceContext) -> Result<(), Error> {
        ctx.send("Say something.").await?;
        Ok(())
    }

    async fn on_message(
        &mut self,
        message: &MessageInfo,
        ctx: &SequenceContext,
    ) -> Result<SequenceStep, Error> {
        self.answers.lock().unwrap().push(message.content.clone());
        match message.content.as_str() {
            "boom" => Err(Error::UserInput("that was not a valid answer".to_string())),
            "done" => Ok(SequenceStep::Done),
            _ => {
                ctx.send("ok").await?;
                Ok(SequenceStep::Continue)
            }
        }
    }
}

fn manager(api: &Arc<MockChatApi>) -> SequenceManager {
    SequenceManager::new(Arc::clone(api) as Arc<dyn ChatApi>)
}

async fn start_echo(manager: &SequenceManager, owner: u64) -> Arc<Mutex<Vec<String>>> {
    let answers = Arc::new(Mutex::new(Vec::new()));
    let started = manager
        .start(
            user(owner),
            channel(10),
            Some(guild(1)),
            Box::new(EchoSequence {
                answers: Arc::clone(&answers),
            }),
            SequenceOptions::default(),
        )
        .await
        .unwrap();
    assert!(started);
    answers
}

#[tokio::test]
async fn at_most_one_session_per_owner() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);

    start_echo(&manager, 100).await;
    assert!(manager.is_active(user(100)).await);

    // second start for the same owner is a no-op
    let answers = Arc::new(Mutex::new(Vec::new()));
    let started = manager
        .start(
            user(100),
            channel(11),
            Some(guild(1)),
            Box::new(EchoSequence { answers }),
            SequenceOptions::default(),
        )
        .await
        .unwrap();
    assert!(!started);

    // a different owner is fine
    start_echo(&manager, 101).await;
    assert!(manager.is_active(user(101)).await);
}

#[tokio::test]
async fn messages_from_other_channels_or_users_are_ignored() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let answers = start_echo(&manager, 100).await;

    manager.offer_message(&message(1, 100, 99, "wrong channel")).await;
    manager.offer_message(&message(2, 101, 10, "wrong user")).await;
    manager.offer_message(&message(3, 100, 10, "right")).await;

    assert_eq!(*answers.lock().unwrap(), vec!["right".to_string()]);
}

#[tokio::test]
async fn stop_destroys_the_session_and_cleans_up() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let answers = start_echo(&manager, 100).await;

    manager.offer_message(&message(1, 100, 10, "first answer")).await;
    manager.offer_message(&message(2, 100, 10, "STOP")).await;

    assert!(!manager.is_active(user(100)).await);
    // STOP never reaches the step callback
    assert_eq!(*answers.lock().unwrap(), vec!["first answer".to_string()]);

    // one bulk delete carrying the announcement, prompts, and both inbound
    // messages
    let bulk = api.bulk_deleted.lock().unwrap().clone();
    assert_eq!(bulk.len(), 1);
    let (bulk_channel, ids) = &bulk[0];
    assert_eq!(*bulk_channel, channel(10));
    assert!(ids.contains(&helpers::message_id(1)));
    assert!(ids.contains(&helpers::message_id(2)));
    assert!(ids.len() >= 4);
}

#[tokio::test(start_paused = true)]
async fn session_expires_after_five_minutes_of_silence() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    start_echo(&manager, 100).await;

    sleep(Duration::from_secs(299)).await;
    assert!(manager.is_active(user(100)).await);

    sleep(Duration::from_secs(2)).await;
    assert!(!manager.is_active(user(100)).await);
    assert_eq!(api.bulk_deleted.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn accepted_message_replaces_the_expiry_timer() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    start_echo(&manager, 100).await;

    sleep(Duration::from_secs(240)).await;
    manager.offer_message(&message(1, 100, 10, "still here")).await;

    // four more minutes since the accepted message: under the fresh timer
    sleep(Duration::from_secs(240)).await;
    assert!(manager.is_active(user(100)).await);

    sleep(Duration::from_secs(120)).await;
    assert!(!manager.is_active(user(100)).await);
}

#[tokio::test(start_paused = true)]
async fn step_error_destroys_session_and_reports() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    start_echo(&manager, 100).await;

    manager.offer_message(&message(1, 100, 10, "boom")).await;

    assert!(!manager.is_active(user(100)).await);
    let report = api
        .sent_containing("terminated due to an error")
        .expect("an error report should have been sent");
    assert!(report.content.contains("that was not a valid answer"));

    // the report deletes itself after a minute
    sleep(Duration::from_secs(61)).await;
    let deleted = api.deleted.lock().unwrap().clone();
    assert!(deleted.iter().any(|(_, m)| *m == report.id));
}

#[tokio::test]
async fn owner_leaving_the_guild_destroys_the_session() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    start_echo(&manager, 100).await;

    // leaving an unrelated guild while still sharing others: stays alive
    manager.handle_member_left(guild(2), user(100), 3).await;
    assert!(manager.is_active(user(100)).await);

    manager.handle_member_left(guild(1), user(100), 3).await;
    assert!(!manager.is_active(user(100)).await);
}

#[tokio::test]
async fn losing_all_mutual_guilds_destroys_direct_message_sessions() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);

    let answers = Arc::new(Mutex::new(Vec::new()));
    manager
        .start(
            user(100),
            channel(55),
            None,
            Box::new(EchoSequence { answers }),
            SequenceOptions {
                cleanup_messages: false,
                announce_start: false,
            },
        )
        .await
        .unwrap();

    manager.handle_member_left(guild(2), user(100), 0).await;
    assert!(!manager.is_active(user(100)).await);
    // cleanup disabled: nothing to bulk delete
    assert!(api.bulk_deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn add_category_wizard_persists_one_category() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let categories = Arc::new(MemoryRoleCategories::new());

    manager
        .start(
            user(100),
            channel(10),
            Some(guild(1)),
            Box::new(AddCategorySequence::new(
                Arc::clone(&categories) as Arc<dyn RoleCategoryRepository>,
                guild(1),
            )),
            SequenceOptions::default(),
        )
        .await
        .unwrap();

    assert!(api.sent_containing("unique category name").is_some());

    manager.offer_message(&message(1, 100, 10, "Regions")).await;
    manager.offer_message(&message(2, 100, 10, "3")).await;

    let stored = categories.stored.lock().unwrap().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Regions");
    assert_eq!(stored[0].allowed_roles, 3);
    assert!(!manager.is_active(user(100)).await);
}

#[tokio::test]
async fn duplicate_category_name_fails_the_wizard() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let categories = Arc::new(MemoryRoleCategories::new());
    categories.stored.lock().unwrap().push(RoleCategory {
        guild_id: guild(1),
        name: "Regions".to_string(),
        allowed_roles: 1,
    });

    manager
        .start(
            user(100),
            channel(10),
            Some(guild(1)),
            Box::new(AddCategorySequence::new(
                Arc::clone(&categories) as Arc<dyn RoleCategoryRepository>,
                guild(1),
            )),
            SequenceOptions::default(),
        )
        .await
        .unwrap();

    manager.offer_message(&message(1, 100, 10, "Regions")).await;

    assert!(!manager.is_active(user(100)).await);
    assert_eq!(categories.stored.lock().unwrap().len(), 1);
    assert!(api.sent_containing("already being used").is_some());
}

#[tokio::test]
async fn log_settings_wizard_toggles_a_switch() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let settings = Arc::new(MemoryLoggingSettings::new());

    manager
        .start(
            user(100),
            channel(10),
            Some(guild(1)),
            Box::new(LogSettingsSequence::new(
                Arc::clone(&settings) as Arc<dyn LoggingSettingsRepository>,
                guild(1),
            )),
            SequenceOptions::default(),
        )
        .await
        .unwrap();

    // option 3 is the "deleted messages" switch, on by default
    manager.offer_message(&message(1, 100, 10, "3")).await;

    let saved = settings.get(guild(1)).expect("settings should be saved");
    assert!(!saved.log_message_delete);
    assert!(saved.log_message_update);
    assert!(!manager.is_active(user(100)).await);
    assert!(api.sent_containing("Settings successfully saved").is_some());
}

#[tokio::test]
async fn log_settings_wizard_sets_the_mod_channel() {
    let api = Arc::new(MockChatApi::new());
    let manager = manager(&api);
    let settings = Arc::new(MemoryLoggingSettings::new());
    settings.insert(LoggingSettings::new(guild(1)));

    manager
        .start(
            user(100),
            channel(10),
            Some(guild(1)),
            Box::new(LogSettingsSequence::new(
                Arc::clone(&settings) as Arc<dyn LoggingSettingsRepository>,
                guild(1),
            )),
            SequenceOptions::default(),
        )
        .await
        .unwrap();

    manager.offer_message(&message(1, 100, 10, "0")).await;
    manager.offer_message(&message(2, 100, 10, "<#555>")).await;

    let saved = settings.get(guild(1)).unwrap();
    assert_eq!(saved.mod_log_channel, Some(channel(555)));
    assert!(!manager.is_active(user(100)).await);
}
