// guardbot-common/src/models/log.rs

use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};

/// Which log channel a record is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAudience {
    Moderator,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColor {
    Red,
    Green,
    Yellow,
    LightBlue,
}

#[derive(Debug, Clone)]
pub struct LogField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A formatted moderation log record. Rendering it for the wire is the
/// sink's job; the core only fills in the data.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub guild_id: Id<GuildMarker>,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<LogField>,
    pub color: LogColor,
    pub associated_user: Option<(Id<UserMarker>, String)>,
    pub timestamp: DateTime<Utc>,
    /// Raw transcript bytes attached to the record (bulk deletes).
    pub payload: Option<Vec<u8>>,
}

impl LogRecord {
    pub fn new(guild_id: Id<GuildMarker>, title: impl Into<String>, color: LogColor) -> Self {
        Self {
            guild_id,
            title: title.into(),
            description: None,
            fields: Vec::new(),
            color,
            associated_user: None,
            timestamp: Utc::now(),
            payload: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(LogField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn user(mut self, user_id: Id<UserMarker>, name: impl Into<String>) -> Self {
        self.associated_user = Some((user_id, name.into()));
        self
    }

    pub fn payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = Some(bytes);
        self
    }

    /// Look up a field by name, mostly useful in tests and sinks.
    pub fn find_field(&self, name: &str) -> Option<&LogField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
