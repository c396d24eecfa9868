// guardbot-common/src/models/audit.rs

use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

/// Audit-log action kinds the correlator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditActionType {
    MessageDelete,
    MemberKick,
    MemberBanAdd,
    MemberBanRemove,
    MemberUpdate,
}

/// One entry from the platform's audit trail, newest entries first when
/// fetched through [`crate::traits::audit::AuditLogReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub id: u64,
    pub action: AuditActionType,
    /// The affected user (message author for deletes, member for the rest).
    pub target_id: u64,
    pub actor_id: Id<UserMarker>,
    pub reason: Option<String>,
    /// The platform folds rapid identical actions into one entry and bumps
    /// this counter instead of appending a new entry.
    pub repeat_count: Option<u32>,
}
