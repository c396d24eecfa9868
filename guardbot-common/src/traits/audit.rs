// guardbot-common/src/traits/audit.rs

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use crate::error::Error;
use crate::models::audit::{AuditActionType, AuditLogEntry};

/// Read access to the platform's audit trail, newest entries first.
#[async_trait]
pub trait AuditLogReader: Send + Sync {
    async fn fetch_recent_entries(
        &self,
        guild: Id<GuildMarker>,
        limit: usize,
        filter: Option<AuditActionType>,
    ) -> Result<Vec<AuditLogEntry>, Error>;
}
