// guardbot-common/src/traits/log_sink.rs

use async_trait::async_trait;

use crate::error::Error;
use crate::models::log::{LogAudience, LogRecord};

/// Delivers finished log records to the configured log channels.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn log(&self, record: LogRecord, audience: LogAudience) -> Result<(), Error>;
}
