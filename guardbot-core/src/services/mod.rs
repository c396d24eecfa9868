// guardbot-core/src/services/mod.rs

pub mod guild_logger;
pub mod slow_mode;

pub use guild_logger::GuildLogger;
pub use slow_mode::SlowModeRegistry;
