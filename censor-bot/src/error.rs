//! Process-level error type for the bot binary.
//!
//! Wraps the engine's own error type and adds the categories that only
//! make sense once there's a chat platform and a config file in the
//! picture: Telegram RPC failures, config loading, and I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Any failure surfaced by the moderation engine itself.
    #[error(transparent)]
    Censor(#[from] censor_core::Error),

    /// A Telegram Bot API call failed.
    #[error("telegram API error: {0}")]
    Telegram(String),

    /// Configuration could not be loaded, parsed, or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem or network I/O outside the above categories.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
