//! # Censor Bot
//!
//! The binary crate wrapping the moderation engine ([`censor_core`]) into a
//! runnable Telegram bot: YAML configuration, a Prometheus metrics surface,
//! the Telegram Bot API client, and the action pipeline that turns plugin
//! decisions into delete/notify/ban side effects.
//!
//! ## Quick Start
//!
//! ```no_run
//! use censor_bot::config::Config;
//!
//! # async fn run() -> censor_bot::error::Result<()> {
//! let config = Config::load("config.yaml")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — YAML configuration, environment overrides, validation.
//! - [`error`] — the process-level error type.
//! - [`metrics`] — the Prometheus text collector implementing
//!   [`censor_core::MetricsSink`].
//! - [`platform`] — the `ChatClient` boundary and its Telegram implementation.
//! - [`pipeline`] — turns a plugin-manager decision into platform side effects.
//! - [`server`] — the `/health` and `/metrics` HTTP server.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod server;

pub use error::{Error, Result};
