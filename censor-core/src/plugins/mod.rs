//! The built-in plugin set (§4.3-§4.8), modeled as a capability set plus a
//! variant enum rather than a trait-object registry: no inheritance, one
//! flat dispatch point per operation.

pub mod duplicate;
pub mod forwarded;
pub mod keyword;
pub mod llm;
pub mod pattern;
pub mod rate_limit;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};

use duplicate::DuplicatePlugin;
use forwarded::ForwardedPlugin;
use keyword::KeywordPlugin;
use llm::LlmPlugin;
use pattern::RegexPlugin;
use rate_limit::RateLimitPlugin;

/// One of the six built-in plugins. The registry holds a collection of
/// these rather than `Box<dyn Plugin>`; each variant still implements
/// `Plugin` by delegating to its inner value.
pub enum BuiltinPlugin {
    RateLimit(RateLimitPlugin),
    Keyword(KeywordPlugin),
    Regex(RegexPlugin),
    Forwarded(ForwardedPlugin),
    Duplicate(DuplicatePlugin),
    Llm(LlmPlugin),
}

#[async_trait]
impl Plugin for BuiltinPlugin {
    fn name(&self) -> &str {
        match self {
            BuiltinPlugin::RateLimit(p) => p.name(),
            BuiltinPlugin::Keyword(p) => p.name(),
            BuiltinPlugin::Regex(p) => p.name(),
            BuiltinPlugin::Forwarded(p) => p.name(),
            BuiltinPlugin::Duplicate(p) => p.name(),
            BuiltinPlugin::Llm(p) => p.name(),
        }
    }

    fn priority(&self) -> i32 {
        match self {
            BuiltinPlugin::RateLimit(p) => p.priority(),
            BuiltinPlugin::Keyword(p) => p.priority(),
            BuiltinPlugin::Regex(p) => p.priority(),
            BuiltinPlugin::Forwarded(p) => p.priority(),
            BuiltinPlugin::Duplicate(p) => p.priority(),
            BuiltinPlugin::Llm(p) => p.priority(),
        }
    }

    async fn evaluate(&self, ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        match self {
            BuiltinPlugin::RateLimit(p) => p.evaluate(ctx, msg).await,
            BuiltinPlugin::Keyword(p) => p.evaluate(ctx, msg).await,
            BuiltinPlugin::Regex(p) => p.evaluate(ctx, msg).await,
            BuiltinPlugin::Forwarded(p) => p.evaluate(ctx, msg).await,
            BuiltinPlugin::Duplicate(p) => p.evaluate(ctx, msg).await,
            BuiltinPlugin::Llm(p) => p.evaluate(ctx, msg).await,
        }
    }

    async fn cleanup(&self) {
        match self {
            BuiltinPlugin::RateLimit(p) => p.cleanup().await,
            BuiltinPlugin::Keyword(p) => p.cleanup().await,
            BuiltinPlugin::Regex(p) => p.cleanup().await,
            BuiltinPlugin::Forwarded(p) => p.cleanup().await,
            BuiltinPlugin::Duplicate(p) => p.cleanup().await,
            BuiltinPlugin::Llm(p) => p.cleanup().await,
        }
    }
}

/// Default priority for a plugin name, used when a registration omits its
/// own config override and the plugin hasn't been constructed yet.
pub fn default_priority(name: &str) -> Option<i32> {
    match name {
        "ratelimit" => Some(rate_limit::PRIORITY),
        "keyword" => Some(keyword::PRIORITY),
        "regex" => Some(pattern::PRIORITY),
        "forwarded" => Some(forwarded::PRIORITY),
        "duplicate" => Some(duplicate::PRIORITY),
        "llm" => Some(llm::PRIORITY),
        _ => None,
    }
}

/// Constructs the named built-in plugin from its config entry.
pub fn create_plugin(name: &str, config: &PluginConfigEntry) -> Result<BuiltinPlugin> {
    match name {
        "ratelimit" => Ok(BuiltinPlugin::RateLimit(RateLimitPlugin::new(config)?)),
        "keyword" => Ok(BuiltinPlugin::Keyword(KeywordPlugin::new(config)?)),
        "regex" => Ok(BuiltinPlugin::Regex(RegexPlugin::new(config)?)),
        "forwarded" => Ok(BuiltinPlugin::Forwarded(ForwardedPlugin::new(config)?)),
        "duplicate" => Ok(BuiltinPlugin::Duplicate(DuplicatePlugin::new(config)?)),
        "llm" => Ok(BuiltinPlugin::Llm(LlmPlugin::new(config)?)),
        other => Err(Error::InvalidConfig(format!("unknown plugin: {other}"))),
    }
}
