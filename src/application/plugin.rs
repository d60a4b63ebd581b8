//! # Plugin Interface
//!
//! Every chat feature is a plugin: a static capability declaration, a
//! contribution to the command tree and a set of optional hooks. All hooks have
//! no-op defaults, so a plugin only overrides what it needs.

use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::application::grammar::CommandGrammar;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::error::GrammarError;
use crate::domain::types::{ChatMessage, Presence};

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name and version advertised to peers. Must be stable for the session.
    fn capability(&self) -> Capability;

    /// Adds this plugin's commands to the tree. Called once per session.
    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError>;

    /// Called once the session exists, e.g. to subscribe to nicknames.
    /// Plugins must not keep the session around.
    fn bind(self: Arc<Self>, _session: &Session) {}

    /// A member other than the bot came online.
    async fn got_online(&self, _session: &Session, _presence: &Presence) -> anyhow::Result<()> {
        Ok(())
    }

    /// Offered text addressed to the bot that failed to parse.
    /// Returning `true` claims it and suppresses the error message.
    async fn fallback(&self, _session: &Session, _text: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// A message addressed to a nickname this plugin subscribed to.
    async fn on_addressed_message(
        &self,
        _session: &Session,
        _nick: &str,
        _message: &ChatMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Awaits one plugin call, turning a panic into an error naming `what`.
pub(crate) async fn guarded<T>(
    what: &str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("{what} panicked")),
    }
}
