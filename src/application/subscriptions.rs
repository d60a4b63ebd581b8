//! # Subscriptions
//!
//! Plugins can watch a nickname and receive room messages addressed to it
//! (`"bob: ..."`) that are not commands for the bot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::plugin::{Plugin, guarded};
use crate::application::session::Session;
use crate::domain::types::ChatMessage;
use crate::strings::{logs, messages};

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Vec<Arc<dyn Plugin>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `plugin` to the watchers of `nick`. Subscribing twice delivers twice.
    pub fn subscribe(&mut self, nick: &str, plugin: Arc<dyn Plugin>) {
        self.entries.entry(nick.to_string()).or_default().push(plugin);
    }

    /// Snapshot of the watchers of `nick`, in subscription order.
    pub fn subscribers(&self, nick: &str) -> Vec<Arc<dyn Plugin>> {
        self.entries.get(nick).cloned().unwrap_or_default()
    }

}

/// Runs every subscriber's hook in order. A failing or panicking subscriber
/// is logged and reported to the room on its own; the rest still run.
pub async fn deliver(
    session: &Session,
    subscribers: &[Arc<dyn Plugin>],
    nick: &str,
    message: &ChatMessage,
) {
    for plugin in subscribers {
        let name = plugin.capability().name;
        let hook = plugin.on_addressed_message(session, nick, message);
        if let Err(err) = guarded(&format!("subscriber {name}"), hook).await {
            tracing::error!("{}", logs::subscriber_failed(&name, nick, &format!("{err:#}")));
            session.write(messages::subscriber_failed(&name, &err.to_string())).await;
        }
    }
}
