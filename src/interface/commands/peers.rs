//! # Peers Command
//!
//! `peers [plugin] [--min-version V]`: lists the sibling instances this bot
//! knows about, optionally only those providing a plugin.

use anyhow::Result;
use async_trait::async_trait;
use clap::{Arg, Command};
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::error::GrammarError;
use crate::strings::{help, messages};

pub struct PeersPlugin;

#[async_trait]
impl Plugin for PeersPlugin {
    fn capability(&self) -> Capability {
        Capability::new("peers", env!("CARGO_PKG_VERSION"))
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let spec = Command::new("peers")
            .about(help::PEERS)
            .arg(Arg::new("plugin").help(help::PEERS_CAPABILITY))
            .arg(
                Arg::new("min-version")
                    .long("min-version")
                    .default_value("0")
                    .help(help::PEERS_MIN_VERSION),
            );
        grammar.register(&["peers"], spec, "peers", self)
    }
}

#[async_trait]
impl CommandHandler for PeersPlugin {
    async fn call(&self, session: &Session, invocation: &Invocation) -> Result<Option<String>> {
        let filter = invocation.string("plugin").map(|name| {
            let min = invocation.string("min-version").unwrap_or_else(|| "0".to_string());
            Capability::new(name, min)
        });

        let peers = session.get_peers(filter.as_ref());
        let text = if peers.is_empty() {
            messages::NO_PEERS.to_string()
        } else {
            peers
                .iter()
                .map(|peer| messages::peer_line(&peer.nick, &peer.capabilities()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        session.write(&text).await;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use crate::application::testing::{RecordingPlugin, TestRoom};
    use crate::domain::types::ChatMessage;
    use crate::strings::messages;

    #[tokio::test]
    async fn test_no_peers() {
        let room = TestRoom::new();
        let session = room.session("storm", vec![]).await;

        session.handle_message(ChatMessage::new("alice", "storm: peers")).await;

        assert_eq!(room.lines_from("storm"), vec![messages::NO_PEERS.to_string()]);
    }

    #[tokio::test]
    async fn test_filter_by_plugin_and_version() {
        let room = TestRoom::new();
        let log = RecordingPlugin::shared_log();
        let storm = room.spawn_session("storm", vec![]).await;
        let _stormy = room
            .spawn_session("stormy", vec![RecordingPlugin::new("echo", log.clone())])
            .await;
        let _stormz = room.spawn_session("stormz", vec![]).await;
        room.settle().await;

        storm.handle_message(ChatMessage::new("alice", "storm: peers echo")).await;
        storm
            .handle_message(ChatMessage::new("alice", "storm: peers echo --min-version 2.0"))
            .await;

        let lines = room.lines_from("storm");
        assert_eq!(lines.len(), 2, "{lines:?}");
        assert!(lines[0].starts_with("stormy:"));
        assert!(lines[0].contains("echo 1.0"));
        assert!(!lines[0].contains("stormz"));
        assert_eq!(lines[1], messages::NO_PEERS);
    }
}
