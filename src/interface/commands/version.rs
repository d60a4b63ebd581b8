//! # Version Command
//!
//! `version`: prints the bot version and every bound capability.

use anyhow::Result;
use async_trait::async_trait;
use clap::Command;
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::error::GrammarError;
use crate::strings::{help, messages};

pub struct VersionPlugin;

#[async_trait]
impl Plugin for VersionPlugin {
    fn capability(&self) -> Capability {
        Capability::new("version", env!("CARGO_PKG_VERSION"))
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let spec = Command::new("version").about(help::VERSION);
        grammar.register(&["version"], spec, "version", self)
    }
}

#[async_trait]
impl CommandHandler for VersionPlugin {
    async fn call(&self, session: &Session, _invocation: &Invocation) -> Result<Option<String>> {
        let mut lines = vec![messages::version_line(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )];
        lines.extend(
            session
                .capabilities()
                .iter()
                .map(|c| messages::version_line(&c.name, &c.version)),
        );

        let text = lines.join("\n");
        session.write(&text).await;
        Ok(Some(text))
    }
}
