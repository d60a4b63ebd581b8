//! # Say Command
//!
//! `say [--voice V] <text>...`: speaks through the configured TTS program.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Arg, Command};
use std::process::Stdio;
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::config::SayConfig;
use crate::domain::error::GrammarError;
use crate::strings::{help, logs};

pub struct SayPlugin {
    player: String,
    voice: String,
}

impl SayPlugin {
    pub fn from_config(config: &SayConfig) -> Self {
        Self {
            player: config.player.clone(),
            voice: config.voice.clone(),
        }
    }

    fn arguments(&self, voice: &str, words: &[String]) -> Vec<String> {
        vec!["-v".to_string(), voice.to_string(), words.join(" ")]
    }
}

#[async_trait]
impl Plugin for SayPlugin {
    fn capability(&self) -> Capability {
        Capability::new("say", "1.0")
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let spec = Command::new("say")
            .about(help::SAY)
            .arg(
                Arg::new("voice")
                    .long("voice")
                    .default_value(self.voice.clone())
                    .help(help::SAY_VOICE),
            )
            .arg(
                Arg::new("text")
                    .required(true)
                    .num_args(1..)
                    .help(help::SAY_TEXT),
            );
        grammar.register(&["say"], spec, "say", self)
    }
}

#[async_trait]
impl CommandHandler for SayPlugin {
    async fn call(&self, _session: &Session, invocation: &Invocation) -> Result<Option<String>> {
        let voice = invocation.string("voice").unwrap_or_else(|| self.voice.clone());
        let words: Vec<String> = invocation
            .args
            .get_many::<String>("text")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        tokio::process::Command::new(&self.player)
            .args(self.arguments(&voice, &words))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.player))?;
        tracing::info!("{}", logs::player_spawned(&self.player, &voice));
        Ok(None)
    }
}
