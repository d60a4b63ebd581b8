//! # Fortune Command
//!
//! `fortune`: a random sentence from the dictionary. Also answers any
//! unparsed question addressed to the bot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Command;
use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::config::FortuneConfig;
use crate::domain::error::GrammarError;
use crate::strings::help;

const BUILTIN: &[&str] = &[
    "C'est pas faux.",
    "Le gras, c'est la vie.",
    "Faut pas respirer la compote, ça fait tousser.",
    "On en a gros !",
    "Qu'est-ce que c'est que ce bordel ?",
];

pub struct FortunePlugin {
    sentences: Vec<String>,
}

impl FortunePlugin {
    pub fn new(sentences: Vec<String>) -> Result<Self> {
        if sentences.is_empty() {
            anyhow::bail!("fortune dictionary is empty");
        }
        Ok(Self { sentences })
    }

    pub fn from_config(config: &FortuneConfig) -> Result<Self> {
        let sentences = match &config.dictionary {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read fortune dictionary {path}"))?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            None => BUILTIN.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(sentences)
    }

    fn pick(&self) -> String {
        self.sentences
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Plugin for FortunePlugin {
    fn capability(&self) -> Capability {
        Capability::new("fortune", "1.0")
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let spec = Command::new("fortune").about(help::FORTUNE);
        grammar.register(&["fortune"], spec, "fortune", self)
    }

    async fn fallback(&self, session: &Session, text: &str) -> Result<bool> {
        if !text.trim_end().ends_with('?') {
            return Ok(false);
        }
        session.write(self.pick()).await;
        Ok(true)
    }
}

#[async_trait]
impl CommandHandler for FortunePlugin {
    async fn call(&self, session: &Session, _invocation: &Invocation) -> Result<Option<String>> {
        let sentence = self.pick();
        session.write(&sentence).await;
        Ok(Some(sentence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::TestRoom;
    use crate::domain::types::ChatMessage;
    use std::io::Write;

    #[test]
    fn test_dictionary_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first\n\n  second  ").unwrap();
        let plugin = FortunePlugin::from_config(&FortuneConfig {
            dictionary: Some(file.path().display().to_string()),
        })
        .unwrap();
        assert_eq!(plugin.sentences, vec!["first".to_string(), "second".to_string()]);
        assert!(FortunePlugin::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_questions_are_claimed() {
        let plugin = Arc::new(FortunePlugin::new(vec!["only one".into()]).unwrap());
        let room = TestRoom::new();
        let session = room.session("storm", vec![plugin]).await;

        session
            .handle_message(ChatMessage::new("alice", "storm: will it rain tomorrow?"))
            .await;
        session.handle_message(ChatMessage::new("alice", "storm: fortune")).await;

        assert_eq!(room.lines_from("storm"), vec!["only one".to_string(), "only one".to_string()]);
    }

    #[tokio::test]
    async fn test_statements_are_not_claimed() {
        let plugin = Arc::new(FortunePlugin::new(vec!["only one".into()]).unwrap());
        let room = TestRoom::new();
        let session = room.session("storm", vec![plugin]).await;

        session.handle_message(ChatMessage::new("alice", "storm: blah blah")).await;

        let lines = room.lines_from("storm");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("usage:"));
    }
}
