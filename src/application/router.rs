//! # Command Router
//!
//! Decides whether a room line is a command for this bot, runs it through the
//! command grammar and the resolved handler, and turns every failure into chat
//! output: parse errors give message plus usage (unless a plugin's fallback
//! claims the text), handler faults give one generic line while the details go
//! to the operator log.

use regex::Regex;
use std::sync::LazyLock;

use crate::application::grammar::{CommandParser, ParseFailure, ParseOutcome};
use crate::application::plugin::guarded;
use crate::application::session::Session;
use crate::domain::types::MessageContext;
use crate::strings::{logs, messages};

static ADDRESSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^ :]+):").expect("addressing regex is valid"));

/// How a room line relates to this bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing<'a> {
    /// `"<botNick>: rest"`, carries `rest`.
    Command(&'a str),
    /// `"<otherNick>: ..."`.
    Nick(&'a str),
    Ignored,
}

pub fn classify<'a>(own_nick: &str, body: &'a str) -> Addressing<'a> {
    if let Some(rest) = body.strip_prefix(own_nick).and_then(|r| r.strip_prefix(':')) {
        return Addressing::Command(rest.trim());
    }
    match ADDRESSED.captures(body).and_then(|caps| caps.get(1)) {
        Some(nick) => Addressing::Nick(nick.as_str()),
        None => Addressing::Ignored,
    }
}

/// What happened to one command line.
#[derive(Debug)]
pub enum Execution {
    Completed(Option<String>),
    /// Help was shown.
    Aborted,
    Rejected(ParseFailure),
    Faulted(anyhow::Error),
}

pub struct CommandRouter {
    parser: CommandParser,
}

impl CommandRouter {
    pub fn new(parser: CommandParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    /// Parses and runs `text` without any chat-side error reporting.
    /// Help text produced by the parse is written to the room.
    pub async fn execute(&self, session: &Session, text: &str, context: MessageContext) -> Execution {
        let mut help = Vec::new();
        let invocation = match self.parser.parse_line(text, context, &mut help) {
            ParseOutcome::Invocation(invocation) => invocation,
            ParseOutcome::Abort => {
                for chunk in help {
                    session.write(chunk).await;
                }
                return Execution::Aborted;
            }
            ParseOutcome::Failure(failure) => return Execution::Rejected(failure),
        };

        tracing::info!(
            "Router dispatching cmd='{}' sender='{}' peer_origin={}",
            invocation.command(),
            invocation.context.sender,
            invocation.context.is_peer_origin()
        );

        let handler = invocation.node.handler();
        let what = format!("handler for '{}'", invocation.command());
        match guarded(&what, handler.call(session, &invocation)).await {
            Ok(result) => Execution::Completed(result),
            Err(err) => Execution::Faulted(err),
        }
    }

    /// Runs a room command and reports every failure to the room.
    pub async fn dispatch(&self, session: &Session, text: &str, context: MessageContext) {
        match self.execute(session, text, context).await {
            Execution::Completed(_) | Execution::Aborted => {}
            Execution::Rejected(failure) => {
                if !self.offer_fallbacks(session, text).await {
                    session.write(failure.to_string()).await;
                }
            }
            Execution::Faulted(err) => {
                tracing::error!("{}", logs::handler_failed(text, &format!("{err:?}")));
                session.write(messages::HANDLER_FAULT).await;
            }
        }
    }

    /// Offers unparsed text to each plugin in registration order. Returns
    /// whether one of them claimed it.
    async fn offer_fallbacks(&self, session: &Session, text: &str) -> bool {
        for plugin in session.plugins() {
            let name = plugin.capability().name;
            match guarded(&format!("fallback of {name}"), plugin.fallback(session, text)).await {
                Ok(true) => {
                    tracing::debug!("Fallback claimed by {name}");
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        "{}",
                        logs::fallback_failed(&name, &format!("{err:#}"))
                    );
                }
            }
        }
        false
    }
}
