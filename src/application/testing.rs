//! Test doubles shared by the application tests: a plugin that records every
//! hook call and a room that hosts sessions on the in-process transport.

use async_trait::async_trait;
use clap::{Arg, Command};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::{Session, SessionSettings};
use crate::domain::capability::Capability;
use crate::domain::error::GrammarError;
use crate::domain::types::{ChatMessage, Presence};
use crate::infrastructure::local::LocalRoom;

pub type SharedLog = Arc<Mutex<Vec<String>>>;

/// Registers one command named after itself, `<name> <text>`, which answers
/// `text` except for the words `fail`, `panic` and `sleep`.
pub struct RecordingPlugin {
    name: String,
    log: SharedLog,
    claim: AtomicBool,
    fail_fallback: AtomicBool,
    fail_subscriber: AtomicBool,
    panic_hooks: AtomicBool,
}

impl RecordingPlugin {
    pub fn shared_log() -> SharedLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn new(name: &str, log: SharedLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log,
            claim: AtomicBool::new(false),
            fail_fallback: AtomicBool::new(false),
            fail_subscriber: AtomicBool::new(false),
            panic_hooks: AtomicBool::new(false),
        })
    }

    pub fn claiming(self: Arc<Self>) -> Arc<Self> {
        self.claim.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_fallback(self: Arc<Self>) -> Arc<Self> {
        self.fail_fallback.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_subscriber(self: Arc<Self>) -> Arc<Self> {
        self.fail_subscriber.store(true, Ordering::SeqCst);
        self
    }

    /// Every hook panics right after recording its call.
    pub fn panicking(self: Arc<Self>) -> Arc<Self> {
        self.panic_hooks.store(true, Ordering::SeqCst);
        self
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
        if self.panic_hooks.load(Ordering::SeqCst) {
            panic!("{} panics on every hook", self.name);
        }
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn capability(&self) -> Capability {
        Capability::new(self.name.clone(), "1.0")
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let name = self.name.clone();
        let spec = Command::new(name.clone())
            .about("Answers with its argument")
            .arg(Arg::new("text").required(true));
        grammar.register(&[name.as_str()], spec, &name, self)
    }

    async fn fallback(&self, _session: &Session, text: &str) -> anyhow::Result<bool> {
        self.record(format!("{}:fallback:{text}", self.name));
        if self.fail_fallback.load(Ordering::SeqCst) {
            anyhow::bail!("fallback of {} is broken", self.name);
        }
        Ok(self.claim.load(Ordering::SeqCst))
    }

    async fn got_online(&self, _session: &Session, presence: &Presence) -> anyhow::Result<()> {
        self.record(format!("{}:online:{}", self.name, presence.nick));
        Ok(())
    }

    async fn on_addressed_message(
        &self,
        _session: &Session,
        nick: &str,
        _message: &ChatMessage,
    ) -> anyhow::Result<()> {
        self.record(format!("{}:message:{nick}", self.name));
        if self.fail_subscriber.load(Ordering::SeqCst) {
            anyhow::bail!("subscriber {} is broken", self.name);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for RecordingPlugin {
    async fn call(&self, _session: &Session, invocation: &Invocation) -> anyhow::Result<Option<String>> {
        let text = invocation.string("text").unwrap_or_default();
        match text.as_str() {
            "fail" => anyhow::bail!("asked to fail"),
            "panic" => panic!("asked to panic"),
            "sleep" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            }
            _ => {
                let origin = if invocation.context.is_peer_origin() { "peer" } else { "room" };
                self.record(format!("{}:command:{text}:{origin}", self.name));
                Ok(Some(text))
            }
        }
    }
}

/// A [`LocalRoom`] named `lobby` with helpers to host sessions in it.
pub struct TestRoom {
    room: Arc<LocalRoom>,
}

impl TestRoom {
    pub fn new() -> Self {
        Self {
            room: LocalRoom::new("lobby"),
        }
    }

    pub fn room(&self) -> &Arc<LocalRoom> {
        &self.room
    }

    /// A joined session whose events are not processed; tests drive it directly.
    pub async fn session(&self, nick: &str, plugins: Vec<Arc<dyn Plugin>>) -> Session {
        let (transport, _events) = self.room.connect(nick).unwrap();
        let session = Session::bind(SessionSettings::new(nick), transport, plugins)
            .await
            .unwrap();
        session.start().await.unwrap();
        session
    }

    /// A session running its event loop.
    pub async fn spawn_session(&self, nick: &str, plugins: Vec<Arc<dyn Plugin>>) -> Session {
        let (transport, events) = self.room.connect(nick).unwrap();
        let session = Session::bind(SessionSettings::new(nick), transport, plugins)
            .await
            .unwrap();
        tokio::spawn(session.clone().run(events));
        self.settle().await;
        session
    }

    /// Lets spawned tasks drain their queues.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub fn lines_from(&self, nick: &str) -> Vec<String> {
        self.room.lines_from(nick)
    }
}
