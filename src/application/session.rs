//! # Session
//!
//! Composition root of one bot instance. Owns the plugins, the capability
//! registry, the command router, the subscription registry, the peer directory
//! and the pending forwards, and is the only place that mutates them.
//! Cloning a `Session` clones a handle, not the state.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::application::federation::{self, PendingRequests};
use crate::application::grammar::CommandGrammar;
use crate::application::peers::{Peer, PeerDirectory};
use crate::application::plugin::{Plugin, guarded};
use crate::application::router::{Addressing, CommandRouter, classify};
use crate::application::subscriptions::{self, SubscriptionRegistry};
use crate::domain::capability::{Capability, CapabilityRegistry};
use crate::domain::error::TransportError;
use crate::domain::traits::Transport;
use crate::domain::types::{ChatMessage, MessageContext, Presence, TransportEvent};
use crate::interface::commands;
use crate::strings::{help, logs};

/// Per-instance settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub nick: String,
    /// Deadline plugins use for forwards unless they pick their own.
    pub forward_timeout: Duration,
}

impl SessionSettings {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            forward_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    settings: SessionSettings,
    room: String,
    transport: Arc<dyn Transport>,
    plugins: Vec<Arc<dyn Plugin>>,
    capabilities: CapabilityRegistry,
    router: CommandRouter,
    subscriptions: Mutex<SubscriptionRegistry>,
    peers: Mutex<PeerDirectory>,
    pending: Mutex<PendingRequests>,
}

impl Session {
    /// Binds the built-in plugins followed by `plugins`, builds the command
    /// tree once and publishes the capability list to the transport.
    pub async fn bind(
        settings: SessionSettings,
        transport: Arc<dyn Transport>,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Result<Self> {
        let mut all = commands::builtins();
        all.extend(plugins);

        let mut capabilities = CapabilityRegistry::new();
        let mut grammar = CommandGrammar::new(format!("{}:", settings.nick), help::ABOUT);
        for plugin in &all {
            let capability = plugin.capability();
            capabilities
                .register(capability.clone())
                .with_context(|| format!("Failed to bind plugin {capability}"))?;
            plugin
                .clone()
                .register(&mut grammar)
                .with_context(|| format!("Failed to register commands of {capability}"))?;
        }

        let session = Self {
            inner: Arc::new(SessionInner {
                room: transport.room(),
                settings,
                transport,
                plugins: all,
                capabilities,
                router: CommandRouter::new(grammar.build()),
                subscriptions: Mutex::new(SubscriptionRegistry::new()),
                peers: Mutex::new(PeerDirectory::new()),
                pending: Mutex::new(PendingRequests::new()),
            }),
        };

        for plugin in session.plugins() {
            plugin.clone().bind(&session);
        }

        session
            .inner
            .transport
            .advertise(
                vec![federation::PEERING_FEATURE.to_string()],
                federation::PEERING_FEATURE,
                session.inner.capabilities.items(),
            )
            .await
            .context("Failed to advertise capabilities")?;

        tracing::info!("{}", logs::session_bound(session.nick(), &session.inner.capabilities.items()));
        Ok(session)
    }

    pub fn nick(&self) -> &str {
        &self.inner.settings.nick
    }

    pub fn room(&self) -> &str {
        &self.inner.room
    }

    pub fn forward_timeout(&self) -> Duration {
        self.inner.settings.forward_timeout
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.inner.plugins
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.inner.capabilities
    }

    pub fn router(&self) -> &CommandRouter {
        &self.inner.router
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub(crate) fn peer_directory(&self) -> &Mutex<PeerDirectory> {
        &self.inner.peers
    }

    pub(crate) fn pending(&self) -> &Mutex<PendingRequests> {
        &self.inner.pending
    }

    /// Sends a line to the room. Transport failures are logged, not returned.
    pub async fn write(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if let Err(err) = self.inner.transport.send_room(text).await {
            tracing::error!("{}", logs::write_failed(self.nick(), &err.to_string()));
        }
    }

    /// Routes messages addressed to `nick` to `plugin`.
    pub fn subscribe(&self, nick: &str, plugin: Arc<dyn Plugin>) {
        self.inner.subscriptions.lock().subscribe(nick, plugin);
    }

    /// Known peers, optionally only those supporting `filter`.
    pub fn get_peers(&self, filter: Option<&Capability>) -> Vec<Peer> {
        self.inner.peers.lock().snapshot(filter)
    }

    pub fn peer(&self, nick: &str) -> Option<Peer> {
        self.inner.peers.lock().get(nick).cloned()
    }

    pub async fn members(&self) -> Result<Vec<String>, TransportError> {
        self.inner.transport.members().await
    }

    /// Joins the room under the session nick.
    pub async fn start(&self) -> Result<()> {
        self.inner
            .transport
            .join(self.nick())
            .await
            .with_context(|| format!("Failed to join {} as {}", self.room(), self.nick()))?;
        tracing::info!("{}", logs::joined(self.room(), self.nick()));
        Ok(())
    }

    /// Joins the room and processes transport events until the channel closes.
    /// Every event runs as its own task, so a handler waiting on a peer reply
    /// does not hold up the reply itself.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> Result<()> {
        self.start().await?;
        while let Some(event) = events.recv().await {
            let session = self.clone();
            tokio::spawn(async move { session.handle_event(event).await });
        }
        tracing::info!("{}", logs::session_closed(self.nick()));
        Ok(())
    }

    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.handle_message(message).await,
            TransportEvent::Online(presence) => self.got_online(presence).await,
            TransportEvent::Offline { nick } => self.forget_peer(&nick),
            TransportEvent::Stanza(envelope) => self.handle_stanza(envelope).await,
        }
    }

    pub async fn handle_message(&self, message: ChatMessage) {
        if message.from == self.nick() {
            return;
        }
        match classify(self.nick(), &message.body) {
            Addressing::Command(text) => {
                let context = MessageContext::room(message.from.clone(), message.body.clone());
                self.inner.router.dispatch(self, text, context).await;
            }
            Addressing::Nick(nick) => {
                let subscribers = self.inner.subscriptions.lock().subscribers(nick);
                subscriptions::deliver(self, &subscribers, nick, &message).await;
            }
            Addressing::Ignored => {}
        }
    }

    async fn got_online(&self, presence: Presence) {
        if presence.nick == self.nick() {
            return;
        }
        tracing::info!("{}", logs::got_online(&presence.nick));
        let round = self.reset_peer(&presence);
        for plugin in self.plugins() {
            let name = plugin.capability().name;
            let hook = plugin.got_online(self, &presence);
            if let Err(err) = guarded(&format!("got_online of {name}"), hook).await {
                tracing::error!("{}", logs::hook_failed(&name, "got_online", &format!("{err:#}")));
            }
        }
        if let Some(round) = round {
            self.discover_peer(round, &presence).await;
        }
    }
}
