//! # Federation
//!
//! Sibling instances in the same room find each other through the transport's
//! discovery queries, exchange their `name#version` capability lists and
//! forward commands to each other as correlated request/reply stanzas.
//!
//! A forwarded command is replayed on the receiving side through the same
//! router as a room command, tagged with a peer origin so handlers do not
//! forward it again.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::application::peers::{DiscoveryRound, Peer};
use crate::application::router::Execution;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::error::{PeerError, TransportError};
use crate::domain::types::{
    CommandPayload, Envelope, ErrorCondition, MessageContext, Presence, Reply, RequestId, Stanza,
};
use crate::strings::{logs, messages};

/// Discovery feature and item node advertised by every instance.
pub const PEERING_FEATURE: &str = "urn:x-squall:peering:1";

/// Siblings share a nick stem: one nick is a prefix of the other.
pub fn is_peer_candidate(own: &str, other: &str) -> bool {
    !other.is_empty() && own != other && (own.starts_with(other) || other.starts_with(own))
}

type ReplySender = oneshot::Sender<Result<Reply, PeerError>>;

struct PendingRequest {
    peer: String,
    reply: ReplySender,
}

/// Forwards awaiting a reply, keyed by request id.
///
/// Every entry leaves the map exactly once: resolved by a reply, released on
/// timeout, or failed because its peer went away.
#[derive(Default)]
pub struct PendingRequests {
    last_id: RequestId,
    entries: HashMap<RequestId, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, peer: &str) -> (RequestId, oneshot::Receiver<Result<Reply, PeerError>>) {
        self.last_id += 1;
        let (reply, receiver) = oneshot::channel();
        self.entries.insert(
            self.last_id,
            PendingRequest {
                peer: peer.to_string(),
                reply,
            },
        );
        (self.last_id, receiver)
    }

    /// Completes request `id` if `from` is the peer it was sent to.
    /// Returns `false` for unknown ids and mismatched senders, which leave the
    /// entry untouched.
    pub fn resolve(&mut self, id: RequestId, from: &str, outcome: Result<Reply, PeerError>) -> bool {
        match self.entries.get(&id) {
            Some(pending) if pending.peer == from => {}
            _ => return false,
        }
        match self.entries.remove(&id) {
            Some(pending) => {
                // The waiter may have given up already.
                let _ = pending.reply.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drops request `id` without answering it.
    pub fn release(&mut self, id: RequestId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Fails every request sent to `nick` with [`PeerError::PeerReset`].
    pub fn fail_peer(&mut self, nick: &str) -> usize {
        let ids: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, pending)| pending.peer == nick)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(pending) = self.entries.remove(id) {
                let _ = pending.reply.send(Err(PeerError::PeerReset(nick.to_string())));
            }
        }
        ids.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Session {
    /// Invalidates what was known about a sibling that just came online and
    /// opens a discovery round for it. Its old record and pending forwards are
    /// dropped here, before any plugin hears about the presence. `None` for
    /// members that cannot be peers.
    pub(crate) fn reset_peer(&self, presence: &Presence) -> Option<DiscoveryRound> {
        if !is_peer_candidate(self.nick(), &presence.nick) {
            return None;
        }

        let round = self.peer_directory().lock().begin_discovery(&presence.nick);
        let failed = self.pending().lock().fail_peer(&presence.nick);
        if failed > 0 {
            tracing::warn!("{}", logs::pending_reset(&presence.nick, failed));
        }
        tracing::debug!("{}", logs::discovery_started(round.nick()));
        Some(round)
    }

    /// Queries the member behind `round` and publishes it if the round is
    /// still the newest one for that nick.
    pub(crate) async fn discover_peer(&self, round: DiscoveryRound, presence: &Presence) {
        match self.query_peer(presence).await {
            Ok(Some(peer)) => {
                let capabilities = peer.capabilities();
                if self.peer_directory().lock().complete_discovery(&round, peer) {
                    tracing::info!("{}", logs::peer_registered(round.nick(), &capabilities));
                } else {
                    tracing::debug!("{}", logs::discovery_superseded(round.nick()));
                }
            }
            Ok(None) => {
                self.peer_directory().lock().abandon_discovery(&round);
                tracing::debug!("{}", logs::not_a_peer(round.nick()));
            }
            Err(err) => {
                self.peer_directory().lock().abandon_discovery(&round);
                tracing::warn!("{}", logs::discovery_failed(round.nick(), &err.to_string()));
            }
        }
    }

    async fn query_peer(&self, presence: &Presence) -> Result<Option<Peer>, TransportError> {
        let features = self.transport().features(&presence.nick).await?;
        if !features.iter().any(|f| f == PEERING_FEATURE) {
            return Ok(None);
        }

        let items = self.transport().items(&presence.nick, PEERING_FEATURE).await?;
        let mut peer = Peer::new(presence.room.clone(), presence.nick.clone());
        for item in items {
            match Capability::from_item(&item) {
                Ok(capability) => peer.add_capability(capability),
                Err(err) => tracing::warn!("{}", logs::malformed_item(&presence.nick, &err.to_string())),
            }
        }
        Ok(Some(peer))
    }

    /// Forgets a member that left and fails what was still waiting on it.
    pub(crate) fn forget_peer(&self, nick: &str) {
        let removed = self.peer_directory().lock().remove(nick);
        let failed = self.pending().lock().fail_peer(nick);
        if removed.is_some() || failed > 0 {
            tracing::info!("{}", logs::peer_forgotten(nick, failed));
        }
    }

    /// Asks `peer` to run `command` with its `capability` plugin on behalf of
    /// `sender`. `None` waits until the peer answers or goes away.
    pub async fn forward(
        &self,
        capability: &Capability,
        peer: &str,
        command: &str,
        sender: &str,
        timeout: Option<Duration>,
    ) -> Result<Reply, PeerError> {
        if !self.peer_directory().lock().contains(peer) {
            return Err(PeerError::UnknownPeer(peer.to_string()));
        }

        let (id, receiver) = self.pending().lock().open(peer);
        let envelope = Envelope {
            id,
            from: self.nick().to_string(),
            to: peer.to_string(),
            stanza: Stanza::Request {
                plugin: capability.clone(),
                command: CommandPayload {
                    from: sender.to_string(),
                    text: command.to_string(),
                },
            },
        };
        tracing::info!("{}", logs::forward_sent(id, peer, capability, command));

        if let Err(err) = self.transport().send_stanza(envelope).await {
            self.pending().lock().release(id);
            return Err(err.into());
        }

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending().lock().release(id);
                    tracing::warn!("{}", logs::forward_timed_out(id, peer));
                    return Err(PeerError::Timeout);
                }
            },
            None => receiver.await,
        };
        received.unwrap_or_else(|_| Err(PeerError::PeerReset(peer.to_string())))
    }

    pub(crate) async fn handle_stanza(&self, envelope: Envelope) {
        let outcome = match &envelope.stanza {
            Stanza::Request { plugin, command } => {
                let stanza = self.answer_request(&envelope.from, plugin, command).await;
                if let Err(err) = self.transport().send_stanza(envelope.reply(stanza)).await {
                    tracing::error!("{}", logs::reply_failed(&envelope.from, &err.to_string()));
                }
                return;
            }
            Stanza::Result { result } => Ok(Reply {
                result: result.clone(),
            }),
            Stanza::Error { condition, text } => Err(PeerError::Remote {
                condition: *condition,
                text: text.clone(),
            }),
        };

        if !self.pending().lock().resolve(envelope.id, &envelope.from, outcome) {
            tracing::warn!("{}", logs::unexpected_reply(envelope.id, &envelope.from));
        }
    }

    /// Replays a forwarded command and builds the reply stanza.
    async fn answer_request(&self, from: &str, plugin: &Capability, command: &CommandPayload) -> Stanza {
        if !self.peer_directory().lock().contains(from) {
            tracing::warn!("{}", logs::request_rejected(from, "not a known peer"));
            return Stanza::error(ErrorCondition::Forbidden, messages::NOT_A_PEER);
        }
        if self.capabilities().position_exact(plugin).is_none() {
            tracing::warn!("{}", logs::request_rejected(from, &format!("{plugin} is not bound here")));
            return Stanza::error(ErrorCondition::ItemNotFound, messages::capability_missing(plugin));
        }

        let context = MessageContext::peer(from, command.from.clone(), command.text.clone());
        match self.router().execute(self, &command.text, context).await {
            Execution::Completed(result) => Stanza::Result { result },
            Execution::Aborted => Stanza::Result { result: None },
            Execution::Rejected(failure) => Stanza::error(ErrorCondition::BadRequest, failure.message),
            Execution::Faulted(err) => {
                tracing::error!("{}", logs::replay_failed(from, &command.text, &format!("{err:?}")));
                Stanza::error(ErrorCondition::InternalServerError, messages::REPLAY_FAULT)
            }
        }
    }
}
