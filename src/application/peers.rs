//! # Peer Directory
//!
//! Sibling bot instances discovered in the room and the capabilities they
//! advertise. A record is dropped the moment its nick reconnects and only
//! reappears once a fresh discovery round completes, so stale capability data
//! is never visible.

use std::collections::HashMap;

use crate::domain::capability::{Capability, Version};

/// A sibling instance and its advertised capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub room: String,
    pub nick: String,
    capabilities: HashMap<String, String>,
}

impl Peer {
    pub fn new(room: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            nick: nick.into(),
            capabilities: HashMap::new(),
        }
    }

    pub fn add_capability(&mut self, capability: Capability) {
        self.capabilities.insert(capability.name, capability.version);
    }

    /// True iff the peer advertises `name` at `min_version` or newer.
    pub fn supports(&self, name: &str, min_version: &str) -> bool {
        self.capabilities
            .get(name)
            .is_some_and(|advertised| Version::parse(advertised) >= Version::parse(min_version))
    }

    pub fn supports_capability(&self, capability: &Capability) -> bool {
        self.supports(&capability.name, &capability.version)
    }

    /// Advertised capabilities, sorted by name.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut list: Vec<Capability> = self
            .capabilities
            .iter()
            .map(|(name, version)| Capability::new(name.clone(), version.clone()))
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

/// Ticket for one discovery attempt. Only the newest round for a nick may
/// publish its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRound {
    nick: String,
    generation: u64,
}

impl DiscoveryRound {
    pub fn nick(&self) -> &str {
        &self.nick
    }
}

#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: HashMap<String, Peer>,
    rounds: HashMap<String, u64>,
    next_generation: u64,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops any record for `nick` and opens a new round, superseding older ones.
    pub fn begin_discovery(&mut self, nick: &str) -> DiscoveryRound {
        self.peers.remove(nick);
        self.next_generation += 1;
        self.rounds.insert(nick.to_string(), self.next_generation);
        DiscoveryRound {
            nick: nick.to_string(),
            generation: self.next_generation,
        }
    }

    /// Publishes the peer found by `round`. Returns `false` when the round was
    /// superseded or cancelled in the meantime.
    pub fn complete_discovery(&mut self, round: &DiscoveryRound, peer: Peer) -> bool {
        if !self.is_current(round) {
            return false;
        }
        self.rounds.remove(&round.nick);
        self.peers.insert(round.nick.clone(), peer);
        true
    }

    /// Closes a round that found nothing usable.
    pub fn abandon_discovery(&mut self, round: &DiscoveryRound) {
        if self.is_current(round) {
            self.rounds.remove(&round.nick);
        }
    }

    fn is_current(&self, round: &DiscoveryRound) -> bool {
        self.rounds.get(&round.nick) == Some(&round.generation)
    }

    /// Forgets `nick` and cancels any discovery in flight for it.
    pub fn remove(&mut self, nick: &str) -> Option<Peer> {
        self.rounds.remove(nick);
        self.peers.remove(nick)
    }

    pub fn get(&self, nick: &str) -> Option<&Peer> {
        self.peers.get(nick)
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.peers.contains_key(nick)
    }

    /// Copies of the known peers sorted by nick, optionally only those
    /// supporting `filter` at its version or newer.
    pub fn snapshot(&self, filter: Option<&Capability>) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .peers
            .values()
            .filter(|peer| filter.is_none_or(|cap| peer.supports_capability(cap)))
            .cloned()
            .collect();
        peers.sort_by(|a, b| a.nick.cmp(&b.nick));
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
