//! # Local Room
//!
//! In-process chat room implementing [`Transport`]. Several bot sessions and
//! human members can share one room; stanzas go through the JSON wire codec
//! exactly as they would on a network transport. The binary uses it to run a
//! federation on one machine and the tests use it as the transport double.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::error::TransportError;
use crate::domain::traits::Transport;
use crate::domain::types::{ChatMessage, Envelope, Presence, TransportEvent};

/// Lines of transcript a room keeps unless told otherwise.
pub const TRANSCRIPT_LIMIT: usize = 1000;

/// One line of the room transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLine {
    pub from: String,
    pub body: String,
}

#[derive(Default)]
struct Member {
    /// `None` for members without an event loop (humans at the console).
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    joined: bool,
    features: Vec<String>,
    items: HashMap<String, Vec<String>>,
}

#[derive(Default)]
struct RoomState {
    members: BTreeMap<String, Member>,
    transcript: VecDeque<RoomLine>,
    observers: Vec<mpsc::UnboundedSender<RoomLine>>,
}

impl RoomState {
    fn joined(&self, nick: &str) -> bool {
        self.members.get(nick).is_some_and(|m| m.joined)
    }

    fn notify(&self, nick: &str, event: TransportEvent) {
        if let Some(events) = self.members.get(nick).and_then(|m| m.events.as_ref()) {
            // A member whose loop stopped just misses the event.
            let _ = events.send(event);
        }
    }

    fn broadcast(&self, except: &str, event: &TransportEvent) {
        for (nick, member) in &self.members {
            if nick != except && member.joined {
                self.notify(nick, event.clone());
            }
        }
    }
}

pub struct LocalRoom {
    name: String,
    transcript_limit: usize,
    state: Mutex<RoomState>,
}

impl LocalRoom {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_transcript_limit(name, TRANSCRIPT_LIMIT)
    }

    /// A room that only remembers the last `limit` lines.
    pub fn with_transcript_limit(name: impl Into<String>, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            transcript_limit: limit,
            state: Mutex::new(RoomState::default()),
        })
    }

    /// Opens a connection for `nick`. The member is only visible to others
    /// once the transport joins.
    pub fn connect(
        self: &Arc<Self>,
        nick: &str,
    ) -> Result<(Arc<LocalTransport>, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.joined(nick) {
            return Err(TransportError::NickInUse(nick.to_string()));
        }
        state.members.insert(
            nick.to_string(),
            Member {
                events: Some(sender),
                ..Member::default()
            },
        );
        drop(state);

        let transport = Arc::new(LocalTransport {
            room: self.clone(),
            nick: nick.to_string(),
        });
        Ok((transport, receiver))
    }

    /// Adds a member without an event loop, e.g. the console operator.
    pub fn enter(&self, nick: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.joined(nick) {
            return Err(TransportError::NickInUse(nick.to_string()));
        }
        state.members.insert(nick.to_string(), Member::default());
        self.mark_joined(&mut state, nick);
        Ok(())
    }

    fn join(&self, nick: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let joined = match state.members.get(nick) {
            Some(member) => member.joined,
            None => return Err(TransportError::Closed),
        };
        if joined {
            return Err(TransportError::NickInUse(nick.to_string()));
        }
        self.mark_joined(&mut state, nick);
        Ok(())
    }

    fn mark_joined(&self, state: &mut RoomState, nick: &str) {
        if let Some(member) = state.members.get_mut(nick) {
            member.joined = true;
        }
        let online = TransportEvent::Online(self.presence(nick));
        state.broadcast(nick, &online);

        // The newcomer learns who is already there.
        let present: Vec<String> = state
            .members
            .iter()
            .filter(|(other, m)| other.as_str() != nick && m.joined)
            .map(|(other, _)| other.clone())
            .collect();
        for other in present {
            state.notify(nick, TransportEvent::Online(self.presence(&other)));
        }
    }

    /// Removes `nick` and tells everyone else.
    pub fn leave(&self, nick: &str) {
        let mut state = self.state.lock();
        if state.members.remove(nick).is_some_and(|m| m.joined) {
            state.broadcast(
                nick,
                &TransportEvent::Offline {
                    nick: nick.to_string(),
                },
            );
        }
    }

    /// Posts a line as `from`, who must have joined.
    pub fn post(&self, from: &str, body: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.joined(from) {
            return Err(TransportError::NotJoined(from.to_string()));
        }

        let line = RoomLine {
            from: from.to_string(),
            body: body.to_string(),
        };
        state.observers.retain(|observer| observer.send(line.clone()).is_ok());
        state.transcript.push_back(line);
        while state.transcript.len() > self.transcript_limit {
            state.transcript.pop_front();
        }

        let message = TransportEvent::Message(ChatMessage::new(from, body));
        for (nick, member) in &state.members {
            if member.joined {
                state.notify(nick, message.clone());
            }
        }
        Ok(())
    }

    /// Stream of every line posted from now on.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<RoomLine> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state.lock().observers.push(sender);
        receiver
    }

    /// Bodies of the remembered lines posted by `nick`.
    #[cfg(test)]
    pub fn lines_from(&self, nick: &str) -> Vec<String> {
        self.state
            .lock()
            .transcript
            .iter()
            .filter(|line| line.from == nick)
            .map(|line| line.body.clone())
            .collect()
    }

    fn presence(&self, nick: &str) -> Presence {
        Presence {
            room: self.name.clone(),
            nick: nick.to_string(),
        }
    }

    fn deliver_stanza(&self, sender: &str, envelope: Envelope) -> Result<(), TransportError> {
        let state = self.state.lock();
        if !state.joined(sender) {
            return Err(TransportError::NotJoined(sender.to_string()));
        }
        if !state.joined(&envelope.to) {
            return Err(TransportError::UnknownRecipient(envelope.to.clone()));
        }

        let wire = serde_json::to_string(&envelope).map_err(|e| TransportError::Codec(e.to_string()))?;
        let decoded: Envelope = serde_json::from_str(&wire).map_err(|e| TransportError::Codec(e.to_string()))?;
        tracing::trace!("stanza {} -> {}: {}", sender, decoded.to, wire);
        let to = decoded.to.clone();
        state.notify(&to, TransportEvent::Stanza(decoded));
        Ok(())
    }

    fn discovery<T>(
        &self,
        nick: &str,
        read: impl FnOnce(&Member) -> T,
    ) -> Result<T, TransportError> {
        let state = self.state.lock();
        match state.members.get(nick) {
            Some(member) if member.joined => Ok(read(member)),
            _ => Err(TransportError::Discovery {
                nick: nick.to_string(),
                condition: "item-not-found".to_string(),
            }),
        }
    }
}

/// One member's connection to a [`LocalRoom`].
pub struct LocalTransport {
    room: Arc<LocalRoom>,
    nick: String,
}

#[async_trait]
impl Transport for LocalTransport {
    fn room(&self) -> String {
        self.room.name.clone()
    }

    async fn join(&self, nick: &str) -> Result<(), TransportError> {
        if nick != self.nick {
            return Err(TransportError::NotJoined(nick.to_string()));
        }
        self.room.join(&self.nick)
    }

    async fn send_room(&self, body: &str) -> Result<(), TransportError> {
        self.room.post(&self.nick, body)
    }

    async fn send_stanza(&self, mut envelope: Envelope) -> Result<(), TransportError> {
        envelope.from = self.nick.clone();
        self.room.deliver_stanza(&self.nick, envelope)
    }

    async fn advertise(
        &self,
        features: Vec<String>,
        node: &str,
        items: Vec<String>,
    ) -> Result<(), TransportError> {
        let mut state = self.room.state.lock();
        let member = state
            .members
            .get_mut(&self.nick)
            .ok_or(TransportError::Closed)?;
        member.features = features;
        member.items.insert(node.to_string(), items);
        Ok(())
    }

    async fn features(&self, nick: &str) -> Result<Vec<String>, TransportError> {
        self.room.discovery(nick, |member| member.features.clone())
    }

    async fn items(&self, nick: &str, node: &str) -> Result<Vec<String>, TransportError> {
        self.room
            .discovery(nick, |member| member.items.get(node).cloned().unwrap_or_default())
    }

    async fn members(&self) -> Result<Vec<String>, TransportError> {
        let state = self.room.state.lock();
        Ok(state
            .members
            .iter()
            .filter(|(_, m)| m.joined)
            .map(|(nick, _)| nick.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Stanza;

    #[tokio::test]
    async fn test_join_announces_both_ways() {
        let room = LocalRoom::new("lobby");
        let (first, mut first_events) = room.connect("storm").unwrap();
        first.join("storm").await.unwrap();
        let (second, mut second_events) = room.connect("stormy").unwrap();
        second.join("stormy").await.unwrap();

        assert_eq!(
            first_events.try_recv().unwrap(),
            TransportEvent::Online(Presence {
                room: "lobby".into(),
                nick: "stormy".into()
            })
        );
        assert_eq!(
            second_events.try_recv().unwrap(),
            TransportEvent::Online(Presence {
                room: "lobby".into(),
                nick: "storm".into()
            })
        );
        assert!(room.connect("storm").is_err());
    }

    #[tokio::test]
    async fn test_post_reaches_every_member_and_transcript() {
        let room = LocalRoom::new("lobby");
        let (bot, mut events) = room.connect("storm").unwrap();
        bot.join("storm").await.unwrap();
        room.enter("alice").unwrap();
        let mut observer = room.observe();

        room.post("alice", "storm: help").unwrap();
        bot.send_room("hello").await.unwrap();

        assert!(matches!(events.try_recv().unwrap(), TransportEvent::Online(_)));
        assert_eq!(
            events.try_recv().unwrap(),
            TransportEvent::Message(ChatMessage::new("alice", "storm: help"))
        );
        assert_eq!(observer.try_recv().unwrap().body, "storm: help");
        assert_eq!(room.lines_from("storm"), vec!["hello".to_string()]);
        assert_eq!(room.lines_from("alice"), vec!["storm: help".to_string()]);
        assert!(room.post("bob", "hi").is_err());
    }

    #[test]
    fn test_transcript_keeps_only_recent_lines() {
        let room = LocalRoom::with_transcript_limit("lobby", 2);
        room.enter("alice").unwrap();
        let mut observer = room.observe();

        for body in ["one", "two", "three"] {
            room.post("alice", body).unwrap();
        }

        assert_eq!(room.lines_from("alice"), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(observer.try_recv().unwrap().body, "one");
    }

    #[tokio::test]
    async fn test_stanza_to_absent_member_fails() {
        let room = LocalRoom::new("lobby");
        let (bot, _events) = room.connect("storm").unwrap();
        bot.join("storm").await.unwrap();

        let err = bot
            .send_stanza(Envelope {
                id: 1,
                from: String::new(),
                to: "stormy".into(),
                stanza: Stanza::Result { result: None },
            })
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownRecipient("stormy".into()));
    }

    #[tokio::test]
    async fn test_discovery_and_leave() {
        let room = LocalRoom::new("lobby");
        let (first, mut first_events) = room.connect("storm").unwrap();
        first.join("storm").await.unwrap();
        let (second, _second_events) = room.connect("stormy").unwrap();
        second
            .advertise(vec!["feat".into()], "node", vec!["music#1.0".into()])
            .await
            .unwrap();

        assert!(first.features("stormy").await.is_err());
        second.join("stormy").await.unwrap();
        assert_eq!(first.features("stormy").await.unwrap(), vec!["feat".to_string()]);
        assert_eq!(first.items("stormy", "node").await.unwrap(), vec!["music#1.0".to_string()]);
        assert!(first.items("stormy", "other").await.unwrap().is_empty());
        assert_eq!(first.members().await.unwrap(), vec!["storm".to_string(), "stormy".to_string()]);

        room.leave("stormy");
        assert!(matches!(first_events.try_recv().unwrap(), TransportEvent::Online(_)));
        assert_eq!(
            first_events.try_recv().unwrap(),
            TransportEvent::Offline {
                nick: "stormy".into()
            }
        );
    }
}
