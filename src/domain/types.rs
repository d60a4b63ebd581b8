//! # Domain Types
//!
//! Messages, presence, invocation context and the peer wire stanzas shared by
//! the transport, the dispatcher and the federation protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::capability::Capability;

/// A groupchat line as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: String,
    pub body: String,
}

impl ChatMessage {
    pub fn new(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            body: body.into(),
        }
    }
}

/// A member coming online in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub room: String,
    pub nick: String,
}

/// Where a command line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Room,
    /// Replayed on behalf of a sibling instance.
    Peer { nick: String },
}

/// Originating context attached to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub sender: String,
    pub body: String,
    pub origin: Origin,
}

impl MessageContext {
    pub fn room(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            origin: Origin::Room,
        }
    }

    pub fn peer(peer: impl Into<String>, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            origin: Origin::Peer { nick: peer.into() },
        }
    }

    /// Handlers check this to avoid forwarding a command back out.
    pub fn is_peer_origin(&self) -> bool {
        matches!(self.origin, Origin::Peer { .. })
    }
}

/// Transport-native request identifier correlating a forward to its reply.
pub type RequestId = u64;

/// Error conditions carried by failed peer replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCondition {
    BadRequest,
    Forbidden,
    ItemNotFound,
    InternalServerError,
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "bad-request",
            Self::Forbidden => "forbidden",
            Self::ItemNotFound => "item-not-found",
            Self::InternalServerError => "internal-server-error",
        };
        f.write_str(name)
    }
}

/// `command{from, text}` element of a forwarded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub from: String,
    pub text: String,
}

/// A peer-to-peer stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Stanza {
    Request {
        plugin: Capability,
        command: CommandPayload,
    },
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    Error {
        condition: ErrorCondition,
        text: String,
    },
}

impl Stanza {
    pub fn error(condition: ErrorCondition, text: impl Into<String>) -> Self {
        Self::Error {
            condition,
            text: text.into(),
        }
    }
}

/// Addressed stanza with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: RequestId,
    pub from: String,
    pub to: String,
    pub stanza: Stanza,
}

impl Envelope {
    /// Builds the reply envelope for this request.
    pub fn reply(&self, stanza: Stanza) -> Self {
        Self {
            id: self.id,
            from: self.to.clone(),
            to: self.from.clone(),
            stanza,
        }
    }
}

/// Successful peer reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub result: Option<String>,
}

/// Events the transport pushes into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(ChatMessage),
    Online(Presence),
    Offline { nick: String },
    Stanza(Envelope),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let stanza = Stanza::Request {
            plugin: Capability::new("music", "1.0"),
            command: CommandPayload {
                from: "alice".into(),
                text: "music song.ogg".into(),
            },
        };
        let json = serde_json::to_value(&stanza).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["plugin"]["name"], "music");
        assert_eq!(json["plugin"]["version"], "1.0");
        assert_eq!(json["command"]["from"], "alice");
        assert_eq!(json["command"]["text"], "music song.ogg");
    }

    #[test]
    fn test_error_condition_wire_name() {
        let stanza = Stanza::error(ErrorCondition::InternalServerError, "boom");
        let json = serde_json::to_value(&stanza).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["condition"], "internal-server-error");
        assert_eq!(ErrorCondition::ItemNotFound.to_string(), "item-not-found");
    }

    #[test]
    fn test_empty_result_omits_field() {
        let json = serde_json::to_string(&Stanza::Result { result: None }).unwrap();
        assert_eq!(json, r#"{"type":"result"}"#);
        let back: Stanza = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Stanza::Result { result: None });
    }

    #[test]
    fn test_reply_swaps_addresses() {
        let request = Envelope {
            id: 7,
            from: "storm".into(),
            to: "stormy".into(),
            stanza: Stanza::Result { result: None },
        };
        let reply = request.reply(Stanza::Result {
            result: Some("42".into()),
        });
        assert_eq!(reply.id, 7);
        assert_eq!(reply.from, "stormy");
        assert_eq!(reply.to, "storm");
    }

    #[test]
    fn test_peer_origin_flag() {
        assert!(!MessageContext::room("alice", "x").is_peer_origin());
        assert!(MessageContext::peer("storm", "alice", "x").is_peer_origin());
    }
}
