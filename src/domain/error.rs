//! # Domain Errors
//!
//! Typed failures raised at the library seams: grammar registration, the
//! transport boundary, peer forwarding and storage. Handler code works in
//! `anyhow::Result` and converts into chat output at the dispatch boundary.

use thiserror::Error;

use crate::domain::types::ErrorCondition;

/// Failures while building the command tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("command path is empty")]
    EmptyPath,

    #[error("command '{path}' is already registered")]
    DuplicateCommand { path: String },
}

/// Failures reported by the chat transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("'{0}' is not in the room")]
    UnknownRecipient(String),

    #[error("'{0}' has not joined the room")]
    NotJoined(String),

    #[error("nickname '{0}' is already taken")]
    NickInUse(String),

    #[error("discovery query to '{nick}' failed: {condition}")]
    Discovery { nick: String, condition: String },

    #[error("wire codec error: {0}")]
    Codec(String),

    #[error("transport closed")]
    Closed,
}

/// Outcome of a forwarded command that did not produce a successful reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer replied with {condition}: {text}")]
    Remote {
        condition: ErrorCondition,
        text: String,
    },

    #[error("no reply from peer before the deadline")]
    Timeout,

    #[error("peer '{0}' reconnected or left before replying")]
    PeerReset(String),

    #[error("'{0}' is not a known peer")]
    UnknownPeer(String),

    #[error("peer protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the persistent key/value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage file '{path}' is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage document for '{path}' could not be encoded: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("key path is empty")]
    EmptyKey,

    #[error("'{0}' is not an object")]
    NotAnObject(String),
}
