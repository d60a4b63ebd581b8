//! # Domain Traits
//!
//! Abstract interface for the chat transport. The session only talks to the
//! room through this trait; concrete transports live in the infrastructure
//! layer.

use async_trait::async_trait;

use crate::domain::error::TransportError;
use crate::domain::types::Envelope;

/// Abstract interface for a chat transport (groupchat room + peer stanzas).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Room this transport is attached to.
    fn room(&self) -> String;

    /// Join the room under the given nickname.
    async fn join(&self, nick: &str) -> Result<(), TransportError>;

    /// Send a groupchat message to the whole room.
    async fn send_room(&self, body: &str) -> Result<(), TransportError>;

    /// Send a stanza to one specific member.
    async fn send_stanza(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Publish the features and the items under `node` other members discover.
    async fn advertise(
        &self,
        features: Vec<String>,
        node: &str,
        items: Vec<String>,
    ) -> Result<(), TransportError>;

    /// Query the features a member advertises.
    async fn features(&self, nick: &str) -> Result<Vec<String>, TransportError>;

    /// Query the items a member advertises under `node`.
    async fn items(&self, nick: &str, node: &str) -> Result<Vec<String>, TransportError>;

    /// Current room membership.
    async fn members(&self) -> Result<Vec<String>, TransportError>;
}
