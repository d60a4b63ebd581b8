//! # Application Layer
//!
//! Contains the core logic and orchestration of the bot.
//! This includes the command grammar, command routing, subscriptions, the peer
//! directory, federation and the session that ties them together.

pub mod federation;
pub mod grammar;
pub mod peers;
pub mod plugin;
pub mod router;
pub mod session;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod testing;
