//! # Domain Layer
//!
//! Core definitions, types, and traits that define the bot's domain: capabilities,
//! configuration, peer wire stanzas and the transport contract.
//! Independent of any concrete transport, serving as the contract for other layers.

pub mod capability;
pub mod config;
pub mod error;
pub mod paths;
pub mod traits;
pub mod types;
