//! # squall
//!
//! A group-chat command bot. Room lines addressed to the bot become commands
//! dispatched to plugins, and sibling instances in the same room federate:
//! each advertises its plugin capabilities and can forward a command to a
//! sibling that provides a matching one.
//!
//! - Domain: configuration, capabilities, wire types, transport trait
//! - Application: grammar, router, subscriptions, peers, federation, session
//! - Infrastructure: in-process room transport, storage, logging
//! - Interface: command plugins

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod strings;
