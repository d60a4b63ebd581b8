//! # Strings Module
//!
//! Centralizes chat-facing strings, operator log lines and command help text.
//! Ensures consistency in messaging and easier localization/updates.

pub mod help;
pub mod logs;
pub mod messages;
