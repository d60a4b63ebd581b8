//! # Interface Layer
//!
//! The chat-facing plugins: built-in commands and the bundled features.

pub mod commands;
