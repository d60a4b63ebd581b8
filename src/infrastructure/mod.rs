//! # Infrastructure Layer
//!
//! Handles interactions with the outside world.
//! Implements the traits defined in the Domain layer (e.g., `Transport`) and
//! owns process-wide concerns such as logging and on-disk storage.

pub mod local;
pub mod logging;
pub mod storage;
