//! # Messages
//!
//! Contains constant strings and format functions for chat-facing messages,
//! plus the short texts carried by peer error replies.

use crate::domain::capability::Capability;

pub const HANDLER_FAULT: &str = "Are you trying to drive me insane?";

pub fn subscriber_failed(plugin: &str, err: &str) -> String {
    format!("{plugin} choked on that: {err}")
}

// Peer replies
pub const NOT_A_PEER: &str = "not a known peer";
pub const REPLAY_FAULT: &str = "command failed on this instance";

pub fn capability_missing(capability: &Capability) -> String {
    format!("{capability} is not available here")
}

// Built-ins
pub fn version_line(name: &str, version: &str) -> String {
    format!("{name} {version}")
}

pub const NO_PEERS: &str = "No peers around.";

pub fn peer_line(nick: &str, capabilities: &[Capability]) -> String {
    let list: Vec<String> = capabilities.iter().map(Capability::to_string).collect();
    if list.is_empty() {
        format!("{nick}: nothing advertised")
    } else {
        format!("{nick}: {}", list.join(", "))
    }
}

// Music
pub const MUSIC_NO_TRACK: &str = "Which song?";
pub const MUSIC_UNSAFE: &str = "Don't try to mess with me !";
pub const MUSIC_MISSING: &str = "You have such bad taste I don't even have this song !";
pub const MUSIC_PLAYING: &str = "playing your favorite song out loud !";

pub fn music_forwarded(accepted: usize, total: usize) -> String {
    format!("{accepted}/{total} of my siblings joined in")
}

// Volunteer
pub const NO_VOLUNTEER: &str = "Nobody here to volunteer.";

pub fn volunteer_is(nick: &str, role: &str, remaining: &str) -> String {
    format!("{nick} is {role} for {remaining}")
}

pub fn volunteer_relay(volunteer: &str, from: &str, body: &str) -> String {
    format!("{volunteer}: {from} says: {body}")
}
