//! # Log Messages
//!
//! Operator-facing log lines. These never reach the chat room.

use crate::domain::capability::Capability;
use crate::domain::types::RequestId;

// Session
pub fn session_bound(nick: &str, items: &[String]) -> String {
    format!("Session {nick} bound with capabilities [{}]", items.join(", "))
}

pub fn joined(room: &str, nick: &str) -> String {
    format!("Joined {room} as {nick}")
}

pub fn session_closed(nick: &str) -> String {
    format!("Event stream of {nick} closed")
}

pub fn write_failed(nick: &str, err: &str) -> String {
    format!("{nick} could not write to the room: {err}")
}

pub fn got_online(nick: &str) -> String {
    format!("{nick} came online")
}

pub fn hook_failed(plugin: &str, hook: &str, err: &str) -> String {
    format!("Plugin {plugin} failed in {hook}: {err}")
}

// Dispatch
pub fn handler_failed(command: &str, err: &str) -> String {
    format!("Command '{command}' failed: {err}")
}

pub fn fallback_failed(plugin: &str, err: &str) -> String {
    format!("Fallback of {plugin} failed: {err}")
}

pub fn subscriber_failed(plugin: &str, nick: &str, err: &str) -> String {
    format!("Subscriber {plugin} failed on message for {nick}: {err}")
}

// Federation
pub fn discovery_started(nick: &str) -> String {
    format!("Discovering capabilities of {nick}")
}

pub fn peer_registered(nick: &str, capabilities: &[Capability]) -> String {
    let list: Vec<String> = capabilities.iter().map(Capability::item).collect();
    format!("Peer {nick} registered with [{}]", list.join(", "))
}

pub fn discovery_superseded(nick: &str) -> String {
    format!("Dropped stale discovery result for {nick}")
}

pub fn not_a_peer(nick: &str) -> String {
    format!("{nick} does not speak the peering protocol")
}

pub fn discovery_failed(nick: &str, err: &str) -> String {
    format!("Couldn't check if {nick} is a peer: {err}")
}

pub fn malformed_item(nick: &str, err: &str) -> String {
    format!("Ignoring capability advertised by {nick}: {err}")
}

pub fn pending_reset(nick: &str, count: usize) -> String {
    format!("{nick} reconnected, failed {count} pending forward(s)")
}

pub fn peer_forgotten(nick: &str, failed: usize) -> String {
    format!("Forgot peer {nick} ({failed} pending forward(s) failed)")
}

pub fn forward_sent(id: RequestId, peer: &str, capability: &Capability, command: &str) -> String {
    format!("Forward #{id} to {peer} via {}: {command}", capability.item())
}

pub fn forward_timed_out(id: RequestId, peer: &str) -> String {
    format!("Forward #{id} to {peer} timed out")
}

pub fn forward_failed(peer: &str, err: &str) -> String {
    format!("Forward to {peer} failed: {err}")
}

pub fn reply_failed(peer: &str, err: &str) -> String {
    format!("Could not reply to {peer}: {err}")
}

pub fn unexpected_reply(id: RequestId, from: &str) -> String {
    format!("Dropped reply #{id} from {from}: no such pending request")
}

pub fn request_rejected(from: &str, reason: &str) -> String {
    format!("Rejected command from {from}: {reason}")
}

pub fn replay_failed(from: &str, command: &str, err: &str) -> String {
    format!("Command '{command}' forwarded by {from} failed: {err}")
}

// Plugins
pub fn player_spawned(player: &str, target: &str) -> String {
    format!("Spawned {player} for {target}")
}

pub fn volunteer_picked(role: &str, nick: &str) -> String {
    format!("Picked {nick} as {role}")
}
