//! # Help Text
//!
//! Descriptions shown by `help` and `--help` for every chat command.

pub const ABOUT: &str = "Chat commands. Address me as '<nick>: <command>'.";

pub const VERSION: &str = "Show my version and the version of every plugin";

pub const PEERS: &str = "List sibling instances and what they can do";
pub const PEERS_CAPABILITY: &str = "Only peers providing this plugin";
pub const PEERS_MIN_VERSION: &str = "Minimum plugin version";

pub const FORTUNE: &str = "Tell a fortune";

pub const MUSIC: &str = "Play music out loud";
pub const MUSIC_VOLUME: &str = "Player volume";
pub const MUSIC_REMOTE: &str = "Ask my siblings to play it too";
pub const MUSIC_TRACK: &str = "Track to play, relative to the music library";

pub const SAY: &str = "Say something out loud";
pub const SAY_VOICE: &str = "Voice to use";
pub const SAY_TEXT: &str = "Text to say";

pub const WHOIS: &str = "Who is volunteer for a role";
pub const WHOIS_ROLE: &str = "Role to look up";
