//! # Music Command
//!
//! `music [--volume N] [--remote] [track]`: plays a track from the library
//! through the configured player. With `--remote` every sibling that provides
//! a compatible `music` plugin is asked to play it as well.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Arg, ArgAction, Command, value_parser};
use futures::future::join_all;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::config::MusicConfig;
use crate::domain::error::GrammarError;
use crate::strings::{help, logs, messages};

const DEFAULT_VOLUME: u32 = 65536;

pub struct MusicPlugin {
    player: String,
    library: PathBuf,
    default_track: Option<String>,
}

impl MusicPlugin {
    pub fn from_config(config: &MusicConfig) -> Result<Self> {
        let library = std::path::absolute(&config.library)
            .with_context(|| format!("Invalid music library {}", config.library))?;
        Ok(Self {
            player: config.player.clone(),
            library: normalize(&library),
            default_track: config.default_track.clone(),
        })
    }

    /// Resolves `track` inside the library. `None` if it escapes it.
    pub fn confine(&self, track: &str) -> Option<PathBuf> {
        let path = normalize(&self.library.join(track));
        path.starts_with(&self.library).then_some(path)
    }

    async fn forward_to_siblings(&self, session: &Session, track: &str, volume: u32, sender: &str) {
        let volume = volume.to_string();
        let Ok(command) = shlex::try_join(["music", "--volume", volume.as_str(), track]) else {
            return;
        };

        let capability = self.capability();
        let peers = session.get_peers(Some(&capability));
        if peers.is_empty() {
            return;
        }

        let timeout = Some(session.forward_timeout());
        let replies = join_all(
            peers
                .iter()
                .map(|peer| session.forward(&capability, &peer.nick, &command, sender, timeout)),
        )
        .await;

        let mut accepted = 0;
        for (peer, reply) in peers.iter().zip(replies) {
            match reply {
                Ok(_) => accepted += 1,
                Err(err) => tracing::warn!("{}", logs::forward_failed(&peer.nick, &err.to_string())),
            }
        }
        session.write(messages::music_forwarded(accepted, peers.len())).await;
    }
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }
    normal
}

#[async_trait]
impl Plugin for MusicPlugin {
    fn capability(&self) -> Capability {
        Capability::new("music", "1.1")
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let mut track = Arg::new("track").help(help::MUSIC_TRACK);
        if let Some(default) = &self.default_track {
            track = track.default_value(default.clone());
        }
        let spec = Command::new("music")
            .about(help::MUSIC)
            .arg(
                Arg::new("volume")
                    .long("volume")
                    .value_parser(value_parser!(u32))
                    .default_value(DEFAULT_VOLUME.to_string())
                    .help(help::MUSIC_VOLUME),
            )
            .arg(
                Arg::new("remote")
                    .long("remote")
                    .action(ArgAction::SetTrue)
                    .help(help::MUSIC_REMOTE),
            )
            .arg(track);
        grammar.register(&["music"], spec, "music", self)
    }
}

#[async_trait]
impl CommandHandler for MusicPlugin {
    async fn call(&self, session: &Session, invocation: &Invocation) -> Result<Option<String>> {
        let Some(track) = invocation.string("track") else {
            session.write(messages::MUSIC_NO_TRACK).await;
            return Ok(None);
        };
        let Some(path) = self.confine(&track) else {
            session.write(messages::MUSIC_UNSAFE).await;
            return Ok(None);
        };
        if !path.exists() {
            session.write(messages::MUSIC_MISSING).await;
            return Ok(None);
        }

        let volume = invocation.get::<u32>("volume").unwrap_or(DEFAULT_VOLUME);
        // Replayed commands never fan out again.
        if invocation.flag("remote") && !invocation.context.is_peer_origin() {
            self.forward_to_siblings(session, &track, volume, &invocation.context.sender)
                .await;
        }

        session.write(messages::MUSIC_PLAYING).await;
        tokio::process::Command::new(&self.player)
            .arg(format!("--volume={volume}"))
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.player))?;
        tracing::info!("{}", logs::player_spawned(&self.player, &path.display().to_string()));
        Ok(Some(track))
    }
}
