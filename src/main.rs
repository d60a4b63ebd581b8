//! # Main Entry Point
//!
//! Runs every configured bot instance in one in-process room and attaches the
//! console to it: stdin lines are posted as the operator, room lines are
//! printed on stdout, logs go to stderr and the session log file.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use squall::application::session::{Session, SessionSettings};
use squall::domain::config::AppConfig;
use squall::domain::paths;
use squall::infrastructure::local::LocalRoom;
use squall::infrastructure::logging;
use squall::infrastructure::storage::JsonStore;
use squall::interface::commands;

#[derive(Parser, Debug)]
#[command(name = "squall", version, about = "Federated group-chat command bot")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = paths::CONFIG_FILE)]
    config: PathBuf,

    /// Nickname used for lines typed at the console
    #[arg(short, long, default_value = "you")]
    nick: String,

    /// Log filter, overrides the configuration (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Configuration
    let config = AppConfig::load(&cli.config)?;

    // 2. Logging
    let _guard = logging::init(&config.logging, cli.log_filter.as_deref())?;
    tracing::info!("Starting squall {} in {}", env!("CARGO_PKG_VERSION"), config.room);

    // 3. Storage and room
    let store = Arc::new(
        JsonStore::open(&config.storage.path)
            .with_context(|| format!("Failed to open storage {}", config.storage.path))?,
    );
    let room = LocalRoom::new(config.room.clone());

    // 4. Bot instances
    let mut sessions = Vec::new();
    for instance in &config.instances {
        let plugins = commands::build(&instance.plugins, &config.plugins, &store)
            .with_context(|| format!("Failed to load plugins of {}", instance.nick))?;
        let (transport, events) = room
            .connect(&instance.nick)
            .with_context(|| format!("Failed to connect {}", instance.nick))?;
        let settings = SessionSettings::new(instance.nick.clone())
            .with_forward_timeout(config.federation.forward_timeout());
        let session = Session::bind(settings, transport, plugins).await?;

        let nick = instance.nick.clone();
        sessions.push(tokio::spawn(async move {
            if let Err(e) = session.run(events).await {
                tracing::error!("Session {} stopped: {:#}", nick, e);
            }
        }));
    }

    // 5. Console
    room.enter(&cli.nick)
        .with_context(|| format!("Failed to enter {} as {}", config.room, cli.nick))?;

    let mut transcript = room.observe();
    tokio::spawn(async move {
        while let Some(line) = transcript.recv().await {
            for text in line.body.lines() {
                println!("<{}> {}", line.from, text);
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = room.post(&cli.nick, &line) {
                    tracing::error!("Failed to post: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    tracing::info!("Shutting down...");
    room.leave(&cli.nick);
    for handle in &sessions {
        handle.abort();
    }
    Ok(())
}
