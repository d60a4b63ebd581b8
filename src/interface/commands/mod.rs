//! # Command Plugins
//!
//! Every chat command lives in a plugin. `version` and `peers` are bound to
//! every session; the others are picked per instance in `config.yaml`.

pub mod fortune;
pub mod music;
pub mod peers;
pub mod say;
pub mod version;
pub mod volunteer;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::application::plugin::Plugin;
use crate::domain::config::PluginsConfig;
use crate::infrastructure::storage::JsonStore;

/// Plugins bound ahead of the configured ones, in this order.
pub fn builtins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(version::VersionPlugin), Arc::new(peers::PeersPlugin)]
}

/// Instantiates the bundled plugins listed in `names`.
pub fn build(
    names: &[String],
    config: &PluginsConfig,
    store: &Arc<JsonStore>,
) -> Result<Vec<Arc<dyn Plugin>>> {
    names
        .iter()
        .map(|name| {
            let plugin: Arc<dyn Plugin> = match name.as_str() {
                "fortune" => Arc::new(fortune::FortunePlugin::from_config(&config.fortune)?),
                "music" => Arc::new(music::MusicPlugin::from_config(&config.music)?),
                "say" => Arc::new(say::SayPlugin::from_config(&config.say)),
                "volunteer" => Arc::new(
                    volunteer::VolunteerPlugin::new(&config.volunteer, store.clone())
                        .context("Invalid volunteer roles")?,
                ),
                other => anyhow::bail!("unknown plugin '{other}'"),
            };
            Ok(plugin)
        })
        .collect()
}
