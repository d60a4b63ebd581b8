//! # Volunteer Command
//!
//! Rotating duties. Every role has a start date and a period; during each
//! period one room member (never a bot of the federation) is picked at random
//! and remembered in storage. `volunteer whois <role>` names the current pick,
//! and any message addressed to the role name (`"cook: ..."`) is relayed to
//! that person.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use clap::builder::PossibleValuesParser;
use clap::{Arg, Command};
use rand::seq::SliceRandom;
use serde_json::json;
use std::sync::Arc;

use crate::application::grammar::{CommandGrammar, CommandHandler, Invocation};
use crate::application::plugin::Plugin;
use crate::application::session::Session;
use crate::domain::capability::Capability;
use crate::domain::config::{RoleConfig, VolunteerConfig};
use crate::domain::error::GrammarError;
use crate::domain::types::ChatMessage;
use crate::infrastructure::storage::JsonStore;
use crate::strings::{help, logs, messages};

const STORAGE_KEY: &str = "volunteer";

#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    start: DateTime<FixedOffset>,
    period: Duration,
}

impl Role {
    pub fn from_config(config: &RoleConfig) -> Result<Self> {
        let start = DateTime::parse_from_rfc3339(&config.start)
            .with_context(|| format!("Invalid start date for role {}", config.name))?;
        if config.period_secs == 0 {
            anyhow::bail!("role {} has an empty period", config.name);
        }
        let period = i64::try_from(config.period_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .filter(|period| start.checked_add_signed(*period).is_some())
            .with_context(|| format!("Period of role {} is too long", config.name))?;
        Ok(Self {
            name: config.name.clone(),
            start,
            period,
        })
    }

    /// Start of the period containing `now`.
    pub fn period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.start.with_timezone(&Utc);
        if now <= start {
            return start;
        }
        let elapsed = (now - start).num_seconds();
        let periods = elapsed / self.period.num_seconds();
        start + Duration::seconds(periods * self.period.num_seconds())
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.period_start(now) + self.period - now
    }
}

fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    let (days, hours, minutes) = (minutes / 1440, (minutes / 60) % 24, minutes % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else {
        format!("{hours}h {minutes}m")
    }
}

pub struct VolunteerPlugin {
    roles: Vec<Role>,
    store: Arc<JsonStore>,
}

impl VolunteerPlugin {
    pub fn new(config: &VolunteerConfig, store: Arc<JsonStore>) -> Result<Self> {
        let roles = config
            .roles
            .iter()
            .map(Role::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { roles, store })
    }

    fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// The volunteer for the current period of `role`, picking one if needed.
    async fn current(&self, session: &Session, role: &Role) -> Result<Option<String>> {
        let since = role.period_start(Utc::now()).to_rfc3339();
        if let Some(stored) = self.store.get(&[STORAGE_KEY, role.name.as_str()]) {
            if stored["since"].as_str() == Some(since.as_str()) {
                if let Some(nick) = stored["nick"].as_str() {
                    return Ok(Some(nick.to_string()));
                }
            }
        }

        let bots: Vec<String> = session.get_peers(None).into_iter().map(|p| p.nick).collect();
        let candidates: Vec<String> = session
            .members()
            .await?
            .into_iter()
            .filter(|nick| nick != session.nick() && !bots.contains(nick))
            .collect();
        let Some(nick) = candidates.choose(&mut rand::thread_rng()).cloned() else {
            return Ok(None);
        };

        self.store
            .set(&[STORAGE_KEY, role.name.as_str()], json!({ "nick": nick, "since": since }))?;
        tracing::info!("{}", logs::volunteer_picked(&role.name, &nick));
        Ok(Some(nick))
    }
}

#[async_trait]
impl Plugin for VolunteerPlugin {
    fn capability(&self) -> Capability {
        Capability::new("volunteer", "1.0")
    }

    fn register(self: Arc<Self>, grammar: &mut CommandGrammar) -> Result<(), GrammarError> {
        let names: Vec<String> = self.roles.iter().map(|role| role.name.clone()).collect();
        let spec = Command::new("whois").about(help::WHOIS).arg(
            Arg::new("role")
                .required(true)
                .value_parser(PossibleValuesParser::new(names))
                .help(help::WHOIS_ROLE),
        );
        grammar.register(&["volunteer", "whois"], spec, "volunteer", self)
    }

    fn bind(self: Arc<Self>, session: &Session) {
        for role in &self.roles {
            session.subscribe(&role.name, self.clone());
        }
    }

    async fn on_addressed_message(
        &self,
        session: &Session,
        nick: &str,
        message: &ChatMessage,
    ) -> Result<()> {
        let Some(role) = self.role(nick) else {
            return Ok(());
        };
        let Some(volunteer) = self.current(session, role).await? else {
            session.write(messages::NO_VOLUNTEER).await;
            return Ok(());
        };
        let body = message
            .body
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .unwrap_or(&message.body);
        session
            .write(messages::volunteer_relay(&volunteer, &message.from, body))
            .await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for VolunteerPlugin {
    async fn call(&self, session: &Session, invocation: &Invocation) -> Result<Option<String>> {
        let name = invocation.string("role").context("role is required")?;
        let role = self
            .role(&name)
            .with_context(|| format!("unknown role {name}"))?;

        let Some(volunteer) = self.current(session, role).await? else {
            session.write(messages::NO_VOLUNTEER).await;
            return Ok(None);
        };
        let remaining = format_remaining(role.remaining(Utc::now()));
        session
            .write(messages::volunteer_is(&volunteer, &role.name, &remaining))
            .await;
        Ok(Some(volunteer))
    }
}
