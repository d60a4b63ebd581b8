//! # Capabilities
//!
//! A capability is the `{name, version}` pair a plugin declares when it is bound
//! to a session. Peers advertise the same pairs as `name#version` items, and
//! forwarding only happens between plugins that agree on them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::domain::error::PeerError;

static VERSION_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|[A-Za-z]+").expect("version component regex is valid"));

/// One run of a version string. Numeric runs sort before alphabetic ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Word(String),
}

/// A loosely structured version (`1.10`, `2.0b1`, `0.3.12`).
///
/// Comparison is component-wise: numeric runs compare as numbers, so `1.9`
/// sorts before `1.10`, and a version that is a strict prefix of another sorts
/// first (`1.0 < 1.0.1`).
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<Component>,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let components = VERSION_COMPONENT
            .find_iter(raw)
            .map(|m| {
                let text = m.as_str();
                match text.parse::<u64>() {
                    Ok(n) => Component::Number(n),
                    Err(_) => Component::Word(text.to_ascii_lowercase()),
                }
            })
            .collect();
        Self { components }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

/// Static declaration of what a plugin provides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub version: String,
}

impl Capability {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Renders the discovery item advertised to peers.
    pub fn item(&self) -> String {
        format!("{}#{}", self.name, self.version)
    }

    /// Parses a `name#version` discovery item.
    pub fn from_item(item: &str) -> Result<Self, PeerError> {
        match item.split_once('#') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(PeerError::Protocol(format!(
                "malformed capability item '{item}'"
            ))),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Capabilities bound to one session, in registration order.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    entries: Vec<Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability. Names are unique within a session.
    pub fn register(&mut self, capability: Capability) -> anyhow::Result<()> {
        if self.entries.iter().any(|c| c.name == capability.name) {
            anyhow::bail!("capability '{}' is already bound", capability.name);
        }
        self.entries.push(capability);
        Ok(())
    }

    /// Exact match on both name and version, as required for peer requests.
    pub fn position_exact(&self, wanted: &Capability) -> Option<usize> {
        self.entries.iter().position(|c| c == wanted)
    }

    pub fn items(&self) -> Vec<String> {
        self.entries.iter().map(Capability::item).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_components_compare_as_numbers() {
        assert!(Version::parse("1.9") < Version::parse("1.10"));
        assert!(Version::parse("1.2") > Version::parse("1.1"));
        assert!(Version::parse("1.0") < Version::parse("1.1"));
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert!(Version::parse("1.0") < Version::parse("1.0.1"));
        assert_eq!(Version::parse("2.0"), Version::parse("2.0"));
    }

    #[test]
    fn test_alpha_components() {
        assert!(Version::parse("1.0") < Version::parse("1.0b1"));
        assert!(Version::parse("1.0a") < Version::parse("1.0b"));
    }

    #[test]
    fn test_item_parsing() {
        let cap = Capability::from_item("music#1.2").unwrap();
        assert_eq!(cap, Capability::new("music", "1.2"));
        assert_eq!(cap.item(), "music#1.2");

        assert!(Capability::from_item("music").is_err());
        assert!(Capability::from_item("#1.0").is_err());
        assert!(Capability::from_item("music#").is_err());
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::new("music", "1.0")).unwrap();
        assert!(registry.register(Capability::new("music", "2.0")).is_err());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.items(), vec!["music#1.0".to_string()]);
    }

    #[test]
    fn test_exact_lookup() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::new("say", "0.3")).unwrap();
        registry.register(Capability::new("music", "1.0")).unwrap();
        assert_eq!(registry.position_exact(&Capability::new("music", "1.0")), Some(1));
        assert_eq!(registry.position_exact(&Capability::new("music", "1.0.0")), None);
    }
}
