//! The `Protocol` trait objects the dispatcher races, and the `Registry`
//! that enumerates/looks them up by canonical name or alias.

use crate::error::Error;
use crate::response::Response;
use crate::transport::{Network, Transport};

/// A single protocol's metadata and request/response state machine.
/// Implementations are stateless: everything they need to run a query is
/// handed to `execute` via the transport.
pub trait Protocol: Send + Sync {
    fn name(&self) -> &'static str;
    fn aliases(&self) -> &'static [&'static str];
    fn default_port(&self) -> u16;
    fn priority(&self) -> u16;
    fn network(&self) -> Network;
    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, Error>;

    fn matches(&self, name: &str) -> bool {
        self.name() == name || self.aliases().contains(&name)
    }
}

/// Enumerates the known protocols and looks them up by canonical name or
/// alias. Holds no mutable state: built once, consulted by every
/// `query`/`detect` call.
pub struct Registry {
    protocols: Vec<Box<dyn Protocol>>,
}

impl Registry {
    pub fn new(protocols: Vec<Box<dyn Protocol>>) -> Self {
        Self { protocols }
    }

    pub fn all(&self) -> &[Box<dyn Protocol>] {
        &self.protocols
    }

    /// Registration order is preserved here and is relied on by the
    /// dispatcher as the tie-breaker for protocols of equal priority.
    pub fn find(&self, name: &str) -> Vec<&dyn Protocol> {
        self.protocols
            .iter()
            .filter(|p| p.matches(name))
            .map(|p| p.as_ref())
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        use crate::protocols::{minecraft_tcp::MinecraftTcp, minecraft_udp::MinecraftUdp, source::Source};

        Registry::new(vec![
            Box::new(Source),
            Box::new(MinecraftUdp),
            Box::new(MinecraftTcp),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_minecraft_alias_returns_both_variants() {
        let registry = Registry::default();
        let found = registry.find("minecraft");
        assert_eq!(found.len(), 2);
        let mut names: Vec<&str> = found.iter().map(|p| p.name()).collect();
        names.sort();
        assert_eq!(names, vec!["minecraft_tcp", "minecraft_udp"]);
    }

    #[test]
    fn find_source_returns_exactly_one() {
        let registry = Registry::default();
        let found = registry.find("source");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "source");
    }

    #[test]
    fn find_unknown_returns_empty() {
        let registry = Registry::default();
        assert!(registry.find("unknown").is_empty());
    }
}
