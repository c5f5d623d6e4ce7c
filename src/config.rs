use crate::identity::{self, Identity, IdentityTier};
use crate::output::Output;
use swayipc_async::Output as SwayOutput;

/// Snapshot of every output the compositor currently knows about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    outputs: Vec<Output>,
}

impl Config {
    pub fn new(outputs: Vec<Output>) -> Config {
        Config { outputs }
    }

    pub fn from_sway(outputs: &[SwayOutput]) -> Config {
        Config {
            outputs: outputs.iter().map(Output::from_sway).collect(),
        }
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn connected_outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter().filter(|o| o.is_connected())
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    pub fn primary_output(&self) -> Option<&Output> {
        self.connected_outputs().find(|o| o.is_primary())
    }

    /// Identity of the set of connected outputs.
    pub fn connected_outputs_hash(&self) -> Identity {
        let ids: Vec<Identity> = self.connected_outputs().map(Output::identity).collect();
        identity::arrangement_identity(&ids)
    }

    /// Arrangement identities computed from weaker per-output tiers, used to find
    /// records written before the outputs reported better EDID data.
    pub fn alternate_outputs_hashes(&self) -> Vec<Identity> {
        let primary = self.connected_outputs_hash();
        let mut hashes = Vec::new();
        // connector keys would match any hardware plugged into the same ports
        for tier in [IdentityTier::DisplayName, IdentityTier::Edid] {
            let ids: Vec<Identity> = self
                .connected_outputs()
                .map(|o| {
                    let descriptor = o.descriptor();
                    if identity::identity_tier(descriptor) >= tier {
                        o.identity()
                    } else {
                        identity::identity_at(descriptor, tier).unwrap_or_else(|| o.identity())
                    }
                })
                .collect();
            let hash = identity::arrangement_identity(&ids);
            if hash != primary && !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }
        hashes
    }
}
