//! Stable output identities derived from hardware descriptors.
//!
//! Connector names move around between docks and reboots, so they are only the
//! last resort. The strongest key is the make/model/serial composite reported by
//! the EDID; weaker tiers are kept around to find records written before better
//! data was available.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex digest naming one output, or one arrangement of outputs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Panel,
    DisplayPort,
    Hdmi,
    Dvi,
    Vga,
    Virtual,
    Unknown,
}

impl ConnectionType {
    /// Guess the connection type from a DRM style connector name (`eDP-1`, `HDMI-A-2`).
    pub fn from_connector(connector: &str) -> ConnectionType {
        let prefix = connector
            .split('-')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match prefix.as_str() {
            "EDP" | "LVDS" | "DSI" => ConnectionType::Panel,
            "DP" => ConnectionType::DisplayPort,
            "HDMI" => ConnectionType::Hdmi,
            "DVI" => ConnectionType::Dvi,
            "VGA" => ConnectionType::Vga,
            "VIRTUAL" | "HEADLESS" | "WL" | "X11" => ConnectionType::Virtual,
            _ => ConnectionType::Unknown,
        }
    }

    pub fn is_builtin(&self) -> bool {
        *self == ConnectionType::Panel
    }

    fn tag(&self) -> &'static str {
        match self {
            ConnectionType::Panel => "panel",
            ConnectionType::DisplayPort => "dp",
            ConnectionType::Hdmi => "hdmi",
            ConnectionType::Dvi => "dvi",
            ConnectionType::Vga => "vga",
            ConnectionType::Virtual => "virtual",
            ConnectionType::Unknown => "unknown",
        }
    }
}

/// Identity-relevant fields of one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub connector: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub edid_hash: Option<String>,
    pub connection: ConnectionType,
}

impl OutputDescriptor {
    pub fn new(connector: &str) -> OutputDescriptor {
        OutputDescriptor {
            connector: connector.to_owned(),
            make: None,
            model: None,
            serial: None,
            edid_hash: None,
            connection: ConnectionType::from_connector(connector),
        }
    }

    /// Builds a descriptor from the strings a compositor reports, where missing
    /// EDID fields come back as `"Unknown"` or empty.
    pub fn from_reported(connector: &str, make: &str, model: &str, serial: &str) -> Self {
        OutputDescriptor {
            make: known(make),
            model: known(model),
            serial: known(serial),
            ..OutputDescriptor::new(connector)
        }
    }

    pub fn with_edid_hash(mut self, hash: &str) -> Self {
        self.edid_hash = known(hash);
        self
    }

    /// `make model` as shown to users, if either is known.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.make, &self.model]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn known(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(value.to_owned())
    }
}

/// Source an identity was derived from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdentityTier {
    Serial,
    DisplayName,
    Edid,
    Connector,
}

impl IdentityTier {
    const ALL: [IdentityTier; 4] = [
        IdentityTier::Serial,
        IdentityTier::DisplayName,
        IdentityTier::Edid,
        IdentityTier::Connector,
    ];
}

fn digest(tag: &str, fields: &[&str]) -> Identity {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    for field in fields {
        hasher.update([0u8]);
        hasher.update(field.as_bytes());
    }
    Identity(format!("{:x}", hasher.finalize()))
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

/// Identity for `descriptor` computed from one tier only, if that tier has data.
pub fn identity_at(descriptor: &OutputDescriptor, tier: IdentityTier) -> Option<Identity> {
    match tier {
        IdentityTier::Serial => descriptor.serial.as_ref().map(|serial| {
            digest(
                "serial",
                &[opt(&descriptor.make), opt(&descriptor.model), serial.as_str()],
            )
        }),
        IdentityTier::DisplayName => {
            if descriptor.make.is_none() && descriptor.model.is_none() {
                return None;
            }
            Some(digest(
                "name",
                &[opt(&descriptor.make), opt(&descriptor.model)],
            ))
        }
        IdentityTier::Edid => descriptor
            .edid_hash
            .as_ref()
            .map(|hash| digest("edid", &[hash.as_str()])),
        IdentityTier::Connector => Some(connector_identity(descriptor)),
    }
}

fn connector_identity(descriptor: &OutputDescriptor) -> Identity {
    digest(
        "connector",
        &[descriptor.connector.as_str(), descriptor.connection.tag()],
    )
}

fn primary(descriptor: &OutputDescriptor) -> (IdentityTier, Identity) {
    IdentityTier::ALL
        .into_iter()
        .find_map(|tier| identity_at(descriptor, tier).map(|id| (tier, id)))
        .unwrap_or_else(|| (IdentityTier::Connector, connector_identity(descriptor)))
}

/// Stable identity of an output. Same descriptor fields, same identity.
pub fn identity(descriptor: &OutputDescriptor) -> Identity {
    primary(descriptor).1
}

/// Tier the primary identity of `descriptor` comes from.
pub fn identity_tier(descriptor: &OutputDescriptor) -> IdentityTier {
    primary(descriptor).0
}

/// Weaker keys a record for this output may have been stored under.
///
/// Outputs reporting hardware data only fall back to weaker tiers that still
/// describe the hardware. Connector keys are shared by whatever gets plugged
/// in, so only outputs without any hardware data fall back to the bare
/// connector name.
pub fn alternate_identities(descriptor: &OutputDescriptor) -> Vec<Identity> {
    let (tier, primary_id) = primary(descriptor);
    let mut alternates: Vec<Identity> = if tier == IdentityTier::Connector {
        vec![Identity(descriptor.connector.clone())]
    } else {
        IdentityTier::ALL
            .into_iter()
            .filter(|candidate| *candidate > tier && *candidate != IdentityTier::Connector)
            .filter_map(|candidate| identity_at(descriptor, candidate))
            .collect()
    };
    alternates.retain(|id| *id != primary_id);
    alternates.dedup();
    alternates
}

/// Identity of a whole arrangement. Member order does not matter.
pub fn arrangement_identity(members: &[Identity]) -> Identity {
    let mut sorted: Vec<&str> = members.iter().map(Identity::as_str).collect();
    sorted.sort_unstable();
    digest("arrangement", &sorted)
}
