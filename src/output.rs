use crate::identity::{self, Identity, OutputDescriptor};
use crate::modes::Mode;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};
use swayipc_async::Output as SwayOutput;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromPrimitive)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    #[default]
    Normal = 0,
    Left = 1,
    Down = 2,
    Right = 3,
    Flipped = 4,
    FlippedLeft = 5,
    FlippedDown = 6,
    FlippedRight = 7,
}

impl Rotation {
    /// Parses sway's `transform` field (`normal`, `90`, `flipped-270`, ...).
    pub fn from_sway(transform: &str) -> Rotation {
        match transform {
            "90" => Rotation::Left,
            "180" => Rotation::Down,
            "270" => Rotation::Right,
            "flipped" => Rotation::Flipped,
            "flipped-90" => Rotation::FlippedLeft,
            "flipped-180" => Rotation::FlippedDown,
            "flipped-270" => Rotation::FlippedRight,
            _ => Rotation::Normal,
        }
    }

    pub fn sway_transform(&self) -> &'static str {
        match self {
            Rotation::Normal => "normal",
            Rotation::Left => "90",
            Rotation::Down => "180",
            Rotation::Right => "270",
            Rotation::Flipped => "flipped",
            Rotation::FlippedLeft => "flipped-90",
            Rotation::FlippedDown => "flipped-180",
            Rotation::FlippedRight => "flipped-270",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// The part of an output's state that gets remembered and restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub rotation: Rotation,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            enabled: true,
            mode: None,
            position: Position::default(),
            scale: default_scale(),
            rotation: Rotation::Normal,
        }
    }
}

impl OutputSettings {
    /// Sway commands reproducing these settings on the output named `connector`.
    pub fn sway_commands(&self, connector: &str, modes: &[Mode]) -> Vec<String> {
        if !self.enabled {
            return vec![format!("output {connector} disable")];
        }
        let mut cmds = vec![format!("output {connector} enable")];
        if let Some(mode) = self
            .mode
            .as_deref()
            .and_then(|id| modes.iter().find(|m| m.get_id() == id))
        {
            cmds.push(format!("output {connector} mode {}", mode.sway_mode()));
        }
        cmds.push(format!(
            "output {connector} pos {} {}",
            self.position.x, self.position.y
        ));
        cmds.push(format!("output {connector} scale {}", self.scale));
        cmds.push(format!(
            "output {connector} transform {}",
            self.rotation.sway_transform()
        ));
        cmds
    }
}

/// One output of the live configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    descriptor: OutputDescriptor,
    connected: bool,
    enabled: bool,
    primary: bool,
    modes: Vec<Mode>,
    position: Position,
    scale: f64,
    rotation: Rotation,
}

impl Output {
    pub fn new(descriptor: OutputDescriptor) -> Output {
        Output {
            descriptor,
            connected: true,
            enabled: true,
            primary: false,
            modes: Vec::new(),
            position: Position::default(),
            scale: 1.0,
            rotation: Rotation::Normal,
        }
    }

    pub fn from_sway(output: &SwayOutput) -> Output {
        let descriptor = OutputDescriptor::from_reported(
            &output.name,  // connector
            &output.make,  // vendor
            &output.model, // product
            &output.serial,
        );
        Output {
            descriptor,
            // sway only reports connected outputs
            connected: true,
            enabled: output.active,
            primary: output.primary,
            modes: output.modes.iter().map(|m| Mode::from_sway(output, m)).collect(),
            position: Position {
                x: output.rect.x,
                y: output.rect.y,
            },
            scale: output.scale.unwrap_or(1f64),
            rotation: output
                .transform
                .as_deref()
                .map(Rotation::from_sway)
                .unwrap_or_default(),
        }
    }

    pub fn with_modes(mut self, modes: Vec<Mode>) -> Output {
        self.modes = modes;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Output {
        self.enabled = enabled;
        self
    }

    pub fn with_connected(mut self, connected: bool) -> Output {
        self.connected = connected;
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Output {
        self.primary = primary;
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Output {
        self.position = Position { x, y };
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.connector
    }

    pub fn descriptor(&self) -> &OutputDescriptor {
        &self.descriptor
    }

    pub fn identity(&self) -> Identity {
        identity::identity(&self.descriptor)
    }

    pub fn alternate_identities(&self) -> Vec<Identity> {
        identity::alternate_identities(&self.descriptor)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn current_mode(&self) -> Option<&Mode> {
        self.modes.iter().find(|m| m.current())
    }

    /// Snapshot of the restorable state.
    pub fn settings(&self) -> OutputSettings {
        OutputSettings {
            enabled: self.enabled,
            mode: self.current_mode().map(|m| m.get_id().to_owned()),
            position: self.position,
            scale: self.scale,
            rotation: self.rotation,
        }
    }

    /// Human readable label, `DP-1 'Dell Inc. DELL U2719D'`.
    pub fn label(&self) -> String {
        match self.descriptor.display_name() {
            Some(display_name) => format!("{} '{}'", self.name(), display_name),
            None => self.name().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    fn laptop_panel() -> Output {
        Output::new(OutputDescriptor::from_reported("eDP-1", "BOE", "0x095F", "Unknown"))
            .with_modes(vec![
                Mode::new(1920, 1080, 60000).with_current(true),
                Mode::new(1280, 720, 60000),
            ])
            .with_position(1920, 0)
    }

    #[test]
    fn settings_snapshot_current_state() {
        let settings = laptop_panel().settings();
        assert!(settings.enabled);
        assert_eq!(settings.mode.as_deref(), Some("1920x1080@60Hz"));
        assert_eq!(settings.position, Position { x: 1920, y: 0 });
        assert_eq!(settings.rotation, Rotation::Normal);
    }

    #[test]
    fn sway_commands_for_enabled_output() {
        let output = laptop_panel();
        let mut settings = output.settings();
        settings.rotation = Rotation::Right;
        settings.scale = 1.5;
        assert_eq!(
            settings.sway_commands(output.name(), output.modes()),
            vec![
                "output eDP-1 enable",
                "output eDP-1 mode 1920x1080@60.000Hz",
                "output eDP-1 pos 1920 0",
                "output eDP-1 scale 1.5",
                "output eDP-1 transform 270",
            ]
        );
    }

    #[test]
    fn disabled_output_only_disables() {
        let settings = OutputSettings {
            enabled: false,
            ..OutputSettings::default()
        };
        assert_eq!(settings.sway_commands("DP-2", &[]), vec!["output DP-2 disable"]);
    }

    #[test]
    fn rotation_conversions() {
        assert_eq!(Rotation::from_sway("flipped-90"), Rotation::FlippedLeft);
        assert_eq!(Rotation::from_sway("bogus"), Rotation::Normal);
        assert_eq!(Rotation::from_i64(3), Some(Rotation::Right));
        assert_eq!(Rotation::from_i64(8), None);
        assert_eq!(
            serde_json::to_value(Rotation::FlippedDown).unwrap(),
            serde_json::json!("flipped-down")
        );
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings: OutputSettings = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "position": { "x": 10, "y": 20 }
        }))
        .unwrap();
        assert_eq!(settings.scale, 1.0);
        assert_eq!(settings.mode, None);
        assert_eq!(settings.position, Position { x: 10, y: 20 });
    }

    #[test]
    fn label_uses_display_name() {
        assert_eq!(laptop_panel().label(), "eDP-1 'BOE 0x095F'");
        assert_eq!(Output::new(OutputDescriptor::new("HDMI-A-1")).label(), "HDMI-A-1");
    }
}
