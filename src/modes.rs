use serde::{Deserialize, Serialize};
use swayipc_async::{Mode as SwayMode, Output as SwayOutput};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Mode {
    id: String,
    width: i32,
    height: i32,
    refresh_rate: f64,
    current: bool,
    preferred: bool,
}

impl Mode {
    pub fn new(width: i32, height: i32, refresh_mhz: i32) -> Mode {
        let refresh_rate = refresh_mhz as f64 / 1000f64;
        Mode {
            id: Self::mode_id(width, height, refresh_rate),
            width,
            height,
            refresh_rate,
            current: false,
            preferred: false,
        }
    }

    pub fn from_sway(output: &SwayOutput, mode_info: &SwayMode) -> Mode {
        let SwayMode {
            height,
            width,
            refresh,
            ..
        } = *mode_info;
        let mut mode = Mode::new(width, height, refresh);
        mode.current = match &output.current_mode {
            Some(x) => Self::is_current_mode(x, mode_info),
            _ => false,
        };
        mode
    }

    pub fn with_current(mut self, current: bool) -> Mode {
        self.current = current;
        self
    }

    pub fn with_preferred(mut self, preferred: bool) -> Mode {
        self.preferred = preferred;
        self
    }

    pub fn mode_id(width: i32, height: i32, refresh_rate: f64) -> String {
        format!("{width}x{height}@{refresh_rate}Hz")
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn refresh_rate(&self) -> f64 {
        self.refresh_rate
    }

    /// Mode string as understood by `swaymsg output <name> mode`.
    pub fn sway_mode(&self) -> String {
        format!("{}x{}@{:.3}Hz", self.width, self.height, self.refresh_rate)
    }

    pub fn is_current_mode(actual: &SwayMode, current: &SwayMode) -> bool {
        current.height == actual.height
            && current.width == actual.width
            && current.refresh == actual.refresh
    }

    pub fn current(&self) -> bool {
        self.current
    }

    pub fn preferred(&self) -> bool {
        self.preferred
    }
}
