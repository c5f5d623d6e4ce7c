use super::{control_dir, Control, Info, OutputRetention};
use crate::identity::Identity;
use crate::output::{Output, OutputSettings};
use log::warn;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Record of a single physical output, shared by every arrangement it shows up in.
#[derive(Debug)]
pub struct ControlOutput {
    data_dir: PathBuf,
    identity: Identity,
    alternates: Vec<Identity>,
    info: Info,
}

impl ControlOutput {
    pub fn new(data_dir: &Path, output: &Output) -> ControlOutput {
        let mut control = ControlOutput {
            data_dir: data_dir.to_path_buf(),
            identity: output.identity(),
            alternates: output.alternate_identities(),
            info: Info::new(),
        };
        control.read_file();
        control
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn retention(&self) -> OutputRetention {
        self.info
            .get("retention")
            .map(OutputRetention::from_value)
            .unwrap_or_default()
    }

    pub fn set_retention(&mut self, value: OutputRetention) {
        self.stamp();
        self.info
            .insert("retention".into(), Value::String(value.as_str().into()));
    }

    pub fn settings(&self) -> Option<OutputSettings> {
        let value = self.info.get("settings")?;
        match serde_json::from_value(value.clone()) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring unreadable settings for output {}: {e}", self.identity);
                None
            }
        }
    }

    pub fn set_settings(&mut self, settings: &OutputSettings) {
        match serde_json::to_value(settings) {
            Ok(value) => {
                self.stamp();
                self.info.insert("settings".into(), value);
            }
            Err(e) => warn!("Unable to store settings for output {}: {e}", self.identity),
        }
    }

    // Records found through an alternate hash are rewritten under the primary id.
    fn stamp(&mut self) {
        self.info
            .insert("id".into(), Value::String(self.identity.to_string()));
    }
}

impl Control for ControlOutput {
    fn dir_path(&self) -> PathBuf {
        control_dir(&self.data_dir).join("outputs")
    }

    fn file_path(&self) -> PathBuf {
        self.file_path_from_hash(self.identity.as_str())
    }

    fn info(&self) -> &Info {
        &self.info
    }

    fn info_mut(&mut self) -> &mut Info {
        &mut self.info
    }

    fn alternate_hashes(&self) -> Vec<String> {
        self.alternates.iter().map(Identity::to_string).collect()
    }
}
