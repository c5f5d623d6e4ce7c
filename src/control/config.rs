use super::{control_dir, Control, Info, OutputRetention};
use crate::config::Config;
use crate::identity::Identity;
use crate::output::{Output, OutputSettings};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default)]
    pub name: String,
}

/// One output's entry inside an arrangement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub id: Identity,
    #[serde(default)]
    pub metadata: EntryMetadata,
    #[serde(default)]
    pub retention: OutputRetention,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    // keys written by other versions are carried along untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OutputEntry {
    pub fn new(id: Identity, name: &str) -> OutputEntry {
        OutputEntry {
            id,
            metadata: EntryMetadata {
                name: name.to_owned(),
            },
            retention: OutputRetention::Undefined,
            settings: None,
            extra: Map::new(),
        }
    }
}

/// Record of one arrangement of connected outputs.
///
/// Identities come from EDID data, which is not unique: two monitors of the same
/// model without serials hash the same. Such ids are tracked in
/// `duplicate_output_ids` and only match an entry whose stored connector name
/// also matches.
#[derive(Debug)]
pub struct ControlConfig {
    data_dir: PathBuf,
    config: Config,
    duplicate_output_ids: Vec<Identity>,
    info: Info,
}

impl ControlConfig {
    pub fn new(data_dir: &Path, config: Config) -> ControlConfig {
        let mut seen = HashSet::new();
        let mut duplicate_output_ids = Vec::new();
        for output in config.connected_outputs() {
            let id = output.identity();
            if !seen.insert(id.clone()) && !duplicate_output_ids.contains(&id) {
                duplicate_output_ids.push(id);
            }
        }
        if !duplicate_output_ids.is_empty() {
            debug!("Outputs sharing an identity: {duplicate_output_ids:?}");
        }
        let mut control = ControlConfig {
            data_dir: data_dir.to_path_buf(),
            config,
            duplicate_output_ids,
            info: Info::new(),
        };
        control.read_file();
        control
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn duplicate_output_ids(&self) -> &[Identity] {
        &self.duplicate_output_ids
    }

    pub fn is_duplicate(&self, id: &Identity) -> bool {
        self.duplicate_output_ids.contains(id)
    }

    pub fn get_output_retention(&self, output: &Output) -> OutputRetention {
        self.lookup(output)
            .map(|entry| entry.retention)
            .unwrap_or_default()
    }

    pub fn get_output_retention_by_id(
        &self,
        output_id: &Identity,
        output_name: &str,
    ) -> OutputRetention {
        self.lookup_ids(std::slice::from_ref(output_id), output_name)
            .map(|entry| entry.retention)
            .unwrap_or_default()
    }

    pub fn set_output_retention(&mut self, output: &Output, value: OutputRetention) {
        let ids = Self::candidate_ids(output);
        self.update_entry(&ids, output.name(), |entry| entry.retention = value);
    }

    pub fn set_output_retention_by_id(
        &mut self,
        output_id: &Identity,
        output_name: &str,
        value: OutputRetention,
    ) {
        let ids = [output_id.clone()];
        self.update_entry(&ids, output_name, |entry| entry.retention = value);
    }

    pub fn get_output_settings(&self, output: &Output) -> Option<OutputSettings> {
        let value = self.lookup(output)?.settings?;
        match serde_json::from_value(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring unreadable settings for {}: {e}", output.name());
                None
            }
        }
    }

    pub fn set_output_settings(&mut self, output: &Output, settings: &OutputSettings) {
        let value = match serde_json::to_value(settings) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unable to store settings for {}: {e}", output.name());
                return;
            }
        };
        let ids = Self::candidate_ids(output);
        self.update_entry(&ids, output.name(), |entry| entry.settings = Some(value));
    }

    /// Entries of the record in stored order. Malformed entries are skipped.
    pub fn get_outputs(&self) -> Vec<OutputEntry> {
        Self::parse_entries(&self.raw_outputs())
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn set_outputs(&mut self, outputs_info: Vec<OutputEntry>) {
        let list = outputs_info
            .iter()
            .filter_map(|entry| serde_json::to_value(entry).ok())
            .collect();
        self.store_outputs(list);
    }

    /// Whether `entry` belongs to the output known by `output_ids` (primary id
    /// first, then its alternates) and connector `output_name`.
    pub fn info_is_output(
        &self,
        entry: &OutputEntry,
        output_ids: &[Identity],
        output_name: &str,
    ) -> bool {
        let Some((primary, alternates)) = output_ids.split_first() else {
            return false;
        };
        if entry.id.as_str().is_empty() {
            return false;
        }
        let name_matches = !output_name.is_empty() && entry.metadata.name == output_name;
        if entry.id == *primary {
            // the hash alone is ambiguous, the connector name must match too
            !self.is_duplicate(primary) || name_matches
        } else {
            // weaker ids may have been shared by several outputs back then
            alternates.contains(&entry.id) && name_matches
        }
    }

    fn candidate_ids(output: &Output) -> Vec<Identity> {
        let mut ids = vec![output.identity()];
        ids.extend(output.alternate_identities());
        ids
    }

    fn raw_outputs(&self) -> Vec<Value> {
        match self.const_info().get("outputs") {
            Some(Value::Array(list)) => list.clone(),
            _ => Vec::new(),
        }
    }

    fn parse_entries(raw: &[Value]) -> Vec<Option<OutputEntry>> {
        raw.iter()
            .map(|item| match serde_json::from_value(item.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping malformed output entry: {e}");
                    None
                }
            })
            .collect()
    }

    fn store_outputs(&mut self, list: Vec<Value>) {
        let id = Value::String(self.config.connected_outputs_hash().to_string());
        let info = self.info_mut();
        info.insert("id".into(), id);
        info.insert("outputs".into(), Value::Array(list));
    }

    /// Index of the entry for `ids`. An entry under the primary id wins over
    /// one found through an alternate.
    fn find_entry(
        &self,
        entries: &[Option<OutputEntry>],
        ids: &[Identity],
        output_name: &str,
    ) -> Option<usize> {
        let primary = ids.first()?;
        let matching = |entry: &Option<OutputEntry>, primary_only: bool| {
            entry.as_ref().map_or(false, |entry| {
                (!primary_only || entry.id == *primary)
                    && self.info_is_output(entry, ids, output_name)
            })
        };
        entries
            .iter()
            .position(|entry| matching(entry, true))
            .or_else(|| entries.iter().position(|entry| matching(entry, false)))
    }

    fn lookup_ids(&self, ids: &[Identity], output_name: &str) -> Option<OutputEntry> {
        let entries = Self::parse_entries(&self.raw_outputs());
        let index = self.find_entry(&entries, ids, output_name)?;
        entries.into_iter().nth(index).flatten()
    }

    fn lookup(&self, output: &Output) -> Option<OutputEntry> {
        self.lookup_ids(&Self::candidate_ids(output), output.name())
    }

    /// Applies `update` to the entry for `ids`, creating it if needed. Entries
    /// that do not parse are written back untouched.
    fn update_entry<F>(&mut self, ids: &[Identity], output_name: &str, update: F)
    where
        F: FnOnce(&mut OutputEntry),
    {
        let Some(primary) = ids.first() else {
            return;
        };
        let mut raw = self.raw_outputs();
        let mut entries = Self::parse_entries(&raw);
        let index = self.find_entry(&entries, ids, output_name);
        let mut entry = index
            .and_then(|index| entries[index].take())
            .unwrap_or_else(|| OutputEntry::new(primary.clone(), output_name));
        // migrate entries found through an alternate id
        entry.id = primary.clone();
        entry.metadata.name = output_name.to_owned();
        update(&mut entry);
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unable to store entry for {output_name}: {e}");
                return;
            }
        };
        match index {
            Some(index) => raw[index] = value,
            None => raw.push(value),
        }
        self.store_outputs(raw);
    }
}

impl Control for ControlConfig {
    fn dir_path(&self) -> PathBuf {
        control_dir(&self.data_dir).join("configs")
    }

    fn file_path(&self) -> PathBuf {
        self.file_path_from_hash(self.config.connected_outputs_hash().as_str())
    }

    fn info(&self) -> &Info {
        &self.info
    }

    fn info_mut(&mut self) -> &mut Info {
        &mut self.info
    }

    fn alternate_hashes(&self) -> Vec<String> {
        self.config
            .alternate_outputs_hashes()
            .iter()
            .map(Identity::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OutputDescriptor;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn twin(connector: &str) -> Output {
        Output::new(OutputDescriptor::from_reported(connector, "Dell-X", "U2719D", ""))
    }

    fn twins() -> Config {
        Config::new(vec![twin("DP-1"), twin("DP-2")])
    }

    #[test]
    fn unknown_arrangement_is_undefined() {
        let tmp = TempDir::new().unwrap();
        let control = ControlConfig::new(tmp.path(), twins());
        assert!(control.info().is_empty());
        for output in control.config().outputs() {
            assert_eq!(control.get_output_retention(output), OutputRetention::Undefined);
        }
    }

    #[test]
    fn duplicates_are_detected() {
        let tmp = TempDir::new().unwrap();
        let control = ControlConfig::new(tmp.path(), twins());
        assert_eq!(control.duplicate_output_ids(), &[twin("DP-1").identity()]);
    }

    #[test]
    fn duplicate_ids_are_told_apart_by_name() {
        let tmp = TempDir::new().unwrap();
        let config = twins();
        let (dp1, dp2) = (config.outputs()[0].clone(), config.outputs()[1].clone());
        let mut control = ControlConfig::new(tmp.path(), config);

        control.set_output_retention(&dp1, OutputRetention::Individual);
        assert_eq!(control.get_output_retention(&dp1), OutputRetention::Individual);
        assert_eq!(control.get_output_retention(&dp2), OutputRetention::Undefined);
        assert_eq!(
            control.get_output_retention_by_id(&dp2.identity(), ""),
            OutputRetention::Undefined
        );

        control.set_output_retention(&dp2, OutputRetention::Global);
        assert_eq!(control.get_outputs().len(), 2);
        assert_eq!(control.get_output_retention(&dp1), OutputRetention::Individual);
        assert_eq!(control.get_output_retention(&dp2), OutputRetention::Global);
        assert!(control
            .get_outputs()
            .iter()
            .all(|entry| !entry.metadata.name.is_empty()));
    }

    #[test]
    fn unique_ids_ignore_connector_name() {
        let tmp = TempDir::new().unwrap();
        let output = Output::new(OutputDescriptor::from_reported("DP-1", "LG-A", "Panel", "123"));
        let config = Config::new(vec![output.clone()]);
        let mut control = ControlConfig::new(tmp.path(), config);
        control.set_output_retention(&output, OutputRetention::Global);
        assert_eq!(
            control.get_output_retention_by_id(&output.identity(), "HDMI-A-1"),
            OutputRetention::Global
        );
    }

    #[test]
    fn update_keeps_single_entry() {
        let tmp = TempDir::new().unwrap();
        let output = twin("DP-1");
        let mut control = ControlConfig::new(tmp.path(), Config::new(vec![output.clone()]));
        control.set_output_retention(&output, OutputRetention::Global);
        control.set_output_retention(&output, OutputRetention::Individual);
        control.set_output_settings(&output, &output.settings());
        let outputs = control.get_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].retention, OutputRetention::Individual);
        assert_eq!(control.get_output_settings(&output), Some(output.settings()));
    }

    #[test]
    fn unknown_keys_and_values_survive() {
        let tmp = TempDir::new().unwrap();
        let output = twin("DP-1");
        let config = Config::new(vec![output.clone()]);
        let mut control = ControlConfig::new(tmp.path(), config.clone());
        control.set_outputs(vec![OutputEntry {
            extra: json!({ "rgbRange": 2 }).as_object().unwrap().clone(),
            ..OutputEntry::new(output.identity(), "DP-1")
        }]);
        control.info_mut().get_mut("outputs").unwrap()[0]["retention"] = json!("per-planet");
        assert!(control.write_file());

        let reloaded = ControlConfig::new(tmp.path(), config);
        assert_eq!(reloaded.get_output_retention(&output), OutputRetention::Undefined);
        assert_eq!(reloaded.get_outputs()[0].extra.get("rgbRange"), Some(&json!(2)));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let output = twin("DP-1");
        let config = Config::new(vec![output.clone()]);
        let path = ControlConfig::new(tmp.path(), config.clone()).file_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let record = json!({
            "outputs": [
                "garbage",
                { "metadata": { "name": "DP-1" } },
                { "id": output.identity(), "metadata": { "name": "DP-1" }, "retention": "global" }
            ]
        });
        fs::write(&path, record.to_string()).unwrap();

        let control = ControlConfig::new(tmp.path(), config);
        assert_eq!(control.get_outputs().len(), 1);
        assert_eq!(control.get_output_retention(&output), OutputRetention::Global);
    }

    #[test]
    fn unparsed_entries_survive_updates() {
        let tmp = TempDir::new().unwrap();
        let output = twin("DP-1");
        let config = Config::new(vec![output.clone()]);
        let path = ControlConfig::new(tmp.path(), config.clone()).file_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let record = json!({
            "outputs": [
                "garbage",
                { "id": output.identity(), "metadata": { "name": "DP-1" }, "retention": "global" }
            ]
        });
        fs::write(&path, record.to_string()).unwrap();

        let mut control = ControlConfig::new(tmp.path(), config.clone());
        control.set_output_retention(&output, OutputRetention::Individual);
        control.set_output_settings(&output, &output.settings());
        assert!(control.write_file());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let stored = raw["outputs"].as_array().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], json!("garbage"));
        let reloaded = ControlConfig::new(tmp.path(), config);
        assert_eq!(reloaded.get_output_retention(&output), OutputRetention::Individual);
    }

    #[test]
    fn alternate_matches_need_the_connector_name() {
        let tmp = TempDir::new().unwrap();
        let config = twins();
        let (dp1, dp2) = (config.outputs()[0].clone(), config.outputs()[1].clone());
        let mut control = ControlConfig::new(tmp.path(), config);
        control.set_output_retention(&dp1, OutputRetention::Individual);
        control.set_output_retention(&dp2, OutputRetention::Global);
        assert!(control.write_file());

        // the same two monitors now report their serials
        let serial = |connector: &str, serial: &str| {
            Output::new(OutputDescriptor::from_reported(connector, "Dell-X", "U2719D", serial))
        };
        let later = Config::new(vec![serial("DP-1", "111"), serial("DP-2", "222")]);
        let (dp1, dp2) = (later.outputs()[0].clone(), later.outputs()[1].clone());
        let mut migrated = ControlConfig::new(tmp.path(), later);
        assert!(migrated.duplicate_output_ids().is_empty());
        assert_eq!(migrated.get_output_retention(&dp1), OutputRetention::Individual);
        assert_eq!(migrated.get_output_retention(&dp2), OutputRetention::Global);

        migrated.set_output_retention(&dp2, OutputRetention::Individual);
        assert_eq!(migrated.get_output_retention(&dp1), OutputRetention::Individual);
        assert_eq!(migrated.get_outputs().len(), 2);
        assert_eq!(migrated.get_outputs()[1].id, dp2.identity());

        // a different connector does not pick up an entry through the weaker id
        let moved = serial("HDMI-A-1", "333");
        let elsewhere = ControlConfig::new(tmp.path(), twins());
        assert_eq!(elsewhere.get_output_retention(&moved), OutputRetention::Undefined);
    }
}
