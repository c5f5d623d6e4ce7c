//! Which record an output's settings go to, and which record wins on restore.

use crate::control::{Control, ControlConfig, ControlOutput, OutputRetention};
use crate::output::{Output, OutputSettings};
use log::debug;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTarget {
    /// The output's own record under `control/outputs/`.
    Output,
    /// The output's entry in the current arrangement's record.
    Config,
}

pub fn target_for(retention: OutputRetention) -> Option<RecordTarget> {
    match retention {
        OutputRetention::Individual => Some(RecordTarget::Output),
        OutputRetention::Global => Some(RecordTarget::Config),
        OutputRetention::Undefined => None,
    }
}

/// Settings to restore for an output. An individual output is restored from its
/// own record first, a global one only from the arrangement entry, whatever an
/// earlier individual record still holds.
pub fn resolve_settings(
    retention: OutputRetention,
    output_record: Option<OutputSettings>,
    config_entry: Option<OutputSettings>,
) -> Option<OutputSettings> {
    match target_for(retention)? {
        RecordTarget::Output => output_record.or(config_entry),
        RecordTarget::Config => config_entry,
    }
}

/// Stores the current settings of `output` according to its retention in
/// `control`. Returns false only if a record had to be written and could not be.
pub fn store_output(data_dir: &Path, control: &mut ControlConfig, output: &Output) -> bool {
    let retention = control.get_output_retention(output);
    match target_for(retention) {
        Some(RecordTarget::Output) => {
            let mut record = ControlOutput::new(data_dir, output);
            record.set_retention(retention);
            record.set_settings(&output.settings());
            record.write_file()
        }
        Some(RecordTarget::Config) => {
            control.set_output_settings(output, &output.settings());
            true
        }
        None => {
            debug!("Not remembering {}: retention undefined", output.name());
            true
        }
    }
}

/// Looks up what should be restored onto `output`.
pub fn restore_output(
    data_dir: &Path,
    control: &ControlConfig,
    output: &Output,
) -> Option<OutputSettings> {
    let retention = control.get_output_retention(output);
    target_for(retention)?;
    let record = ControlOutput::new(data_dir, output);
    // a record left over from another retention is not authoritative
    let record_settings = match record.retention() {
        OutputRetention::Individual => record.settings(),
        _ => None,
    };
    resolve_settings(retention, record_settings, control.get_output_settings(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::identity::OutputDescriptor;
    use crate::output::Rotation;
    use tempfile::TempDir;

    fn rotated(rotation: Rotation) -> OutputSettings {
        OutputSettings {
            rotation,
            ..OutputSettings::default()
        }
    }

    #[test]
    fn targets() {
        assert_eq!(target_for(OutputRetention::Individual), Some(RecordTarget::Output));
        assert_eq!(target_for(OutputRetention::Global), Some(RecordTarget::Config));
        assert_eq!(target_for(OutputRetention::Undefined), None);
    }

    #[test]
    fn output_record_wins_only_for_individual_outputs() {
        let left = rotated(Rotation::Left);
        let down = rotated(Rotation::Down);
        assert_eq!(
            resolve_settings(OutputRetention::Individual, Some(left.clone()), Some(down.clone())),
            Some(left.clone())
        );
        assert_eq!(
            resolve_settings(OutputRetention::Individual, None, Some(down.clone())),
            Some(down.clone())
        );
        assert_eq!(
            resolve_settings(OutputRetention::Global, Some(left.clone()), Some(down.clone())),
            Some(down.clone())
        );
        assert_eq!(resolve_settings(OutputRetention::Global, Some(left.clone()), None), None);
        assert_eq!(resolve_settings(OutputRetention::Undefined, Some(left), Some(down)), None);
    }

    #[test]
    fn store_routes_by_retention() {
        let tmp = TempDir::new().unwrap();
        let panel = Output::new(OutputDescriptor::from_reported("eDP-1", "LG-A", "Panel", "123"))
            .with_position(0, 0);
        let external =
            Output::new(OutputDescriptor::from_reported("DP-1", "Dell-X", "U2719D", "555"))
                .with_position(1920, 0);
        let unset = Output::new(OutputDescriptor::new("HDMI-A-1"));
        let config = Config::new(vec![panel.clone(), external.clone(), unset.clone()]);
        let mut control = ControlConfig::new(tmp.path(), config);
        control.set_output_retention(&panel, OutputRetention::Global);
        control.set_output_retention(&external, OutputRetention::Individual);

        for output in [&panel, &external, &unset] {
            assert!(store_output(tmp.path(), &mut control, output));
        }
        assert_eq!(control.get_output_settings(&panel), Some(panel.settings()));
        assert_eq!(control.get_output_settings(&external), None);
        assert_eq!(
            ControlOutput::new(tmp.path(), &external).settings(),
            Some(external.settings())
        );
        assert!(ControlOutput::new(tmp.path(), &panel).info().is_empty());
        assert!(ControlOutput::new(tmp.path(), &unset).info().is_empty());

        assert_eq!(restore_output(tmp.path(), &control, &panel), Some(panel.settings()));
        assert_eq!(restore_output(tmp.path(), &control, &external), Some(external.settings()));
        assert_eq!(restore_output(tmp.path(), &control, &unset), None);
    }

    #[test]
    fn switching_to_global_leaves_old_record_behind() {
        let tmp = TempDir::new().unwrap();
        let descriptor = OutputDescriptor::from_reported("DP-1", "Dell-X", "U2719D", "555");
        let before = Output::new(descriptor.clone()).with_position(0, 0);
        let mut control = ControlConfig::new(tmp.path(), Config::new(vec![before.clone()]));
        control.set_output_retention(&before, OutputRetention::Individual);
        assert!(store_output(tmp.path(), &mut control, &before));

        // moved, then switched to global
        let after = Output::new(descriptor).with_position(1920, 0);
        control.set_output_retention(&after, OutputRetention::Global);
        assert!(store_output(tmp.path(), &mut control, &after));
        assert!(control.write_file());

        let old = ControlOutput::new(tmp.path(), &after);
        assert_eq!(old.settings(), Some(before.settings()));
        let restored = restore_output(tmp.path(), &control, &after).unwrap();
        assert_eq!(restored.position, after.settings().position);
        assert_eq!(restored.position.x, 1920);
    }
}
