//! On-disk control records.
//!
//! A record is a JSON object mirrored to one file. Outputs get one record each
//! under `control/outputs/`, arrangements of outputs one under `control/configs/`.
//! Reads never fail: a missing or unreadable record is an empty one. Writes
//! report failure as `false` and leave the in-memory state untouched.

mod config;
mod output;

pub use config::{ControlConfig, EntryMetadata, OutputEntry};
pub use output::ControlOutput;

use crate::error::Result;
use log::{debug, warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

const DIR_NAME: &str = "control";

pub type Info = Map<String, Value>;

/// Where the settings of an output are remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum OutputRetention {
    #[default]
    Undefined = -1,
    Global = 0,
    Individual = 1,
}

impl OutputRetention {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputRetention::Undefined => "undefined",
            OutputRetention::Global => "global",
            OutputRetention::Individual => "individual",
        }
    }

    pub fn from_name(name: &str) -> OutputRetention {
        match name.trim().to_ascii_lowercase().as_str() {
            "global" => OutputRetention::Global,
            "individual" => OutputRetention::Individual,
            _ => OutputRetention::Undefined,
        }
    }

    /// Lenient parse of a stored value. Anything unrecognized is `Undefined`.
    pub fn from_value(value: &Value) -> OutputRetention {
        match value {
            Value::String(s) => OutputRetention::from_name(s),
            // older records stored the enum discriminant
            Value::Number(n) => n
                .as_i64()
                .and_then(OutputRetention::from_i64)
                .unwrap_or_default(),
            _ => OutputRetention::Undefined,
        }
    }
}

impl fmt::Display for OutputRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OutputRetention {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputRetention {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(OutputRetention::from_value(&value))
    }
}

/// Shared behavior of the per-output and per-arrangement records.
pub trait Control {
    /// Root directory of the record kind.
    fn dir_path(&self) -> PathBuf;
    /// Backing file named by the record's own identity.
    fn file_path(&self) -> PathBuf;
    fn info(&self) -> &Info;
    fn info_mut(&mut self) -> &mut Info;

    /// Hashes older records may be stored under, strongest first.
    fn alternate_hashes(&self) -> Vec<String> {
        Vec::new()
    }

    fn file_path_from_hash(&self, hash: &str) -> PathBuf {
        self.dir_path().join(hash)
    }

    fn const_info(&self) -> &Info {
        self.info()
    }

    /// Loads the record into memory, falling back to records stored under an
    /// alternate hash. Leaves an empty map when nothing is found.
    fn read_file(&mut self) {
        let path = self.file_path();
        let info = read_record(&path).or_else(|| {
            let alternates = self.alternate_hashes();
            find_alternate(&*self, &alternates)
        });
        *self.info_mut() = info.unwrap_or_default();
    }

    /// Flushes the in-memory record to `file_path()`. An empty record removes the
    /// file. Returns false if the change could not be persisted.
    fn write_file(&self) -> bool {
        let path = self.file_path();
        let result = if self.const_info().is_empty() {
            remove_record(&path)
        } else {
            write_record(&self.dir_path(), &path, self.const_info())
        };
        match result {
            Ok(()) => {
                debug!("Wrote control record {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to write control record {}: {e}", path.display());
                false
            }
        }
    }

    fn convert_variant_to_output_retention(value: &Value) -> OutputRetention
    where
        Self: Sized,
    {
        OutputRetention::from_value(value)
    }
}

/// `<data dir>/control`
pub fn control_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(DIR_NAME)
}

fn read_record(path: &Path) -> Option<Info> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Unable to read control record {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(info)) => Some(info),
        Ok(_) => {
            warn!("Control record {} is not an object, ignoring", path.display());
            None
        }
        Err(e) => {
            warn!("Corrupt control record {}: {e}", path.display());
            None
        }
    }
}

fn find_alternate<C: Control + ?Sized>(control: &C, alternates: &[String]) -> Option<Info> {
    if alternates.is_empty() {
        return None;
    }
    for hash in alternates {
        let path = control.file_path_from_hash(hash);
        if let Some(info) = read_record(&path) {
            debug!("Found control record under alternate hash {hash}");
            return Some(info);
        }
    }
    // the file name may differ from the id it was written for
    let entries = fs::read_dir(control.dir_path()).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(info) = read_record(&path) else {
            continue;
        };
        let matches = info
            .get("id")
            .and_then(Value::as_str)
            .map_or(false, |id| alternates.iter().any(|alt| alt == id));
        if matches {
            debug!("Found control record {} by scanning", path.display());
            return Some(info);
        }
    }
    None
}

fn write_record(dir: &Path, path: &Path, info: &Info) -> Result<()> {
    fs::create_dir_all(dir)?;
    let contents = serde_json::to_vec_pretty(info)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    let written = replace_with(&tmp_path, path, &contents);
    if written.is_err() {
        // best effort, the write error is what gets reported
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn replace_with(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn remove_record(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
