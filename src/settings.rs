use lazy_static::lazy_static;
use log::warn;
use std::{env, path::PathBuf, time::Duration};

pub const DATA_DIR_VAR: &str = "REGOLITH_DISPLAY_DATA_DIR";
pub const OSD_TIMEOUT_VAR: &str = "REGOLITH_DISPLAY_OSD_TIMEOUT_MS";

const APP_DIR: &str = "regolith-display";
const DEFAULT_OSD_TIMEOUT: Duration = Duration::from_secs(60);

lazy_static! {
    static ref DEFAULT_DATA_DIR: PathBuf = default_data_dir();
}

/// Runtime settings of the daemon, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub osd_timeout: Duration,
}

impl Settings {
    pub fn new(data_dir: PathBuf) -> Settings {
        Settings {
            data_dir,
            osd_timeout: DEFAULT_OSD_TIMEOUT,
        }
    }

    pub fn from_env() -> Settings {
        let data_dir = env::var_os(DATA_DIR_VAR)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| DEFAULT_DATA_DIR.clone());
        let osd_timeout = match env::var(OSD_TIMEOUT_VAR) {
            Ok(value) => parse_timeout(&value).unwrap_or_else(|| {
                warn!("Ignoring invalid {OSD_TIMEOUT_VAR}={value:?}");
                DEFAULT_OSD_TIMEOUT
            }),
            Err(_) => DEFAULT_OSD_TIMEOUT,
        };
        Settings {
            data_dir,
            osd_timeout,
        }
    }
}

fn parse_timeout(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn default_data_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME").filter(|dir| !dir.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR);
    }
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/share").join(APP_DIR),
        None => env::temp_dir().join(APP_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_parsing_rejects_garbage() {
        assert_eq!(parse_timeout("1500"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timeout(" 20 "), Some(Duration::from_millis(20)));
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout("soon"), None);
    }

    #[test]
    fn new_uses_default_timeout() {
        let settings = Settings::new(PathBuf::from("/tmp/displays"));
        assert_eq!(settings.osd_timeout, Duration::from_secs(60));
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/displays"));
    }
}
