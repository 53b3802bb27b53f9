use serde::Deserialize;
use std::{error::Error, fs, io};

const SETTINGS_FILENAME: &str = "settings.json";

/// Runtime configuration, read from `settings.json` in the working
/// directory. Every field has a default, so the file is optional and may
/// be partial.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    pub save_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            save_file: "assignments.redb".to_string(),
        }
    }
}

impl Settings {
    /// Missing file → defaults. A file that exists but does not parse is
    /// an error: silently ignoring a broken config hides typos.
    pub fn load() -> Result<Settings, Box<dyn Error>> {
        match fs::read_to_string(SETTINGS_FILENAME) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }
}
