use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default settings file looked up next to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "macguard.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Process settings, loaded from TOML with embedded defaults for every field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Path of the line-oriented device store.
    pub store_path: PathBuf,
    /// Backup directory for store copies; defaults to a sibling `backups/`.
    pub backup_dir: Option<PathBuf>,
    pub router: RouterSettings,
    pub firewall: FirewallSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSettings {
    pub host: String,
    pub user: String,
    /// SSH key file; a leading `~/` is expanded against `$HOME`.
    pub key_path: String,
    /// Remote path of the appliance configuration document.
    pub config_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FirewallSettings {
    pub alias_name: String,
    /// Synthetic token embedded in the managed rule's description and
    /// matched token-exactly when looking the rule up.
    pub rule_marker: String,
    pub rule_label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("mac_addresses/mac_addresses.txt"),
            backup_dir: None,
            router: RouterSettings::default(),
            firewall: FirewallSettings::default(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            host: "192.168.123.1".to_string(),
            user: "root".to_string(),
            key_path: "~/.ssh/id_ed25519_opnsense".to_string(),
            config_path: "/conf/config.xml".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            alias_name: "ParentalControlMACs".to_string(),
            rule_marker: "[macguard:block]".to_string(),
            rule_label: "ParentalControlBlock".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load_file(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Key path with a leading `~/` expanded against `$HOME`.
    pub fn resolved_key_path(&self) -> PathBuf {
        let raw = &self.router.key_path;
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return Path::new(&home).join(rest);
            }
        }
        PathBuf::from(raw)
    }
}
