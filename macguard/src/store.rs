use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::device::{normalize_mac, normalize_name, DeviceRecord};

/// Errors from reading or writing the persisted device list.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read device store {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write device store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of a best-effort store load: parsed records plus one warning per
/// line that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadedDevices {
    pub devices: Vec<DeviceRecord>,
    pub warnings: Vec<String>,
}

/// Line-oriented on-disk device list with backup-before-write.
///
/// Format is one `{id}|{name}\t{original_mac}\t` line per enabled device,
/// ascending by id, trailing newline. Disabled devices are not written, so
/// their ids are not preserved across a disable/re-enable cycle.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl DeviceStore {
    /// Open a store at `path`; backups land in a sibling `backups/` directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_dir = path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"));
        Self { path, backup_dir }
    }

    /// Open a store with an explicit backup directory.
    pub fn with_backup_dir(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the store file, skipping (and reporting) unusable lines.
    ///
    /// A missing file is an empty registry, not an error. Parsing never
    /// aborts on a single bad line: a line without at least two tab-separated
    /// fields, with an invalid MAC, or with an unusable name is recorded as a
    /// warning and skipped.
    pub fn load(&self) -> Result<LoadedDevices, StoreError> {
        if !self.path.exists() {
            return Ok(LoadedDevices::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut loaded = LoadedDevices::default();
        for (idx, line) in content.lines().enumerate() {
            let line_num = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_line(line, line_num) {
                Ok(device) => loaded.devices.push(device),
                Err(reason) => loaded
                    .warnings
                    .push(format!("line {line_num}: {reason}, skipped")),
            }
        }

        Ok(loaded)
    }

    /// Persist the enabled subset of `devices`, sorted by id.
    ///
    /// The previous file is first copied into the backup directory with a
    /// timestamped name; backups are forensic only, so a backup failure is
    /// returned as a warning and never blocks the write. The write itself
    /// goes to a temp file in the store directory and is renamed into place.
    pub fn save(&self, devices: &[DeviceRecord]) -> Result<Vec<String>, StoreError> {
        let mut warnings = Vec::new();
        if let Err(reason) = self.backup_current() {
            warnings.push(format!("store backup failed: {reason}"));
        }

        let mut enabled: Vec<&DeviceRecord> = devices.iter().filter(|d| d.enabled).collect();
        enabled.sort_by_key(|d| d.id);

        let mut body = String::new();
        for device in enabled {
            body.push_str(&format!(
                "{}|{}\t{}\t\n",
                device.id, device.name, device.original_mac
            ));
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(body.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path)
            .map_err(|e| write_err(e.error))?;

        Ok(warnings)
    }

    fn backup_current(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.backup_dir).map_err(|e| e.to_string())?;
        let name = format!("mac_addresses_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        fs::copy(&self.path, self.backup_dir.join(name)).map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn parse_line(line: &str, line_num: usize) -> Result<DeviceRecord, String> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 2 {
        return Err("fewer than two tab-separated fields".to_string());
    }

    let id_name = parts[0];
    let raw_mac = parts[1].trim();

    let (id, raw_name) = match id_name.split_once('|') {
        Some((id_str, name)) => match id_str.trim().parse::<u32>() {
            Ok(id) => (id, name),
            // Keep the row; the line number stands in for a missing id.
            Err(_) => (line_num as u32, name),
        },
        None => (line_num as u32, id_name),
    };

    let mac = normalize_mac(raw_mac).map_err(|e| e.to_string())?;
    let name = normalize_name(raw_name).map_err(|e| e.to_string())?;

    Ok(DeviceRecord::new(id, name, mac, raw_mac.to_string()))
}
