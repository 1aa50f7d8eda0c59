use std::sync::Mutex;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use crate::device::{normalize_mac, normalize_name, DeviceError, DeviceRecord};
use crate::store::{DeviceStore, LoadedDevices, StoreError};

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no device with id {id}")]
    NotFound { id: u32 },
    #[error("MAC address {mac} already belongs to device '{owner}'")]
    DuplicateMac { mac: String, owner: String },
    #[error("device name '{name}' already exists")]
    DuplicateName { name: String },
}

/// A successful mutation plus any best-effort warnings raised on the way
/// (store-backup failures and skipped store lines).
#[derive(Debug)]
pub struct Saved<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

/// Partial update for [`Registry::update`]; `None` fields stay untouched.
#[derive(Debug, Default, Clone)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub mac: Option<String>,
    pub enabled: Option<bool>,
}

/// Snapshot of the enabled device set in the shape the firewall alias wants.
#[derive(Debug, Serialize)]
pub struct FirewallExport {
    pub alias_name: String,
    pub alias_type: String,
    pub description: String,
    /// Newline-joined canonical MACs, one per enabled device.
    pub content: String,
    pub devices: Vec<DeviceRecord>,
}

/// Device counts for the stats report.
#[derive(Debug, Serialize)]
pub struct DeviceStats {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
}

/// Outcome of a best-effort bulk import.
#[derive(Debug)]
pub struct ImportReport {
    pub added: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Device CRUD over the line-oriented store.
///
/// Every read re-parses the store file; there is no long-lived cache. A
/// process-local mutex serializes read-modify-write cycles so two in-process
/// mutations cannot silently drop each other's changes. Cross-process
/// exclusion is out of scope for a single-operator tool.
#[derive(Debug)]
pub struct Registry {
    store: DeviceStore,
    write_lock: Mutex<()>,
}

impl Registry {
    pub fn new(store: DeviceStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All persisted devices plus warnings for any lines skipped on load.
    pub fn list(&self) -> Result<LoadedDevices, RegistryError> {
        Ok(self.store.load()?)
    }

    /// One device by id.
    pub fn get(&self, id: u32) -> Result<DeviceRecord, RegistryError> {
        self.store
            .load()?
            .devices
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(RegistryError::NotFound { id })
    }

    /// Validate, check duplicates, assign the next id, and persist.
    ///
    /// Duplicate checks run before any mutation; a persist failure means the
    /// device was not added.
    pub fn add(&self, name: &str, mac: &str) -> Result<Saved<DeviceRecord>, RegistryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let loaded = self.store.load()?;
        let mut warnings = loaded.warnings;
        let mut devices = loaded.devices;

        let clean_name = normalize_name(name)?;
        let canonical = normalize_mac(mac)?;
        check_duplicates(&devices, &clean_name, &canonical, None)?;

        let next_id = devices.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let record = DeviceRecord::new(next_id, clean_name, canonical, mac.trim().to_string());
        devices.push(record.clone());

        warnings.extend(self.store.save(&devices)?);
        Ok(Saved {
            value: record,
            warnings,
        })
    }

    /// Apply a partial update to an existing device and persist.
    ///
    /// Changed fields are re-validated and re-checked for conflicts against
    /// every other device (a device's own current MAC or name never
    /// conflicts with itself). Disabling a device removes its row from the
    /// store; the returned record still shows the disabled state, but the id
    /// is not reserved for a later re-enable.
    pub fn update(
        &self,
        id: u32,
        update: DeviceUpdate,
    ) -> Result<Saved<DeviceRecord>, RegistryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let loaded = self.store.load()?;
        let mut warnings = loaded.warnings;
        let mut devices = loaded.devices;

        let idx = devices
            .iter()
            .position(|d| d.id == id)
            .ok_or(RegistryError::NotFound { id })?;

        let clean_name = update.name.as_deref().map(normalize_name).transpose()?;
        let canonical = update.mac.as_deref().map(normalize_mac).transpose()?;
        check_duplicates(
            &devices,
            clean_name.as_deref().unwrap_or(&devices[idx].name),
            canonical.as_deref().unwrap_or(&devices[idx].mac),
            Some(id),
        )?;

        let device = &mut devices[idx];
        if let Some(name) = clean_name {
            device.name = name;
        }
        if let Some(mac) = canonical {
            device.mac = mac;
            device.original_mac = update.mac.unwrap_or_default().trim().to_string();
        }
        if let Some(enabled) = update.enabled {
            device.enabled = enabled;
        }
        device.updated_date = Some(Local::now());
        let record = device.clone();

        warnings.extend(self.store.save(&devices)?);
        Ok(Saved {
            value: record,
            warnings,
        })
    }

    /// Remove a device and persist the remaining set.
    pub fn delete(&self, id: u32) -> Result<Saved<()>, RegistryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let loaded = self.store.load()?;
        let mut warnings = loaded.warnings;
        let mut devices = loaded.devices;

        let before = devices.len();
        devices.retain(|d| d.id != id);
        if devices.len() == before {
            return Err(RegistryError::NotFound { id });
        }

        warnings.extend(self.store.save(&devices)?);
        Ok(Saved {
            value: (),
            warnings,
        })
    }

    /// Pure read: the payload the reconciler pushes into the firewall alias.
    pub fn export_snapshot(&self, alias_name: &str) -> Result<FirewallExport, RegistryError> {
        let devices: Vec<DeviceRecord> = self
            .store
            .load()?
            .devices
            .into_iter()
            .filter(|d| d.enabled)
            .collect();

        let content = devices
            .iter()
            .map(|d| d.mac.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(FirewallExport {
            alias_name: alias_name.to_string(),
            alias_type: "mac".to_string(),
            description: format!(
                "Parental Controls MAC Addresses ({} devices)",
                devices.len()
            ),
            content,
            devices,
        })
    }

    /// Device counts for reporting.
    pub fn stats(&self) -> Result<DeviceStats, RegistryError> {
        let devices = self.store.load()?.devices;
        let enabled = devices.iter().filter(|d| d.enabled).count();
        Ok(DeviceStats {
            total: devices.len(),
            enabled,
            disabled: devices.len() - enabled,
        })
    }

    /// Best-effort bulk import.
    ///
    /// Accepts tab-separated `id|name<TAB>mac` / `name<TAB>mac` lines and
    /// comma-separated `name,mac` lines. Every line goes through [`add`]
    /// independently; one line failing is recorded as an error string and
    /// does not stop later lines.
    ///
    /// [`add`]: Registry::add
    pub fn import_from_text(&self, text: &str) -> Result<ImportReport, RegistryError> {
        let mut report = ImportReport {
            added: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        for (idx, raw_line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = if let Some((name_part, rest)) = line.split_once('\t') {
                let name = match name_part.split_once('|') {
                    Some((_, name)) => name,
                    None => name_part,
                };
                let mac = rest.split('\t').next().unwrap_or("");
                Some((name.trim(), mac.trim()))
            } else if let Some((name, mac)) = line.split_once(',') {
                Some((name.trim(), mac.trim()))
            } else {
                None
            };

            let Some((name, mac)) = parsed else {
                report
                    .errors
                    .push(format!("line {line_num}: unrecognized format"));
                continue;
            };

            match self.add(name, mac) {
                Ok(saved) => {
                    report.added += 1;
                    report.warnings.extend(saved.warnings);
                }
                Err(err) => report.errors.push(format!("line {line_num}: {err}")),
            }
        }

        Ok(report)
    }
}

fn check_duplicates(
    devices: &[DeviceRecord],
    name: &str,
    mac: &str,
    exclude_id: Option<u32>,
) -> Result<(), RegistryError> {
    for device in devices {
        if Some(device.id) == exclude_id {
            continue;
        }
        if device.mac == mac {
            return Err(RegistryError::DuplicateMac {
                mac: mac.to_string(),
                owner: device.name.clone(),
            });
        }
        if device.name.eq_ignore_ascii_case(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{DeviceUpdate, Registry, RegistryError};
    use crate::store::DeviceStore;

    fn registry(dir: &std::path::Path) -> Registry {
        Registry::new(DeviceStore::new(dir.join("mac_addresses.txt")))
    }

    #[test]
    fn add_assigns_monotonic_ids() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());

        let a = reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add a");
        let b = reg.add("Phone", "AA:BB:CC:DD:EE:02").expect("add b");
        assert_eq!(a.value.id, 1);
        assert_eq!(b.value.id, 2);

        reg.delete(1).expect("delete");
        let c = reg.add("TV", "AA:BB:CC:DD:EE:03").expect("add c");
        assert_eq!(c.value.id, 3, "max+1 over remaining ids");
    }

    #[test]
    fn add_rejects_duplicate_mac_after_normalization() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");

        let err = reg.add("Other", "aa-bb-cc-dd-ee-01").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMac { .. }));
    }

    #[test]
    fn add_rejects_duplicate_name_case_insensitively() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        reg.add("Kids Tablet", "AA:BB:CC:DD:EE:01").expect("add");

        let err = reg.add("kids tablet", "AA:BB:CC:DD:EE:02").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn update_own_mac_is_not_a_conflict() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        let added = reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");

        let updated = reg
            .update(
                added.value.id,
                DeviceUpdate {
                    mac: Some("aa:bb:cc:dd:ee:01".to_string()),
                    ..DeviceUpdate::default()
                },
            )
            .expect("self update");
        assert_eq!(updated.value.mac, "AA:BB:CC:DD:EE:01");
        assert!(updated.value.updated_date.is_some());
    }

    #[test]
    fn update_to_another_devices_mac_fails() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");
        let other = reg.add("Phone", "AA:BB:CC:DD:EE:02").expect("add");

        let err = reg
            .update(
                other.value.id,
                DeviceUpdate {
                    mac: Some("AABBCCDDEE01".to_string()),
                    ..DeviceUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMac { .. }));
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        let err = reg.update(42, DeviceUpdate::default()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { id: 42 }));
    }

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        let added = reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");

        let updated = reg
            .update(
                added.value.id,
                DeviceUpdate {
                    name: Some("Big Tablet".to_string()),
                    ..DeviceUpdate::default()
                },
            )
            .expect("update");
        assert_eq!(updated.value.name, "Big Tablet");
        assert_eq!(updated.value.mac, "AA:BB:CC:DD:EE:01");
        assert!(updated.value.enabled);
    }

    #[test]
    fn disabling_removes_device_from_later_reads() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        let added = reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");

        let updated = reg
            .update(
                added.value.id,
                DeviceUpdate {
                    enabled: Some(false),
                    ..DeviceUpdate::default()
                },
            )
            .expect("disable");
        assert!(!updated.value.enabled);

        // The store keeps enabled rows only; a disabled device is gone.
        assert!(reg.list().expect("list").devices.is_empty());
        assert!(matches!(
            reg.get(added.value.id),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        assert!(matches!(
            reg.delete(7),
            Err(RegistryError::NotFound { id: 7 })
        ));
    }

    #[test]
    fn export_snapshot_joins_enabled_macs() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());
        reg.add("Tablet", "AA:BB:CC:DD:EE:01").expect("add");
        reg.add("Phone", "aabbccddee02").expect("add");

        let export = reg.export_snapshot("ParentalControlMACs").expect("export");
        assert_eq!(export.alias_name, "ParentalControlMACs");
        assert_eq!(export.alias_type, "mac");
        assert_eq!(export.content, "AA:BB:CC:DD:EE:01\nAA:BB:CC:DD:EE:02");
        assert!(export.description.contains("2 devices"));
    }

    #[test]
    fn import_mixed_lines_counts_and_reports_per_line() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());

        let text = "Tablet,AA:BB:CC:DD:EE:01\n\
                    5|Phone\tAA:BB:CC:DD:EE:02\t\n\
                    Tablet,AA:BB:CC:DD:EE:03\n\
                    garbage-without-separators\n\
                    TV,not-a-mac\n";
        let report = reg.import_from_text(text).expect("import");

        assert_eq!(report.added, 2);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].contains("line 3"), "duplicate name line");
        assert!(report.errors[1].contains("line 4"), "unrecognized line");
        assert!(report.errors[2].contains("line 5"), "bad mac line");
    }

    #[test]
    fn import_ignores_ids_in_tab_lines_and_assigns_fresh_ones() {
        let dir = tempdir().expect("tempdir");
        let reg = registry(dir.path());

        reg.import_from_text("99|Phone\tAA:BB:CC:DD:EE:02\t\n")
            .expect("import");
        let devices = reg.list().expect("list").devices;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, 1);
    }
}
