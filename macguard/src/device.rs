use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

/// Longest device name kept after cleaning; anything past this is truncated
/// silently rather than rejected.
pub const MAX_NAME_LEN: usize = 50;

/// Validation errors for user-entered device fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Raw MAC did not reduce to exactly 12 hex digits.
    #[error("invalid MAC address format: {raw}")]
    InvalidMac { raw: String },
    /// Name was empty after removing disallowed characters.
    #[error("device name contains no valid characters: {raw:?}")]
    InvalidName { raw: String },
}

/// One registered household device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// Positive, unique, assigned as max(existing)+1; stable across edits.
    pub id: u32,
    /// Cleaned human label, unique case-insensitively.
    pub name: String,
    /// Canonical `XX:XX:XX:XX:XX:XX` uppercase form, unique.
    pub mac: String,
    /// The raw string the user entered; written back to the store verbatim.
    pub original_mac: String,
    /// Only enabled devices are persisted and synced to the firewall.
    pub enabled: bool,
    /// Informational only.
    pub added_date: DateTime<Local>,
    /// Informational only; set on every successful update.
    pub updated_date: Option<DateTime<Local>>,
}

impl DeviceRecord {
    /// Build a fresh enabled record from already-validated fields.
    pub fn new(id: u32, name: String, mac: String, original_mac: String) -> Self {
        Self {
            id,
            name,
            mac,
            original_mac,
            enabled: true,
            added_date: Local::now(),
            updated_date: None,
        }
    }
}

/// Normalize a raw MAC string to the canonical colon-separated uppercase
/// form the appliance expects.
///
/// Accepts `AA-BB-CC-DD-EE-FF`, `aa:bb:cc:dd:ee:ff`, `AABBCCDDEEFF`, and any
/// other separator noise; everything that is not a hex digit is stripped and
/// exactly 12 digits must remain.
pub fn normalize_mac(raw: &str) -> Result<String, DeviceError> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if digits.len() != 12 {
        return Err(DeviceError::InvalidMac {
            raw: raw.to_string(),
        });
    }

    let pairs: Vec<&str> = (0..6).map(|i| &digits[i * 2..i * 2 + 2]).collect();
    Ok(pairs.join(":"))
}

/// Clean a device name for use in alias descriptions and the store file.
///
/// Characters outside `[A-Za-z0-9_- ]` are removed; an empty result is an
/// error, and names longer than [`MAX_NAME_LEN`] are truncated silently.
pub fn normalize_name(raw: &str) -> Result<String, DeviceError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();
    let cleaned = cleaned.trim().to_string();

    if cleaned.is_empty() {
        return Err(DeviceError::InvalidName {
            raw: raw.to_string(),
        });
    }

    if cleaned.len() > MAX_NAME_LEN {
        return Ok(cleaned[..MAX_NAME_LEN].trim_end().to_string());
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::{normalize_mac, normalize_name, DeviceError};

    #[test]
    fn normalizes_common_mac_formats_to_same_canonical_form() {
        for raw in ["AA-BB-CC-DD-EE-FF", "AABBCCDDEEFF", "aa:bb:cc:dd:ee:ff"] {
            assert_eq!(
                normalize_mac(raw).expect("valid"),
                "AA:BB:CC:DD:EE:FF",
                "input {raw}"
            );
        }
    }

    #[test]
    fn normalize_mac_is_idempotent() {
        let once = normalize_mac("aa-bb-cc-dd-ee-01").expect("valid");
        let twice = normalize_mac(&once).expect("still valid");
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_short_and_long_macs() {
        assert!(matches!(
            normalize_mac("AA:BB:CC"),
            Err(DeviceError::InvalidMac { .. })
        ));
        assert!(matches!(
            normalize_mac("AABBCCDDEEFF00"),
            Err(DeviceError::InvalidMac { .. })
        ));
    }

    #[test]
    fn rejects_non_hex_noise_that_leaves_wrong_length() {
        // "GG" contributes nothing, leaving 10 digits.
        assert!(normalize_mac("GG:BB:CC:DD:EE:FF").is_err());
    }

    #[test]
    fn cleans_name_and_keeps_allowed_punctuation() {
        assert_eq!(
            normalize_name("  Kid's Tablet #1! ").expect("valid"),
            "Kids Tablet 1"
        );
        assert_eq!(normalize_name("game-room_pc").expect("valid"), "game-room_pc");
    }

    #[test]
    fn empty_after_cleaning_is_an_error() {
        assert!(matches!(
            normalize_name("!!!@@@"),
            Err(DeviceError::InvalidName { .. })
        ));
        assert!(normalize_name("   ").is_err());
    }

    #[test]
    fn long_names_truncate_silently() {
        let raw = "x".repeat(80);
        let cleaned = normalize_name(&raw).expect("valid");
        assert_eq!(cleaned.len(), super::MAX_NAME_LEN);
    }
}
