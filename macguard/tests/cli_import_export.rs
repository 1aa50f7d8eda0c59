use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn write_settings(dir: &TempDir) -> PathBuf {
    let store = dir.path().join("mac_addresses.txt");
    let config = dir.path().join("macguard.toml");
    fs::write(
        &config,
        format!("store_path = {:?}\n", store.display().to_string()),
    )
    .expect("write settings");
    config
}

fn macguard(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("macguard"));
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn import_mixed_file_counts_valid_lines_and_reports_the_rest() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(&dir);
    let import = dir.path().join("devices.txt");
    fs::write(
        &import,
        "Tablet,AA:BB:CC:DD:EE:01\n\
         7|Phone\tAA:BB:CC:DD:EE:02\t\n\
         Tablet,AA:BB:CC:DD:EE:03\n\
         not a parseable line\n",
    )
    .expect("write import file");

    macguard(&config)
        .arg("import")
        .arg(&import)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 2 device(s)"))
        .stdout(predicate::str::contains("line 3"))
        .stdout(predicate::str::contains("line 4: unrecognized format"));

    macguard(&config)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("devices total=2 enabled=2 disabled=0"));
}

#[test]
fn export_lists_alias_and_canonical_macs() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(&dir);

    macguard(&config)
        .args(["add", "Tablet", "aa-bb-cc-dd-ee-01"])
        .assert()
        .success();
    macguard(&config)
        .args(["add", "Switch", "AABBCCDDEE02"])
        .assert()
        .success();

    macguard(&config)
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("ParentalControlMACs"))
        .stdout(predicate::str::contains("AA:BB:CC:DD:EE:01"))
        .stdout(predicate::str::contains("AA:BB:CC:DD:EE:02"))
        .stdout(predicate::str::contains("2 devices"));
}

#[test]
fn export_json_carries_newline_joined_content() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(&dir);

    macguard(&config)
        .args(["add", "Tablet", "AA:BB:CC:DD:EE:01"])
        .assert()
        .success();
    macguard(&config)
        .args(["add", "Switch", "AA:BB:CC:DD:EE:02"])
        .assert()
        .success();

    let output = macguard(&config)
        .args(["export", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(parsed["alias_name"], "ParentalControlMACs");
    assert_eq!(parsed["alias_type"], "mac");
    assert_eq!(parsed["content"], "AA:BB:CC:DD:EE:01\nAA:BB:CC:DD:EE:02");
}

#[test]
fn custom_alias_name_from_settings_flows_into_export() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("mac_addresses.txt");
    let config = dir.path().join("macguard.toml");
    fs::write(
        &config,
        format!(
            "store_path = {:?}\n\n[firewall]\nalias_name = \"HouseBlockList\"\n",
            store.display().to_string()
        ),
    )
    .expect("write settings");

    macguard(&config)
        .args(["add", "Tablet", "AA:BB:CC:DD:EE:01"])
        .assert()
        .success();

    macguard(&config)
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("HouseBlockList"));
}

#[test]
fn explicit_config_that_does_not_parse_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("macguard.toml");
    fs::write(&config, "store_path = [not valid").expect("write settings");

    macguard(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load settings"));
}
