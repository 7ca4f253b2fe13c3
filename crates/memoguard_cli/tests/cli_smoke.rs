use std::process::Command;

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_memoguard");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run memoguard --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("reminders"));
}

#[test]
fn cli_smoke_unknown_command_is_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_memoguard");
    let output = Command::new(exe)
        .arg("teleport")
        .output()
        .expect("failed to run memoguard");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: invalid_input"));
}

#[test]
fn cli_smoke_rejects_malformed_now() {
    let exe = env!("CARGO_BIN_EXE_memoguard");
    let output = Command::new(exe)
        .args(["--now", "yesterday", "reminders"])
        .env("MEMOGUARD_CONFIG_PATH", std::env::temp_dir().join("memoguard-absent.json"))
        .output()
        .expect("failed to run memoguard");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - now must be RFC3339"));
}

#[test]
fn cli_smoke_rejects_unknown_config_override() {
    let exe = env!("CARGO_BIN_EXE_memoguard");
    let output = Command::new(exe)
        .args(["--config-override", "colour=red", "list"])
        .output()
        .expect("failed to run memoguard");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown config field 'colour'"));
}

#[test]
fn cli_smoke_rejects_non_ascii_offset_override() {
    let exe = env!("CARGO_BIN_EXE_memoguard");
    let output = Command::new(exe)
        .args(["--config-override", "utc_offset=+1é2", "list"])
        .env("MEMOGUARD_CONFIG_PATH", std::env::temp_dir().join("memoguard-absent.json"))
        .output()
        .expect("failed to run memoguard");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - invalid utc offset '+1é2'"));
}
