//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("colibri");
    cmd.env_remove("COLIBRI_PORT")
        .env_remove("COLIBRI_USE_CHECKSUM")
        .env_remove("COLIBRI_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("colibri"))
        .stdout(predicate::str::contains("Usage"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn subcommand_help_exits_zero() {
    let mut cmd = cli_cmd();
    cmd.args(["help", "measure"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SAMPLE_230"));
}

#[test]
fn version_flag_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("colibri"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_command_reports_both_versions() {
    let mut cmd = cli_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("command-line interface:"))
        .stdout(predicate::str::contains(" library:"));
}

#[test]
fn no_arguments_prints_help_and_exits_zero() {
    let mut cmd = cli_cmd();
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn list_ports_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], true);
    assert!(parsed["data"]["ports"].is_array());
}

#[test]
fn params_lists_known_indices() {
    let mut cmd = cli_cmd();
    cmd.arg("params")
        .assert()
        .success()
        .stdout(predicate::str::contains("Firmware version"))
        .stdout(predicate::str::contains("Levelling target 340nm"));
}

#[test]
fn params_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["params", "--json"])
        .output()
        .expect("command should execute");

    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("JSON");
    assert_eq!(parsed["data"]["indices"][0]["description"], "Firmware version");
}

#[test]
fn completions_bash_writes_script() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_colibri()"));
}

// ============================================================================
// Exit codes follow the Colibri error table
// ============================================================================

#[test]
fn unknown_command_exits_200() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(200);
}

#[test]
fn unknown_option_exits_201() {
    let mut cmd = cli_cmd();
    cmd.args(["--frobnicate", "version"])
        .assert()
        .failure()
        .code(201);
}

#[test]
fn invalid_index_exits_203() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["get", "ten"])
        .assert()
        .failure()
        .code(203)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Colibri error (203)"))
        .stderr(predicate::str::contains("'ten' is not a valid number."));
}

#[test]
fn stored_measurement_out_of_range_exits_207() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["measure", "10"])
        .assert()
        .failure()
        .code(207);
}

#[test]
fn fwupdate_missing_file_exits_204() {
    let dir = tempdir().expect("tempdir should be created");
    let missing = dir.path().join("missing.srec");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("fwupdate")
        .arg(missing.as_os_str())
        .assert()
        .failure()
        .code(204)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Colibri error (204)"));
}

#[test]
fn unopenable_port_exits_205() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-p", "/nonexistent/ttyCOLIBRI", "get", "0"])
        .assert()
        .failure()
        .code(205)
        .stderr(predicate::str::contains("Colibri error (205)"));
}

#[test]
fn port_from_environment_is_used() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("COLIBRI_PORT", "/nonexistent/ttyCOLIBRI")
        .args(["command", "V 0"])
        .assert()
        .failure()
        .code(205);
}

#[test]
fn port_from_local_config_is_used() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(
        dir.path().join("colibri.toml"),
        "[connection]\nport = \"/nonexistent/ttyCOLIBRI\"\n",
    )
    .expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("selftest")
        .assert()
        .failure()
        .code(205);
}

#[test]
fn checksum_from_environment_overrides_local_config() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(
        dir.path().join("colibri.toml"),
        "[connection]\nport = \"/nonexistent/ttyCOLIBRI\"\nuse_checksum = true\n",
    )
    .expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("COLIBRI_USE_CHECKSUM", "false")
        .args(["-v", "get", "0"])
        .assert()
        .failure()
        .code(205)
        .stderr(predicate::str::contains("checksum false"));

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-v", "get", "0"])
        .assert()
        .failure()
        .code(205)
        .stderr(predicate::str::contains("checksum true"));
}

// ============================================================================
// Config and output conventions
// ============================================================================

#[test]
fn invalid_config_warns_but_command_succeeds() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[connection\nport = ").expect("write config");

    let mut cmd = cli_cmd();
    cmd.arg("--config")
        .arg(config.as_os_str())
        .args(["list-ports", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("TOML").or(predicate::str::contains("config")));
}

#[test]
fn colors_disabled_when_not_a_tty() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["get", "ten"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\u{1b}[").not());
}
