use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn m4lab_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("m4lab");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/m4lab.sqlite"

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("m4lab.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_m4lab(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = m4lab_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run m4lab binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_m4lab(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(stdout.contains("Seeded chassis: 10, motors: 15, gear ratios: 8"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_m4lab(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (stdout, _, success2) = run_m4lab(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
    assert!(stdout.contains("already seeded"));
}

#[test]
fn test_catalog_listing() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);

    let (stdout, _, success) = run_m4lab(&config_path, &["catalog", "chassis"]);
    assert!(success);
    assert!(stdout.contains("10 chassis"));

    let (stdout, _, success) = run_m4lab(&config_path, &["catalog", "chassis", "--shaft", "double"]);
    assert!(success);
    assert!(stdout.contains("MS Chassis"));
    assert!(!stdout.contains("AR Chassis"));
    assert!(stdout.contains("2 chassis"));

    let (stdout, _, success) = run_m4lab(&config_path, &["catalog", "motors"]);
    assert!(success);
    assert!(stdout.contains("15 motors"));

    let (stdout, _, success) = run_m4lab(&config_path, &["catalog", "gears"]);
    assert!(success);
    assert!(stdout.contains("8 gear ratios"));
}

#[test]
fn test_catalog_json() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);

    let (stdout, _, success) = run_m4lab(
        &config_path,
        &["--json", "catalog", "motors", "--category", "stock"],
    );
    assert!(success);
    let motors: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let motors = motors.as_array().unwrap();
    assert_eq!(motors.len(), 1);
    assert_eq!(motors[0]["name"], "Normal Motor");
}

#[test]
fn test_profile_create_and_duplicate() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);

    let (stdout, stderr, success) = run_m4lab(
        &config_path,
        &["profile", "create", "Speed Demon", "--chassis", "MS", "--tags", "Racing, speed"],
    );
    assert!(success, "create failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Created profile 1"));

    let (_, stderr, success) = run_m4lab(&config_path, &["profile", "create", "Speed Demon"]);
    assert!(!success, "duplicate name should fail");
    assert!(stderr.contains("A car with this name already exists"));

    let (stdout, _, _) = run_m4lab(&config_path, &["profile", "check-name", "Speed Demon"]);
    assert!(stdout.contains("taken"));
}

#[test]
fn test_profile_show_resolves_chassis() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);
    run_m4lab(
        &config_path,
        &["profile", "create", "Speed Demon", "--chassis", "MS", "--tags", "Racing, speed"],
    );

    let (stdout, _, success) = run_m4lab(&config_path, &["--json", "profile", "show", "1"]);
    assert!(success);
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["name"], "Speed Demon");
    assert_eq!(profile["chassis"]["code"], "MS");
    assert_eq!(profile["tags"], serde_json::json!(["racing", "speed"]));
}

#[test]
fn test_profile_search_and_tag() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);
    run_m4lab(&config_path, &["profile", "create", "Speed Demon", "--tags", "nascar"]);
    run_m4lab(&config_path, &["profile", "create", "Track Master", "--tags", "drift"]);

    let (stdout, _, success) = run_m4lab(&config_path, &["profile", "search", "speed"]);
    assert!(success);
    assert!(stdout.contains("Speed Demon"));
    assert!(!stdout.contains("Track Master"));

    let (stdout, _, success) = run_m4lab(&config_path, &["profile", "tag", "car"]);
    assert!(success);
    assert!(stdout.contains("Speed Demon"));
    assert!(stdout.contains("1 profiles"));
}

#[test]
fn test_reference_removal_keeps_profile() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);
    run_m4lab(&config_path, &["profile", "create", "Orphan", "--chassis", "MS"]);

    let (stdout, _, success) = run_m4lab(&config_path, &["--json", "profile", "show", "1"]);
    assert!(success);
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chassis_id = profile["chassis_ref_id"].as_i64().unwrap().to_string();

    let (stdout, _, success) =
        run_m4lab(&config_path, &["catalog", "remove", "chassis", &chassis_id]);
    assert!(success);
    assert!(stdout.contains("Deleted chassis"));

    let (stdout, _, success) = run_m4lab(&config_path, &["--json", "profile", "show", "1"]);
    assert!(success);
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["name"], "Orphan");
    assert!(profile["chassis_ref_id"].is_null());
    assert!(profile.get("chassis").is_none());
}

#[test]
fn test_profile_delete() {
    let (_tmp, config_path) = setup_test_env();
    run_m4lab(&config_path, &["init"]);
    run_m4lab(&config_path, &["profile", "create", "Gone Soon"]);

    let (_, _, success) = run_m4lab(&config_path, &["profile", "delete", "1"]);
    assert!(success);
    let (_, _, success) = run_m4lab(&config_path, &["profile", "delete", "1"]);
    assert!(success, "deleting a missing profile should succeed");

    let (stdout, _, _) = run_m4lab(&config_path, &["profile", "list"]);
    assert!(stdout.contains("No profiles found."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_m4lab(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
