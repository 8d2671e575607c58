use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rix_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rix");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Port 9 is discard; nothing in these tests should reach the index.
    let config_content = format!(
        r#"[db]
path = "{}/data/rix.sqlite"

[index]
url = "http://127.0.0.1:9"
timeout_secs = 2

[reconcile]
search_engines = false

[images]
dir = "{}/covers"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("rix.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rix(config_path: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let binary = rix_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rix binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, code) = run_rix(&config_path, &["init"]);
    assert_eq!(code, Some(0), "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/rix.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_rix(&config_path, &["init"]);
    assert_eq!(first, Some(0), "First init failed");

    let (_, _, second) = run_rix(&config_path, &["init"]);
    assert_eq!(second, Some(0), "Second init failed (not idempotent)");
}

#[test]
fn test_sources_lists_every_source() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, code) = run_rix(&config_path, &["sources"]);
    assert_eq!(code, Some(0), "sources failed: {}", stderr);
    for name in ["local", "catalog", "structured", "aggregator", "google", "yahoo"] {
        assert!(stdout.contains(name), "missing {} in:\n{}", name, stdout);
    }
    assert!(stdout.contains("DISABLED"));
}

#[test]
fn test_sync_rejects_unknown_namespace() {
    let (_tmp, config_path) = setup_test_env();
    run_rix(&config_path, &["init"]);

    let (_, stderr, code) = run_rix(&config_path, &["sync", "movies"]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("invalid value"), "stderr: {}", stderr);
}

#[test]
fn test_sync_requires_namespace() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, code) = run_rix(&config_path, &["sync"]);
    assert_eq!(code, Some(2));
    assert!(stderr.to_lowercase().contains("usage"), "stderr: {}", stderr);
}

#[test]
fn test_sync_rejects_zero_batch_size() {
    let (_tmp, config_path) = setup_test_env();
    run_rix(&config_path, &["init"]);

    let (_, _, zero) = run_rix(&config_path, &["sync", "predb", "0"]);
    assert_eq!(zero, Some(2));

    let (_, _, negative) = run_rix(&config_path, &["sync", "predb", "--", "-5"]);
    assert_eq!(negative, Some(2));
}

#[test]
fn test_sync_empty_table_completes() {
    let (_tmp, config_path) = setup_test_env();
    run_rix(&config_path, &["init"]);

    let (stdout, stderr, code) =
        run_rix(&config_path, &["sync", "predb", "500", "--progress", "off"]);
    assert_eq!(code, Some(0), "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("0 rows"), "stdout: {}", stdout);
}

#[test]
fn test_commands_need_initialized_database() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, code) = run_rix(&config_path, &["movies", "reset"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("rix init"), "stderr: {}", stderr);
}

#[test]
fn test_movies_reset_and_show() {
    let (_tmp, config_path) = setup_test_env();
    run_rix(&config_path, &["init"]);

    let (stdout, _, code) = run_rix(&config_path, &["movies", "reset"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Reset 0"));

    let (_, stderr, code) = run_rix(&config_path, &["movies", "show", "tt0327597"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("No movie record"), "stderr: {}", stderr);
}

#[test]
fn test_movies_process_with_nothing_pending() {
    let (_tmp, config_path) = setup_test_env();
    run_rix(&config_path, &["init"]);

    let (stdout, stderr, code) = run_rix(
        &config_path,
        &["movies", "process", "--limit", "10", "--progress", "off"],
    );
    assert_eq!(code, Some(0), "process failed: {}", stderr);
    assert!(stdout.contains("0 processed"), "stdout: {}", stdout);
}
