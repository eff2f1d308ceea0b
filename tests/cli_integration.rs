//! Integration tests for the command-line interface
//!
//! Runs the built binary against temporary workspaces.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MESSAGE: &str = "Added get_quantity_step method to all MockBackend implementations";

const MOCK_BACKEND: &str = r#"impl ExecutionBackend for MockBackend {
    fn backend_name(&self) -> &str {
        "mock"
    }
}
"#;

fn setup_workspace(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("src/strategy/atomic_execution.rs");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, content).unwrap();
    dir
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_backend-patcher"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn target_content(dir: &TempDir) -> String {
    fs::read_to_string(dir.path().join("src/strategy/atomic_execution.rs")).unwrap()
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Insert generated methods after matched declarations"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_no_arguments_patches_default_target() {
    let dir = setup_workspace(MOCK_BACKEND);
    let output = run_in(dir.path(), &[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, format!("{MESSAGE}\n"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 matched, 1 inserted, 0 skipped"));

    let patched = target_content(&dir);
    assert!(patched.contains("async fn get_quantity_step(&self, _exchange: &str, _symbol: &str)"));
    assert!(patched.contains("Ok(0.001)"));
}

#[test]
fn test_no_match_still_reports_success() {
    let original = "pub struct Nothing;\n";
    let dir = setup_workspace(original);
    let output = run_in(dir.path(), &[]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), format!("{MESSAGE}\n"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("matched no locations"));
    assert!(stderr.contains("0 matched, 0 inserted"));
    assert_eq!(target_content(&dir), original);
}

#[test]
fn test_missing_target_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &[]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("atomic_execution.rs"));
}

#[test]
fn test_explicit_file_argument() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("backends.rs"), MOCK_BACKEND).unwrap();

    let output = run_in(dir.path(), &["backends.rs"]);

    assert!(output.status.success());
    let patched = fs::read_to_string(dir.path().join("backends.rs")).unwrap();
    assert!(patched.contains("fn get_quantity_step"));
}

#[test]
fn test_dry_run_leaves_file_unchanged() {
    let dir = setup_workspace(MOCK_BACKEND);
    let output = run_in(dir.path(), &["--dry-run", "--diff"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("would insert 1"));
    assert!(stdout.contains("+            async fn get_quantity_step"));
    assert!(!stdout.contains(MESSAGE));
    assert_eq!(target_content(&dir), MOCK_BACKEND);
}

#[test]
fn test_expect_mismatch_fails_without_writing() {
    let dir = setup_workspace(MOCK_BACKEND);
    let output = run_in(dir.path(), &["--expect", "2"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected 2 insertions"));
    assert_eq!(target_content(&dir), MOCK_BACKEND);
}

#[test]
fn test_rules_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("lib.rs"), "fn main() {}\n").unwrap();
    fs::write(
        dir.path().join("rules.toml"),
        r#"[meta]
name = "custom"
workspace_relative = true

[[rules]]
id = "mark-main"
file = "lib.rs"
pattern = '(fn main\(\) \{\})(\n)'
insert = "// marked"
separator = " "
message = "Marked main"
"#,
    )
    .unwrap();

    let output = run_in(dir.path(), &["--rules", "rules.toml"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Marked main\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("lib.rs")).unwrap(),
        "fn main() {} // marked\n"
    );
}

#[test]
fn test_target_outside_workspace_rejected() {
    let outer = TempDir::new().unwrap();
    let workspace = outer.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(outer.path().join("outside.rs"), MOCK_BACKEND).unwrap();

    let output = run_in(&workspace, &["../outside.rs"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("outside workspace"));
    assert_eq!(
        fs::read_to_string(outer.path().join("outside.rs")).unwrap(),
        MOCK_BACKEND
    );
}
