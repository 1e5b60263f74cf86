//! Integration tests for configuration layering.
//!
//! Tests the priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn curator(sandbox: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("photo-curator").unwrap();
    cmd.current_dir(sandbox.path())
        .env("XDG_CONFIG_HOME", sandbox.path().join("xdg"))
        .env("XDG_DATA_HOME", sandbox.path().join("data"));
    cmd
}

fn write_project_config(sandbox: &TempDir, toml: &str) {
    fs::write(sandbox.path().join(".photo-curator.toml"), toml).unwrap();
}

#[test]
fn test_project_config_sets_models_dir() {
    let sandbox = tempfile::tempdir().unwrap();
    let models = sandbox.path().join("project-models");
    write_project_config(
        &sandbox,
        &format!("[models]\ndir = '{}'\n", models.display()),
    );

    curator(&sandbox)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(models.display().to_string()));
}

#[test]
fn test_cli_models_dir_overrides_project_config() {
    let sandbox = tempfile::tempdir().unwrap();
    let from_config = sandbox.path().join("project-models");
    let from_cli = sandbox.path().join("cli-models");
    write_project_config(
        &sandbox,
        &format!("[models]\ndir = '{}'\n", from_config.display()),
    );

    curator(&sandbox)
        .arg("--models-dir")
        .arg(&from_cli)
        .arg(".")
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains(from_cli.display().to_string())
                .and(predicate::str::contains("No detector model found")),
        );
}

#[test]
fn test_project_config_found_from_subdirectory() {
    let sandbox = tempfile::tempdir().unwrap();
    let models = sandbox.path().join("shared-models");
    write_project_config(
        &sandbox,
        &format!("[models]\ndir = '{}'\n", models.display()),
    );
    let nested = sandbox.path().join("albums/2024");
    fs::create_dir_all(&nested).unwrap();

    curator(&sandbox)
        .current_dir(&nested)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(models.display().to_string()));
}

#[test]
fn test_out_of_range_config_value_warns() {
    let sandbox = tempfile::tempdir().unwrap();
    write_project_config(
        &sandbox,
        "[detection]\nconfidence_threshold = 1.5\n\n[output]\nformat = 'xml'\n",
    );

    curator(&sandbox)
        .args(["models", "path"])
        .assert()
        .success()
        .stderr(
            predicate::str::contains("detection.confidence_threshold must be 0.0-1.0")
                .and(predicate::str::contains("output.format must be 'json' or 'jsonl'")),
        );
}

#[test]
fn test_unparsable_config_is_ignored_with_warning() {
    let sandbox = tempfile::tempdir().unwrap();
    write_project_config(&sandbox, "[models\ndir = 'x'\n");

    curator(&sandbox)
        .args(["models", "path"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_project_config_overrides_xdg_config() {
    let sandbox = tempfile::tempdir().unwrap();
    let xdg_dir = sandbox.path().join("xdg/photo-curator");
    fs::create_dir_all(&xdg_dir).unwrap();
    let from_xdg = sandbox.path().join("xdg-models");
    fs::write(
        xdg_dir.join("config.toml"),
        format!("[models]\ndir = '{}'\n", from_xdg.display()),
    )
    .unwrap();

    curator(&sandbox)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(from_xdg.display().to_string()));

    let from_project = sandbox.path().join("project-models");
    write_project_config(
        &sandbox,
        &format!("[models]\ndir = '{}'\n", from_project.display()),
    );
    curator(&sandbox)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(from_project.display().to_string()));
}
