//! Failure and recovery tests for kcal.
//!
//! These tests verify the system can handle:
//! - A store that was never initialized
//! - Profiles that cannot produce a goal
//! - Malformed log and summary rows
//! - Corrupted annotation files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn kcal(data_dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kcal"));
    cmd.env("HOME", data_dir)
        .env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args);
    cmd
}

fn write_profile(data_dir: &Path, activity: &str) {
    fs::write(
        data_dir.join("profile.csv"),
        format!(
            "field,value\nsex,Male\nweight_kg,70\nheight_cm,175\nage_years,30\nactivity_factor,{}\ngoal_offset,-500\n",
            activity
        ),
    )
    .unwrap();
}

#[test]
fn test_uninitialized_store_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    kcal(data_dir, &["recompute"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[store_not_initialized]"));

    assert!(!data_dir.join("summary.csv").exists());
}

#[test]
fn test_uninitialized_store_json_failure() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let output = kcal(data_dir, &["--json", "today"]).output().unwrap();
    assert!(!output.status.success());

    let failure: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(failure["kind"], "store_not_initialized");
    assert!(failure["message"].as_str().unwrap().contains("summary"));
}

#[test]
fn test_missing_summary_with_existing_log_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(
        data_dir.join("log.csv"),
        "date,time,meal_type,description,calories\n2024-01-15,,,toast,300\n",
    )
    .unwrap();
    write_profile(data_dir, "1.55");

    kcal(data_dir, &["hook", "--collection", "log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[store_not_initialized]"));
}

#[test]
fn test_invalid_profile_leaves_summary_untouched() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "1.55");
    kcal(
        data_dir,
        &["add", "--date", "2024-01-15", "--calories", "1600"],
    )
    .assert()
    .success();

    let before = fs::read_to_string(data_dir.join("summary.csv")).unwrap();

    // 1.3 is not one of the supported activity factors
    kcal(data_dir, &["profile", "--activity", "1.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[invalid_profile]"));

    let after = fs::read_to_string(data_dir.join("summary.csv")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_incomplete_profile_is_invalid() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();

    kcal(data_dir, &["profile", "--weight", "70"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[invalid_profile]"))
        .stderr(predicate::str::contains("is missing"));
}

#[test]
fn test_label_without_number_is_invalid() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "Moderately active");

    kcal(data_dir, &["recompute"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[invalid_profile]"));
}

#[test]
fn test_dirty_log_rows_are_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "1.55");

    fs::write(
        data_dir.join("log.csv"),
        "date,time,meal_type,description,calories\n\
         2024-01-15,08:00,breakfast,oats,350\n\
         not a date,12:00,lunch,soup,500\n\
         2024-01-15,13:00,lunch,salad,abc\n\
         ,,,,\n\
         2024-01-15,19:00,dinner,stew,-40\n\
         2024-01-15,20:00,snack,tea,\n\
         2024-01-14,19:00,dinner,pizza,900\n",
    )
    .unwrap();

    kcal(data_dir, &["recompute"]).assert().success();

    let summary = fs::read_to_string(data_dir.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "2024-01-14,900,2056,Under Goal (+1156)");
    assert_eq!(lines[2], "2024-01-15,350,2056,Under Goal (+1706)");
}

#[test]
fn test_summary_row_without_date_is_kept() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "1.55");

    fs::write(
        data_dir.join("summary.csv"),
        "date,total_calories,goal_limit,status\nnotes,,,\n",
    )
    .unwrap();

    kcal(
        data_dir,
        &["add", "--date", "2024-01-15", "--calories", "1600"],
    )
    .assert()
    .success();

    let summary = fs::read_to_string(data_dir.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[1], "notes,,,");
    assert_eq!(lines[2], "2024-01-15,1600,2056,Under Goal (+456)");
}

#[test]
fn test_corrupted_styles_file_is_rebuilt() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "1.55");
    kcal(
        data_dir,
        &["add", "--date", "2024-01-15", "--calories", "1600"],
    )
    .assert()
    .success();

    fs::write(data_dir.join("summary.styles.json"), "{ invalid json }}}").unwrap();

    kcal(data_dir, &["recompute"]).assert().success();

    let styles = fs::read_to_string(data_dir.join("summary.styles.json")).unwrap();
    let styles: serde_json::Value = serde_json::from_str(&styles).unwrap();
    assert_eq!(styles["1:3"], "green");
}

#[test]
fn test_negative_calories_rejected_by_cli() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();
    write_profile(data_dir, "1.55");

    kcal(
        data_dir,
        &["add", "--date", "2024-01-15", "--calories=-100"],
    )
    .assert()
    .failure()
    .stderr(predicate::str::contains("non-negative"));

    let log = fs::read_to_string(data_dir.join("log.csv")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn test_invalid_date_rejected_by_cli() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    kcal(data_dir, &["init"]).assert().success();

    kcal(
        data_dir,
        &["add", "--date", "yesterday", "--calories", "100"],
    )
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid date: yesterday"));
}
