//! End-to-end tests running the `playlog` binary against log directories.
//!
//! Tests the full pipeline: CSV logs → segments → report tables.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const ALICE: &str = "Timestamp,Event,Value\n\
    2025-03-01 10:00:00,StageBegin,Stage 1\n\
    2025-03-01 10:00:03,InputGrab,box\n\
    2025-03-01 10:00:04,StageStar,3\n\
    2025-03-01 10:00:08,StageClear,Stage 1\n\
    2025-03-01 10:01:00,StageBegin,Stage 2\n\
    2025-03-01 10:01:30,StageExit,\n";

const BOB_LOCALIZED: &str = "\u{feff}시간,로그 이벤트,값\n\
    2025-03-01 11:00:00,StageBegin,stage 1\n\
    2025-03-01 11:00:02,InputGrab,root\n\
    2025-03-01 11:00:03,InputGrab,key\n\
    2025-03-01 11:00:12,StageClear,STAGE 1\n";

fn playlog_binary() -> String {
    env!("CARGO_BIN_EXE_playlog").to_string()
}

/// Runs playlog with an isolated home directory so no user config is picked up.
fn playlog(temp: &Path, args: &[&str]) -> Output {
    Command::new(playlog_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run playlog")
}

fn setup() -> (TempDir, String) {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("DATA");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("alice.csv"), ALICE).unwrap();
    fs::write(data.join("bob.csv"), BOB_LOCALIZED).unwrap();
    let data = data.to_string_lossy().into_owned();
    (temp, data)
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "playlog should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_report_writes_all_tables() {
    let (temp, data) = setup();
    let out = temp.path().join("outputs");

    let output = playlog(
        temp.path(),
        &["report", "--data", &data, "--out", &out.to_string_lossy()],
    );
    let text = stdout(&output);
    assert!(text.starts_with("Saved to "));

    for name in [
        "global_stage_means.csv",
        "global_exit_counts.csv",
        "personal_exit_counts.csv",
        "personal_first_clear_stars.csv",
        "first_grab_top3_by_stage.csv",
    ] {
        assert!(out.join(name).exists(), "{name} should be written");
    }

    assert_eq!(
        fs::read_to_string(out.join("global_exit_counts.csv")).unwrap(),
        "stage,exit_sum\nstage 1,0\nstage 2,1\n"
    );

    // Earliest policy picks alice's clear of stage 1.
    let grabs = fs::read_to_string(out.join("first_grab_top3_by_stage.csv")).unwrap();
    let rows: Vec<&str> = grabs.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("stage 1,1,box,"));
    assert!(rows[0].ends_with(",alice"));
}

#[test]
fn test_report_policy_and_player_selection() {
    let (temp, data) = setup();
    let out = temp.path().join("outputs");

    let output = playlog(
        temp.path(),
        &[
            "report",
            "--data",
            &data,
            "--out",
            &out.to_string_lossy(),
            "--players",
            "bob",
            "--policy",
            "latest",
        ],
    );
    stdout(&output);

    let grabs = fs::read_to_string(out.join("first_grab_top3_by_stage.csv")).unwrap();
    let rows: Vec<&str> = grabs.lines().skip(1).collect();
    assert_eq!(rows.len(), 1, "root grab should be excluded: {grabs}");
    assert!(rows[0].starts_with("stage 1,1,key,"));

    let exits = fs::read_to_string(out.join("personal_exit_counts.csv")).unwrap();
    assert_eq!(exits, "player_id,stage,exit_sum\nbob,stage 1,0\n");
}

#[test]
fn test_segments_json_lines() {
    let (temp, data) = setup();

    let output = playlog(temp.path(), &["segments", "--data", &data, "--json"]);
    let text = stdout(&output);

    let segments: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0]["player_id"], "alice");
    assert_eq!(segments[1]["close_reason"], "exited");
    assert_eq!(segments[1]["exit_cnt"], 1);
    assert_eq!(segments[2]["player_id"], "bob");
    assert_eq!(segments[2]["cleared"], true);
}

#[test]
fn test_grabs_text_output() {
    let (temp, data) = setup();

    let output = playlog(
        temp.path(),
        &[
            "grabs", "--data", &data, "--stage", "Stage 1", "--policy", "latest",
        ],
    );
    let text = stdout(&output);
    assert_eq!(
        text,
        "First grabs in 'Stage 1' by bob (latest policy)\n1. key          +3.0s\n"
    );
}

#[test]
fn test_players_lists_file_stems() {
    let (temp, data) = setup();

    let output = playlog(temp.path(), &["players", "--data", &data]);
    assert_eq!(
        stdout(&output),
        "alice\tsegments=2\nbob\tsegments=1\n"
    );
}

#[test]
fn test_config_file_sets_data_dir() {
    let (temp, data) = setup();
    let config = temp.path().join("playlog.toml");
    fs::write(&config, format!("data_dir = {data:?}\n")).unwrap();

    let output = playlog(
        temp.path(),
        &["-c", &config.to_string_lossy(), "players"],
    );
    assert!(stdout(&output).contains("alice"));
}

#[test]
fn test_missing_data_dir_fails() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");

    let output = playlog(temp.path(), &["players", "--data", &missing.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load logs"));
}

#[test]
fn test_unknown_policy_is_rejected() {
    let (temp, data) = setup();

    let output = playlog(
        temp.path(),
        &["grabs", "--data", &data, "--stage", "a", "--policy", "fastest"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown selection policy"));
}
