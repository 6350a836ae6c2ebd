// CLI surface checks for the submission-flow binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("submission-flow").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("SUBMISSION_FLOW_WORKFLOW__CONFLICT_POLICY");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("scenario"))
        .stdout(predicate::str::contains("transitions"))
        .stdout(predicate::str::contains("show-config"));
}

#[test]
fn test_transitions_prints_table() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("transitions")
        .assert()
        .success()
        .stdout(predicate::str::contains("PENDING"))
        .stdout(predicate::str::contains("final_approve"))
        .stdout(predicate::str::contains("CONTENT_REVIEW"))
        .stdout(predicate::str::contains("STORY_MANAGER"));
}

#[test]
fn test_show_config_reflects_file_and_env() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("submission-flow.toml"),
        "[retry]\nmax_attempts = 7\n",
    )
    .unwrap();

    cli(&dir)
        .arg("show-config")
        .env("SUBMISSION_FLOW_WORKFLOW__CONFLICT_POLICY", "reject")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempts = 7"))
        .stdout(predicate::str::contains("conflict_policy = \"reject\""))
        .stdout(predicate::str::contains("writer@test.local"));
}

#[test]
fn test_unknown_scenario_is_rejected() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["scenario", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("happy-path"));
}

#[test]
fn test_in_process_happy_path_reports_published() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["scenario", "happy-path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"finalStatus\": \"PUBLISHED\""))
        .stdout(predicate::str::contains("\"scenario\": \"happy-path\""));
}
