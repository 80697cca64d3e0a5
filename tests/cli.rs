use assert_cmd::Command;
use httpmock::{Method::POST, MockServer};
use predicates::prelude::*;
use std::path::Path;

fn today() -> String {
    chrono::Local::now().format("%a %b %d %Y").to_string()
}

fn chat_cmd(server: &MockServer, state: &Path) -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("compliance-chat")?;
    cmd.env("CHAT_WEBHOOK_TEST_URL", server.url("/webhook-test/chat"))
        .env("CHAT_WEBHOOK_PRODUCTION_URL", server.url("/webhook/chat"))
        .env("CHAT_STATE_FILE", state)
        .env_remove("CHAT_ENVIRONMENT")
        .env_remove("CHAT_DAILY_MAX")
        .arg("--log-level")
        .arg("warn");
    Ok(cmd)
}

fn stored_count(state: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(state).unwrap();
    let file: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let record = file["compliance_chat_queries"].as_str().unwrap();
    serde_json::from_str::<serde_json::Value>(record).unwrap()["queryCount"].clone()
}

#[test]
fn version_flag() -> anyhow::Result<()> {
    Command::cargo_bin("compliance-chat")?
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("compliance-chat "));
    Ok(())
}

#[test]
fn one_shot_message_prints_reply_and_charges_quota() -> anyhow::Result<()> {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook-test/chat")
            .body_contains("\"message\":\"What is GDPR?\"");
        then.status(200)
            .json_body(serde_json::json!({"response": "A regulation on data protection."}));
    });
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("storage.json");

    chat_cmd(&server, &state)?
        .arg("--message")
        .arg("What is GDPR?")
        .assert()
        .success()
        .stdout(predicate::str::contains("You: What is GDPR?"))
        .stdout(predicate::str::contains("AI: A regulation on data protection."))
        .stdout(predicate::str::contains("9 queries remaining today"));
    hook.assert();
    assert_eq!(stored_count(&state), 1);
    Ok(())
}

#[test]
fn exhausted_quota_blocks_without_calling_webhook() -> anyhow::Result<()> {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(serde_json::json!({"response": "x"}));
    });
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("storage.json");
    let record = serde_json::json!({"queryCount": 10, "lastResetDate": today()}).to_string();
    std::fs::write(&state, serde_json::json!({"compliance_chat_queries": record}).to_string())?;

    chat_cmd(&server, &state)?
        .arg("-m")
        .arg("anything")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily limit of 10 queries reached"));
    assert_eq!(hook.hits(), 0);
    assert_eq!(stored_count(&state), 10);
    Ok(())
}

#[test]
fn interactive_session_handles_commands_and_failures() -> anyhow::Result<()> {
    let server = MockServer::start();
    let prod = server.mock(|when, then| {
        when.method(POST).path("/webhook/chat");
        then.status(502);
    });
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("storage.json");

    chat_cmd(&server, &state)?
        .write_stdin("   \n/env production\nIs this retained?\n/status\n/quit\nnever sent\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment: Production"))
        .stdout(predicate::str::contains("AI (error): Sorry, I encountered an error"))
        .stdout(predicate::str::contains("10 queries remaining today"))
        .stdout(predicate::str::contains("Quota resets in"))
        .stdout(predicate::str::contains("never sent").not());
    assert_eq!(prod.hits(), 1);
    assert_eq!(stored_count(&state), 0);
    Ok(())
}

#[test]
fn status_reports_reset_for_stale_record() -> anyhow::Result<()> {
    let server = MockServer::start();
    let dir = tempfile::tempdir()?;
    let state = dir.path().join("storage.json");
    let record =
        serde_json::json!({"queryCount": 7, "lastResetDate": "Mon Jan 01 2024"}).to_string();
    std::fs::write(&state, serde_json::json!({"compliance_chat_queries": record}).to_string())?;

    chat_cmd(&server, &state)?
        .arg("--status")
        .assert()
        .success()
        .stdout(predicate::str::contains("10 queries remaining today"))
        .stdout(predicate::str::contains("Environment: Test"));
    assert_eq!(stored_count(&state), 0);
    Ok(())
}

#[test]
fn invalid_environment_is_reported() -> anyhow::Result<()> {
    let server = MockServer::start();
    let dir = tempfile::tempdir()?;
    chat_cmd(&server, &dir.path().join("storage.json"))?
        .env("CHAT_ENVIRONMENT", "staging")
        .arg("--status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown environment"));
    Ok(())
}
