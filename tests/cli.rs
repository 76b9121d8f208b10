//! End-to-end tests for the lmstudio-terminal binary

use std::{fs, process::Command};

use assert_cmd::{cargo::cargo_bin, prelude::*};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

const LMSTUDIO_VARS: [&str; 8] = [
    "LMSTUDIO_BASE_URL",
    "LMSTUDIO_REMOTE_URL",
    "LMSTUDIO_DRAGON_URL",
    "LMSTUDIO_USE_REMOTE",
    "LMSTUDIO_USE_DRAGON",
    "LMSTUDIO_MODEL",
    "LMSTUDIO_TEMPERATURE",
    "LMSTUDIO_MAX_TOKENS",
];

/// Binary run from an empty directory with no LMSTUDIO_* variables inherited
fn command(dir: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("lmstudio-terminal"));
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    for var in LMSTUDIO_VARS {
        cmd.env_remove(var);
    }
    cmd
}

async fn mount_models(server: &MockServer, ids: &[&str]) {
    let data: Vec<_> = ids.iter().map(|id| json!({"id": id, "object": "model"})).collect();
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": data})))
        .mount(server)
        .await;
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lmstudio-terminal version"));
}

#[test]
fn test_config_defaults() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""baseUrl": "ws://localhost:1234""#))
        .stdout(predicate::str::contains(r#""model": "qwen3-8b""#))
        .stdout(predicate::str::contains(r#""maxTokens": 200"#));
}

#[test]
fn test_config_layer_precedence() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/default.json"),
        r#"{"lmstudio": {"model": "file-model", "baseUrl": "ws://file:1234", "maxTokens": 32}}"#,
    )
    .unwrap();

    command(&dir)
        .env("LMSTUDIO_MODEL", "env-model")
        .env("LMSTUDIO_MAX_TOKENS", "not-a-number")
        .args(["--model", "flag-model", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""model": "flag-model""#))
        .stdout(predicate::str::contains(r#""baseUrl": "ws://file:1234""#))
        .stdout(predicate::str::contains(r#""maxTokens": 32"#));
}

#[test]
fn test_config_explicit_use_remote_false() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .env("LMSTUDIO_USE_REMOTE", "true")
        .env("LMSTUDIO_REMOTE_URL", "ws://dragon:1234")
        .args(["--use-remote", "false", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""useRemote": false"#))
        .stdout(predicate::str::contains(r#""remoteUrl": "ws://dragon:1234""#));
}

#[test]
fn test_malformed_config_file_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.json");
    fs::write(&path, "{ oops").unwrap();

    command(&dir)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""model": "qwen3-8b""#));
}

#[tokio::test]
async fn test_ask_against_server() {
    let server = MockServer::start().await;
    mount_models(&server, &["llama-3.2-3b", "qwen3-8b-mlx"]).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "qwen3-8b-mlx", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen3-8b-mlx",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Run `ls -la`."}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.args(["--base-url", uri.as_str(), "ask", "how do I list files?"]);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    output
        .assert()
        .success()
        .stdout("Run `ls -la`.\n");
}

#[tokio::test]
async fn test_ask_streaming_falls_back_to_local() {
    let server = MockServer::start().await;
    mount_models(&server, &["qwen3-8b"]).await;
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"git\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" log\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.env("LMSTUDIO_USE_REMOTE", "true")
        .env("LMSTUDIO_REMOTE_URL", "ws://127.0.0.1:1")
        .args(["--base-url", uri.as_str(), "ask", "history?", "--stream"]);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    output
        .assert()
        .success()
        .stdout("git log\n");
}

#[tokio::test]
async fn test_models_marks_active() {
    let server = MockServer::start().await;
    mount_models(&server, &["llama-3.2-3b", "qwen3-8b-mlx"]).await;

    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.args(["--base-url", uri.as_str(), "--model", "llama", "models"]);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    output
        .assert()
        .success()
        .stdout("* llama-3.2-3b\n  qwen3-8b-mlx\n");
}

#[tokio::test]
async fn test_ask_with_no_models_fails() {
    let server = MockServer::start().await;
    mount_models(&server, &[]).await;

    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.args(["--base-url", uri.as_str(), "ask", "hi"]);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    output
        .assert()
        .failure()
        .stderr(predicate::str::contains("No models available"));
}

async fn mount_stream_reply(server: &MockServer, reply: &str) {
    let chunk = json!({"choices": [{"index": 0, "delta": {"content": reply}}]});
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(format!("data: {chunk}\n\ndata: [DONE]\n\n")),
        )
        .mount(server)
        .await;
}

fn run_chat(cmd: Command, input: &'static str) -> std::process::Output {
    assert_cmd::Command::from_std(cmd)
        .write_stdin(input)
        .output()
        .unwrap()
}

#[tokio::test]
async fn test_chat_carries_and_saves_context() {
    let server = MockServer::start().await;
    mount_models(&server, &["qwen3-8b"]).await;
    mount_stream_reply(&server, "git log").await;

    let dir = TempDir::new().unwrap();
    let history = dir.path().join("context.json");
    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.args(["--base-url", uri.as_str(), "chat", "--history"])
        .arg(&history);
    let output = tokio::task::spawn_blocking(move || {
        run_chat(cmd, "what changed?\n\nand before?\nexit\nnever sent\n")
    })
    .await
    .unwrap();

    output.assert().success().stdout("git log\ngit log\n");

    let saved: Vec<String> = serde_json::from_str(&fs::read_to_string(&history).unwrap()).unwrap();
    assert_eq!(
        saved,
        vec![
            "User: what changed?",
            "Assistant: git log",
            "User: and before?",
            "Assistant: git log",
        ]
    );

    let chats: Vec<serde_json::Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/v1/chat/completions")
        .map(|request| request.body_json().unwrap())
        .collect();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0]["messages"], json!([{"role": "user", "content": "what changed?"}]));
    assert_eq!(
        chats[1]["messages"][0]["content"],
        "You are an intelligent terminal assistant. Context: User: what changed?\nAssistant: git log"
    );
    assert_eq!(chats[1]["messages"][1]["content"], "and before?");
}

#[tokio::test]
async fn test_chat_clear_resets_saved_context() {
    let server = MockServer::start().await;
    mount_models(&server, &["qwen3-8b"]).await;

    let dir = TempDir::new().unwrap();
    let history = dir.path().join("context.json");
    fs::write(&history, r#"["User: old question", "Assistant: old answer"]"#).unwrap();

    let uri = server.uri();
    let mut cmd = command(&dir);
    cmd.args(["--base-url", uri.as_str(), "chat", "--history"])
        .arg(&history);
    let output = tokio::task::spawn_blocking(move || run_chat(cmd, "clear\nEXIT\n"))
        .await
        .unwrap();

    output
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded 2 context entries"))
        .stderr(predicate::str::contains("Context cleared"));

    let saved: Vec<String> = serde_json::from_str(&fs::read_to_string(&history).unwrap()).unwrap();
    assert!(saved.is_empty());
}
