//! Integration tests for the ephemera command surface.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const COMPOSE: &str = "\
services:
  web:
    build: .
    env_file: ./web.env
    ports:
      - \"80-81:80-81\"
      - \"53:53/udp\"
  worker:
    image: busybox
    volumes:
      - ./data:/data
      - cache:/cache
volumes:
  cache: {}
";

/// Binary with colors off and configuration pointed at a file that does not
/// exist, so the user's own `~/.ephemera/config.yaml` never leaks in.
fn ephemera(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ephemera"));
    cmd.env("NO_COLOR", "1")
        .env("RUST_LOG", "warn")
        .env("EPHEMERA_CONFIG", home.path().join("missing.yaml"));
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let write = |rel: &str, contents: &str| {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, contents).expect("write");
    };
    write("docker-compose.yml", COMPOSE);
    write("Dockerfile", "FROM nginx\n");
    write("web.env", "MODE=preview\n");
    write("data/seed.json", "{}\n");
    dir
}

fn compose_path(dir: &TempDir) -> String {
    dir.path().join("docker-compose.yml").display().to_string()
}

// --- Help and version ---

#[test]
fn test_cli_no_args_shows_help() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Provision machines"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("exec"));
}

#[test]
fn test_version_command_shows_version() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "ephemera {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let home = TempDir::new().expect("tempdir");
    let output = ephemera(&home)
        .args(["--json", "version"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_quiet_version_prints_nothing() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .args(["--quiet", "version"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unknown_command_exits_with_error() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// --- analyze ---

#[test]
fn test_analyze_lists_ports_and_files() {
    let home = TempDir::new().expect("tempdir");
    let dir = project();
    ephemera(&home)
        .args(["analyze", &compose_path(&dir)])
        .assert()
        .success()
        .stdout(predicate::str::contains("web, worker"))
        .stdout(predicate::str::contains("80-81/tcp, 53/udp"))
        .stdout(predicate::str::contains("./web.env"))
        .stdout(predicate::str::contains("./data"))
        .stdout(predicate::str::contains("./Dockerfile"));
}

#[test]
fn test_analyze_json_is_structured() {
    let home = TempDir::new().expect("tempdir");
    let dir = project();
    let output = ephemera(&home)
        .args(["analyze", "--json", &compose_path(&dir)])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["services"], serde_json::json!(["web", "worker"]));
    assert_eq!(
        value["ports"][0],
        serde_json::json!({"fromPort": 80, "toPort": 81, "protocol": "tcp"})
    );
    assert_eq!(value["bind_mounts"], serde_json::json!(["./data"]));
}

#[test]
fn test_analyze_missing_file_fails() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .args(["analyze", "/nonexistent/docker-compose.yml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read /nonexistent/docker-compose.yml"));
}

#[test]
fn test_analyze_invalid_port_reports_manifest_error_code() {
    let home = TempDir::new().expect("tempdir");
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("compose.yml");
    std::fs::write(&path, "services:\n  web:\n    ports:\n      - \"http:80\"\n").expect("write");
    let output = ephemera(&home)
        .args(["--json", "analyze"])
        .arg(&path)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "MANIFEST_ERROR");
}

// --- plan ---

fn plan_args(dir: &Path) -> Vec<String> {
    vec![
        "plan".into(),
        "--dir".into(),
        dir.display().to_string(),
        "-f".into(),
        "docker-compose.yml".into(),
        "--build-arg".into(),
        "API_TOKEN=build-secret-value".into(),
        "--registry".into(),
        "ghcr.io=deployer:registry-password".into(),
    ]
}

#[test]
fn test_plan_shows_templates_without_secret_values() {
    let home = TempDir::new().expect("tempdir");
    let dir = project();
    ephemera(&home)
        .args(plan_args(dir.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("InstallSoftware"))
        .stdout(predicate::str::contains("DeployCompose"))
        .stdout(predicate::str::contains("--password-stdin @server"))
        .stdout(predicate::str::contains("data/seed.json"))
        .stdout(predicate::str::contains("build-secret-value").not())
        .stdout(predicate::str::contains("registry-password").not());
}

#[test]
fn test_plan_json_lists_uploads() {
    let home = TempDir::new().expect("tempdir");
    let dir = project();
    let output = ephemera(&home)
        .arg("--json")
        .args(plan_args(dir.path()))
        .output()
        .expect("run");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(!text.contains("registry-password"));
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    let uploads: Vec<&str> = value["actions"]
        .as_array()
        .expect("actions")
        .iter()
        .filter(|a| a["kind"] == "upload")
        .filter_map(|a| a["path"].as_str())
        .collect();
    assert_eq!(
        uploads,
        vec![
            "/opt/ephemera/deployment/Dockerfile",
            "/opt/ephemera/deployment/data/seed.json",
            "/opt/ephemera/deployment/docker-compose.yml",
            "/opt/ephemera/deployment/web.env",
        ]
    );
}

#[test]
fn test_plan_missing_dependency_names_the_file() {
    let home = TempDir::new().expect("tempdir");
    let dir = project();
    std::fs::remove_file(dir.path().join("web.env")).expect("remove");
    ephemera(&home)
        .args(plan_args(dir.path()))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("docker-compose.yml requires web.env"));
}

#[test]
fn test_plan_rejects_malformed_registry() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .args(["plan", "-f", "docker-compose.yml", "--registry", "ghcr.io"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SERVER=USER:PASSWORD"));
}

#[test]
fn test_plan_honors_configured_deployment_root() {
    let home = TempDir::new().expect("tempdir");
    let config = home.path().join("config.yaml");
    std::fs::write(&config, "deployment:\n  root: /srv/preview\n").expect("write");
    let dir = project();
    ephemera(&home)
        .env("EPHEMERA_CONFIG", &config)
        .args(plan_args(dir.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("/srv/preview/web.env"));
}

// --- exec ---

#[test]
fn test_exec_missing_argument_fails_before_connecting() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .args(["exec", "--host", "192.0.2.1", "docker logs @container"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("undeclared argument 'container'"));
}

#[test]
fn test_exec_missing_argument_json_error_code() {
    let home = TempDir::new().expect("tempdir");
    let output = ephemera(&home)
        .args(["--json", "exec", "--host", "192.0.2.1", "cat @path"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["code"], "SANITIZATION_ERROR");
}

#[test]
fn test_exec_rejects_argument_without_name() {
    let home = TempDir::new().expect("tempdir");
    ephemera(&home)
        .args(["exec", "--host", "192.0.2.1", "echo @x", "--arg", "=value"])
        .assert()
        .code(2);
}

// --- configuration ---

#[test]
fn test_invalid_config_is_reported() {
    let home = TempDir::new().expect("tempdir");
    let config = home.path().join("config.yaml");
    std::fs::write(&config, "retry:\n  max_attempts: 0\n").expect("write");
    ephemera(&home)
        .env("EPHEMERA_CONFIG", &config)
        .arg("version")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"))
        .stderr(predicate::str::contains("retry.max_attempts"));
}

#[test]
fn test_unparseable_config_is_reported() {
    let home = TempDir::new().expect("tempdir");
    let config = home.path().join("config.yaml");
    std::fs::write(&config, "ssh: [unclosed").expect("write");
    ephemera(&home)
        .env("EPHEMERA_CONFIG", &config)
        .arg("version")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot parse"));
}
