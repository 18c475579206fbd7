// ABOUTME: Integration tests for the stagehand CLI commands.
// ABOUTME: Validates --help output, config errors and the status listing.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const CONFIG: &str = "\
index-length: 2
clusters:
  - host: worker.example.com
    stages:
      - name: PROD
        count: 2
";

const NGINX: &str = "\
upstream worker01 {
    server worker01:10001;
}

upstream dummy-app-lb {
    least_conn;
    server worker01:10001;
}

server {
    server_name worker01;
    listen 80;
    location / {
        proxy_pass http://worker01/;
    }
}

server {
    server_name dummy-app;
    listen 80;
    location / {
        proxy_pass http://dummy-app-lb/dummy-app;
    }
}
";

fn stagehand_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stagehand"))
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cluster-config.yaml"), CONFIG).unwrap();
    fs::write(dir.path().join("nginx.conf"), NGINX).unwrap();
    dir
}

#[test]
fn help_shows_commands() {
    stagehand_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("deployments"))
        .stdout(predicate::str::contains("reload-service"));
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    stagehand_cmd()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn status_lists_proxies_and_load_balancers() {
    let dir = workspace();
    stagehand_cmd()
        .current_dir(dir.path())
        .args(["status", "--nginx-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("worker01:80 -> 10001"))
        .stdout(predicate::str::contains("dummy-app [least_conn] worker01:10001"));
}

#[test]
fn status_as_json() {
    let dir = workspace();
    stagehand_cmd()
        .current_dir(dir.path())
        .args(["--json", "status", "--nginx-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"{"event":"report","data":[{"cluster":"worker:""#))
        .stdout(predicate::str::contains(r#""application":"dummy-app""#));
}

#[test]
fn undeclared_node_is_rejected() {
    let dir = workspace();
    stagehand_cmd()
        .current_dir(dir.path())
        .args(["balance", "worker", "PROD", "3", "dummy-app", "--nginx-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("index 3 of stage PROD is not in 1..=2"));
}

#[test]
fn json_errors_are_json() {
    let dir = workspace();
    stagehand_cmd()
        .current_dir(dir.path())
        .args(["--json", "balance", "nope", "PROD", "1", "dummy-app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""event":"error""#))
        .stderr(predicate::str::contains("unknown cluster: nope"));
}

#[test]
fn unbalance_is_written_to_the_config() {
    let dir = workspace();
    stagehand_cmd()
        .current_dir(dir.path())
        .args(["unbalance", "worker", "PROD", "2", "dummy-app", "--nginx-root"])
        .arg(dir.path())
        .assert()
        .success();

    let config = fs::read_to_string(dir.path().join("cluster-config.yaml")).unwrap();
    assert!(config.contains("2:dummy-app"));
    assert!(config.contains("unbalanced"));
    assert_eq!(
        fs::read_to_string(dir.path().join("nginx.conf")).unwrap(),
        NGINX
    );

    stagehand_cmd()
        .current_dir(dir.path())
        .args(["status", "--nginx-root"])
        .arg(dir.path())
        .assert()
        .success();
}
