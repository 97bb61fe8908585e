// Drives the binary through a full campaign using the JSON snapshot store

use assert_cmd::Command;
use predicates::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

struct Workspace {
    dir: TempDir,
    seller: String,
    channel: String,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            seller: Uuid::new_v4().to_string(),
            channel: Uuid::new_v4().to_string(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ad-marketplace").unwrap();
        cmd.current_dir(self.dir.path())
            .env(
                "AD_MARKETPLACE__STORAGE__SNAPSHOT_PATH",
                self.dir.path().join("store.json"),
            )
            .env("AD_MARKETPLACE__OBSERVABILITY__LOG_LEVEL", "warn")
            .env_remove("RUST_LOG");
        cmd
    }

    fn as_seller(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--role", "seller", "--seller", self.seller.as_str()]);
        cmd
    }

    fn as_owner(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--role", "channel_owner", "--owns", self.channel.as_str()]);
        cmd
    }
}

fn json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[test]
fn test_campaign_completes_through_cli() {
    let ws = Workspace::new();

    let output = ws.as_seller().args(["deposit", "10000"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(amount(&json(&output.stdout)["balance"]), Decimal::from(10_000));

    let output = ws
        .as_seller()
        .args([
            "create",
            "--channel",
            ws.channel.as_str(),
            "--budget",
            "10000",
            "--start",
            "2025-12-01",
            "--end",
            "2025-12-07",
            "--text",
            "Winter collection is here",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let campaign = json(&output.stdout);
    assert_eq!(campaign["status"], "pending");
    let id = campaign["id"].as_str().unwrap().to_string();

    ws.as_owner()
        .args(["accept", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"accepted\""));

    ws.as_owner()
        .args([
            "submit",
            id.as_str(),
            "--proof-url",
            "https://t.me/winter_channel/88",
            "--proof-type",
            "screenshot",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"in_progress\""));

    ws.as_seller()
        .args(["confirm", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"completed\""));

    let output = ws.as_owner().arg("balance").output().unwrap();
    assert!(output.status.success());
    let balances = json(&output.stdout);
    assert_eq!(amount(&balances[0]["balance"]), Decimal::from(9_000));
}

#[test]
fn test_wrong_role_is_reported() {
    let ws = Workspace::new();

    ws.as_seller().args(["deposit", "500"]).assert().success();
    let output = ws
        .as_seller()
        .args([
            "create",
            "--channel",
            ws.channel.as_str(),
            "--budget",
            "500",
            "--start",
            "2025-12-01",
            "--end",
            "2025-12-02",
        ])
        .output()
        .unwrap();
    let id = json(&output.stdout)["id"].as_str().unwrap().to_string();

    ws.as_seller()
        .args(["accept", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong actor role"));

    ws.as_seller()
        .args(["show", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"pending\""));
}

#[test]
fn test_config_prints_defaults() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[marketplace]"))
        .stdout(predicate::str::contains("platform_commission_percent"));
}

#[test]
fn test_queries_leave_snapshot_untouched() {
    let ws = Workspace::new();
    let snapshot = ws.dir.path().join("store.json");

    ws.as_seller().args(["list"]).assert().success();
    ws.as_seller().args(["balance"]).assert().success();
    assert!(!snapshot.exists());

    ws.as_seller().args(["deposit", "250"]).assert().success();
    let written = std::fs::read(&snapshot).unwrap();

    ws.as_seller().args(["stats"]).assert().success();
    assert_eq!(std::fs::read(&snapshot).unwrap(), written);
}

#[test]
fn test_held_store_refuses_second_process() {
    let ws = Workspace::new();
    let snapshot = ws.dir.path().join("store.json");
    let held = tokio_test::block_on(ad_marketplace::MemoryStore::open(&snapshot)).unwrap();

    ws.as_seller()
        .args(["deposit", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("in use by another process"));

    drop(held);
    ws.as_seller().args(["deposit", "100"]).assert().success();
}
