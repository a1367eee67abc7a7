use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn tally(db: &Path, args: &[&str]) -> Command {
    let binary = assert_cmd::cargo::cargo_bin!("tally-cli");
    let mut cmd = Command::new(binary);
    cmd.env("RUST_LOG", "warn")
        .arg("--db")
        .arg(db)
        .args(args);
    cmd
}

fn run_json(db: &Path, args: &[&str]) -> Result<Value> {
    let output = tally(db, args).assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

fn seed_users(db: &Path) -> Result<()> {
    for (id, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        run_json(db, &["user", "add", id, "--name", name])?;
    }
    Ok(())
}

#[test]
fn split_settle_and_balance_end_to_end() -> Result<()> {
    let temp = tempdir()?;
    let db = temp.path().join("tally.db");
    seed_users(&db)?;

    let created = run_json(
        &db,
        &[
            "split", "create", "--payer", "alice", "--currency", "USD", "--total", "90",
            "--share", "alice", "--share", "bob", "--share", "carol",
        ],
    )?;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["split"]["payer_share"], "30.00");
    assert_eq!(created["split"]["participants"].as_array().unwrap().len(), 2);

    let balance = run_json(&db, &["balance", "alice", "--with", "bob"])?;
    assert_eq!(balance["balances"]["USD"], "30.00");

    run_json(&db, &["wallet", "top-up", "bob", "50", "USD"])?;
    let settled = run_json(&db, &["settle", "wallet", &split_id, "bob"])?;
    assert_eq!(settled["to"], "settled");
    assert_eq!(settled["journal"].as_array().unwrap().len(), 2);

    let wallet = run_json(&db, &["wallet", "show", "alice"])?;
    assert_eq!(wallet["wallet"]["USD"], "30.00");

    run_json(&db, &["settle", "request", &split_id, "--actor", "carol"])?;
    tally(&db, &["settle", "approve", &split_id, "carol", "--actor", "bob"])
        .assert()
        .failure();
    let approved = run_json(
        &db,
        &["settle", "approve", &split_id, "carol", "--actor", "alice"],
    )?;
    assert_eq!(approved["to"], "settled");

    let sheet = run_json(&db, &["balance", "alice"])?;
    assert!(sheet["friends"].as_object().unwrap().is_empty());

    let audit = run_json(&db, &["wallet", "audit", "bob"])?;
    assert_eq!(audit["consistent"], true);
    Ok(())
}

#[test]
fn insufficient_funds_fails_without_changes() -> Result<()> {
    let temp = tempdir()?;
    let db = temp.path().join("tally.db");
    seed_users(&db)?;
    let created = run_json(
        &db,
        &[
            "split", "create", "--payer", "alice", "--total", "40", "--method", "by_amount",
            "--share", "bob=25", "--share", "carol=15",
        ],
    )?;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();

    tally(&db, &["settle", "wallet", &split_id, "bob"])
        .assert()
        .failure();
    let split = run_json(&db, &["split", "show", &split_id])?;
    assert_eq!(split["participants"][0]["settlement_status"], "unsettled");
    let history = run_json(&db, &["wallet", "history", "bob"])?;
    assert!(history.as_array().unwrap().is_empty());
    Ok(())
}

#[test]
fn single_sharer_is_rejected() -> Result<()> {
    let temp = tempdir()?;
    let db = temp.path().join("tally.db");
    seed_users(&db)?;
    tally(
        &db,
        &["split", "create", "--payer", "alice", "--total", "10", "--share", "bob"],
    )
    .assert()
    .failure();
    let splits = run_json(&db, &["split", "list", "--user", "alice"])?;
    assert!(splits.as_array().unwrap().is_empty());
    Ok(())
}

#[test]
fn policy_override_still_publishes_events() -> Result<()> {
    let temp = tempdir()?;
    let db = temp.path().join("tally.db");
    seed_users(&db)?;
    run_json(
        &db,
        &["group", "add", "trip", "--name", "Trip", "--member", "alice", "--member", "bob"],
    )?;

    let output = tally(
        &db,
        &[
            "split", "create", "--payer", "alice", "--total", "50", "--method", "by_amount",
            "--share", "alice=30", "--share", "bob=20", "--group", "trip", "--policy", "reject",
        ],
    )
    .env("RUST_LOG", "tally_cli=debug")
    .env("TALLY__LOG__FORMAT", "json")
    .assert()
    .success()
    .get_output()
    .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("event published"), "no event logged: {stderr}");
    assert!(stderr.contains("SplitCreated"));

    let balance = run_json(&db, &["balance", "alice", "--group", "trip"])?;
    let friends = balance["friends"].as_object().unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends["bob"]["USD"], "20.00");

    tally(&db, &["balance", "carol", "--group", "trip"])
        .assert()
        .failure();
    Ok(())
}
