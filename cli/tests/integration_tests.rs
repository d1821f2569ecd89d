use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use cim_store_sqlite::UpgradeRunner;
use rusqlite::Connection;
use tempfile::TempDir;

fn cim_db(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cim-db"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run cim-db")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Three objects and one data source, with every reference resolvable.
fn write_snapshot(dir: &TempDir) -> PathBuf {
    let json = serde_json::json!({
        "metadata": {
            "gis": { "source": "gis", "version": "2.1", "timestamp": "2024-01-15T10:30:00Z" }
        },
        "objects": [
            { "type": "BaseVoltage", "base": { "mrid": "bv1", "name": "11kV" }, "nominal_voltage": 11000 },
            {
                "type": "Breaker",
                "base": { "mrid": "b1", "name": "Main breaker" },
                "equipment": { "base_voltage": "bv1", "in_service": false },
                "rated_current": 630
            },
            {
                "type": "Terminal",
                "base": { "mrid": "t1" },
                "conducting_equipment": "b1",
                "sequence_number": 1
            }
        ]
    });
    let path = dir.path().join("network.json");
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

fn import(snapshot: &Path, db: &Path) -> Output {
    cim_db(&["import", "--input", arg(snapshot), "--db", arg(db)])
}

// ---------------------------------------------------------------------------
// Import tests
// ---------------------------------------------------------------------------

#[test]
fn import_creates_database_at_current_version() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");

    let output = import(&snapshot, &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Imported 3 objects"));

    let conn = Connection::open(&db).unwrap();
    let version: i64 = conn
        .query_row("SELECT version FROM version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 7);
    let breakers: i64 = conn
        .query_row("SELECT COUNT(*) FROM breakers", [], |row| row.get(0))
        .unwrap();
    assert_eq!(breakers, 1);
}

#[test]
fn import_refuses_existing_database_without_replace() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");
    assert!(import(&snapshot, &db).status.success());

    let second = import(&snapshot, &db);
    assert_eq!(second.status.code(), Some(1));
    assert!(stderr(&second).contains("error:"));

    let replaced = cim_db(&[
        "import",
        "--input",
        arg(&snapshot),
        "--db",
        arg(&db),
        "--replace",
    ]);
    assert!(replaced.status.success(), "stderr: {}", stderr(&replaced));
}

#[test]
fn import_honours_replace_from_config_file() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");
    let config = dir.path().join("cim-store.yml");
    fs::write(&config, "writer:\n  replace_existing: true\n").unwrap();
    assert!(import(&snapshot, &db).status.success());

    let output = cim_db(&[
        "import",
        "--input",
        arg(&snapshot),
        "--db",
        arg(&db),
        "--config",
        arg(&config),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn import_rejects_malformed_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("broken.json");
    fs::write(&snapshot, "{ \"objects\": [ { \"type\": \"Teapot\" } ] }").unwrap();
    let db = dir.path().join("network.sqlite");

    let output = import(&snapshot, &db);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to load snapshot"));
    assert!(!db.exists());
}

#[test]
fn bad_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");
    let config = dir.path().join("cim-store.yml");
    fs::write(&config, "reader:\n  unresolved_references: ignore\n").unwrap();

    let output = cim_db(&[
        "import",
        "--input",
        arg(&snapshot),
        "--db",
        arg(&db),
        "--config",
        arg(&config),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to load config"));
}

// ---------------------------------------------------------------------------
// Export tests
// ---------------------------------------------------------------------------

#[test]
fn export_writes_back_the_imported_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");
    let exported = dir.path().join("exported.json");
    assert!(import(&snapshot, &db).status.success());

    let output = cim_db(&["export", "--db", arg(&db), "--output", arg(&exported)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Exported 3 objects"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(json["metadata"]["gis"]["version"], "2.1");

    let objects = json["objects"].as_array().unwrap();
    let ids: Vec<_> = objects
        .iter()
        .map(|o| o["base"]["mrid"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["b1", "bv1", "t1"]);
    assert_eq!(objects[0]["type"], "Breaker");
    assert_eq!(objects[0]["equipment"]["in_service"], false);
    assert_eq!(objects[0]["rated_current"], 630);
    assert_eq!(objects[2]["conducting_equipment"], "b1");
}

#[test]
fn export_of_missing_database_fails() {
    let dir = TempDir::new().unwrap();
    let output = cim_db(&[
        "export",
        "--db",
        arg(&dir.path().join("missing.sqlite")),
        "--output",
        arg(&dir.path().join("out.json")),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("out.json").exists());
}

// ---------------------------------------------------------------------------
// Status and upgrade tests
// ---------------------------------------------------------------------------

#[test]
fn status_reports_version_and_row_counts() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let db = dir.path().join("network.sqlite");
    assert!(import(&snapshot, &db).status.success());

    let output = cim_db(&["status", "--db", arg(&db)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Version: 7"));
    assert!(text.contains("Pending upgrades: none"));
    assert!(text.contains("breakers: 1"));
    assert!(text.contains("terminals: 1"));
}

#[test]
fn upgrade_of_missing_file_fails_without_creating_it() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("missing.sqlite");

    let output = cim_db(&["upgrade", "--db", arg(&db)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("does not exist"));
    assert!(!db.exists());
}

#[test]
fn upgrade_applies_pending_change_sets_and_backs_up() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("old.sqlite");
    {
        let mut conn = Connection::open(&db).unwrap();
        UpgradeRunner::default().upgrade_to(&mut conn, 3).unwrap();
    }

    let status = cim_db(&["status", "--db", arg(&db)]);
    assert!(stdout(&status).contains("Pending upgrades: 4, 5, 6, 7"));

    let output = cim_db(&["upgrade", "--db", arg(&db)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("from 3 to 7 (applied 4, 5, 6, 7)"));
    assert!(dir.path().join("old.sqlite.v3.bak").exists());

    let again = cim_db(&["upgrade", "--db", arg(&db)]);
    assert!(again.status.success());
    assert!(stdout(&again).contains("already at version 7"));
}

#[test]
fn upgrade_skips_backup_when_disabled() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("old.sqlite");
    {
        let mut conn = Connection::open(&db).unwrap();
        UpgradeRunner::default().upgrade_to(&mut conn, 5).unwrap();
    }
    let config = dir.path().join("cim-store.yml");
    fs::write(&config, "reader:\n  backup_before_upgrade: false\n").unwrap();

    let output = cim_db(&["upgrade", "--db", arg(&db), "--config", arg(&config)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("old.sqlite.v5.bak").exists());
}
