//! Command-line tests for the db2file binary.
//!
//! Every test points `HOME` and the working directory at a temp dir so the
//! operator's real credential cache is never touched.

#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

const TELEMETRY_HEADER: &str = concat!(
    "id,timestamp,temperature_1,temperature_2,temperature_3,temperature_4,",
    "humidity,pressure,door_status,power_status,fan_status,alarm_status"
);

async fn seed_telemetry(path: &Path) {
    let mut conn: SqliteConnection = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE temperatureAndStatusPhaseTwo (
            id INTEGER PRIMARY KEY, timestamp TEXT,
            temperature_1 REAL, temperature_2 REAL, temperature_3 REAL, temperature_4 REAL,
            humidity REAL, pressure REAL,
            door_status INTEGER, power_status INTEGER, fan_status INTEGER, alarm_status INTEGER
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO temperatureAndStatusPhaseTwo VALUES
         (1, '2024-03-01 12:30:00', 21.5, 21.0, 20.5, 22.0, 40.0, 1013.25, 0, 1, 1, 0),
         (2, '2024-03-01 12:31:00', 21.6, 21.1, 20.6, 22.1, 40.1, NULL, 0, 1, 1, 0),
         (3, '2024-03-01 12:32:00', 21.7, 21.2, 20.7, 22.2, 40.2, 1013.5, 1, 1, 0, 1)",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

fn db2file(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("db2file").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("DB2FILE_TEST_PASSWORD", "pw")
        .env_remove("RUST_LOG");
    cmd
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_cli_help() {
    let temp = tempfile::tempdir().unwrap();
    db2file(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--mysql-access-file"))
        .stdout(predicate::str::contains("--update-password"));
}

#[test]
fn test_cli_rejects_non_csv_format() {
    let temp = tempfile::tempdir().unwrap();

    db2file(temp.path())
        .args(["--output-format", ".json"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("only .csv"));

    assert!(!temp.path().join(".thebox").exists());
    assert!(!temp.path().join("output.json").exists());
}

#[test]
fn test_cli_directory_failure_exits_non_zero() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join(".thebox"), b"not a directory").unwrap();

    db2file(temp.path())
        .args(["--driver", "sqlite", "--password-env", "DB2FILE_TEST_PASSWORD"])
        .args(["-D", "unused.db"])
        .assert()
        .failure()
        .code(3);

    assert!(!temp.path().join("output.csv").exists());
}

#[test]
fn test_cli_filtered_is_not_implemented() {
    let temp = tempfile::tempdir().unwrap();

    db2file(temp.path())
        .args(["--driver", "sqlite", "--password-env", "DB2FILE_TEST_PASSWORD"])
        .args(["-D", "unused.db", "--filtered"])
        .assert()
        .failure()
        .code(7);

    assert!(!temp.path().join("output.csv").exists());
    assert!(!temp.path().join(".thebox").exists());
}

#[tokio::test]
async fn test_end_to_end_sqlite_export() {
    let temp = tempfile::tempdir().unwrap();
    let database = temp.path().join("thebox.db");
    seed_telemetry(&database).await;
    let database = database.to_string_lossy().to_string();

    db2file(temp.path())
        .args(["--driver", "sqlite", "--password-env", "DB2FILE_TEST_PASSWORD"])
        .args(["-D", database.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rows: 3"));

    let lines = read_lines(&temp.path().join("output.csv"));
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "1,2024-03-01 12:30:00,21.5,21,20.5,22,40,1013.25,0,1,1,0"
    );
    assert!(temp.path().join(".thebox").join("mysqlaccess").is_file());

    // Second run is served from the cache; no password source is needed
    db2file(temp.path())
        .env_remove("DB2FILE_TEST_PASSWORD")
        .args(["--driver", "sqlite", "--password-env", "DB2FILE_TEST_PASSWORD"])
        .args(["-D", database.as_str(), "--header", "--output-name", "with_header"])
        .assert()
        .success();

    let lines = read_lines(&temp.path().join("with_header.csv"));
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], TELEMETRY_HEADER);
}

#[tokio::test]
async fn test_end_to_end_header_mismatch_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let database = temp.path().join("thebox.db");
    seed_telemetry(&database).await;

    let mut conn: SqliteConnection = SqliteConnectOptions::new()
        .filename(&database)
        .connect()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE narrow (id INTEGER, value REAL)")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();

    let database = database.to_string_lossy().to_string();
    db2file(temp.path())
        .args(["--driver", "sqlite", "--password-env", "DB2FILE_TEST_PASSWORD"])
        .args(["-D", database.as_str(), "-T", "narrow", "--header"])
        .assert()
        .failure()
        .code(8);

    assert!(!temp.path().join("output.csv").exists());
}
