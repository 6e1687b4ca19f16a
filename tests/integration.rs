//! Integration tests for the lodcrm command line against a local store

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use lodcrm::store::local::LocalStore;
use predicates::prelude::*;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Temp directory with a seeded SQLite store and a config pointing at it
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("store.db");
        let config_path = temp_dir.path().join("config.toml");

        let store = LocalStore::open(&store_path).unwrap();
        seed(&store);
        drop(store);

        let config = format!(
            "[store]\nbackend = \"local\"\npath = {:?}\n",
            store_path.to_str().unwrap()
        );
        fs::write(&config_path, config).unwrap();

        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn query(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        lodcrm_cmd()
            .arg("--config")
            .arg(&self.config_path)
            .arg("query")
            .args(args)
            .assert()
    }
}

fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn seed(store: &LocalStore) {
    store
        .put(
            "contacts",
            "c1",
            obj(json!({"firstName": "Al", "lastName": "Smith", "company": "Acme", "email": "al@acme.test",
                "businessSector": "Retail", "linkedin": "https://linkedin.test/al"})),
        )
        .unwrap();
    store
        .put(
            "contacts",
            "c2",
            obj(json!({"firstName": "Bo", "company": "Beta", "businessSector": "Industrial"})),
        )
        .unwrap();
    store
        .put(
            "contacts",
            "c3",
            obj(json!({"firstName": "Cy", "company": "acme corp", "notes": "Toured Oak Ave", "linkedin": " "})),
        )
        .unwrap();
}

fn lodcrm_cmd() -> Command {
    Command::cargo_bin("lodcrm").unwrap()
}

// =============================================================================
// Query
// =============================================================================

#[test]
fn test_query_without_filters_lists_everything_sorted() {
    let env = TestEnv::new();
    let assert = env.query(&[]).success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines[0], "id\tdisplayName\temail\tcompany");
    assert_eq!(lines[1], "c1\tAl Smith\tal@acme.test\tAcme");
    assert_eq!(lines[2], "c2\tBo\t\tBeta");
    assert_eq!(lines[3], "c3\tCy\t\tacme corp");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_query_company_is_case_insensitive_substring() {
    let env = TestEnv::new();
    env.query(&["--company", "ACME"])
        .success()
        .stdout(predicate::str::contains("c1\tAl Smith"))
        .stdout(predicate::str::contains("c3\tCy"))
        .stdout(predicate::str::contains("c2\t").not());
}

#[test]
fn test_query_filters_combine() {
    let env = TestEnv::new();
    env.query(&["--company", "acme", "--notes", "oak"])
        .success()
        .stdout(predicate::str::contains("c3\tCy"))
        .stdout(predicate::str::contains("c1\t").not());
}

#[test]
fn test_query_linkedin_known_and_blank() {
    let env = TestEnv::new();
    env.query(&["--linkedin", "known"])
        .success()
        .stdout(predicate::str::contains("c1\t"))
        .stdout(predicate::str::contains("c3\t").not());

    env.query(&["--linkedin", "blank"])
        .success()
        .stdout(predicate::str::contains("c2\t"))
        .stdout(predicate::str::contains("c3\t"))
        .stdout(predicate::str::contains("c1\t").not());
}

#[test]
fn test_query_sector() {
    let env = TestEnv::new();
    env.query(&["--sector", "industrial"])
        .success()
        .stdout(predicate::str::contains("c2\tBo"))
        .stdout(predicate::str::contains("c1\t").not());
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn test_unknown_backend_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[store]\nbackend = \"mongo\"\n").unwrap();

    lodcrm_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid store.backend"));
}

#[test]
fn test_unconfigured_store_reports_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[store]\nbackend = \"firestore\"\n").unwrap();

    lodcrm_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Store configuration is missing"));
}

#[test]
fn test_blank_chat_message_fails_without_network() {
    lodcrm_cmd()
        .args(["--config", "/nonexistent/lodcrm/config.toml", "chat", " "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a message"));
}
