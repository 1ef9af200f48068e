//! End-to-end tests driving the `hut` binary.
//!
//! Covers the full flow: record stays → shared hours → bill → delete.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn hut_binary() -> String {
    env!("CARGO_BIN_EXE_hut").to_string()
}

/// Runs `hut` against a database inside `temp`, isolated from user config.
fn hut(temp: &Path, args: &[&str]) -> Output {
    Command::new(hut_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("HUT_DATABASE_PATH", temp.join("data/hut.db"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run hut")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "hut should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn add_stay(temp: &Path, member: &str, arrival: &str, departure: &str, counter: (&str, &str)) -> Output {
    hut(
        temp,
        &[
            "stay",
            "add",
            "--member",
            member,
            "--arrival",
            arrival,
            "--departure",
            departure,
            "--counter-start",
            counter.0,
            "--counter-end",
            counter.1,
            "--members",
            "2",
            "--guests",
            "1",
        ],
    )
}

fn stay_ids(temp: &Path) -> Vec<String> {
    let output = hut(temp, &["stay", "list", "--json"]);
    assert_success(&output);
    let stays: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    stays
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_overlapping_stays_share_hours_until_deleted() {
    let temp = TempDir::new().unwrap();

    let output = add_stay(temp.path(), "anna", "2025-06-01", "2025-06-03", ("10", "20"));
    assert_success(&output);
    assert!(stdout(&output).contains("Billable:  10.00 h"));

    let output = add_stay(temp.path(), "bert", "2025-06-02", "2025-06-04", ("15", "25"));
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Billable:  7.50 h (shared)"), "{out}");
    assert!(out.contains("Recalculated 1 other stay(s)."), "{out}");

    let ids = stay_ids(temp.path());
    assert_eq!(ids.len(), 2);
    let (anna, bert) = (&ids[0], &ids[1]);

    let output = hut(temp.path(), &["stay", "show", anna, "--json"]);
    assert_success(&output);
    let detail: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(detail["stay"]["adjusted_hours"], 7.5);
    assert_eq!(detail["stay"]["has_overlaps"], true);
    assert_eq!(detail["segments"][0]["shared_hours"], 2.5);

    let output = hut(temp.path(), &["stay", "delete", bert]);
    assert_success(&output);

    let output = hut(temp.path(), &["stay", "show", anna, "--json"]);
    let detail: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(detail["stay"]["adjusted_hours"], 10.0);
    assert_eq!(detail["stay"]["has_overlaps"], false);
    assert_eq!(detail["segments"], serde_json::json!([]));
}

#[test]
fn test_rejected_stay_fails_with_reason() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(temp.path(), "anna", "2025-06-01", "2025-06-03", ("10", "20")));

    let output = add_stay(temp.path(), "bert", "2025-06-10", "2025-06-12", ("15", "25"));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid_overlap_logic"), "{stderr}");

    assert_eq!(stay_ids(temp.path()).len(), 1);
}

#[test]
fn test_same_day_handover_tolerance() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(
        temp.path(),
        "anna",
        "2025-06-01T14:00:00Z",
        "2025-06-03T10:00:00Z",
        ("90", "100"),
    ));

    let output = add_stay(
        temp.path(),
        "bert",
        "2025-06-03T15:00:00Z",
        "2025-06-05T10:00:00Z",
        ("100.05", "110"),
    );
    assert_success(&output);

    let output = add_stay(
        temp.path(),
        "carl",
        "2025-06-05T15:00:00Z",
        "2025-06-07T10:00:00Z",
        ("111", "120"),
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid_counter_jump"));
}

#[test]
fn test_bill_and_status() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(temp.path(), "anna", "2025-06-01", "2025-06-03", ("10", "20")));
    assert_success(&add_stay(temp.path(), "bert", "2025-06-02", "2025-06-04", ("15", "25")));

    let output = hut(temp.path(), &["bill", "--member", "anna", "--year", "2025"]);
    assert!(!output.status.success(), "billing needs prices first");

    assert_success(&hut(temp.path(), &["prices", "add-year", "2025"]));
    assert_success(&hut(
        temp.path(),
        &[
            "prices",
            "set",
            "--year",
            "2025",
            "--oil",
            "1.20",
            "--member-night",
            "10",
            "--guest-night",
            "15",
            "--consumption",
            "2.5",
        ],
    ));

    let output = hut(temp.path(), &["bill", "--member", "anna", "--year", "2025", "--json"]);
    assert_success(&output);
    let statement: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // 7.5 h × 2.5 l × 1.20 + 2 × 10 + 1 × 15
    assert_eq!(statement["oil"], "22.50");
    assert_eq!(statement["total"], "57.50");

    let output = hut(temp.path(), &["status"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Stays: 2"), "{out}");
    assert!(out.contains("Years: 2025"), "{out}");
}

#[test]
fn test_recompute_reports_nothing_to_change() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(temp.path(), "anna", "2025-06-01", "2025-06-03", ("10", "20")));
    assert_success(&add_stay(temp.path(), "bert", "2025-06-02", "2025-06-04", ("15", "25")));

    let output = hut(temp.path(), &["recompute"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "Checked 2 stay(s), 0 changed.\n");
}

#[test]
fn test_handover_overlap_keeps_year_total() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(
        temp.path(),
        "carl",
        "2025-06-01T12:00:00Z",
        "2025-06-05T12:00:00Z",
        ("90", "110"),
    ));
    assert_success(&add_stay(
        temp.path(),
        "anna",
        "2025-06-01T14:00:00Z",
        "2025-06-03T10:00:00Z",
        ("90", "100"),
    ));
    assert_success(&add_stay(
        temp.path(),
        "bert",
        "2025-06-03T14:00:00Z",
        "2025-06-05T10:00:00Z",
        ("99.95", "110"),
    ));

    let output = hut(temp.path(), &["stats", "--year", "2025", "--json"]);
    assert_success(&output);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let total = report["current"]["burner_hours"].as_f64().unwrap();
    assert!((total - 20.0).abs() < 1e-9, "total {total}");
    assert!(report["current"]["idle_hours"].as_f64().unwrap().abs() < 1e-9);
}

#[test]
fn test_tank_fillings_feed_stats() {
    let temp = TempDir::new().unwrap();
    assert_success(&add_stay(temp.path(), "anna", "2025-06-01", "2025-06-03", ("10", "20")));

    let fill = |date: &str, liters: &str, counter: &str| {
        hut(
            temp.path(),
            &[
                "tank", "add", "--date", date, "--liters", liters, "--price", "1.10", "--counter",
                counter,
            ],
        )
    };
    let output = fill("2025-05-01", "500", "8");
    assert_success(&output);
    assert!(stdout(&output).contains("Recorded tank filling 1"));

    let output = fill("2025-07-01", "300", "5");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of order"));

    assert_success(&fill("2025-07-01", "300", "24"));

    let output = hut(temp.path(), &["tank", "list", "--year", "2025"]);
    assert_success(&output);
    assert!(stdout(&output).contains("TOTAL"));

    let output = hut(temp.path(), &["stats", "--year", "2025", "--member", "anna"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Idle hours:     6.00"), "{out}");
    assert!(out.contains("Oil delivered:  800.00 liters for 880.00 (2 filling(s))"), "{out}");
    assert!(out.contains("Own:            10.00"), "{out}");
}
