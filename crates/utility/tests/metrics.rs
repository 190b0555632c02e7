use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use traces::Cancellation;
use utility::{HourGap, Metric, MetricError, MetricRegistry, Movement, PoiRetention, Crossings};

fn live() -> Cancellation {
    Cancellation::new()
}

fn write(dir: &TempDir, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.path().join(name);
    let mut body = rows.join("\n");
    body.push('\n');
    fs::write(&path, body).unwrap();
    path
}

fn row(user: &str, ts: &str, lat: f64, lon: f64) -> String {
    format!("{user}\t{ts}\t{lat:.4}\t{lon:.4}")
}

fn del() -> String {
    "DEL".to_string()
}

#[test]
fn test_hour_gap_identical_hours_is_one() {
    let dir = TempDir::new().unwrap();
    let rows = vec![
        row("u1", "2015-01-05 08:10:00", 45.0, 4.0),
        row("u1", "2015-01-05 23:59:00", 45.0, 4.0),
        row("u2", "2015-01-06T00:00:00", 46.0, 5.0),
    ];
    let orig = write(&dir, "orig.csv", &rows);
    let anon_rows = vec![
        row("x", "2015-01-07 08:59:00", 45.0, 4.0),
        row("x", "2015-01-05 23:00:00", 45.0, 4.0),
        row("y", "2015-01-06T00:30:00", 46.0, 5.0),
    ];
    let anon = write(&dir, "anon.csv", &anon_rows);

    assert_eq!(HourGap.score(&orig, &anon, &Value::Null, &live()).unwrap(), 1.0);
}

#[test]
fn test_hour_gap_row_scores() {
    assert_relative_eq!(HourGap::row_score(10, 11), 0.1, epsilon = 1e-12);
    assert_relative_eq!(HourGap::row_score(23, 0), 0.1, epsilon = 1e-12);
    assert_relative_eq!(HourGap::row_score(3, 6), 0.4, epsilon = 1e-12);
    assert_eq!(HourGap::row_score(7, 7), 1.0);
    assert_eq!(HourGap::row_score(0, 6), 1.0);
}

#[test]
fn test_hour_gap_averages_over_all_rows_including_deleted() {
    let dir = TempDir::new().unwrap();
    let orig = write(
        &dir,
        "orig.csv",
        &[row("u1", "2015-01-05 10:00:00", 45.0, 4.0), row("u1", "2015-01-05 12:00:00", 45.0, 4.0)],
    );
    let anon = write(&dir, "anon.csv", &[row("x", "2015-01-05 11:00:00", 45.0, 4.0), del()]);

    let score = HourGap.score(&orig, &anon, &json!({}), &live()).unwrap();
    assert_relative_eq!(score, (0.1 + 1.0) / 2.0, epsilon = 1e-12);
}

#[test]
fn test_hour_gap_rejects_bad_timestamps() {
    let dir = TempDir::new().unwrap();
    let orig = write(
        &dir,
        "orig.csv",
        &[row("u1", "2015-01-05 10:00:00", 45.0, 4.0), row("u1", "2015-01-05 12:00:00", 45.0, 4.0)],
    );

    let anon = write(
        &dir,
        "hour.csv",
        &[row("x", "2015-01-05 10:00:00", 45.0, 4.0), row("x", "2015-01-05 25:00:00", 45.0, 4.0)],
    );
    let err = HourGap.score(&orig, &anon, &Value::Null, &live()).unwrap_err();
    assert!(matches!(err, MetricError::Row { line: 2, .. }));

    let anon = write(&dir, "short.csv", &[row("x", "2015-01-05", 45.0, 4.0), del()]);
    let err = HourGap.score(&orig, &anon, &Value::Null, &live()).unwrap_err();
    assert_eq!(err.line(), Some(1));
}

fn poi_rows(shift: f64) -> Vec<String> {
    vec![
        row("alice", "2015-01-05 23:00:00", 45.10 + shift, 4.80),
        row("alice", "2015-01-05 23:30:00", 45.10 + shift, 4.80),
        row("alice", "2015-01-06 10:00:00", 45.20 + shift, 4.90),
        row("alice", "2015-01-06 11:00:00", 45.20 + shift, 4.90),
        row("bob", "2015-01-07 02:00:00", 48.85 + shift, 2.35),
        row("bob", "2015-01-07 03:00:00", 48.85 + shift, 2.35),
        row("bob", "2015-01-10 03:00:00", 48.80 + shift, 2.30),
    ]
}

#[test]
fn test_poi_identical_files_score_one() {
    let dir = TempDir::new().unwrap();
    let orig = write(&dir, "orig.csv", &poi_rows(0.0));
    let anon = write(&dir, "anon.csv", &poi_rows(0.0));
    assert_eq!(PoiRetention.score(&orig, &anon, &Value::Null, &live()).unwrap(), 1.0);
}

#[test]
fn test_poi_moved_places_score_zero() {
    let dir = TempDir::new().unwrap();
    let orig = write(&dir, "orig.csv", &poi_rows(0.0));
    let anon = write(&dir, "anon.csv", &poi_rows(1.0));
    assert_eq!(PoiRetention.score(&orig, &anon, &Value::Null, &live()).unwrap(), 0.0);
}

#[test]
fn test_poi_partial_time_is_a_ratio() {
    let dir = TempDir::new().unwrap();
    let orig = write(
        &dir,
        "orig.csv",
        &[
            row("alice", "2015-01-05 23:00:00", 45.10, 4.80),
            row("alice", "2015-01-06 01:00:00", 45.10, 4.80),
        ],
    );
    let anon = write(
        &dir,
        "anon.csv",
        &[
            row("a1", "2015-01-05 23:00:00", 45.10, 4.80),
            row("a1", "2015-01-06 00:00:00", 45.10, 4.80),
        ],
    );
    let score = PoiRetention.score(&orig, &anon, &json!({"size": 2, "num_POIs": 1}), &live()).unwrap();
    assert_relative_eq!(score, 0.5, epsilon = 1e-12);
}

#[test]
fn test_movement_same_cells_any_order_is_one() {
    let dir = TempDir::new().unwrap();
    let orig = write(
        &dir,
        "orig.csv",
        &[
            row("alice", "2015-01-05 08:00:00", 45.10, 4.80),
            row("alice", "2015-01-05 09:00:00", 45.10, 4.80),
            row("alice", "2015-01-05 10:00:00", 45.20, 4.90),
            row("bob", "2015-01-05 10:00:00", 48.85, 2.35),
        ],
    );
    let anon = write(
        &dir,
        "anon.csv",
        &[
            row("a", "2015-01-05 08:00:00", 45.20, 4.90),
            row("a", "2015-01-05 09:00:00", 45.10, 4.80),
            row("a", "2015-01-05 10:00:00", 45.20, 4.90),
            row("b", "2015-01-05 10:00:00", 48.85, 2.35),
        ],
    );
    assert_eq!(Movement.score(&orig, &anon, &Value::Null, &live()).unwrap(), 1.0);

    let anon = write(
        &dir,
        "anon_del.csv",
        &[
            row("a", "2015-01-05 08:00:00", 45.20, 4.90),
            row("a", "2015-01-05 09:00:00", 45.10, 4.80),
            row("a", "2015-01-05 10:00:00", 45.20, 4.90),
            del(),
        ],
    );
    assert_relative_eq!(Movement.score(&orig, &anon, &Value::Null, &live()).unwrap(), 0.5, epsilon = 1e-12);
}

fn crowded_rows() -> Vec<String> {
    // Cell 0 is visited three times, cells 1..=9 once each.
    let mut rows: Vec<String> = (0..3)
        .map(|i| row("u0", &format!("2015-01-05 0{i}:00:00"), 45.0, 4.0))
        .collect();
    rows.extend((1..10).map(|i| row(&format!("u{i}"), "2015-01-05 10:00:00", 45.0 + i as f64 * 0.1, 4.0)));
    rows
}

#[test]
fn test_crossings_top_cell_kept_or_lost() {
    let dir = TempDir::new().unwrap();
    let orig = write(&dir, "orig.csv", &crowded_rows());
    let anon = write(&dir, "same.csv", &crowded_rows());
    assert_eq!(Crossings.score(&orig, &anon, &json!({"size": 2, "pt": 0.1}), &live()).unwrap(), 1.0);

    let mut rows = crowded_rows();
    for r in rows.iter_mut().take(3) {
        *r = del();
    }
    let anon = write(&dir, "lost.csv", &rows);
    assert_eq!(Crossings.score(&orig, &anon, &Value::Null, &live()).unwrap(), 0.0);
}

#[test]
fn test_crossings_without_candidates_scores_one() {
    let dir = TempDir::new().unwrap();
    let rows = &crowded_rows()[..5];
    let orig = write(&dir, "orig.csv", rows);
    let anon = write(&dir, "anon.csv", &[del(), del(), del(), del(), del()]);
    assert_eq!(Crossings.score(&orig, &anon, &Value::Null, &live()).unwrap(), 1.0);
}

#[test]
fn test_registry_dispatches_by_name() {
    let dir = TempDir::new().unwrap();
    let orig = write(&dir, "orig.csv", &poi_rows(0.0));

    let registry = MetricRegistry::builtin();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["crossings", "hour_gap", "movement", "poi_retention"]);

    for name in names {
        let score = registry.run(name, &orig, &orig, &Value::Null, &live()).unwrap();
        assert!((0.0..=1.0).contains(&score), "{name} gave {score}");
    }

    assert!(matches!(
        registry.run("utility_tuile", &orig, &orig, &Value::Null, &live()),
        Err(MetricError::UnknownMetric(_))
    ));
    assert!(matches!(
        registry.run("movement", &orig, &orig, &json!({"size": 9}), &live()),
        Err(MetricError::InvalidParameters { .. })
    ));
    assert!(registry.get("crossings").unwrap().validate(&json!({"pt": 1.5})).is_err());
}

#[test]
fn test_cancelled_metric_stops_before_scoring() {
    let dir = TempDir::new().unwrap();
    let orig = write(&dir, "orig.csv", &poi_rows(0.0));
    let cancel = Cancellation::new();
    cancel.cancel();

    let registry = MetricRegistry::builtin();
    for name in registry.names() {
        let err = registry.run(name, &orig, &orig, &Value::Null, &cancel).unwrap_err();
        assert!(matches!(err, MetricError::Io { ref reason, .. } if reason == "Cancelled"), "{name}: {err}");
    }
}
