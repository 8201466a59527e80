use chrono::{TimeZone, Utc};
use loginsight::parser;
use loginsight::sample::{label_ground_truth, LogGenerator};

#[test]
fn same_seed_gives_same_logs() {
    let start = Utc.with_ymd_and_hms(2024, 2, 20, 15, 0, 0).unwrap();
    let a = LogGenerator::new(7).generate(25, start, 60, true);
    let b = LogGenerator::new(7).generate(25, start, 60, true);
    assert_eq!(a, b);
    assert!(a.len() >= 25);
}

#[test]
fn without_errors_exactly_one_line_per_entry() {
    let start = Utc.with_ymd_and_hms(2024, 2, 20, 15, 0, 0).unwrap();
    let logs = LogGenerator::new(1).generate(10, start, 60, false);
    assert_eq!(logs.len(), 10);
    assert!(logs[0].starts_with("2024-02-20T15:00:00 "));
    assert!(logs[9].starts_with("2024-02-20T15:09:00 "));
    for line in &logs {
        let rec = parser::parse_line(line);
        assert!(rec.is_valid(), "{line}");
        assert!(!line.contains('{'), "unfilled placeholder in {line}");
    }
}

#[test]
fn labels_follow_the_log_subject() {
    let db = label_ground_truth("2024-01-01T00:00:00 ERROR [Database] Query execution failed: Connection refused");
    assert_eq!(db.category.as_deref(), Some("Database"));
    assert_eq!(db.severity.as_deref(), Some("Critical"));
    assert_eq!(db.context.as_deref(), Some("database"));
    assert_eq!(db.timestamp.as_deref(), Some("2024-01-01T00:00:00"));

    let slow = label_ground_truth("2024-01-01T00:00:00 WARNING [Database] Slow query detected. Execution time: 1200ms");
    assert_eq!(slow.severity.as_deref(), Some("High"));

    let mem = label_ground_truth("2024-01-01T00:00:00 WARNING [Memory] High memory usage: 91% on prod-app-01");
    assert_eq!(mem.category.as_deref(), Some("Memory"));
    assert_eq!(mem.severity.as_deref(), Some("High"));
    assert_eq!(mem.context.as_deref(), Some("infrastructure"));

    let oom = label_ground_truth("2024-01-01T00:00:00 CRITICAL [Memory] Out of memory error on prod-app-02");
    assert_eq!(oom.severity.as_deref(), Some("Critical"));

    let sec = label_ground_truth("2024-01-01T00:00:00 CRITICAL [Security] Unauthorized access attempt to /api/admin");
    assert_eq!(sec.category.as_deref(), Some("Security"));
    assert_eq!(sec.severity.as_deref(), Some("High"));

    let app = label_ground_truth("2024-01-01T00:00:00 ERROR [App] Request timeout for /api/v1/users");
    assert_eq!(app.category.as_deref(), Some("Application"));
    assert_eq!(app.severity.as_deref(), Some("Medium"));
    assert!(app.root_cause.is_some());
}
