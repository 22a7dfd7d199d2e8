mod helpers;

use conductor::db;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");

    assert!(!db_path.exists());
    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    assert_eq!(helpers::count(&conn, "SELECT COUNT(*) FROM templates"), 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let conn = helpers::test_db();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.template_count, 0);
    assert_eq!(report.session_count, 0);
    assert_eq!(report.deployment_count, 0);
}

#[test]
fn health_check_counts_open_sessions() {
    let conn = helpers::test_db();
    helpers::seed_project(&conn, "alpha", None);
    conductor::store::sessions::open_session(&conn, "s1", "me", "alpha").unwrap();
    conductor::store::sessions::open_session(&conn, "s2", "me", "alpha").unwrap();
    conductor::store::sessions::close_session_implicit(&conn, "s1").unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.template_count, 1);
    assert_eq!(report.project_count, 1);
    assert_eq!(report.session_count, 2);
    assert_eq!(report.open_session_count, 1);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn reopening_an_existing_db_keeps_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("conductor.db");
    {
        let conn = db::open_database(&path).unwrap();
        helpers::seed_project(&conn, "alpha", None);
    }
    let conn = db::open_database(&path).unwrap();
    assert_eq!(helpers::count(&conn, "SELECT COUNT(*) FROM projects"), 1);
}

#[test]
fn open_fails_cleanly_on_non_database_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("conductor.db");
    std::fs::write(&path, "not a database\n".repeat(512)).unwrap();
    assert!(db::open_database(&path).is_err());
}
