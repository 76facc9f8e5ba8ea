mod common;

use hookdb::{audit, MemoryDriver, Params, Phase, AUDIT_EVENT};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn audit_hooks_log_statement_and_row_count() {
    let driver = MemoryDriver::new();
    let mut db = common::seeded_database(&driver);
    audit::install(&mut db);

    assert!(db.has_hook(AUDIT_EVENT, Phase::Pre));
    assert!(db.has_hook(AUDIT_EVENT, Phase::Post));

    let rows = db
        .fetch_all("SELECT * FROM t", Params::default(), Some(AUDIT_EVENT))
        .unwrap();
    assert_eq!(rows.len(), 3);

    assert!(logs_contain("audit: executing"));
    assert!(logs_contain("audit: executed"));
    assert!(logs_contain("rows=3"));
}

#[traced_test]
#[test]
fn audit_hooks_stay_quiet_for_other_events() {
    let driver = MemoryDriver::new();
    let mut db = common::seeded_database(&driver);
    audit::install(&mut db);

    db.fetch_all("SELECT * FROM t", Params::default(), None)
        .unwrap();

    assert!(!logs_contain("audit: executing"));
    assert!(!logs_contain("audit: executed"));
}
