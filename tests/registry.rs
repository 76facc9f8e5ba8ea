use hookdb::{
    ConnectOptions, Database, MemoryDriver, Params, Registry, Row, Value, DEFAULT_CONNECTION,
};
use std::sync::Arc;
use tracing_test::traced_test;

/// Each connection gets its own named database holding its label
fn labelled(driver: &MemoryDriver, label: &str) -> Database {
    let mut db =
        Database::connect(driver, &format!("memory:{}", label), &ConnectOptions::new()).unwrap();
    db.query("CREATE TABLE meta (label TEXT)", Params::default(), None)
        .unwrap();
    db.query(
        "INSERT INTO meta VALUES (?)",
        Params::positional([label]),
        None,
    )
    .unwrap();
    db
}

fn label_of(registry: &Registry, id: Option<&str>) -> Value {
    let database = registry.get(id).unwrap();
    let row = database
        .lock()
        .fetch_one("SELECT label FROM meta", Params::default(), None)
        .unwrap();
    row.and_then(|row| row.get(0).cloned()).unwrap()
}

#[test]
fn first_connection_becomes_default() {
    let driver = MemoryDriver::new();
    let registry = Registry::new();

    let id = registry.add(labelled(&driver, "h"), None);

    assert_eq!(id, DEFAULT_CONNECTION);
    assert_eq!(label_of(&registry, None), Value::from("h"));
}

#[test]
fn last_added_connection_is_default() {
    let driver = MemoryDriver::new();
    let registry = Registry::new();

    registry.add(labelled(&driver, "h1"), Some("a"));
    registry.add(labelled(&driver, "h2"), Some("b"));

    assert_eq!(label_of(&registry, Some("a")), Value::from("h1"));
    assert_eq!(label_of(&registry, Some("b")), Value::from("h2"));
    assert_eq!(label_of(&registry, None), Value::from("h2"));
    assert_eq!(registry.default_id().as_deref(), Some("b"));
    assert!(Arc::ptr_eq(
        &registry.get(None).unwrap(),
        &registry.get(Some("b")).unwrap()
    ));
}

#[test]
fn unknown_ids_are_absent() {
    let driver = MemoryDriver::new();
    let registry = Registry::new();
    registry.add(labelled(&driver, "h"), Some("a"));

    assert!(!registry.has("never-added"));
    assert!(registry.get(Some("never-added")).is_none());
    assert!(registry.has("a"));
}

#[test]
fn registry_can_be_shared_across_threads() {
    let driver = MemoryDriver::new();
    let registry = Arc::new(Registry::new());
    let mut db = labelled(&driver, "shared");
    db.query("CREATE TABLE hits (n INTEGER)", Params::default(), None)
        .unwrap();
    registry.add(db, None);

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let database = registry.get(None).unwrap();
                let mut database = database.lock();
                database
                    .query("INSERT INTO hits VALUES (?)", Params::positional([n]), None)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let database = registry.get(Some(DEFAULT_CONNECTION)).unwrap();
    let rows = database
        .lock()
        .fetch_all("SELECT * FROM hits", Params::default(), None)
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&Row::new(vec![Value::Integer(3)])));
}

#[traced_test]
#[test]
fn registration_is_logged() {
    let driver = MemoryDriver::new();
    let registry = Registry::new();

    registry.add(labelled(&driver, "h"), Some("primary"));

    assert!(logs_contain("registered connection"));
    assert!(logs_contain("primary"));
    assert!(logs_contain("replaced=false"));
    assert!(!logs_contain("replaced=true"));

    registry.add(labelled(&driver, "h2"), Some("primary"));
    assert!(logs_contain("replaced=true"));
}
