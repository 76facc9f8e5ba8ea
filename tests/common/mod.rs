use hookdb::{ConnectOptions, Database, MemoryDriver, Params, Value};

/// A private database holding table `t` with three rows
pub fn seeded_database(driver: &MemoryDriver) -> Database {
    let mut db = Database::connect(driver, "memory:", &ConnectOptions::new()).unwrap();

    db.query(
        "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
        Params::default(),
        None,
    )
    .unwrap();
    for (id, name) in [(1, "one"), (2, "two"), (3, "three")] {
        db.query(
            "INSERT INTO t VALUES ($id, $name)",
            Params::named([("id", Value::from(id)), ("name", Value::from(name))]),
            None,
        )
        .unwrap();
    }

    db
}
