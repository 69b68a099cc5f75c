use lumo::{DbFlags, EnvOptions, Environment, Error, WriteFlags};
use tempfile::TempDir;

// Common test setup
fn setup_test_env() -> (TempDir, Environment) {
    let temp_dir = TempDir::new().unwrap();
    let env = Environment::open(temp_dir.path(), &EnvOptions::default()).unwrap();
    (temp_dir, env)
}

#[test]
fn test_database_open_close() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();

    // Test opening default database
    let db = txn.open_db(None, DbFlags::empty()).unwrap();
    assert!(db.transaction().active());

    // Test opening named database
    let db = txn.open_db(Some("testdb"), DbFlags::CREATE).unwrap();
    db.close().unwrap();
    assert_eq!(db.close().unwrap_err(), Error::Closed("Database"));

    txn.abort().unwrap();
}

#[test]
fn test_basic_put_get() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    // Test putting and getting data
    let key = b"test_key";
    let value = b"test_value";

    db.put(&txn, key, value, WriteFlags::empty()).unwrap();
    let result = db.get(&txn, key).unwrap();

    assert_eq!(result, value);
    txn.commit().unwrap();
}

#[test]
fn test_delete_operations() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    // Insert and then delete data
    let key = b"delete_key";
    let value = b"delete_value";

    db.put(&txn, key, value, WriteFlags::empty()).unwrap();
    assert_eq!(db.get(&txn, key).unwrap(), value);

    db.delete(&txn, key, None).unwrap();
    assert_eq!(db.get(&txn, key).unwrap_err(), Error::NotFound);

    txn.commit().unwrap();
}

#[test]
fn test_database_stats() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    // Get initial stats
    let stats = db.stat(&txn).unwrap();
    assert_eq!(stats.entries, 0);

    // Add some entries and check stats
    for i in 0..5 {
        let key = format!("key_{}", i);
        let value = format!("value_{}", i);
        db.put(&txn, key.as_bytes(), value.as_bytes(), WriteFlags::empty()).unwrap();
    }

    let stats = db.stat(&txn).unwrap();
    assert_eq!(stats.entries, 5);
    assert!(stats.psize > 0);

    txn.commit().unwrap();
}

#[test]
fn test_error_handling() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    // Test key not found
    assert_eq!(db.get(&txn, b"nonexistent_key").unwrap_err(), Error::NotFound);

    // Test duplicate key with NOOVERWRITE flag
    let key = b"unique_key";
    let value1 = b"value1";
    let value2 = b"value2";

    db.put(&txn, key, value1, WriteFlags::empty()).unwrap();
    let result = db.put(&txn, key, value2, WriteFlags::NOOVERWRITE);
    assert_eq!(result.unwrap_err(), Error::KeyExist);

    // The stored value is untouched by the failed put
    assert_eq!(db.get(&txn, key).unwrap(), value1);

    txn.commit().unwrap();
}

#[test]
fn test_transaction_isolation() {
    let (_dir, env) = setup_test_env();

    // Write transaction
    let write_txn = env.begin_txn().unwrap();
    let db = write_txn.open_db(None, DbFlags::empty()).unwrap();
    db.put(&write_txn, b"key", b"value", WriteFlags::empty()).unwrap();

    // Read transaction shouldn't see uncommitted changes
    let read_txn = env.begin_ro_txn().unwrap();
    let read_db = read_txn.open_db(None, DbFlags::empty()).unwrap();
    assert_eq!(read_db.get(&read_txn, b"key").unwrap_err(), Error::NotFound);
    read_txn.abort().unwrap();

    // After commit, changes should be visible
    write_txn.commit().unwrap();
    let read_txn = env.begin_ro_txn().unwrap();
    let read_db = read_txn.open_db(None, DbFlags::empty()).unwrap();
    assert_eq!(read_db.get(&read_txn, b"key").unwrap(), b"value");
    read_txn.abort().unwrap();
}
