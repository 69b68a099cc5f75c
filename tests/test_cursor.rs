use lumo::{DbFlags, EnvOptions, Environment, Error, WriteFlags};
use tempfile::TempDir;

// Common test setup
fn setup_test_env() -> (TempDir, Environment) {
    let temp_dir = TempDir::new().unwrap();
    let env = Environment::open(temp_dir.path(), &EnvOptions::default()).unwrap();
    (temp_dir, env)
}

#[test]
fn test_cursor_navigation() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    db.put(&txn, b"a", b"1", WriteFlags::empty()).unwrap();
    db.put(&txn, b"b", b"2", WriteFlags::empty()).unwrap();
    db.put(&txn, b"c", b"3", WriteFlags::empty()).unwrap();

    let cursor = db.open_cursor(&txn).unwrap();

    assert_eq!(cursor.first().unwrap(), (b"a".to_vec(), b"1".to_vec()));
    assert_eq!(cursor.next().unwrap(), (b"b".to_vec(), b"2".to_vec()));
    assert_eq!(cursor.next().unwrap(), (b"c".to_vec(), b"3".to_vec()));
    assert_eq!(cursor.next().unwrap_err(), Error::NotFound);

    assert_eq!(cursor.last().unwrap(), (b"c".to_vec(), b"3".to_vec()));
    assert_eq!(cursor.prev().unwrap(), (b"b".to_vec(), b"2".to_vec()));
    assert_eq!(cursor.current().unwrap(), (b"b".to_vec(), b"2".to_vec()));

    // set requires an exact match; set_range takes the first key >= input
    assert_eq!(cursor.set(b"b").unwrap(), (b"b".to_vec(), b"2".to_vec()));
    assert_eq!(cursor.set(b"bb").unwrap_err(), Error::NotFound);
    assert_eq!(cursor.set_range(b"bb").unwrap(), (b"c".to_vec(), b"3".to_vec()));
    assert_eq!(cursor.set_range(b"d").unwrap_err(), Error::NotFound);

    // count is 1 without duplicate keys
    cursor.set(b"a").unwrap();
    assert_eq!(cursor.count().unwrap(), 1);

    cursor.close().unwrap();
    txn.abort().unwrap();
}

#[test]
fn test_cursor_on_empty_database() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    let cursor = db.open_cursor(&txn).unwrap();
    assert_eq!(cursor.first().unwrap_err(), Error::NotFound);
    assert_eq!(cursor.next().unwrap_err(), Error::NotFound);

    cursor.close().unwrap();
    txn.abort().unwrap();
}

#[test]
fn test_cursor_put_and_delete() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    let cursor = db.open_cursor(&txn).unwrap();
    cursor.put(b"a", b"1", WriteFlags::empty()).unwrap();
    cursor.put(b"b", b"2", WriteFlags::empty()).unwrap();
    assert_eq!(db.get(&txn, b"a").unwrap(), b"1");

    // delete removes the pair at the current position
    cursor.set(b"a").unwrap();
    cursor.delete(WriteFlags::empty()).unwrap();
    assert_eq!(db.get(&txn, b"a").unwrap_err(), Error::NotFound);
    assert_eq!(db.get(&txn, b"b").unwrap(), b"2");

    cursor.close().unwrap();
    txn.commit().unwrap();
}

#[test]
fn test_cursor_dupsort_count_and_delete() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(Some("dups"), DbFlags::CREATE | DbFlags::DUPSORT).unwrap();

    db.put(&txn, b"k", b"v1", WriteFlags::empty()).unwrap();
    db.put(&txn, b"k", b"v2", WriteFlags::empty()).unwrap();

    db.with_cursor(&txn, |cursor| {
        cursor.set(b"k")?;
        assert_eq!(cursor.count()?, 2);
        Ok(())
    })
    .unwrap();

    // Deleting with a value removes only the matching pair
    db.delete(&txn, b"k", Some(b"v1")).unwrap();
    db.with_cursor(&txn, |cursor| {
        assert_eq!(cursor.set(b"k")?, (b"k".to_vec(), b"v2".to_vec()));
        assert_eq!(cursor.count()?, 1);
        Ok(())
    })
    .unwrap();

    // Deleting without a value removes every remaining pair
    db.delete(&txn, b"k", None).unwrap();
    assert_eq!(db.get(&txn, b"k").unwrap_err(), Error::NotFound);

    txn.abort().unwrap();
}

#[test]
fn test_cursor_double_close() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();

    let cursor = db.open_cursor(&txn).unwrap();
    cursor.close().unwrap();
    assert!(!cursor.is_open());
    assert_eq!(cursor.close().unwrap_err(), Error::Closed("Cursor"));
    assert_eq!(cursor.first().unwrap_err(), Error::Closed("Cursor"));

    txn.abort().unwrap();
}

#[test]
fn test_scoped_cursor_closes_on_failure() {
    let (_dir, env) = setup_test_env();
    let txn = env.begin_txn().unwrap();
    let db = txn.open_db(None, DbFlags::empty()).unwrap();
    db.put(&txn, b"a", b"1", WriteFlags::empty()).unwrap();

    let result: Result<(), Error> = db.with_cursor(&txn, |cursor| {
        cursor.first()?;
        Err(Error::Engine("cursor block failure".into()))
    });
    assert_eq!(result.unwrap_err(), Error::Engine("cursor block failure".into()));

    // And the happy path returns the block's value
    let pair = db.with_cursor(&txn, |cursor| cursor.first()).unwrap();
    assert_eq!(pair, (b"a".to_vec(), b"1".to_vec()));

    txn.commit().unwrap();
}
