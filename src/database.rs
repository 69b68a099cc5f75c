use std::cell::Cell;
use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;
use std::slice;
use std::sync::Arc;

use lmdb_sys as ffi;
use log::trace;

use crate::constants::{DbFlags, WriteFlags};
use crate::cursor::Cursor;
use crate::error::{Error, IntoResult, Result};
use crate::transaction::{Transaction, TxnInner};
use crate::types::Stat;

/// Named key-value namespace within an environment.
///
/// Data operations execute in the transaction passed to each call — any
/// active transaction of the same environment. The transaction that
/// opened the handle is remembered separately and only gates whether the
/// handle itself is still usable.
#[derive(Debug)]
pub struct Database {
    /// Engine table handle
    dbi: ffi::MDB_dbi,
    /// False once closed or dropped
    open: Cell<bool>,
    /// Opening transaction, kept for validity-chain walks
    txn: Arc<TxnInner>,
}

impl Database {
    pub(crate) fn open(txn: &Transaction, name: Option<&str>, flags: DbFlags) -> Result<Database> {
        let txn_ptr = txn.inner.ptr()?;
        let name = match name {
            Some(name) => Some(CString::new(name).map_err(|_| Error::Invalid)?),
            None => None,
        };
        let name_ptr = name.as_ref().map_or(ptr::null(), |name| name.as_ptr());

        let mut dbi: ffi::MDB_dbi = 0;
        unsafe { ffi::mdb_dbi_open(txn_ptr.as_ptr(), name_ptr, flags.bits(), &mut dbi) }
            .into_result()?;
        trace!("opened database handle {}", dbi);

        Ok(Database { dbi, open: Cell::new(true), txn: Arc::clone(&txn.inner) })
    }

    /// Usable iff the open flag is set and the opening transaction's
    /// chain is still active
    fn check(&self) -> Result<()> {
        if !self.txn.active() {
            return Err(Error::TerminatedTransaction);
        }
        if !self.open.get() {
            return Err(Error::Closed("Database"));
        }
        Ok(())
    }

    /// Close the table handle. Terminal; later operations fail.
    pub fn close(&self) -> Result<()> {
        self.check()?;
        let env = self.txn.env.ptr()?;
        unsafe { ffi::mdb_dbi_close(env.as_ptr(), self.dbi) };
        self.open.set(false);
        Ok(())
    }

    /// Database statistics snapshot, captured in `txn`
    pub fn stat(&self, txn: &Transaction) -> Result<Stat> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        let mut stat: ffi::MDB_stat = unsafe { std::mem::zeroed() };
        unsafe { ffi::mdb_stat(txn_ptr.as_ptr(), self.dbi, &mut stat) }.into_result()?;
        Ok(Stat::from_ffi(&stat))
    }

    /// Delete the table from the environment and invalidate the handle
    pub fn drop_db(&self, txn: &Transaction) -> Result<()> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        unsafe { ffi::mdb_drop(txn_ptr.as_ptr(), self.dbi, 1) }.into_result()?;
        self.open.set(false);
        Ok(())
    }

    /// Remove every entry from the table, keeping the handle open
    pub fn clear(&self, txn: &Transaction) -> Result<()> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        unsafe { ffi::mdb_drop(txn_ptr.as_ptr(), self.dbi, 0) }.into_result()
    }

    /// Look up a key, returning the stored bytes unchanged.
    ///
    /// Fails with [`Error::NotFound`] when the key is absent.
    pub fn get(&self, txn: &Transaction, key: &[u8]) -> Result<Vec<u8>> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        let mut key_val = to_val(key);
        let mut data_val = empty_val();
        unsafe { ffi::mdb_get(txn_ptr.as_ptr(), self.dbi, &mut key_val, &mut data_val) }
            .into_result()?;
        Ok(unsafe { from_val(&data_val) })
    }

    /// Store a key/value pair.
    ///
    /// Flag preconditions surface as their specific engine errors, e.g.
    /// [`Error::KeyExist`] for [`WriteFlags::NOOVERWRITE`] on an existing
    /// key.
    pub fn put(&self, txn: &Transaction, key: &[u8], value: &[u8], flags: WriteFlags) -> Result<()> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        let mut key_val = to_val(key);
        let mut data_val = to_val(value);
        unsafe {
            ffi::mdb_put(txn_ptr.as_ptr(), self.dbi, &mut key_val, &mut data_val, flags.bits())
        }
        .into_result()
    }

    /// Delete a key. With a value given, only the matching key/value pair
    /// of a duplicate-key table is removed; otherwise every value under
    /// the key.
    pub fn delete(&self, txn: &Transaction, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        self.check()?;
        let txn_ptr = txn.inner.ptr()?;
        let mut key_val = to_val(key);
        match value {
            Some(value) => {
                let mut data_val = to_val(value);
                unsafe { ffi::mdb_del(txn_ptr.as_ptr(), self.dbi, &mut key_val, &mut data_val) }
                    .into_result()
            }
            None => {
                unsafe { ffi::mdb_del(txn_ptr.as_ptr(), self.dbi, &mut key_val, ptr::null_mut()) }
                    .into_result()
            }
        }
    }

    /// Open a cursor over this database in the given transaction
    pub fn open_cursor(&self, txn: &Transaction) -> Result<Cursor> {
        self.check()?;
        Cursor::open(self, txn)
    }

    /// Run a block with a cursor, closing it on every exit path
    pub fn with_cursor<T, F>(&self, txn: &Transaction, f: F) -> Result<T>
    where
        F: FnOnce(&Cursor) -> Result<T>,
    {
        let cursor = self.open_cursor(txn)?;
        let result = f(&cursor);
        if cursor.is_open() {
            let _ = cursor.close();
        }
        result
    }

    /// The transaction that opened this handle
    pub fn transaction(&self) -> Transaction {
        Transaction::from_inner(Arc::clone(&self.txn))
    }

    /// Engine table identifier
    pub fn dbi(&self) -> u32 {
        self.dbi
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Close the table handle before the transaction reference is
        // released, and only while the chain is live; a terminated
        // opening transaction already invalidated the handle engine-side.
        if self.open.get() && self.txn.active() {
            if let Ok(env) = self.txn.env.ptr() {
                trace!("closing database handle {} on release", self.dbi);
                unsafe { ffi::mdb_dbi_close(env.as_ptr(), self.dbi) };
            }
        }
    }
}

pub(crate) fn to_val(bytes: &[u8]) -> ffi::MDB_val {
    ffi::MDB_val { mv_size: bytes.len() as _, mv_data: bytes.as_ptr() as *mut c_void }
}

pub(crate) fn empty_val() -> ffi::MDB_val {
    ffi::MDB_val { mv_size: 0, mv_data: ptr::null_mut() }
}

/// Copy the engine-owned bytes out of a value the engine just filled.
///
/// Safety: `val` must point at memory valid for `mv_size` bytes.
pub(crate) unsafe fn from_val(val: &ffi::MDB_val) -> Vec<u8> {
    if val.mv_size == 0 {
        return Vec::new();
    }
    slice::from_raw_parts(val.mv_data as *const u8, val.mv_size as usize).to_vec()
}
