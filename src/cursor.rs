use std::cell::Cell;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use lmdb_sys as ffi;
use log::trace;

use crate::constants::WriteFlags;
use crate::database::{empty_val, from_val, to_val, Database};
use crate::error::{Error, IntoResult, Result};
use crate::transaction::{Transaction, TxnInner};
use crate::types::CursorOp;

/// Positional iterator over a database, bound to one transaction.
///
/// The shortest-lived handle: it becomes unusable the moment its
/// transaction (or any ancestor) terminates, even though its own handle
/// field is untouched by that termination.
#[derive(Debug)]
pub struct Cursor {
    /// Engine cursor handle, null once closed
    handle: Cell<*mut ffi::MDB_cursor>,
    /// Transaction this cursor is bound to
    txn: Arc<TxnInner>,
}

impl Cursor {
    pub(crate) fn open(db: &Database, txn: &Transaction) -> Result<Cursor> {
        let txn_ptr = txn.inner.ptr()?;
        let mut cursor: *mut ffi::MDB_cursor = ptr::null_mut();
        unsafe { ffi::mdb_cursor_open(txn_ptr.as_ptr(), db.dbi(), &mut cursor) }.into_result()?;
        trace!("opened cursor on database handle {}", db.dbi());
        Ok(Cursor { handle: Cell::new(cursor), txn: Arc::clone(&txn.inner) })
    }

    /// Usable iff the cursor is open and its transaction chain is active
    fn ptr(&self) -> Result<NonNull<ffi::MDB_cursor>> {
        if !self.txn.active() {
            return Err(Error::TerminatedTransaction);
        }
        NonNull::new(self.handle.get()).ok_or(Error::Closed("Cursor"))
    }

    pub fn is_open(&self) -> bool {
        !self.handle.get().is_null()
    }

    /// Close the cursor. Terminal; later operations fail.
    pub fn close(&self) -> Result<()> {
        let cursor = self.ptr()?;
        self.handle.set(ptr::null_mut());
        unsafe { ffi::mdb_cursor_close(cursor.as_ptr()) };
        Ok(())
    }

    /// One engine positioning operation, copying out the resulting pair.
    /// Positioning failures surface as [`Error::NotFound`].
    fn get(&self, key: Option<&[u8]>, op: CursorOp) -> Result<(Vec<u8>, Vec<u8>)> {
        let cursor = self.ptr()?;
        let mut key_val = match key {
            Some(key) => to_val(key),
            None => empty_val(),
        };
        let mut data_val = empty_val();
        unsafe {
            ffi::mdb_cursor_get(cursor.as_ptr(), &mut key_val, &mut data_val, op as _)
        }
        .into_result()?;
        Ok(unsafe { (from_val(&key_val), from_val(&data_val)) })
    }

    /// Position at the first key
    pub fn first(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(None, CursorOp::First)
    }

    /// Position at the last key
    pub fn last(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(None, CursorOp::Last)
    }

    /// Advance to the next pair
    pub fn next(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(None, CursorOp::Next)
    }

    /// Step back to the previous pair
    pub fn prev(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(None, CursorOp::Prev)
    }

    /// Position at an exact key
    pub fn set(&self, key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(Some(key), CursorOp::SetKey)
    }

    /// Position at the first key greater than or equal to the given key
    pub fn set_range(&self, key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(Some(key), CursorOp::SetRange)
    }

    /// Pair at the current position
    pub fn current(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.get(None, CursorOp::GetCurrent)
    }

    /// Store a pair at the cursor, repositioning it
    pub fn put(&self, key: &[u8], value: &[u8], flags: WriteFlags) -> Result<()> {
        let cursor = self.ptr()?;
        let mut key_val = to_val(key);
        let mut data_val = to_val(value);
        unsafe { ffi::mdb_cursor_put(cursor.as_ptr(), &mut key_val, &mut data_val, flags.bits()) }
            .into_result()
    }

    /// Delete the pair at the current position; flags are forwarded
    /// verbatim to the engine
    pub fn delete(&self, flags: WriteFlags) -> Result<()> {
        let cursor = self.ptr()?;
        unsafe { ffi::mdb_cursor_del(cursor.as_ptr(), flags.bits()) }.into_result()
    }

    /// Number of values at the cursor's current key; always 1 unless the
    /// database holds duplicate keys
    pub fn count(&self) -> Result<usize> {
        let cursor = self.ptr()?;
        let mut count: usize = 0;
        unsafe { ffi::mdb_cursor_count(cursor.as_ptr(), &mut count as *mut usize as *mut _) }
            .into_result()?;
        Ok(count)
    }

    /// The transaction this cursor is bound to
    pub fn transaction(&self) -> Transaction {
        Transaction::from_inner(Arc::clone(&self.txn))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let cursor = self.handle.get();
        if cursor.is_null() {
            return;
        }
        // Cursors of a write transaction die with the transaction; the
        // engine only allows a late close for read-only cursors, and then
        // only while the environment is open.
        if self.txn.active() || (self.txn.is_readonly() && self.txn.env.is_open()) {
            trace!("closing cursor on release");
            unsafe { ffi::mdb_cursor_close(cursor) };
        }
    }
}
