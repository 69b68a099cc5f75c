use std::cell::Cell;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use lmdb_sys as ffi;
use log::trace;

use crate::constants::{DbFlags, EnvFlags};
use crate::database::Database;
use crate::env::{EnvInner, Environment};
use crate::error::{Error, IntoResult, Result};

/// Transaction state shared with every handle derived from it.
///
/// Holds the engine handle (null once terminated) plus the counted links
/// that make the validity chain reachable: the parent transaction for
/// nested transactions and the owning environment.
#[derive(Debug)]
pub(crate) struct TxnInner {
    /// Engine transaction handle, null once committed or aborted
    handle: Cell<*mut ffi::MDB_txn>,
    /// Parent link for nested transactions
    parent: Option<Arc<TxnInner>>,
    /// Owning environment
    pub(crate) env: Arc<EnvInner>,
    /// Opened with the read-only marker
    readonly: bool,
}

impl TxnInner {
    /// A transaction is active iff its own handle and every ancestor's
    /// handle are set and the environment is still open.
    ///
    /// Terminating an ancestor does not null descendant handles, so this
    /// walks the chain on every call instead of trusting the local field.
    pub(crate) fn active(&self) -> bool {
        let mut link = Some(self);
        while let Some(txn) = link {
            if txn.handle.get().is_null() {
                return false;
            }
            link = txn.parent.as_deref();
        }
        self.env.is_open()
    }

    /// Chain-checked engine handle
    pub(crate) fn ptr(&self) -> Result<NonNull<ffi::MDB_txn>> {
        if !self.active() {
            return Err(Error::TerminatedTransaction);
        }
        // Non-null: active() just checked the local handle
        Ok(unsafe { NonNull::new_unchecked(self.handle.get()) })
    }

    /// Null the own handle, handing the pointer to the terminating call.
    /// Ancestor and descendant handles are untouched; descendant liveness
    /// is derived, not stored.
    fn terminate(&self) -> *mut ffi::MDB_txn {
        self.handle.replace(ptr::null_mut())
    }

    pub(crate) fn is_readonly(&self) -> bool {
        self.readonly
    }
}

impl Drop for TxnInner {
    fn drop(&mut self) {
        // Last reference released without an explicit commit or abort:
        // issue the implicit abort, but only while the whole chain is
        // live. A terminated ancestor or a closed environment means the
        // engine already reclaimed this handle. The parent and
        // environment references drop after this, releasing the chain
        // bottom-up.
        if self.active() {
            trace!("aborting transaction on last reference");
            unsafe { ffi::mdb_txn_abort(self.handle.get()) };
        }
    }
}

/// A unit of atomic work against an environment.
///
/// Root transactions are begun from an [`Environment`]; nested ones from
/// [`begin_nested`](Transaction::begin_nested). Committing or aborting
/// any transaction makes every transaction, database and cursor derived
/// from it refuse further operations with
/// [`Error::TerminatedTransaction`].
#[derive(Debug)]
pub struct Transaction {
    pub(crate) inner: Arc<TxnInner>,
}

impl Transaction {
    pub(crate) fn begin(
        env: &Arc<EnvInner>,
        parent: Option<&Arc<TxnInner>>,
        readonly: bool,
    ) -> Result<Transaction> {
        let env_ptr = env.ptr()?;
        let parent_ptr = match parent {
            Some(parent) => parent.ptr()?.as_ptr(),
            None => ptr::null_mut(),
        };
        let flags = if readonly { EnvFlags::RDONLY.bits() } else { 0 };

        let mut txn: *mut ffi::MDB_txn = ptr::null_mut();
        unsafe { ffi::mdb_txn_begin(env_ptr.as_ptr(), parent_ptr, flags, &mut txn) }
            .into_result()?;
        trace!(
            "began {}{} transaction",
            if parent.is_some() { "nested " } else { "" },
            if readonly { "read-only" } else { "write" }
        );

        Ok(Transaction {
            inner: Arc::new(TxnInner {
                handle: Cell::new(txn),
                parent: parent.cloned(),
                env: Arc::clone(env),
                readonly,
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<TxnInner>) -> Transaction {
        Transaction { inner }
    }

    /// Run the block, then commit on normal return or abort on failure,
    /// re-returning the block's error unchanged. Skips its own
    /// termination if the block already terminated the transaction.
    pub(crate) fn scoped<T, F>(txn: Transaction, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        match f(&txn) {
            Ok(value) => {
                if txn.active() {
                    txn.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if txn.active() {
                    let _ = txn.abort();
                }
                Err(err)
            }
        }
    }

    /// Whether this transaction and every ancestor are still live
    pub fn active(&self) -> bool {
        self.inner.active()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    /// Commit all the operations of the transaction into the environment
    pub fn commit(&self) -> Result<()> {
        self.inner.ptr()?;
        trace!("committing transaction");
        // The engine frees the handle even when the commit fails
        let txn = self.inner.terminate();
        unsafe { ffi::mdb_txn_commit(txn) }.into_result()
    }

    /// Abandon all the operations of the transaction
    pub fn abort(&self) -> Result<()> {
        self.inner.ptr()?;
        trace!("aborting transaction");
        let txn = self.inner.terminate();
        unsafe { ffi::mdb_txn_abort(txn) };
        Ok(())
    }

    /// Release a read-only transaction's snapshot until [`renew`]
    ///
    /// [`renew`]: Transaction::renew
    pub fn reset(&self) -> Result<()> {
        let txn = self.inner.ptr()?;
        // The engine only validates this for renew; enforce the same
        // read-only rule here since reset on a write handle is undefined
        if !self.inner.readonly {
            return Err(Error::Invalid);
        }
        unsafe { ffi::mdb_txn_reset(txn.as_ptr()) };
        Ok(())
    }

    /// Acquire a fresh snapshot for a reset read-only transaction
    pub fn renew(&self) -> Result<()> {
        let txn = self.inner.ptr()?;
        unsafe { ffi::mdb_txn_renew(txn.as_ptr()) }.into_result()
    }

    /// Engine identifier of this transaction
    pub fn id(&self) -> Result<usize> {
        let txn = self.inner.ptr()?;
        Ok(unsafe { ffi::mdb_txn_id(txn.as_ptr()) } as usize)
    }

    /// Begin a nested transaction with this transaction as parent.
    ///
    /// The child holds counted references to both this transaction and
    /// its environment. Only meaningful on a write transaction; the
    /// engine rejects nesting under a read-only parent.
    pub fn begin_nested(&self) -> Result<Transaction> {
        Transaction::begin(&self.inner.env, Some(&self.inner), false)
    }

    /// Scoped form of [`begin_nested`](Transaction::begin_nested):
    /// commit on normal return, abort and re-return the error on failure
    pub fn with_nested<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        Transaction::scoped(self.begin_nested()?, f)
    }

    /// The environment this transaction runs against
    pub fn environment(&self) -> Environment {
        Environment::from_inner(Arc::clone(&self.inner.env))
    }

    /// Parent transaction, if this one is nested
    pub fn parent(&self) -> Option<Transaction> {
        self.inner.parent.as_ref().map(|parent| Transaction::from_inner(Arc::clone(parent)))
    }

    /// Open a named database, or the unnamed default database for `None`
    pub fn open_db(&self, name: Option<&str>, flags: DbFlags) -> Result<Database> {
        Database::open(self, name, flags)
    }
}
