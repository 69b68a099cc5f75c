use std::ffi::CStr;
use std::os::raw::c_int;
use std::result;

use lmdb_sys as ffi;
use thiserror::Error;

/// Custom result type for engine operations
pub type Result<T> = result::Result<T, Error>;

/// Typed failures surfaced by this layer.
///
/// Every engine status code maps to exactly one case; codes without a
/// case fall back to [`Error::Engine`] carrying the engine's own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Operation on a handle whose owner was explicitly closed
    #[error("{0} is closed")]
    Closed(&'static str),
    /// Operation on a transaction whose ancestor chain is no longer active
    #[error("Transaction is terminated")]
    TerminatedTransaction,
    /// Key/data pair already exists
    #[error("Key/data pair already exists")]
    KeyExist,
    /// No matching key/data pair found
    #[error("No matching key/data pair found")]
    NotFound,
    /// Requested page not found
    #[error("Requested page not found")]
    PageNotFound,
    /// Database file is corrupted
    #[error("Database file is corrupted")]
    Corrupted,
    /// Update of meta page failed
    #[error("Update of meta page failed")]
    Panic,
    /// Database version mismatch
    #[error("Database version mismatch")]
    VersionMismatch,
    /// File is not a valid database file
    #[error("File is not a valid database file")]
    Invalid,
    /// Environment mapsize limit reached
    #[error("Environment mapsize limit reached")]
    MapFull,
    /// Environment maxdbs limit reached
    #[error("Environment maxdbs limit reached")]
    DbsFull,
    /// Environment maxreaders limit reached
    #[error("Environment maxreaders limit reached")]
    ReadersFull,
    /// Thread-local storage keys full
    #[error("Thread-local storage keys full")]
    TlsFull,
    /// Transaction has too many dirty pages
    #[error("Transaction has too many dirty pages")]
    TxnFull,
    /// Too many open cursors
    #[error("Too many open cursors")]
    CursorFull,
    /// Page has not enough space
    #[error("Page has not enough space")]
    PageFull,
    /// Database contents grew beyond environment mapsize
    #[error("Database contents grew beyond environment mapsize")]
    MapResized,
    /// Operation and DB incompatible
    #[error("Operation and DB incompatible")]
    Incompatible,
    /// Invalid reuse of reader locktable slot
    #[error("Invalid reuse of reader locktable slot")]
    BadRslot,
    /// Transaction must abort, has a child, or is invalid
    #[error("Transaction must abort, has a child, or is invalid")]
    BadTxn,
    /// Unsupported size of key/DB name/data, or wrong DUPFIXED size
    #[error("Unsupported size of key/DB name/data, or wrong DUPFIXED size")]
    BadValSize,
    /// The specified DBI was changed unexpectedly
    #[error("The specified DBI was changed unexpectedly")]
    BadDbi,
    /// Unmapped engine status code, carrying the engine's message
    #[error("{0}")]
    Engine(String),
}

impl From<c_int> for Error {
    fn from(err: c_int) -> Error {
        match err {
            -30799 => Error::KeyExist,
            -30798 => Error::NotFound,
            -30797 => Error::PageNotFound,
            -30796 => Error::Corrupted,
            -30795 => Error::Panic,
            -30794 => Error::VersionMismatch,
            -30793 => Error::Invalid,
            -30792 => Error::MapFull,
            -30791 => Error::DbsFull,
            -30790 => Error::ReadersFull,
            -30789 => Error::TlsFull,
            -30788 => Error::TxnFull,
            -30787 => Error::CursorFull,
            -30786 => Error::PageFull,
            -30785 => Error::MapResized,
            -30784 => Error::Incompatible,
            -30783 => Error::BadRslot,
            -30782 => Error::BadTxn,
            -30781 => Error::BadValSize,
            -30780 => Error::BadDbi,
            err => Error::Engine(strerror(err)),
        }
    }
}

/// Engine message for a status code, minus the redundant "component: "
/// prefix the engine prepends to some of its texts.
fn strerror(err: c_int) -> String {
    let msg = unsafe { CStr::from_ptr(ffi::mdb_strerror(err)) };
    let msg = msg.to_string_lossy();
    match msg.split_once(": ") {
        Some((_, rest)) => rest.to_string(),
        None => msg.into_owned(),
    }
}

/// Helper trait for converting engine return codes to Results
pub(crate) trait IntoResult {
    fn into_result(self) -> Result<()>;
}

impl IntoResult for c_int {
    fn into_result(self) -> Result<()> {
        if self == 0 {
            Ok(())
        } else {
            Err(Error::from(self))
        }
    }
}
