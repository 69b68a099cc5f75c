//! Safe client layer over the LMDB embedded, memory-mapped,
//! transactional key-value engine.
//!
//! Four cooperating handle types mirror the engine's resources:
//! [`Environment`] owns the storage instance and is the root of the
//! ownership graph, [`Transaction`] forms a nestable chain rooted at an
//! environment, [`Database`] is a named key-value namespace opened via a
//! transaction, and [`Cursor`] iterates over one. Ownership is reference
//! counted, and any handle derived from a transaction becomes unusable
//! the instant that transaction (or any ancestor) terminates: validity
//! is recomputed by walking the ancestor chain, never cached.
//!
//! Dropping a handle without an explicit commit/abort/close performs the
//! implicit cleanup in order: own handle first, then the owned
//! references. Scoped variants ([`Environment::open_with`],
//! [`Environment::with_txn`], [`Transaction::with_nested`],
//! [`Database::with_cursor`]) run a block and guarantee
//! commit-or-abort and close-on-exit on every path, re-returning the
//! block's own error unchanged.

mod constants;
mod cursor;
mod database;
mod env;
mod error;
mod transaction;
mod types;

pub use constants::{CopyFlags, DbFlags, EnvFlags, WriteFlags};
pub use cursor::Cursor;
pub use database::Database;
pub use env::{EnvOptions, Environment};
pub use error::{Error, Result};
pub use types::{CursorOp, EnvInfo, Stat};
