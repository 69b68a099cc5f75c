use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use lmdb_sys as ffi;
use log::debug;

use crate::constants::{CopyFlags, EnvFlags, DEFAULT_MAX_DBS, DEFAULT_MODE};
use crate::error::{Error, IntoResult, Result};
use crate::transaction::Transaction;
use crate::types::{EnvInfo, Stat};

lazy_static! {
    /// Environment flags the engine allows toggling after open
    static ref CHANGEABLE: EnvFlags =
        EnvFlags::NOSYNC | EnvFlags::NOMETASYNC | EnvFlags::MAPASYNC | EnvFlags::NOMEMINIT;
}

/// Configuration for opening an environment
#[derive(Debug, Clone)]
pub struct EnvOptions {
    /// Environment flags
    pub flags: EnvFlags,
    /// Filesystem permission bits for created files
    pub mode: u32,
    /// Maximum number of reader slots; engine default when unset
    pub maxreaders: Option<u32>,
    /// Maximum number of named databases
    pub maxdbs: u32,
    /// Memory map size in bytes; engine default when unset
    pub mapsize: Option<usize>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        EnvOptions {
            flags: EnvFlags::empty(),
            mode: DEFAULT_MODE,
            maxreaders: None,
            maxdbs: DEFAULT_MAX_DBS,
            mapsize: None,
        }
    }
}

/// State shared by every handle derived from one environment.
///
/// The pointer is null once the environment has been closed; close is
/// terminal. The Arc count is the reference count: it gates memory
/// reclamation only, while the null check gates handle use.
#[derive(Debug)]
pub(crate) struct EnvInner {
    handle: AtomicPtr<ffi::MDB_env>,
}

impl EnvInner {
    /// Engine handle, or the closed error once `close` has run
    pub(crate) fn ptr(&self) -> Result<NonNull<ffi::MDB_env>> {
        NonNull::new(self.handle.load(Ordering::SeqCst)).ok_or(Error::Closed("Environment"))
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.handle.load(Ordering::SeqCst).is_null()
    }
}

impl Drop for EnvInner {
    fn drop(&mut self) {
        // Last reference gone without an explicit close
        let env = *self.handle.get_mut();
        if !env.is_null() {
            debug!("releasing environment handle on last reference");
            unsafe { ffi::mdb_env_close(env) };
        }
    }
}

/// Handle to an open storage instance, root of the ownership graph.
///
/// Cloning shares the underlying environment. Every transaction begun
/// from it holds a counted reference back to it, so the engine handle
/// outlives dangling transaction objects; an explicit [`close`] releases
/// the handle immediately and every derived handle starts failing with
/// [`Error::Closed`].
///
/// [`close`]: Environment::close
#[derive(Debug, Clone)]
pub struct Environment {
    pub(crate) inner: Arc<EnvInner>,
}

impl Environment {
    /// Open the environment at `path`
    pub fn open<P: AsRef<Path>>(path: P, options: &EnvOptions) -> Result<Environment> {
        let path = path.as_ref().to_str().ok_or(Error::Invalid)?;
        let path = CString::new(path).map_err(|_| Error::Invalid)?;

        let mut env: *mut ffi::MDB_env = ptr::null_mut();
        unsafe { ffi::mdb_env_create(&mut env) }.into_result()?;

        let configured = (|| {
            if let Some(maxreaders) = options.maxreaders {
                unsafe { ffi::mdb_env_set_maxreaders(env, maxreaders as _) }.into_result()?;
            }
            if let Some(mapsize) = options.mapsize {
                unsafe { ffi::mdb_env_set_mapsize(env, mapsize as _) }.into_result()?;
            }
            unsafe { ffi::mdb_env_set_maxdbs(env, options.maxdbs.max(1) as _) }.into_result()?;
            unsafe {
                ffi::mdb_env_open(env, path.as_ptr(), options.flags.bits(), options.mode as _)
            }
            .into_result()
        })();

        if let Err(err) = configured {
            // A handle that never finished opening still has to be freed
            unsafe { ffi::mdb_env_close(env) };
            return Err(err);
        }

        debug!("opened environment at {:?}", path);
        Ok(Environment { inner: Arc::new(EnvInner { handle: AtomicPtr::new(env) }) })
    }

    /// Open an environment and pass it to the block, closing it on every
    /// exit path. The block's error propagates unchanged after the close.
    pub fn open_with<P, T, F>(path: P, options: &EnvOptions, f: F) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&Environment) -> Result<T>,
    {
        let env = Environment::open(path, options)?;
        match f(&env) {
            Ok(value) => {
                if env.is_open() {
                    env.close()?;
                }
                Ok(value)
            }
            Err(err) => {
                if env.is_open() {
                    let _ = env.close();
                }
                Err(err)
            }
        }
    }

    /// Release the engine handle.
    ///
    /// Terminal: every later call on any handle of this environment fails
    /// with [`Error::Closed`], including a second `close`. Outstanding
    /// transaction references only keep the wrapper memory alive.
    pub fn close(&self) -> Result<()> {
        let env = self.inner.handle.swap(ptr::null_mut(), Ordering::SeqCst);
        if env.is_null() {
            return Err(Error::Closed("Environment"));
        }
        debug!("closing environment");
        unsafe { ffi::mdb_env_close(env) };
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Environment statistics snapshot
    pub fn stat(&self) -> Result<Stat> {
        let env = self.inner.ptr()?;
        let mut stat: ffi::MDB_stat = unsafe { std::mem::zeroed() };
        unsafe { ffi::mdb_env_stat(env.as_ptr(), &mut stat) }.into_result()?;
        Ok(Stat::from_ffi(&stat))
    }

    /// Environment information snapshot
    pub fn info(&self) -> Result<EnvInfo> {
        let env = self.inner.ptr()?;
        let mut info: ffi::MDB_envinfo = unsafe { std::mem::zeroed() };
        unsafe { ffi::mdb_env_info(env.as_ptr(), &mut info) }.into_result()?;
        Ok(EnvInfo::from_ffi(&info))
    }

    /// Copy the environment to the directory at `path`.
    ///
    /// May be used to make a backup of the environment; runs against a
    /// consistent read snapshot.
    pub fn copy<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let env = self.inner.ptr()?;
        let path = path.as_ref().to_str().ok_or(Error::Invalid)?;
        let path = CString::new(path).map_err(|_| Error::Invalid)?;
        unsafe { ffi::mdb_env_copy(env.as_ptr(), path.as_ptr()) }.into_result()
    }

    /// Copy the environment with options, e.g. [`CopyFlags::COMPACT`] to
    /// omit free pages and renumber the rest
    pub fn copy2<P: AsRef<Path>>(&self, path: P, flags: CopyFlags) -> Result<()> {
        let env = self.inner.ptr()?;
        let path = path.as_ref().to_str().ok_or(Error::Invalid)?;
        let path = CString::new(path).map_err(|_| Error::Invalid)?;
        unsafe { ffi::mdb_env_copy2(env.as_ptr(), path.as_ptr(), flags.bits()) }.into_result()
    }

    /// Flush the data buffers to disk.
    ///
    /// Data is written to disk when transactions commit, but the OS may
    /// keep it buffered; `force` makes the flush synchronous even for an
    /// environment opened with NOSYNC or MAPASYNC.
    pub fn sync(&self, force: bool) -> Result<()> {
        let env = self.inner.ptr()?;
        unsafe { ffi::mdb_env_sync(env.as_ptr(), force as c_int) }.into_result()
    }

    /// Get environment flags
    pub fn get_flags(&self) -> Result<EnvFlags> {
        let env = self.inner.ptr()?;
        let mut flags: c_uint = 0;
        unsafe { ffi::mdb_env_get_flags(env.as_ptr(), &mut flags) }.into_result()?;
        Ok(EnvFlags::from_bits_truncate(flags))
    }

    /// Replace the runtime-mutable environment flags.
    ///
    /// Clears the mutable subset, then applies the requested subset;
    /// flags outside it are left untouched. Returns the resulting flags.
    pub fn set_flags(&self, flags: EnvFlags) -> Result<EnvFlags> {
        let env = self.inner.ptr()?;
        let current = self.get_flags()?;
        unsafe { ffi::mdb_env_set_flags(env.as_ptr(), (current & *CHANGEABLE).bits(), 0) }
            .into_result()?;
        unsafe { ffi::mdb_env_set_flags(env.as_ptr(), (flags & *CHANGEABLE).bits(), 1) }
            .into_result()?;
        self.get_flags()
    }

    /// Path the environment was opened at
    pub fn path(&self) -> Result<PathBuf> {
        let env = self.inner.ptr()?;
        let mut path: *const c_char = ptr::null();
        unsafe { ffi::mdb_env_get_path(env.as_ptr(), &mut path) }.into_result()?;
        let path = unsafe { CStr::from_ptr(path) };
        Ok(PathBuf::from(path.to_string_lossy().into_owned()))
    }

    /// Resize the memory map
    pub fn set_map_size(&self, size: usize) -> Result<()> {
        let env = self.inner.ptr()?;
        unsafe { ffi::mdb_env_set_mapsize(env.as_ptr(), size as _) }.into_result()
    }

    /// Maximum number of reader slots for the environment
    pub fn get_max_readers(&self) -> Result<u32> {
        let env = self.inner.ptr()?;
        let mut readers: c_uint = 0;
        unsafe { ffi::mdb_env_get_maxreaders(env.as_ptr(), &mut readers) }.into_result()?;
        Ok(readers as u32)
    }

    /// Maximum size of a key, as configured in the engine
    pub fn get_max_key_size(&self) -> Result<u32> {
        let env = self.inner.ptr()?;
        Ok(unsafe { ffi::mdb_env_get_maxkeysize(env.as_ptr()) } as u32)
    }

    /// Check for stale reader slots, returning how many were cleared
    pub fn reader_check(&self) -> Result<usize> {
        let env = self.inner.ptr()?;
        let mut dead: c_int = 0;
        unsafe { ffi::mdb_reader_check(env.as_ptr(), &mut dead) }.into_result()?;
        Ok(dead as usize)
    }

    /// Begin a new write transaction
    pub fn begin_txn(&self) -> Result<Transaction> {
        Transaction::begin(&self.inner, None, false)
    }

    /// Begin a new read-only transaction
    pub fn begin_ro_txn(&self) -> Result<Transaction> {
        Transaction::begin(&self.inner, None, true)
    }

    /// Run a block inside a write transaction: commit on normal return,
    /// abort and re-return the error on failure
    pub fn with_txn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        Transaction::scoped(self.begin_txn()?, f)
    }

    /// Scoped form of [`begin_ro_txn`](Environment::begin_ro_txn)
    pub fn with_ro_txn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        Transaction::scoped(self.begin_ro_txn()?, f)
    }

    pub(crate) fn from_inner(inner: Arc<EnvInner>) -> Environment {
        Environment { inner }
    }

    /// Engine version components
    pub fn version() -> (i32, i32, i32) {
        let mut major: c_int = 0;
        let mut minor: c_int = 0;
        let mut patch: c_int = 0;
        unsafe { ffi::mdb_version(&mut major, &mut minor, &mut patch) };
        (major, minor, patch)
    }

    /// Engine version in string format
    pub fn version_string() -> String {
        let (major, minor, patch) = Self::version();
        format!("{}.{}.{}", major, minor, patch)
    }
}
