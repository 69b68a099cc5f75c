use std::os::raw::c_void;

use lmdb_sys as ffi;

/// Engine cursor operation codes
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    First = 0,
    FirstDup = 1,
    GetBoth = 2,
    GetBothRange = 3,
    GetCurrent = 4,
    GetMultiple = 5,
    Last = 6,
    LastDup = 7,
    Next = 8,
    NextDup = 9,
    NextMultiple = 10,
    NextNoDup = 11,
    Prev = 12,
    PrevDup = 13,
    PrevNoDup = 14,
    Set = 15,
    SetKey = 16,
    SetRange = 17,
}

/// Environment or database statistics, captured at call time
#[derive(Debug, Clone)]
pub struct Stat {
    pub psize: u32,
    pub depth: u32,
    pub branch_pages: usize,
    pub leaf_pages: usize,
    pub overflow_pages: usize,
    pub entries: usize,
}

impl Stat {
    pub(crate) fn from_ffi(stat: &ffi::MDB_stat) -> Stat {
        Stat {
            psize: stat.ms_psize as u32,
            depth: stat.ms_depth as u32,
            branch_pages: stat.ms_branch_pages as usize,
            leaf_pages: stat.ms_leaf_pages as usize,
            overflow_pages: stat.ms_overflow_pages as usize,
            entries: stat.ms_entries as usize,
        }
    }
}

/// Environment information, captured at call time
#[derive(Debug, Clone)]
pub struct EnvInfo {
    pub mapaddr: *mut c_void,
    pub mapsize: usize,
    pub last_pgno: usize,
    pub last_txnid: usize,
    pub max_readers: u32,
    pub num_readers: u32,
}

impl EnvInfo {
    pub(crate) fn from_ffi(info: &ffi::MDB_envinfo) -> EnvInfo {
        EnvInfo {
            mapaddr: info.me_mapaddr,
            mapsize: info.me_mapsize as usize,
            last_pgno: info.me_last_pgno as usize,
            last_txnid: info.me_last_txnid as usize,
            max_readers: info.me_maxreaders as u32,
            num_readers: info.me_numreaders as u32,
        }
    }
}
