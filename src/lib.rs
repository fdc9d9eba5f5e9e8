//! Typed snapshots of procfs pseudo-files.
//!
//! This crate reads a small set of `/proc` pseudo-files into fixed-layout
//! records (`/proc/diskstats`, `/proc/[pid]/stat`, `/proc/[pid]/statm`) and
//! walks per-process descriptor directories to find processes holding a
//! given file or directory open.
//!
//! Every read is a one-shot snapshot: files are rewound and fully re-parsed
//! on each call, and records from different calls are unrelated. All I/O is
//! synchronous and blocking; callers wanting async behaviour should wrap
//! calls on a worker thread.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod diskstats;
pub mod fds;
pub mod iter;
pub mod open_paths;
pub mod parse;
pub mod pids;
pub mod pidstat;
pub mod schema;

pub use diskstats::{DiskStat, DiskStatsReader};
pub use fds::{FdEntry, InfoMask, WalkFlow};
pub use iter::Flow;
pub use open_paths::{OpenPathCheck, OpenPathMatch, PathSpec};
pub use pidstat::{PidStat, PidStatReader, PidStatm, PidStatmReader};

use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum Error {
    /// An OS-level failure, with the path and syscall that failed.
    #[error("{}: {syscall}() failed", .path.display())]
    Io {
        path: PathBuf,
        syscall: &'static str,
        #[source]
        source: io::Error,
    },
    /// A pseudo-file did not match the layout this crate understands.
    /// Partial records are discarded, never surfaced.
    #[error("{}: malformed record", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    /// A descriptor directory contained an entry that is not a descriptor
    /// number. Unlike `/proc` itself, the fd tree holds nothing else, so
    /// this is fatal rather than skippable.
    #[error("unexpected entry '{name}' in descriptor directory {}", .dir.display())]
    BadDescriptorName { dir: PathBuf, name: String },
    /// readlink() or stat() failed for one descriptor during a walk.
    #[error("descriptor '{name}': {syscall}() failed")]
    DescriptorIo {
        name: String,
        syscall: &'static str,
        #[source]
        source: io::Error,
    },
    /// A target path passed to the matcher exceeds the platform limit.
    #[error("target path '{0}' exceeds the platform maximum path length")]
    PathTooLong(String),
    /// A target path passed to the matcher could not be classified.
    #[error("cannot resolve target path '{path}'")]
    BadTargetPath {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Failure raised from a caller-supplied iteration handler.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
