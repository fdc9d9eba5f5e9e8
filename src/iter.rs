//! Streaming iteration over tokens, lines and directory entries.
//!
//! Each iterator drives a caller-supplied handler and buffers at most one
//! unit (one token, one line, one entry) at a time. The handler's verdict
//! controls the iteration: [`Flow::Continue`] advances, [`Flow::Break`]
//! stops successfully, `Err` aborts and propagates.

use std::fs::{self, DirEntry, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::{Error, Result};

/// Verdict returned by iteration handlers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Advance to the next unit.
    Continue,
    /// Stop iterating; this is ordinary completion, not a failure.
    Break,
}

/// Splits `line` on `delim` and invokes `handler` once per token with its
/// zero-based column index. Runs of delimiters count as one; empty tokens
/// are never surfaced.
///
/// Returns the last verdict, so a caller can tell an exhausted line
/// (`Continue`) from a short-circuited one (`Break`).
pub fn iter_line<E, F>(line: &str, delim: char, mut handler: F) -> std::result::Result<Flow, E>
where
    F: FnMut(&str, usize) -> std::result::Result<Flow, E>,
{
    let mut flow = Flow::Continue;

    let tokens = line.split(delim).filter(|t| !t.is_empty());
    for (column, token) in tokens.enumerate() {
        flow = handler(token, column)?;
        if flow == Flow::Break {
            break;
        }
    }

    Ok(flow)
}

/// Rewinds `file` to its start and reads successive lines until end of
/// file or a non-`Continue` verdict. Lines are handed to `handler` with
/// the trailing newline stripped, alongside their zero-based line number.
///
/// A read is always a fresh full-file scan, never a resumption. End of
/// file without an underlying read error is ordinary completion.
pub fn iter_file<F>(file: &mut File, path: &Path, mut handler: F) -> Result<Flow>
where
    F: FnMut(&str, usize) -> Result<Flow>,
{
    file.seek(SeekFrom::Start(0)).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        syscall: "lseek",
        source,
    })?;

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut flow = Flow::Continue;

    for line_no in 0.. {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            syscall: "read",
            source,
        })?;
        if read == 0 {
            break;
        }

        if line.ends_with('\n') {
            line.pop();
        }

        flow = handler(&line, line_no)?;
        if flow == Flow::Break {
            break;
        }
    }

    Ok(flow)
}

/// Reads successive entries of the directory at `path`, passing each to
/// `handler`. The `.` and `..` pseudo-entries are never surfaced. End of
/// stream without an underlying error is ordinary completion.
pub fn iter_dir<F>(path: &Path, mut handler: F) -> Result<Flow>
where
    F: FnMut(&DirEntry) -> Result<Flow>,
{
    let entries = fs::read_dir(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        syscall: "opendir",
        source,
    })?;

    let mut flow = Flow::Continue;
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            syscall: "readdir",
            source,
        })?;

        flow = handler(&entry)?;
        if flow == Flow::Break {
            break;
        }
    }

    Ok(flow)
}
