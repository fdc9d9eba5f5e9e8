//! Schema-table dispatch.
//!
//! Each supported pseudo-file format is described by an ordered table of
//! field setters, one per column. The column index is the sole link
//! between a token and its destination field; deliberately ignored kernel
//! columns keep a discard entry in the table so alignment is preserved.

use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::iter::{iter_file, iter_line, Flow};
use crate::parse::ParseError;
use crate::{Error, Result};

/// Converts one token and assigns it to its field of the in-progress
/// record. Discard columns are `|_, _| Ok(())` entries.
pub type FieldSetter<R> = fn(&str, &mut R) -> std::result::Result<(), ParseError>;

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    /// A token could not be converted to its destination field.
    #[error("'{token}': failed to parse value at column {column}")]
    InvalidToken {
        token: String,
        column: usize,
        #[source]
        source: ParseError,
    },
    /// The line carries more columns than the format defines. The
    /// pseudo-file format changed in a way this reader cannot handle.
    #[error("unexpected column {column}, format defines {expected} columns")]
    TooManyColumns { column: usize, expected: usize },
    /// The line ended before every field of the record was populated.
    #[error("line has {found} columns, format requires {expected}")]
    MissingColumns { found: usize, expected: usize },
}

/// Tokenizes `line` on spaces and applies `table[column]` to each token.
/// The record is only valid if every column of the table was populated;
/// anything else fails the whole line.
pub(crate) fn apply_line<R>(
    line: &str,
    table: &[FieldSetter<R>],
    record: &mut R,
) -> std::result::Result<(), SchemaError> {
    let mut populated = 0;

    iter_line(line, ' ', |token, column| {
        if column >= table.len() {
            return Err(SchemaError::TooManyColumns {
                column,
                expected: table.len(),
            });
        }

        table[column](token, record).map_err(|source| SchemaError::InvalidToken {
            token: token.to_string(),
            column,
            source,
        })?;

        populated += 1;
        Ok(Flow::Continue)
    })?;

    if populated < table.len() {
        return Err(SchemaError::MissingColumns {
            found: populated,
            expected: table.len(),
        });
    }

    Ok(())
}

/// Copies a token into a bounded string field, silently truncating to
/// `cap` characters. Truncation is the defined behaviour, not an error:
/// it mirrors the destination's fixed capacity in the kernel structures.
pub(crate) fn copy_bounded(token: &str, cap: usize) -> String {
    token.chars().take(cap).collect()
}

/// A fixed-layout record parsed from a single pseudo-file line.
pub trait Record: Default + 'static {
    const TABLE: &'static [FieldSetter<Self>];
}

/// A record read from a per-process pseudo-file under `/proc/[pid]/`.
pub trait PidRecord: Record {
    fn filepath(pid: u32) -> PathBuf;
}

/// Reads a single-record pseudo-file. The file stays open across reads;
/// each read rewinds and produces a fresh record.
pub struct RecordReader<R>
where
    R: Record,
{
    file: File,
    path: PathBuf,
    phantom: PhantomData<R>,
}

impl<R> RecordReader<R>
where
    R: Record,
{
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            syscall: "open",
            source,
        })?;

        Ok(RecordReader {
            file,
            path: path.to_path_buf(),
            phantom: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file's first non-blank line into a fresh record.
    /// The record is either fully populated or the read fails.
    pub fn read(&mut self) -> Result<R> {
        let mut record = R::default();
        let mut populated = false;

        let path = &self.path;
        iter_file(&mut self.file, path, |line, _| {
            if line.trim().is_empty() {
                return Ok(Flow::Continue);
            }

            apply_line(line, R::TABLE, &mut record).map_err(|source| Error::Malformed {
                path: path.clone(),
                source,
            })?;
            populated = true;
            Ok(Flow::Break)
        })?;

        if !populated {
            return Err(Error::Malformed {
                path: self.path.clone(),
                source: SchemaError::MissingColumns {
                    found: 0,
                    expected: R::TABLE.len(),
                },
            });
        }

        Ok(record)
    }
}

impl<R> RecordReader<R>
where
    R: PidRecord,
{
    pub fn for_pid(pid: u32) -> Result<Self> {
        Self::open(&R::filepath(pid))
    }
}
