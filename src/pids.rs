//! Process discovery over the `/proc` root.

use std::path::Path;

use crate::iter::{iter_dir, Flow};
use crate::parse::parse_u32;
use crate::Result;

/// Walks the numeric-named entries of `proc_root`, invoking `handler`
/// with each process id and its directory path.
///
/// Entries whose names do not parse entirely as a non-negative integer
/// are kernel pseudo-files, not process directories, and are silently
/// skipped. When `filter` is given, ids outside the set are skipped
/// without invoking the handler.
pub fn iter_proc_pids<F>(proc_root: &Path, filter: Option<&[u32]>, mut handler: F) -> Result<Flow>
where
    F: FnMut(u32, &Path) -> Result<Flow>,
{
    iter_dir(proc_root, |entry| {
        let name = entry.file_name();
        let pid = match name.to_str().and_then(|n| parse_u32(n).ok()) {
            Some(pid) => pid,
            None => return Ok(Flow::Continue),
        };

        if let Some(wanted) = filter {
            if !wanted.contains(&pid) {
                return Ok(Flow::Continue);
            }
        }

        handler(pid, &entry.path())
    })
}
