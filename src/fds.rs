//! Per-process open-descriptor walking.

use std::fs::{self, Metadata};
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use log::warn;

use crate::iter::{iter_dir, Flow};
use crate::parse::parse_u32;
use crate::pids::iter_proc_pids;
use crate::{Error, Result};

/// Selects which descriptor information a walk resolves; on an
/// [`FdEntry`], states which of it was successfully populated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InfoMask(u8);

impl InfoMask {
    pub const NONE: InfoMask = InfoMask(0);
    /// Resolve the descriptor's symbolic link target.
    pub const LINK_TARGET: InfoMask = InfoMask(0x01);
    /// Capture file status metadata for the descriptor path.
    pub const STATUS: InfoMask = InfoMask(0x02);

    pub fn contains(self, other: InfoMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InfoMask {
    type Output = InfoMask;

    fn bitor(self, rhs: InfoMask) -> InfoMask {
        InfoMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for InfoMask {
    fn bitor_assign(&mut self, rhs: InfoMask) {
        self.0 |= rhs.0;
    }
}

/// One open descriptor of a process.
#[derive(Debug)]
pub struct FdEntry {
    /// Descriptor number.
    pub fd: u32,
    /// The `/proc/[pid]/fd/[fd]` pseudo-path.
    pub path: PathBuf,
    /// Resolved link target, when requested and resolved.
    pub link_target: Option<PathBuf>,
    /// File status metadata, when requested and captured.
    pub status: Option<Metadata>,
    /// Which of the requested information was populated.
    pub valid: InfoMask,
}

/// Verdict for multi-process descriptor walks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WalkFlow {
    /// Advance to the next descriptor.
    Continue,
    /// End the current process's walk as ordinary completion and move on
    /// to the next process.
    NextProcess,
    /// Halt the entire multi-process traversal.
    Stop,
}

const STD_STREAM_FDS: [&str; 3] = ["0", "1", "2"];

/// Walks the `fd` subdirectory of one process directory.
///
/// The three standard stream descriptors are unconditionally skipped.
/// Any other entry must be a descriptor number; the fd tree contains
/// nothing else, so a non-numeric name aborts the walk. A `Break`
/// verdict from the handler ends the walk as ordinary completion.
pub fn iter_pid_fds<F>(pid_dir: &Path, want: InfoMask, mut handler: F) -> Result<Flow>
where
    F: FnMut(&FdEntry) -> Result<Flow>,
{
    let fd_dir = pid_dir.join("fd");

    iter_dir(&fd_dir, |entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if STD_STREAM_FDS.contains(&name.as_ref()) {
            return Ok(Flow::Continue);
        }

        let fd = match parse_u32(&name) {
            Ok(fd) => fd,
            Err(_) => {
                warn!("unexpected entry '{}' in {}", name, fd_dir.display());
                return Err(Error::BadDescriptorName {
                    dir: fd_dir.clone(),
                    name: name.to_string(),
                });
            }
        };

        let mut info = FdEntry {
            fd,
            path: entry.path(),
            link_target: None,
            status: None,
            valid: InfoMask::NONE,
        };

        if want.contains(InfoMask::LINK_TARGET) {
            let target = fs::read_link(&info.path).map_err(|source| Error::DescriptorIo {
                name: name.to_string(),
                syscall: "readlink",
                source,
            })?;
            info.link_target = Some(target);
            info.valid |= InfoMask::LINK_TARGET;
        }

        if want.contains(InfoMask::STATUS) {
            let status = fs::metadata(&info.path).map_err(|source| Error::DescriptorIo {
                name: name.to_string(),
                syscall: "stat",
                source,
            })?;
            info.status = Some(status);
            info.valid |= InfoMask::STATUS;
        }

        handler(&info)
    })
}

/// Walks the descriptors of every process under `proc_root` (optionally
/// restricted to `filter`), composing [`iter_proc_pids`] with
/// [`iter_pid_fds`]. The handler receives each process's directory path
/// alongside the descriptor entry and steers the traversal with a
/// [`WalkFlow`] verdict.
pub fn iter_all_pid_fds<F>(
    proc_root: &Path,
    filter: Option<&[u32]>,
    want: InfoMask,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(&Path, &FdEntry) -> Result<WalkFlow>,
{
    iter_proc_pids(proc_root, filter, |_, pid_dir| {
        let mut stop = false;

        iter_pid_fds(pid_dir, want, |info| match handler(pid_dir, info)? {
            WalkFlow::Continue => Ok(Flow::Continue),
            WalkFlow::NextProcess => Ok(Flow::Break),
            WalkFlow::Stop => {
                stop = true;
                Ok(Flow::Break)
            }
        })?;

        // a per-process Break only ends that process's walk
        if stop {
            Ok(Flow::Break)
        } else {
            Ok(Flow::Continue)
        }
    })?;

    Ok(())
}


#[cfg(test)]
mod test_iter_all_pid_fds {
    use std::fs::File;
    use std::os::unix::fs::symlink;

    use tempfile::{tempdir, TempDir};

    use super::*;

    fn fake_proc(pids: &[(&str, &[&str])]) -> TempDir {
        let root = tempdir().expect("Could not create temp dir");
        let target = root.path().join("open-file");
        File::create(&target).expect("Could not create target file");

        for (pid, fds) in pids {
            let fd_dir = root.path().join(pid).join("fd");
            fs::create_dir_all(&fd_dir).expect("Could not create fd dir");
            for fd in *fds {
                symlink(&target, fd_dir.join(fd)).expect("Could not create fd link");
            }
        }
        root
    }

    #[test]
    fn test_walks_every_descriptor_of_every_process() {
        let root = fake_proc(&[("100", &["3", "4"]), ("200", &["5"])]);

        let mut seen = Vec::new();
        iter_all_pid_fds(root.path(), None, InfoMask::NONE, |pid_dir, info| {
            seen.push((pid_dir.to_path_buf(), info.fd));
            Ok(WalkFlow::Continue)
        })
        .expect("Could not walk processes");

        seen.sort();
        assert_eq!(
            seen,
            vec![
                (root.path().join("100"), 3),
                (root.path().join("100"), 4),
                (root.path().join("200"), 5),
            ]
        );
    }

    #[test]
    fn test_next_process_skips_remaining_descriptors_of_current_pid() {
        let root = fake_proc(&[("100", &["3", "4", "5"]), ("200", &["6"])]);

        let mut per_pid = std::collections::HashMap::new();
        iter_all_pid_fds(root.path(), None, InfoMask::NONE, |pid_dir, _| {
            let count = per_pid.entry(pid_dir.to_path_buf()).or_insert(0);
            *count += 1;
            Ok(WalkFlow::NextProcess)
        })
        .expect("Could not walk processes");

        assert_eq!(per_pid.len(), 2);
        assert!(per_pid.values().all(|&count| count == 1));
    }

    #[test]
    fn test_stop_halts_the_entire_traversal() {
        let root = fake_proc(&[("100", &["3", "4"]), ("200", &["5", "6"])]);

        let mut seen = 0;
        iter_all_pid_fds(root.path(), None, InfoMask::NONE, |_, _| {
            seen += 1;
            Ok(WalkFlow::Stop)
        })
        .expect("Could not walk processes");

        assert_eq!(seen, 1);
    }

    #[test]
    fn test_filter_restricts_the_walked_processes() {
        let root = fake_proc(&[("100", &["3"]), ("200", &["4"])]);

        let mut dirs = Vec::new();
        iter_all_pid_fds(root.path(), Some(&[200]), InfoMask::NONE, |pid_dir, _| {
            dirs.push(pid_dir.to_path_buf());
            Ok(WalkFlow::Continue)
        })
        .expect("Could not walk processes");

        assert_eq!(dirs, vec![root.path().join("200")]);
    }
}
