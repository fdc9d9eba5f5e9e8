//! Matching open descriptors against a set of target paths.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use log::debug;

use crate::fds::{iter_all_pid_fds, InfoMask, WalkFlow};
use crate::{Error, Result};

/// A target path, resolved and classified once up front.
///
/// Directory targets match by prefix, plain-file targets by exact
/// equality. A target that cannot be stat-resolved is a usage error for
/// the whole call, not a per-target skip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathSpec {
    path: String,
    is_dir: bool,
}

impl PathSpec {
    pub fn resolve(path: &str) -> Result<PathSpec> {
        if path.len() > libc::PATH_MAX as usize {
            return Err(Error::PathTooLong(path.to_string()));
        }

        let status = fs::metadata(path).map_err(|source| Error::BadTargetPath {
            path: path.to_string(),
            source,
        })?;

        Ok(PathSpec {
            path: path.to_string(),
            is_dir: status.is_dir(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Directory targets compare exactly `path.len()` leading bytes of
    /// the candidate, so `/mnt/data` also matches `/mnt/database`: the
    /// prefix rule has no separator boundary check. This is inherited
    /// behaviour, kept deliberately.
    fn matches(&self, candidate: &[u8], case_insensitive: bool) -> bool {
        let target = self.path.as_bytes();

        if self.is_dir {
            candidate.len() >= target.len()
                && bytes_eq(&candidate[..target.len()], target, case_insensitive)
        } else {
            bytes_eq(candidate, target, case_insensitive)
        }
    }
}

fn bytes_eq(left: &[u8], right: &[u8], case_insensitive: bool) -> bool {
    if case_insensitive {
        left.eq_ignore_ascii_case(right)
    } else {
        left == right
    }
}

/// One descriptor found holding a target open.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpenPathMatch {
    /// The `/proc/[pid]/fd/[fd]` pseudo-path of the matching descriptor.
    pub fd_path: PathBuf,
    /// The descriptor's resolved link target.
    pub target: PathBuf,
    /// The owning process's `/proc/[pid]` directory.
    pub pid_dir: PathBuf,
}

/// Configuration for one open-path check, builder style. Defaults:
/// `/proc` root, fast mode on, case-sensitive, no status capture, all
/// processes.
#[derive(Clone, Debug)]
pub struct OpenPathCheck {
    proc_root: PathBuf,
    fast: bool,
    case_insensitive: bool,
    capture_status: bool,
    pids: Option<Vec<u32>>,
}

impl Default for OpenPathCheck {
    fn default() -> Self {
        OpenPathCheck {
            proc_root: PathBuf::from("/proc"),
            fast: true,
            case_insensitive: false,
            capture_status: false,
            pids: None,
        }
    }
}

impl OpenPathCheck {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// In fast mode the first match halts the entire traversal, so the
    /// result holds at most one record.
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Compare paths ASCII-case-insensitively.
    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Also stat each walked descriptor path during the traversal.
    pub fn capture_status(mut self, capture_status: bool) -> Self {
        self.capture_status = capture_status;
        self
    }

    /// Restrict the traversal to the given process ids.
    pub fn pids(mut self, pids: Vec<u32>) -> Self {
        self.pids = Some(pids);
        self
    }

    /// Resolves `targets` and runs the check.
    pub fn check<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<OpenPathMatch>> {
        let specs = targets
            .iter()
            .map(|target| PathSpec::resolve(target.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        self.run(&specs)
    }

    /// Walks every process's descriptors and reports those whose
    /// resolved target matches any of `targets` (earlier targets are
    /// tried first, without affecting the outcome). An empty target set
    /// returns an empty result without touching the process tree.
    pub fn run(&self, targets: &[PathSpec]) -> Result<Vec<OpenPathMatch>> {
        let mut matches = Vec::new();
        if targets.is_empty() {
            return Ok(matches);
        }

        let mut want = InfoMask::LINK_TARGET;
        if self.capture_status {
            want |= InfoMask::STATUS;
        }

        iter_all_pid_fds(&self.proc_root, self.pids.as_deref(), want, |pid_dir, info| {
            let resolved = match &info.link_target {
                Some(target) => target,
                None => return Ok(WalkFlow::Continue),
            };

            let candidate = resolved.as_os_str().as_bytes();
            let hit = targets
                .iter()
                .any(|target| target.matches(candidate, self.case_insensitive));
            if !hit {
                return Ok(WalkFlow::Continue);
            }

            debug!("{} held open via {}", resolved.display(), info.path.display());
            matches.push(OpenPathMatch {
                fd_path: info.path.clone(),
                target: resolved.clone(),
                pid_dir: pid_dir.to_path_buf(),
            });

            if self.fast {
                Ok(WalkFlow::Stop)
            } else {
                Ok(WalkFlow::Continue)
            }
        })?;

        Ok(matches)
    }
}
