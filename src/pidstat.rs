//! `/proc/[pid]/stat` and `/proc/[pid]/statm` readers.
//!
//! Both files are single-line, whitespace-delimited kernel formats. The
//! stat format carries a number of historically obsolete columns; those
//! are consumed positionally but never stored, so that later columns stay
//! aligned.

use std::path::PathBuf;

use crate::parse::{parse_i32, parse_i64, parse_u32, parse_u64, ParseError};
use crate::schema::{copy_bounded, FieldSetter, PidRecord, Record, RecordReader};

/// `TASK_COMM_LEN` plus the surrounding parentheses.
const COMM_MAX: usize = 17;

/// Data from `/proc/[pid]/stat`.
///
/// The command name column is taken as one whitespace-delimited token,
/// parentheses included. A command name containing spaces shifts every
/// later column and fails the read with a schema error; this is the
/// documented parsing contract, inherited from the format's origin.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PidStat {
    pub pid: i32,
    /// Command name, truncated to [`COMM_MAX`] characters.
    pub comm: String,
    /// Single-character run state code (R, S, D, Z, T, ...).
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub minflt: u64,
    pub cminflt: u64,
    pub majflt: u64,
    pub cmajflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    pub starttime: u64,
    pub vsize: u64,
    /// Resident set size in pages. The kernel documents this as inaccurate.
    pub rss: i64,
    pub rsslim: u64,
    pub startcode: u64,
    pub endcode: u64,
    pub startstack: u64,
    pub kstkesp: u64,
    pub kstkeip: u64,
    pub wchan: u64,
    pub exit_signal: i32,
    pub processor: i32,
    pub rt_priority: u32,
    pub policy: u32,
    pub delayacct_blkio_ticks: u64,
    pub guest_time: u64,
    pub cguest_time: i64,
    pub start_data: u64,
    pub end_data: u64,
    pub start_brk: u64,
    pub arg_start: u64,
    pub arg_end: u64,
    pub env_start: u64,
    pub env_end: u64,
    pub exit_code: i32,
}

/// Some kernel versions emit the exit code as two digit characters with
/// no separator; only the first carries the value. Any other token width
/// is a schema violation for the record.
fn set_exit_code(token: &str, stat: &mut PidStat) -> Result<(), ParseError> {
    if token.len() != 2 {
        return Err(ParseError::ExitCodeWidth);
    }

    let digit = token.as_bytes()[0];
    if !digit.is_ascii_digit() {
        return Err(ParseError::NotNumeric);
    }

    stat.exit_code = i32::from(digit - b'0');
    Ok(())
}

#[rustfmt::skip]
const PIDSTAT_TABLE: &[FieldSetter<PidStat>] = &[
    |t, s| Ok(s.pid = parse_i32(t)?),
    |t, s| Ok(s.comm = copy_bounded(t, COMM_MAX)),
    |t, s| Ok(s.state = t.chars().next().unwrap_or_default()),
    |t, s| Ok(s.ppid = parse_i32(t)?),
    |t, s| Ok(s.pgrp = parse_i32(t)?),
    |t, s| Ok(s.session = parse_i32(t)?),
    |t, s| Ok(s.tty_nr = parse_i32(t)?),
    |t, s| Ok(s.tpgid = parse_i32(t)?),
    |t, s| Ok(s.flags = parse_u32(t)?),
    |t, s| Ok(s.minflt = parse_u64(t)?),
    |t, s| Ok(s.cminflt = parse_u64(t)?),
    |t, s| Ok(s.majflt = parse_u64(t)?),
    |t, s| Ok(s.cmajflt = parse_u64(t)?),
    |t, s| Ok(s.utime = parse_u64(t)?),
    |t, s| Ok(s.stime = parse_u64(t)?),
    |t, s| Ok(s.cutime = parse_i64(t)?),
    |t, s| Ok(s.cstime = parse_i64(t)?),
    |t, s| Ok(s.priority = parse_i64(t)?),
    |t, s| Ok(s.nice = parse_i64(t)?),
    |t, s| Ok(s.num_threads = parse_i64(t)?),
    |_, _| Ok(()), // itrealvalue, hardcoded to zero since Linux 2.6.17
    |t, s| Ok(s.starttime = parse_u64(t)?),
    |t, s| Ok(s.vsize = parse_u64(t)?),
    |t, s| Ok(s.rss = parse_i64(t)?),
    |t, s| Ok(s.rsslim = parse_u64(t)?),
    |t, s| Ok(s.startcode = parse_u64(t)?),
    |t, s| Ok(s.endcode = parse_u64(t)?),
    |t, s| Ok(s.startstack = parse_u64(t)?),
    |t, s| Ok(s.kstkesp = parse_u64(t)?),
    |t, s| Ok(s.kstkeip = parse_u64(t)?),
    |_, _| Ok(()), // signal, obsolete
    |_, _| Ok(()), // blocked, obsolete
    |_, _| Ok(()), // sigignore, obsolete
    |_, _| Ok(()), // sigcatch, obsolete
    |t, s| Ok(s.wchan = parse_u64(t)?),
    |_, _| Ok(()), // nswap, not maintained
    |_, _| Ok(()), // cnswap, not maintained
    |t, s| Ok(s.exit_signal = parse_i32(t)?),
    |t, s| Ok(s.processor = parse_i32(t)?),
    |t, s| Ok(s.rt_priority = parse_u32(t)?),
    |t, s| Ok(s.policy = parse_u32(t)?),
    |t, s| Ok(s.delayacct_blkio_ticks = parse_u64(t)?),
    |t, s| Ok(s.guest_time = parse_u64(t)?),
    |t, s| Ok(s.cguest_time = parse_i64(t)?),
    |t, s| Ok(s.start_data = parse_u64(t)?),
    |t, s| Ok(s.end_data = parse_u64(t)?),
    |t, s| Ok(s.start_brk = parse_u64(t)?),
    |t, s| Ok(s.arg_start = parse_u64(t)?),
    |t, s| Ok(s.arg_end = parse_u64(t)?),
    |t, s| Ok(s.env_start = parse_u64(t)?),
    |t, s| Ok(s.env_end = parse_u64(t)?),
    set_exit_code,
];

impl Record for PidStat {
    const TABLE: &'static [FieldSetter<Self>] = PIDSTAT_TABLE;
}

impl PidRecord for PidStat {
    fn filepath(pid: u32) -> PathBuf {
        let mut path = PathBuf::from("/proc");
        path.push(pid.to_string());
        path.push("stat");
        path
    }
}

pub type PidStatReader = RecordReader<PidStat>;

/// Data from `/proc/[pid]/statm`, all counts in pages. The text, library
/// and dirty columns are unused since Linux 2.6 and are discarded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PidStatm {
    pub size: u64,
    pub resident: u64,
    pub shared: u64,
    pub data: u64,
}

#[rustfmt::skip]
const PIDSTATM_TABLE: &[FieldSetter<PidStatm>] = &[
    |t, s| Ok(s.size = parse_u64(t)?),
    |t, s| Ok(s.resident = parse_u64(t)?),
    |t, s| Ok(s.shared = parse_u64(t)?),
    |_, _| Ok(()), // text
    |_, _| Ok(()), // library
    |t, s| Ok(s.data = parse_u64(t)?),
    |_, _| Ok(()), // dt
];

impl Record for PidStatm {
    const TABLE: &'static [FieldSetter<Self>] = PIDSTATM_TABLE;
}

impl PidRecord for PidStatm {
    fn filepath(pid: u32) -> PathBuf {
        let mut path = PathBuf::from("/proc");
        path.push(pid.to_string());
        path.push("statm");
        path
    }
}

pub type PidStatmReader = RecordReader<PidStatm>;

#[cfg(test)]
mod test_pid_stat {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::schema::SchemaError;
    use crate::Error;

    use super::*;

    // 52 columns; exit code carried as the two-character token "09".
    const SAMPLE: &str = "42 (worker) S 1 42 42 34822 42 4194304 1096 0 5 0 \
13 42 11 10 20 -2 1 0 487679 13963264 2541 18446744073709551615 4194304 7010805 \
140731882007344 3 4 0 0 0 0 7 0 0 17 3 0 0 6 0 0 9362864 9653016 \
10731520 140731882009319 140731882009327 140731882009327 140731882012647 09\n";

    fn reader_for(content: &str) -> (NamedTempFile, PidStatReader) {
        let mut tmp = NamedTempFile::new().expect("Could not create temp file");
        tmp.write_all(content.as_bytes()).expect("Could not write temp file");
        let reader = PidStatReader::open(tmp.path()).expect("Could not open reader");
        (tmp, reader)
    }

    #[test]
    fn test_should_parse_full_stat_line() {
        let (_tmp, mut reader) = reader_for(SAMPLE);

        let stat = reader.read().expect("Could not read pid stat");

        assert_eq!(stat.pid, 42);
        assert_eq!(stat.comm, "(worker)");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.ppid, 1);
        assert_eq!(stat.tty_nr, 34822);
        assert_eq!(stat.flags, 4194304);
        assert_eq!(stat.minflt, 1096);
        assert_eq!(stat.majflt, 5);
        assert_eq!(stat.utime, 13);
        assert_eq!(stat.stime, 42);
        assert_eq!(stat.cutime, 11);
        assert_eq!(stat.cstime, 10);
        assert_eq!(stat.priority, 20);
        assert_eq!(stat.nice, -2);
        assert_eq!(stat.num_threads, 1);
        assert_eq!(stat.starttime, 487679);
        assert_eq!(stat.vsize, 13963264);
        assert_eq!(stat.rss, 2541);
        assert_eq!(stat.rsslim, u64::MAX);
        assert_eq!(stat.kstkesp, 3);
        assert_eq!(stat.kstkeip, 4);
        assert_eq!(stat.wchan, 7);
        assert_eq!(stat.exit_signal, 17);
        assert_eq!(stat.processor, 3);
        assert_eq!(stat.delayacct_blkio_ticks, 6);
        assert_eq!(stat.env_end, 140731882012647);
        assert_eq!(stat.exit_code, 0);
    }

    #[test]
    fn test_comm_with_embedded_space_shifts_columns_and_fails() {
        let shifted = SAMPLE.replacen("(worker)", "(wor ker)", 1);
        let (_tmp, mut reader) = reader_for(&shifted);

        let ret = reader.read();

        assert!(matches!(ret, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_single_character_exit_code_token_is_fatal() {
        let short = SAMPLE.replacen(" 09\n", " 0\n", 1);
        let (_tmp, mut reader) = reader_for(&short);

        let err = reader.read().unwrap_err();

        match err {
            Error::Malformed {
                source: SchemaError::InvalidToken { token, source, .. },
                ..
            } => {
                assert_eq!(token, "0");
                assert_eq!(source, ParseError::ExitCodeWidth);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_long_comm_is_truncated() {
        let long = format!("({})", "c".repeat(30));
        let renamed = SAMPLE.replacen("(worker)", &long, 1);
        let (_tmp, mut reader) = reader_for(&renamed);

        let stat = reader.read().expect("Could not read pid stat");

        assert_eq!(stat.comm.len(), COMM_MAX);
        assert!(stat.comm.starts_with("(ccc"));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let (_tmp, mut reader) = reader_for("");

        let ret = reader.read();

        assert!(matches!(
            ret,
            Err(Error::Malformed {
                source: SchemaError::MissingColumns { found: 0, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_rereading_yields_identical_record() {
        let (_tmp, mut reader) = reader_for(SAMPLE);

        let first = reader.read().expect("Could not read pid stat");
        let second = reader.read().expect("Could not re-read pid stat");

        assert_eq!(first, second);
    }

    #[test]
    fn filepath_should_contain_pid() {
        assert_eq!(PidStat::filepath(456), PathBuf::from("/proc/456/stat"));
    }
}
