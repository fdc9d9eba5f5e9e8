//! `/proc/diskstats` snapshot reader.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::iter::{iter_file, Flow};
use crate::parse::{parse_u32, parse_u64};
use crate::schema::{apply_line, copy_bounded, FieldSetter};
use crate::{Error, Result};

const DISKSTATS_PATH: &str = "/proc/diskstats";

/// Device names are bounded by the kernel's block device name size.
const DEV_NAME_MAX: usize = 31;

/// Most kernels expose well under this many block devices; seeding the
/// output buffer avoids early regrowth on typical hosts.
const INITIAL_CAPACITY: usize = 100;

/// One `/proc/diskstats` line: a block device identity and its 17
/// I/O counters, in kernel column order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskStat {
    pub major: u32,
    pub minor: u32,
    /// Device name, truncated to [`DEV_NAME_MAX`] characters.
    pub name: String,
    pub reads_completed: u64,
    pub reads_merged: u64,
    pub sectors_read: u64,
    pub time_reading_ms: u32,
    pub writes_completed: u64,
    pub writes_merged: u64,
    pub sectors_written: u64,
    pub time_writing_ms: u32,
    pub ios_in_progress: u32,
    pub time_doing_ios_ms: u32,
    pub weighted_time_doing_ios_ms: u32,
    pub discards_completed: u64,
    pub discards_merged: u64,
    pub sectors_discarded: u64,
    pub time_discarding_ms: u32,
    pub flush_requests_completed: u64,
    pub time_flushing_ms: u32,
}

#[rustfmt::skip]
const DISKSTAT_TABLE: &[FieldSetter<DiskStat>] = &[
    |t, s| Ok(s.major = parse_u32(t)?),
    |t, s| Ok(s.minor = parse_u32(t)?),
    |t, s| Ok(s.name = copy_bounded(t, DEV_NAME_MAX)),
    |t, s| Ok(s.reads_completed = parse_u64(t)?),
    |t, s| Ok(s.reads_merged = parse_u64(t)?),
    |t, s| Ok(s.sectors_read = parse_u64(t)?),
    |t, s| Ok(s.time_reading_ms = parse_u32(t)?),
    |t, s| Ok(s.writes_completed = parse_u64(t)?),
    |t, s| Ok(s.writes_merged = parse_u64(t)?),
    |t, s| Ok(s.sectors_written = parse_u64(t)?),
    |t, s| Ok(s.time_writing_ms = parse_u32(t)?),
    |t, s| Ok(s.ios_in_progress = parse_u32(t)?),
    |t, s| Ok(s.time_doing_ios_ms = parse_u32(t)?),
    |t, s| Ok(s.weighted_time_doing_ios_ms = parse_u32(t)?),
    |t, s| Ok(s.discards_completed = parse_u64(t)?),
    |t, s| Ok(s.discards_merged = parse_u64(t)?),
    |t, s| Ok(s.sectors_discarded = parse_u64(t)?),
    |t, s| Ok(s.time_discarding_ms = parse_u32(t)?),
    |t, s| Ok(s.flush_requests_completed = parse_u64(t)?),
    |t, s| Ok(s.time_flushing_ms = parse_u32(t)?),
];

/// Reads all device lines of a diskstats-format file. The file stays
/// open across reads; each read rewinds and produces a fresh snapshot.
pub struct DiskStatsReader {
    file: File,
    path: PathBuf,
}

impl DiskStatsReader {
    pub fn new() -> Result<Self> {
        Self::open(Path::new(DISKSTATS_PATH))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            syscall: "open",
            source,
        })?;

        Ok(DiskStatsReader {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Returns one record per device line, in file order. Any line that
    /// fails to parse fails the whole read; partial output is discarded.
    pub fn read(&mut self) -> Result<Vec<DiskStat>> {
        let mut stats: Vec<DiskStat> = Vec::with_capacity(INITIAL_CAPACITY);

        let path = &self.path;
        iter_file(&mut self.file, path, |line, _| {
            if line.trim().is_empty() {
                return Ok(Flow::Continue);
            }

            let mut stat = DiskStat::default();
            apply_line(line, DISKSTAT_TABLE, &mut stat).map_err(|source| Error::Malformed {
                path: path.clone(),
                source,
            })?;

            stats.push(stat);
            Ok(Flow::Continue)
        })?;

        Ok(stats)
    }
}

#[cfg(test)]
mod test_diskstats {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SAMPLE: &str = "\
   8       0 sda 120 30 9296 60 842 103 19674 316 0 352 448 12 3 456 70 1 2
   8       1 sda1 80 10 4000 40 500 50 9000 200 1 150 260 0 0 0 0 0 0
";

    fn reader_for(content: &str) -> (NamedTempFile, DiskStatsReader) {
        let mut tmp = NamedTempFile::new().expect("Could not create temp file");
        tmp.write_all(content.as_bytes()).expect("Could not write temp file");
        let reader = DiskStatsReader::open(tmp.path()).expect("Could not open reader");
        (tmp, reader)
    }

    #[test]
    fn test_should_return_one_record_per_device_line() {
        let (_tmp, mut reader) = reader_for(SAMPLE);

        let stats = reader.read().expect("Could not read disk stats");

        assert_eq!(stats.len(), 2);
        assert_eq!(
            stats[0],
            DiskStat {
                major: 8,
                minor: 0,
                name: "sda".to_string(),
                reads_completed: 120,
                reads_merged: 30,
                sectors_read: 9296,
                time_reading_ms: 60,
                writes_completed: 842,
                writes_merged: 103,
                sectors_written: 19674,
                time_writing_ms: 316,
                ios_in_progress: 0,
                time_doing_ios_ms: 352,
                weighted_time_doing_ios_ms: 448,
                discards_completed: 12,
                discards_merged: 3,
                sectors_discarded: 456,
                time_discarding_ms: 70,
                flush_requests_completed: 1,
                time_flushing_ms: 2,
            }
        );
        assert_eq!(stats[1].name, "sda1");
        assert_eq!(stats[1].ios_in_progress, 1);
    }

    #[test]
    fn test_short_line_fails_the_whole_read() {
        let (_tmp, mut reader) = reader_for("8 0 sda 120 30\n");

        let ret = reader.read();

        assert!(matches!(ret, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_one_bad_line_discards_all_records() {
        let mut content = SAMPLE.to_string();
        content.push_str("8 2 sda2 bad 30 9296 60 842 103 19674 316 0 352 448 12 3 456 70 1 2\n");
        let (_tmp, mut reader) = reader_for(&content);

        let ret = reader.read();

        assert!(matches!(ret, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_device_name_is_truncated_not_rejected() {
        let long_name = "x".repeat(40);
        let line = format!("8 0 {} 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17\n", long_name);
        let (_tmp, mut reader) = reader_for(&line);

        let stats = reader.read().expect("Could not read disk stats");

        assert_eq!(stats[0].name, "x".repeat(31));
    }

    #[test]
    fn test_rereading_an_unchanged_file_yields_identical_records() {
        let (_tmp, mut reader) = reader_for(SAMPLE);

        let first = reader.read().expect("Could not read disk stats");
        let second = reader.read().expect("Could not re-read disk stats");

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_file_yields_empty_snapshot() {
        let (_tmp, mut reader) = reader_for("");

        let stats = reader.read().expect("Could not read disk stats");

        assert!(stats.is_empty());
    }
}
