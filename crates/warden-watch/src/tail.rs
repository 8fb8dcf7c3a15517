//! Extraction of newly appended lines.
//!
//! In [`TailMode::Offset`] the reader keeps one in-memory checkpoint per
//! file: the byte offset just past the last complete line it has emitted.
//! A partial trailing line stays unread until its newline arrives. A file
//! that became shorter than its checkpoint, or (on Unix) whose device and
//! inode changed, was truncated or rotated, and reading restarts at 0.
//!
//! A single read never takes more than the reader's batch limit. Content
//! beyond it is picked up by the next change event. A line that alone
//! reaches the limit is dropped and reading resumes after its newline.
//!
//! [`TailMode::Window`] ignores checkpoints and returns the last `n` lines
//! of the file on every call.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WatchError};
use crate::filter::LogFileFilter;

/// Default number of lines in window mode.
pub const DEFAULT_WINDOW_LINES: usize = 5;

/// Default upper bound on the bytes taken from one file per read (1 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 1024 * 1024;

/// How a batch is cut from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailMode {
    /// Complete lines appended since the last checkpoint.
    #[default]
    Offset,
    /// The last `n` lines of the file.
    Window(usize),
}

impl fmt::Display for TailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset => write!(f, "offset"),
            Self::Window(n) => write!(f, "window({n})"),
        }
    }
}

impl FromStr for TailMode {
    type Err = String;

    /// Parses `offset` or `window`. Window mode uses [`DEFAULT_WINDOW_LINES`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" => Ok(Self::Offset),
            "window" => Ok(Self::Window(DEFAULT_WINDOW_LINES)),
            other => Err(format!("unknown tail mode: {other} (expected offset or window)")),
        }
    }
}

/// Device and inode of a file.
type FileIdentity = (u64, u64);

#[derive(Debug, Clone, Copy, Default)]
struct Checkpoint {
    offset: u64,
    /// Set while the bytes up to the next newline belong to an oversized line.
    skip_partial: bool,
    identity: Option<FileIdentity>,
}

#[cfg(unix)]
fn file_identity(meta: &fs::Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &fs::Metadata) -> Option<FileIdentity> {
    None
}

/// Reads the new lines of monitored files.
#[derive(Debug)]
pub struct TailReader {
    mode: TailMode,
    max_batch_bytes: u64,
    checkpoints: Mutex<HashMap<PathBuf, Checkpoint>>,
}

impl Default for TailReader {
    fn default() -> Self {
        Self::new(TailMode::default())
    }
}

impl TailReader {
    /// Creates a reader with no checkpoints.
    #[must_use]
    pub fn new(mode: TailMode) -> Self {
        Self {
            mode,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            checkpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the batch limit in bytes. Zero is raised to 1.
    #[must_use]
    pub fn with_max_batch_bytes(mut self, max: u64) -> Self {
        self.max_batch_bytes = max.max(1);
        self
    }

    /// Returns the mode.
    #[must_use]
    pub const fn mode(&self) -> TailMode {
        self.mode
    }

    /// Returns the batch limit in bytes.
    #[must_use]
    pub const fn max_batch_bytes(&self) -> u64 {
        self.max_batch_bytes
    }

    /// Returns the checkpoint of a file, if one is held.
    #[must_use]
    pub fn checkpoint(&self, path: &Path) -> Option<u64> {
        self.checkpoints.lock().get(path).map(|c| c.offset)
    }

    /// Drops the checkpoint of a file.
    pub fn forget(&self, path: &Path) {
        self.checkpoints.lock().remove(path);
    }

    /// Number of files with a checkpoint.
    #[must_use]
    pub fn tracked_files(&self) -> usize {
        self.checkpoints.lock().len()
    }

    /// Places the checkpoint of an existing file after its last newline.
    ///
    /// Content already in the file is never emitted. A trailing partial line
    /// is emitted once completed. Only the last batch-limit bytes are
    /// scanned; if they hold no newline the trailing line is oversized and
    /// is skipped.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::FileAccess` if the file cannot be read.
    pub fn seed(&self, path: &Path) -> Result<u64> {
        let mut file = File::open(path).map_err(|e| WatchError::file_access(path, e))?;
        let meta = file.metadata().map_err(|e| WatchError::file_access(path, e))?;
        let len = meta.len();

        let tail_start = len - len.min(self.max_batch_bytes);
        let buf = read_range(&mut file, tail_start, len - tail_start)
            .map_err(|e| WatchError::file_access(path, e))?;

        let mut state = Checkpoint {
            identity: file_identity(&meta),
            ..Checkpoint::default()
        };
        match buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => state.offset = tail_start + pos as u64 + 1,
            None if tail_start > 0 => {
                state.offset = len;
                state.skip_partial = true;
            }
            None => {}
        }

        self.store(path, state);
        debug!(path = %path.display(), offset = state.offset, "checkpoint seeded");
        Ok(state.offset)
    }

    /// Seeds every accepted file already present in `dir`.
    ///
    /// Does nothing in window mode or when `dir` does not exist. Files that
    /// cannot be read are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::FileAccess` if the directory cannot be listed.
    pub fn seed_directory(&self, dir: &Path, filter: &LogFileFilter) -> Result<usize> {
        if !matches!(self.mode, TailMode::Offset) || !dir.is_dir() {
            return Ok(0);
        }

        let entries = fs::read_dir(dir).map_err(|e| WatchError::file_access(dir, e))?;
        let mut seeded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !filter.accepts(&path) {
                continue;
            }
            match self.seed(&path) {
                Ok(_) => seeded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "cannot seed checkpoint"),
            }
        }

        info!(dir = %dir.display(), files = seeded, "existing log files seeded");
        Ok(seeded)
    }

    /// Returns the batch for a change to `path`.
    ///
    /// Lines keep their trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::FileAccess` if the file cannot be read and
    /// `WatchError::Decode` if the new content is not UTF-8. In offset mode
    /// the checkpoint still moves past an undecodable chunk.
    pub fn read_new(&self, path: &Path) -> Result<Vec<String>> {
        match self.mode {
            TailMode::Offset => self.read_since_checkpoint(path),
            TailMode::Window(n) => read_window(path, n),
        }
    }

    fn read_since_checkpoint(&self, path: &Path) -> Result<Vec<String>> {
        let mut file = File::open(path).map_err(|e| WatchError::file_access(path, e))?;
        let meta = file.metadata().map_err(|e| WatchError::file_access(path, e))?;
        let len = meta.len();
        let identity = file_identity(&meta);

        let mut state = self.checkpoints.lock().get(path).copied().unwrap_or_default();
        let replaced = matches!(
            (state.identity, identity),
            (Some(old), Some(new)) if old != new
        );
        if replaced || len < state.offset {
            info!(
                path = %path.display(),
                checkpoint = state.offset,
                size = len,
                replaced,
                "file rotated or truncated, reading from the start"
            );
            state = Checkpoint::default();
        }
        state.identity = identity;

        let start = state.offset;
        if len == start {
            self.store(path, state);
            return Ok(Vec::new());
        }

        let buf = read_range(&mut file, start, (len - start).min(self.max_batch_bytes))
            .map_err(|e| WatchError::file_access(path, e))?;

        let mut body_start = 0;
        if state.skip_partial {
            let Some(pos) = buf.iter().position(|b| *b == b'\n') else {
                state.offset = start + buf.len() as u64;
                self.store(path, state);
                return Ok(Vec::new());
            };
            debug!(path = %path.display(), skipped = pos + 1, "end of oversized line reached");
            body_start = pos + 1;
            state.skip_partial = false;
        }
        let body = &buf[body_start..];
        let body_offset = start + body_start as u64;

        let Some(last_newline) = body.iter().rposition(|b| *b == b'\n') else {
            if body.len() as u64 >= self.max_batch_bytes {
                warn!(
                    path = %path.display(),
                    offset = body_offset,
                    limit = self.max_batch_bytes,
                    "line exceeds batch limit, skipping it"
                );
                state.offset = start + buf.len() as u64;
                state.skip_partial = true;
            } else {
                debug!(path = %path.display(), pending = body.len(), "no complete line yet");
                state.offset = body_offset;
            }
            self.store(path, state);
            return Ok(Vec::new());
        };

        state.offset = body_offset + last_newline as u64 + 1;
        self.store(path, state);

        let text = std::str::from_utf8(&body[..=last_newline]).map_err(|_| WatchError::Decode {
            path: path.to_path_buf(),
            offset: body_offset,
        })?;
        Ok(text.split_inclusive('\n').map(str::to_string).collect())
    }

    fn store(&self, path: &Path, state: Checkpoint) {
        self.checkpoints.lock().insert(path.to_path_buf(), state);
    }
}

fn read_range(file: &mut File, start: u64, len: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_window(path: &Path, n: usize) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| WatchError::file_access(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| WatchError::Decode {
        path: path.to_path_buf(),
        offset: 0,
    })?;

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let skip = lines.len().saturating_sub(n);
    Ok(lines[skip..].iter().map(|l| (*l).to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;
    use test_case::test_case;

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn log_file(dir: &TempDir) -> PathBuf {
        dir.path().join("app.log")
    }

    mod mode_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("offset", TailMode::Offset ; "offset")]
        #[test_case("WINDOW", TailMode::Window(DEFAULT_WINDOW_LINES) ; "window upper")]
        #[test_case(" window ", TailMode::Window(DEFAULT_WINDOW_LINES) ; "padded")]
        fn parse(input: &str, expected: TailMode) {
            assert_eq!(input.parse::<TailMode>(), Ok(expected));
        }

        #[test]
        fn parse_unknown() {
            assert!("tail".parse::<TailMode>().is_err());
        }

        #[test]
        fn default_is_offset() {
            assert_eq!(TailMode::default(), TailMode::Offset);
            assert_eq!(TailMode::Window(3).to_string(), "window(3)");
        }
    }

    mod offset_tests {
        use super::*;

        #[test]
        fn new_file_is_read_from_start() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "a - INFO - one\na - CRITICAL - two\n");

            let reader = TailReader::new(TailMode::Offset);
            let lines = reader.read_new(&path).unwrap();

            assert_eq!(lines, vec!["a - INFO - one\n", "a - CRITICAL - two\n"]);
            assert_eq!(reader.checkpoint(&path), Some(34));
        }

        #[test]
        fn lines_are_emitted_once() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset);

            append(&path, "first\n");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["first\n"]);

            append(&path, "second\nthird\n");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["second\n", "third\n"]);

            assert!(reader.read_new(&path).unwrap().is_empty());
        }

        #[test]
        fn partial_line_waits_for_newline() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset);

            append(&path, "done\nhalf");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["done\n"]);

            append(&path, " a line");
            assert!(reader.read_new(&path).unwrap().is_empty());

            append(&path, "\n");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["half a line\n"]);
        }

        #[test]
        fn truncation_resets_checkpoint() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset);

            append(&path, "old line one\nold line two\n");
            reader.read_new(&path).unwrap();

            fs::write(&path, "fresh\n").unwrap();
            assert_eq!(reader.read_new(&path).unwrap(), vec!["fresh\n"]);
        }

        #[test]
        fn seeded_file_skips_existing_content() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "x - CRITICAL - before startup\npartial");

            let reader = TailReader::new(TailMode::Offset);
            let offset = reader.seed(&path).unwrap();
            assert_eq!(offset, 30);

            append(&path, " finished\nx - INFO - after\n");
            assert_eq!(
                reader.read_new(&path).unwrap(),
                vec!["partial finished\n", "x - INFO - after\n"]
            );
        }

        #[test]
        fn seed_directory_only_touches_accepted_files() {
            let dir = TempDir::new().unwrap();
            append(&dir.path().join("a.log"), "one\n");
            append(&dir.path().join("b.log"), "two\n");
            append(&dir.path().join("notes.txt"), "three\n");
            fs::create_dir(dir.path().join("nested.log")).unwrap();

            let reader = TailReader::new(TailMode::Offset);
            let seeded = reader
                .seed_directory(dir.path(), &LogFileFilter::default())
                .unwrap();

            assert_eq!(seeded, 2);
            assert_eq!(reader.tracked_files(), 2);
            assert_eq!(reader.checkpoint(&dir.path().join("a.log")), Some(4));
        }

        #[test]
        fn seed_missing_directory_is_noop() {
            let dir = TempDir::new().unwrap();
            let reader = TailReader::new(TailMode::Offset);
            let seeded = reader
                .seed_directory(&dir.path().join("absent"), &LogFileFilter::default())
                .unwrap();
            assert_eq!(seeded, 0);
        }

        #[test]
        fn undecodable_chunk_is_skipped() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset);

            fs::write(&path, b"\xff\xfe broken\n").unwrap();
            let err = reader.read_new(&path).unwrap_err();
            assert!(matches!(err, WatchError::Decode { offset: 0, .. }));

            append(&path, "ok\n");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["ok\n"]);
        }

        #[test]
        fn large_append_is_read_across_events() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset).with_max_batch_bytes(10);

            append(&path, "aaaa\nbbbb\ncccc\n");

            assert_eq!(reader.read_new(&path).unwrap(), vec!["aaaa\n", "bbbb\n"]);
            assert_eq!(reader.checkpoint(&path), Some(10));
            assert_eq!(reader.read_new(&path).unwrap(), vec!["cccc\n"]);
            assert!(reader.read_new(&path).unwrap().is_empty());
        }

        #[test]
        fn oversized_line_is_skipped() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset).with_max_batch_bytes(8);

            append(&path, &format!("short\n{}\nafter\n", "x".repeat(20)));

            let mut emitted = Vec::new();
            for _ in 0..8 {
                emitted.extend(reader.read_new(&path).unwrap());
            }

            assert_eq!(emitted, vec!["short\n", "after\n"]);
            assert_eq!(reader.checkpoint(&path), Some(33));
        }

        #[test]
        fn seed_skips_oversized_trailing_line() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, &format!("old\n{}", "y".repeat(16)));

            let reader = TailReader::new(TailMode::Offset).with_max_batch_bytes(10);
            assert_eq!(reader.seed(&path).unwrap(), 20);

            append(&path, "yyy\nnext\n");
            assert_eq!(reader.read_new(&path).unwrap(), vec!["next\n"]);
        }

        #[test]
        fn zero_batch_limit_is_raised() {
            let reader = TailReader::new(TailMode::Offset).with_max_batch_bytes(0);
            assert_eq!(reader.max_batch_bytes(), 1);
            assert_eq!(TailReader::default().max_batch_bytes(), DEFAULT_MAX_BATCH_BYTES);
        }

        #[cfg(unix)]
        #[test]
        fn replaced_file_is_read_from_start() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            let reader = TailReader::new(TailMode::Offset);

            append(&path, "a\n");
            reader.read_new(&path).unwrap();

            let staged = dir.path().join("app.log.new");
            fs::write(&staged, "replacement one\nreplacement two\n").unwrap();
            fs::rename(&staged, &path).unwrap();

            assert_eq!(
                reader.read_new(&path).unwrap(),
                vec!["replacement one\n", "replacement two\n"]
            );
        }

        #[test]
        fn missing_file_is_access_error() {
            let dir = TempDir::new().unwrap();
            let reader = TailReader::new(TailMode::Offset);
            let err = reader.read_new(&log_file(&dir)).unwrap_err();
            assert!(matches!(err, WatchError::FileAccess { .. }));
            assert!(!err.is_fatal());
        }

        #[test]
        fn forget_drops_checkpoint() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "line\n");
            let reader = TailReader::new(TailMode::Offset);
            reader.read_new(&path).unwrap();

            reader.forget(&path);

            assert_eq!(reader.checkpoint(&path), None);
            assert_eq!(reader.read_new(&path).unwrap(), vec!["line\n"]);
        }
    }

    mod window_tests {
        use super::*;

        #[test]
        fn returns_last_lines() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "1\n2\n3\n4\n5\n6\n7\n");

            let reader = TailReader::new(TailMode::Window(5));
            let lines = reader.read_new(&path).unwrap();

            assert_eq!(lines, vec!["3\n", "4\n", "5\n", "6\n", "7\n"]);
        }

        #[test]
        fn short_file_returns_everything() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "only\n");

            let reader = TailReader::new(TailMode::Window(5));
            assert_eq!(reader.read_new(&path).unwrap(), vec!["only\n"]);
        }

        #[test]
        fn window_repeats_lines() {
            let dir = TempDir::new().unwrap();
            let path = log_file(&dir);
            append(&path, "a\nb\n");

            let reader = TailReader::new(TailMode::Window(5));
            assert_eq!(reader.read_new(&path).unwrap(), reader.read_new(&path).unwrap());
            assert_eq!(reader.tracked_files(), 0);
        }

        #[test]
        fn window_ignores_seeding() {
            let dir = TempDir::new().unwrap();
            append(&log_file(&dir), "a\n");
            let reader = TailReader::new(TailMode::Window(5));
            let seeded = reader
                .seed_directory(dir.path(), &LogFileFilter::default())
                .unwrap();
            assert_eq!(seeded, 0);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn chunked_appends_emit_every_line_exactly_once(
                chunks in prop::collection::vec("[a-z \n]{0,12}", 1..12),
            ) {
                let dir = TempDir::new().unwrap();
                let path = log_file(&dir);
                fs::write(&path, "").unwrap();
                let reader = TailReader::new(TailMode::Offset);

                let mut emitted = String::new();
                for chunk in &chunks {
                    append(&path, chunk);
                    for line in reader.read_new(&path).unwrap() {
                        emitted.push_str(&line);
                    }
                }

                let written: String = chunks.concat();
                let complete = written.rfind('\n').map_or("", |i| &written[..=i]);
                prop_assert_eq!(emitted.as_str(), complete);
            }

            #[test]
            fn capped_reads_drain_every_short_line(
                lines in prop::collection::vec("[a-z ]{0,9}\n", 1..20),
                cap in 10u64..40,
            ) {
                let dir = TempDir::new().unwrap();
                let path = log_file(&dir);
                append(&path, &lines.concat());
                let reader = TailReader::new(TailMode::Offset).with_max_batch_bytes(cap);

                let mut emitted = Vec::new();
                loop {
                    let batch = reader.read_new(&path).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    emitted.extend(batch);
                }

                prop_assert_eq!(emitted, lines);
            }
        }
    }
}
