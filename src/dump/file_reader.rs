//! File-backed [`DumpReader`].
//!
//! A reader is built over one file or over a directory. A directory yields its
//! regular files in name order, skipping `*.tmp` files that a writer has not
//! published yet. Sources are drained one after another:
//!
//! ```text
//!   pending: [a.bin, b.bin] ──open──► version check ──records──► EOF
//!                                                                  │
//!                       on_eof(path) ◄── close source ◄────────────┘
//!                            │
//!                            └──► next source, or Ok(None) when none are left
//! ```
//!
//! `on_eof` runs only for a source read to a clean end (default: remove the
//! file; [`keep_file`] leaves it). A source with a bad version, a truncated
//! record or an oversized body is abandoned, stays on disk, and its error is
//! returned; the next `read` continues with the following source.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::dump::frame::{self, DEFAULT_MAX_BODY, DUMP_FORMAT_VERSION};
use crate::dump::{DumpEntry, DumpReader};
use crate::error::DumpError;

/// Callback invoked with a source's path once it has been fully consumed.
pub type OnEof = Box<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

/// [`OnEof`] callback that leaves consumed files in place.
pub fn keep_file(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[derive(Debug)]
struct Source {
    path: PathBuf,
    reader: BufReader<File>,
}

#[derive(Debug, Default)]
struct ReaderState {
    pending: VecDeque<PathBuf>,
    current: Option<Source>,
}

/// Reads dump records from a file or from every dump file in a directory.
///
/// Consumed files are removed by default so a restart does not replay the
/// same dump twice; use [`FileReader::on_eof`] with [`keep_file`] to keep
/// them. A source that fails to parse is abandoned and left on disk.
///
/// # Example
///
/// ```
/// use ttlkit::dump::{DumpEntry, DumpReader, DumpWriter, FileReader, FileWriter, keep_file};
///
/// let dir = tempfile::tempdir().unwrap();
/// let writer = FileWriter::new(dir.path().join("a.bin").to_str().unwrap(), 0).unwrap();
/// writer.write(&DumpEntry { key: 7, body: b"x".to_vec(), expire: 1 }).unwrap();
/// writer.flush().unwrap();
///
/// let reader = FileReader::new(dir.path()).unwrap().on_eof(keep_file);
/// assert_eq!(reader.read().unwrap().unwrap().key, 7);
/// assert!(reader.read().unwrap().is_none());
/// assert!(dir.path().join("a.bin").exists());
/// ```
pub struct FileReader {
    state: Mutex<ReaderState>,
    on_eof: OnEof,
    max_body: usize,
}

impl FileReader {
    /// Opens `path` as a single source, or every non-`.tmp` regular file in
    /// it (in name order) if it is a directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DumpError::NoFilePath);
        }
        let pending = if fs::metadata(path)?.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                let candidate = entry.path();
                let is_tmp = candidate.extension().is_some_and(|ext| ext == "tmp");
                if entry.file_type()?.is_file() && !is_tmp {
                    files.push(candidate);
                }
            }
            files.sort();
            VecDeque::from(files)
        } else {
            VecDeque::from([path.to_path_buf()])
        };

        Ok(Self {
            state: Mutex::new(ReaderState {
                pending,
                current: None,
            }),
            on_eof: Box::new(|path| fs::remove_file(path)),
            max_body: DEFAULT_MAX_BODY,
        })
    }

    /// Replaces the end-of-source callback.
    pub fn on_eof<F>(mut self, on_eof: F) -> Self
    where
        F: Fn(&Path) -> io::Result<()> + Send + Sync + 'static,
    {
        self.on_eof = Box::new(on_eof);
        self
    }

    /// Sets the largest record body accepted before a source is abandoned.
    pub fn max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// Number of sources not yet fully consumed.
    pub fn remaining_sources(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + usize::from(state.current.is_some())
    }

    fn open(path: PathBuf) -> Result<Option<Source>, DumpError> {
        let mut reader = BufReader::new(File::open(&path)?);
        match frame::read_version(&mut reader)? {
            None => {
                // empty file: nothing to restore, still a completed source
                Ok(None)
            },
            Some(DUMP_FORMAT_VERSION) => Ok(Some(Source { path, reader })),
            Some(other) => Err(DumpError::UnsupportedVersion(other)),
        }
    }

    fn finish(&self, path: &Path) -> Result<(), DumpError> {
        tracing::debug!(path = %path.display(), "dump source consumed");
        (self.on_eof)(path).map_err(DumpError::from)
    }
}

impl DumpReader for FileReader {
    fn read(&self) -> Result<Option<DumpEntry>, DumpError> {
        let mut state = self.state.lock();
        loop {
            let Some(source) = state.current.as_mut() else {
                let Some(path) = state.pending.pop_front() else {
                    return Ok(None);
                };
                match Self::open(path.clone())? {
                    Some(source) => state.current = Some(source),
                    None => self.finish(&path)?,
                }
                continue;
            };

            match frame::read_record(&mut source.reader, self.max_body) {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {
                    if let Some(done) = state.current.take() {
                        drop(done.reader);
                        self.finish(&done.path)?;
                    }
                },
                Err(err) => {
                    if let Some(bad) = state.current.take() {
                        tracing::warn!(path = %bad.path.display(), error = %err, "abandoning dump source");
                    }
                    return Err(err);
                },
            }
        }
    }
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("state", &self.state)
            .field("max_body", &self.max_body)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dump::{DumpWriter, FileWriter};

    fn entry(key: u64) -> DumpEntry {
        DumpEntry {
            key,
            body: vec![key as u8; 3],
            expire: u32::MAX,
        }
    }

    fn publish(dir: &Path, name: &str, keys: impl IntoIterator<Item = u64>) -> PathBuf {
        let writer = FileWriter::new(dir.join(name).to_str().unwrap(), 0).unwrap();
        for key in keys {
            writer.write(&entry(key)).unwrap();
        }
        writer.flush().unwrap();
        writer.last_published().unwrap()
    }

    fn drain(reader: &FileReader) -> Vec<u64> {
        let mut keys = Vec::new();
        while let Some(e) = reader.read().unwrap() {
            keys.push(e.key);
        }
        keys
    }

    #[test]
    fn consumed_file_is_removed_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = publish(dir.path(), "one.bin", 0..5);
        let reader = FileReader::new(&path).unwrap();
        assert_eq!(drain(&reader), [0, 1, 2, 3, 4]);
        assert!(!path.exists());
        assert_eq!(reader.remaining_sources(), 0);
    }

    #[test]
    fn directory_sources_are_read_in_name_order_skipping_tmp() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), "b.bin", [3, 4]);
        publish(dir.path(), "a.bin", [1, 2]);
        fs::write(dir.path().join("c.bin.tmp"), b"garbage").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let reader = FileReader::new(dir.path()).unwrap().on_eof(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(reader.remaining_sources(), 2);
        assert_eq!(drain(&reader), [1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("a.bin").exists());
    }

    #[test]
    fn empty_file_is_a_completed_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();
        let reader = FileReader::new(&path).unwrap();
        assert!(reader.read().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn unknown_version_is_rejected_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.bin");
        fs::write(&path, 99u32.to_le_bytes()).unwrap();
        let reader = FileReader::new(&path).unwrap();
        assert!(matches!(reader.read(), Err(DumpError::UnsupportedVersion(99))));
        assert!(reader.read().unwrap().is_none());
        assert!(path.exists());
    }

    #[test]
    fn truncated_source_is_abandoned_and_next_continues() {
        let dir = tempfile::tempdir().unwrap();
        let first = publish(dir.path(), "a.bin", [1, 2]);
        publish(dir.path(), "b.bin", [3]);
        let bytes = fs::read(&first).unwrap();
        fs::write(&first, &bytes[..bytes.len() - 2]).unwrap();

        let reader = FileReader::new(dir.path()).unwrap();
        assert_eq!(reader.read().unwrap().unwrap().key, 1);
        assert!(matches!(reader.read(), Err(DumpError::Truncated)));
        assert_eq!(reader.read().unwrap().unwrap().key, 3);
        assert!(reader.read().unwrap().is_none());
        assert!(first.exists());
        assert!(!dir.path().join("b.bin").exists());
    }

    #[test]
    fn oversized_record_abandons_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = publish(dir.path(), "a.bin", [1]);
        let reader = FileReader::new(&path).unwrap().max_body(2);
        assert!(matches!(reader.read(), Err(DumpError::BodyTooLarge { len: 3, max: 2 })));
        assert!(reader.read().unwrap().is_none());
        assert!(path.exists());
    }

    #[test]
    fn missing_path_is_an_io_error() {
        assert!(matches!(FileReader::new(""), Err(DumpError::NoFilePath)));
        assert!(matches!(FileReader::new("/no/such/dump.bin"), Err(DumpError::Io(_))));
    }
}
