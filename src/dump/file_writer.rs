//! File-backed [`DumpWriter`].
//!
//! Records accumulate in memory until `buffer` bytes are pending, then go to
//! a `<name>.tmp` file in filesystem-block-sized writes. [`DumpWriter::flush`]
//! drains what is left and renames the file to `<name>`. The next write
//! starts a new file.
//!
//! An I/O error while writing drops the unpublished file together with every
//! record still pending, and the error is returned to the caller. A record
//! whose body does not fit the frame is rejected before it is buffered.
//!
//! `<name>` is the configured pattern formatted with chrono's strftime syntax
//! at the moment the file is opened, so `/var/dump/users-%Y%m%d-%H%M%S.bin`
//! yields one timestamped file per flush.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use parking_lot::Mutex;

use crate::dump::frame::{self, DUMP_FORMAT_VERSION};
use crate::dump::{DumpEntry, DumpWriter};
use crate::error::DumpError;

/// Block size used when the filesystem does not report one.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

#[derive(Debug)]
struct OpenDump {
    file: File,
    tmp: PathBuf,
    dest: PathBuf,
}

#[derive(Debug, Default)]
struct WriterState {
    buf: Vec<u8>,
    current: Option<OpenDump>,
    published: Option<PathBuf>,
}

/// Writes dump records to timestamped files with atomic publication.
///
/// # Example
///
/// ```
/// use ttlkit::dump::{DumpEntry, DumpWriter, FileWriter};
///
/// let dir = tempfile::tempdir().unwrap();
/// let pattern = dir.path().join("dump-%Y%m%d.bin");
/// let writer = FileWriter::new(pattern.to_str().unwrap(), 1 << 16).unwrap();
///
/// writer.write(&DumpEntry { key: 1, body: b"v".to_vec(), expire: u32::MAX }).unwrap();
/// writer.flush().unwrap();
/// assert!(writer.last_published().unwrap().exists());
/// ```
#[derive(Debug)]
pub struct FileWriter {
    pattern: String,
    buffer: usize,
    block_size: usize,
    state: Mutex<WriterState>,
}

impl FileWriter {
    /// Creates a writer for files named by `pattern`.
    ///
    /// `buffer` is the number of pending bytes that triggers a write to disk;
    /// `0` writes every record through immediately.
    pub fn new(pattern: impl Into<String>, buffer: usize) -> Result<Self, DumpError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(DumpError::NoFilePath);
        }
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(DumpError::BadPattern(pattern));
        }
        let dir = parent_dir(Path::new(&pattern));
        if !is_dir_writable(dir) {
            return Err(DumpError::DirNotWritable(dir.to_path_buf()));
        }
        let block_size = block_size_of(dir);

        Ok(Self {
            pattern,
            buffer,
            block_size,
            state: Mutex::new(WriterState::default()),
        })
    }

    /// Block size used for disk writes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Path of the most recently published dump file.
    pub fn last_published(&self) -> Option<PathBuf> {
        self.state.lock().published.clone()
    }

    fn open(&self) -> Result<OpenDump, DumpError> {
        let mut name = String::with_capacity(self.pattern.len() * 2);
        write!(name, "{}", Local::now().format(&self.pattern))
            .map_err(|_| DumpError::BadPattern(self.pattern.clone()))?;
        let dest = unique_path(name);
        let tmp = tmp_path(&dest);
        let mut file = File::create(&tmp)?;
        if let Err(err) = frame::write_version(&mut file, DUMP_FORMAT_VERSION) {
            drop(file);
            discard_tmp(&tmp);
            return Err(err.into());
        }
        tracing::debug!(path = %tmp.display(), "opened dump file");
        Ok(OpenDump { file, tmp, dest })
    }

    /// Moves pending bytes to disk. On failure the unpublished file and every
    /// pending record are dropped, so a later flush never publishes a file
    /// holding a partial or repeated block.
    fn flush_buf(&self, state: &mut WriterState) -> Result<(), DumpError> {
        let result = self.write_blocks(state);
        if result.is_err() {
            abandon(state);
        }
        result
    }

    fn write_blocks(&self, state: &mut WriterState) -> Result<(), DumpError> {
        if state.current.is_none() {
            state.current = Some(self.open()?);
        }
        let Some(current) = state.current.as_mut() else {
            return Ok(());
        };
        for block in state.buf.chunks(self.block_size) {
            current.file.write_all(block)?;
        }
        state.buf.clear();
        Ok(())
    }
}

impl DumpWriter for FileWriter {
    fn write(&self, entry: &DumpEntry) -> Result<usize, DumpError> {
        let mut state = self.state.lock();
        let n = frame::encode_record(&mut state.buf, entry)?;
        if state.buf.len() >= self.buffer {
            self.flush_buf(&mut state)?;
        }
        Ok(n)
    }

    fn flush(&self) -> Result<(), DumpError> {
        let mut state = self.state.lock();
        if state.buf.is_empty() && state.current.is_none() {
            return Ok(());
        }
        if !state.buf.is_empty() {
            self.flush_buf(&mut state)?;
        }
        let Some(OpenDump { file, tmp, dest }) = state.current.take() else {
            return Ok(());
        };
        let synced = file.sync_all();
        drop(file);
        if let Err(err) = synced.and_then(|()| fs::rename(&tmp, &dest)) {
            discard_tmp(&tmp);
            return Err(err.into());
        }
        tracing::debug!(path = %dest.display(), "published dump file");
        state.published = Some(dest);
        Ok(())
    }
}

/// Drops pending records and the unpublished file after an I/O error.
fn abandon(state: &mut WriterState) {
    state.buf.clear();
    if let Some(OpenDump { file, tmp, .. }) = state.current.take() {
        drop(file);
        discard_tmp(&tmp);
    }
}

fn discard_tmp(tmp: &Path) {
    match fs::remove_file(tmp) {
        Ok(()) => tracing::warn!(path = %tmp.display(), "discarded unpublished dump file"),
        Err(err) => tracing::warn!(path = %tmp.display(), error = %err, "failed to remove unpublished dump file"),
    }
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn is_dir_writable(dir: &Path) -> bool {
    fs::metadata(dir).is_ok_and(|meta| meta.is_dir() && !meta.permissions().readonly())
}

#[cfg(unix)]
fn block_size_of(dir: &Path) -> usize {
    use std::os::unix::fs::MetadataExt;

    fs::metadata(dir)
        .ok()
        .and_then(|meta| usize::try_from(meta.blksize()).ok())
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_BLOCK_SIZE)
}

#[cfg(not(unix))]
fn block_size_of(_dir: &Path) -> usize {
    DEFAULT_BLOCK_SIZE
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Appends `.1`, `.2`, ... until neither the name nor its `.tmp` is taken.
fn unique_path(name: String) -> PathBuf {
    let base = PathBuf::from(&name);
    if !base.exists() && !tmp_path(&base).exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = PathBuf::from(format!("{name}.{n}"));
        if !candidate.exists() && !tmp_path(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}
