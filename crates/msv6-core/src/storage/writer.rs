//! Sequential writer for `.part` download files.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Appends a response body to a temp download file and renames it into place.
pub struct StorageWriter {
    file: File,
    temp_path: PathBuf,
    len: u64,
}

impl StorageWriter {
    /// Create (or truncate) the temp file.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file,
            temp_path: temp_path.to_path_buf(),
            len: 0,
        })
    }

    /// Open the temp file for resume; new bytes are appended after its current length.
    /// Creates an empty file when none exists.
    pub fn open_resume(temp_path: &Path) -> io::Result<Self> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(temp_path)?;
        let len = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            temp_path: temp_path.to_path_buf(),
            len,
        })
    }

    /// Bytes currently in the temp file.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Discard everything written so far (server ignored the range request).
    pub fn restart(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.len = 0;
        Ok(())
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically rename the temp file to the final path. Consumes the writer and closes the file.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let Self { file, temp_path, .. } = self;
        drop(file);
        fs::rename(&temp_path, final_path)
    }
}
