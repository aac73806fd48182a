//! Staged writes: bytes go to a sibling temp file and replace the target
//! atomically on commit.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::provider::WriteStream;

/// Writer that stages content next to `target` and renames it into place.
///
/// The temp file lives in the target's directory so the final rename never
/// crosses filesystems. Until [`StagedWriter::commit`] the target is
/// untouched, so a reader holding the old file keeps seeing complete data.
pub struct StagedWriter {
    inner: BufWriter<NamedTempFile>,
    target: PathBuf,
}

impl StagedWriter {
    /// Start staging a new version of `target`.
    ///
    /// # Errors
    /// - Target directory missing or not writable
    pub fn new(target: impl AsRef<Path>) -> io::Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(dir)?;

        Ok(Self {
            inner: BufWriter::new(temp),
            target,
        })
    }

    /// Path that will be replaced on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush, fsync and rename the staged file over the target.
    pub fn commit(self) -> io::Result<PathBuf> {
        let temp = self.inner.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(self.target)
    }
}

impl Write for StagedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl WriteStream for StagedWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.commit().map(|_| ())
    }
}
