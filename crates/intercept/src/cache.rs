//! # Offline Cache
//!
//! Write-once storage for fetched bodies. Every write goes to its own hidden
//! `.part` file next to the destination, is synced, and is then renamed into
//! place, so a file that exists under its final name is always complete and
//! concurrent writers to one path never share an inode. There is no index:
//! the remote side keeps the URL to file mapping.
//!
//! A failed write removes its staging file.

use std::fs;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OfflineCache {
    dir: PathBuf,
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// A fresh staging file in `dir`, private to one writer.
fn staging(dir: &Path) -> io::Result<NamedTempFile> {
    fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)
}

impl OfflineCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves `staged` to a fresh `<dir>/<epoch-millis>` name.
    ///
    /// Writers in the same millisecond get `<epoch-millis>-<n>`.
    fn persist_fresh(&self, mut staged: NamedTempFile) -> io::Result<PathBuf> {
        let stamp = epoch_millis();
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => stamp.to_string(),
                n => format!("{}-{}", stamp, n),
            };
            let path = self.dir.join(name);
            match staged.persist_noclobber(&path) {
                Ok(_) => return Ok(path),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(e.error),
            }
            attempt += 1;
        }
    }

    /// Stores `body` at `target`, or at a generated path when `target` is
    /// `None`, and returns where it went. The file is complete and closed
    /// when this returns. An existing file at `target` is replaced whole.
    pub fn store(&self, target: Option<&Path>, body: &mut dyn Read) -> io::Result<PathBuf> {
        let dir = match target {
            Some(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new(".")),
            None => self.dir.as_path(),
        };
        let mut staged = staging(dir)?;

        let written = {
            let mut writer = BufWriter::new(staged.as_file_mut());
            let n = io::copy(body, &mut writer)?;
            writer.flush()?;
            n
        };
        staged.as_file().sync_all()?;

        let path = match target {
            Some(path) => {
                staged.persist(path).map_err(|e| e.error)?;
                path.to_path_buf()
            }
            None => self.persist_fresh(staged)?,
        };
        debug!(path = %path.display(), bytes = written, "cached body");
        Ok(path)
    }
}
