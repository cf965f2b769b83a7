use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Read-only access to files written by the pre-blob upload flow.
///
/// Relative legacy paths are resolved against `root` exactly as the old
/// upload flow wrote them (including `..` segments); absolute paths are used
/// as stored. These paths come from the database, never from requesters.
#[derive(Debug, Clone)]
pub struct LegacyFiles {
    root: PathBuf,
}

impl LegacyFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LegacyFiles { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a stored legacy path onto the filesystem, or `None` if it is
    /// blank or cannot name a file.
    pub fn locate(&self, stored: &str) -> Option<PathBuf> {
        let stored = stored.trim();
        if stored.is_empty() || stored.contains('\0') {
            return None;
        }
        let path = Path::new(stored);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.root.join(path))
        }
    }

    /// Reads the whole file. Only a file that is verifiably absent is
    /// `Ok(None)`; a path that cannot be located is an `InvalidInput` error.
    pub async fn read(&self, stored: &str) -> io::Result<Option<Bytes>> {
        let Some(path) = self.locate(stored) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable legacy path {stored:?}"),
            ));
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
