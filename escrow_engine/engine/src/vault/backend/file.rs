use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EscrowError, EscrowResult};
use crate::vault::ShareRecords;
use crate::vault::backend::ShareStore;

/// One JSON file per key-holder, rewritten wholesale on every mutation.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous file intact.
pub struct FileShareStore {
    path: PathBuf,
}

impl FileShareStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileShareStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ShareStore for FileShareStore {
    async fn load(&self) -> EscrowResult<ShareRecords> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| EscrowError::Persistence(format!("decode {}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no share file yet, starting empty");
                Ok(ShareRecords::default())
            }
            Err(e) => Err(EscrowError::Persistence(format!("read {}: {e}", self.path.display()))),
        }
    }

    async fn persist(&self, records: &ShareRecords) -> EscrowResult<()> {
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| EscrowError::Persistence(format!("encode records: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EscrowError::Persistence(format!("create {}: {e}", parent.display())))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| EscrowError::Persistence(format!("write {}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| EscrowError::Persistence(format!("replace {}: {e}", self.path.display())))
    }
}
