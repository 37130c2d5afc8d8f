use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::Writable;

/// WritableFile is an append-only handle. Dropping it closes the file; call
/// `flush` first so queued writes have reached the OS.
pub struct WritableFile {
    f: File,
}

impl WritableFile {
    /// create opens a new file, failing if one already exists at `path`.
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let f = OpenOptions::new()
            .create_new(true)
            .write(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self { f })
    }

    /// open_append opens an existing file positioned at its end.
    pub async fn open_append(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let f = OpenOptions::new().append(true).open(path).await?;

        Ok(Self { f })
    }
}

#[async_trait]
impl Writable for WritableFile {
    async fn append(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.f.write_all(data).await?;
        Ok(data.len())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.f.flush().await
    }

    async fn sync(&self) -> std::io::Result<()> {
        self.f.sync_all().await
    }
}
