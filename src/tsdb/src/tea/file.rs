use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use common_base::iterator::AsyncIterator;
use iotdb_storage::{MmapReadableFile, RandomAccessFile, Writable, WritableFile};

use crate::error::Result;
use crate::tea::{TeaFileHeader, TeaItem, TEA_FILE_HEADER_SIZE, TEA_ITEM_SIZE};

/// write_items appends `items` to the file at `path` in a single write,
/// creating the file with a header first if it does not exist yet. A torn
/// record left at the end of an existing file is cut off before appending.
pub async fn write_items(path: &Path, items: &[TeaItem]) -> Result<()> {
    let mut buf = BytesMut::with_capacity(TEA_FILE_HEADER_SIZE + items.len() * TEA_ITEM_SIZE);

    let mut w = match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let len = meta.len() as usize;
            if len < TEA_FILE_HEADER_SIZE {
                truncate(path, 0).await?;
                TeaFileHeader::new().encode_to(&mut buf);
            } else if (len - TEA_FILE_HEADER_SIZE) % TEA_ITEM_SIZE != 0 {
                let aligned = len - (len - TEA_FILE_HEADER_SIZE) % TEA_ITEM_SIZE;
                warn!("cutting torn record of {:?} at {}", path, aligned);
                truncate(path, aligned as u64).await?;
            }
            WritableFile::open_append(path).await?
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            TeaFileHeader::new().encode_to(&mut buf);
            WritableFile::create(path).await?
        }
        Err(e) => return Err(e.into()),
    };

    for item in items {
        item.encode_to(&mut buf);
    }

    w.append(&buf).await?;
    w.flush().await?;
    w.sync().await?;
    Ok(())
}

async fn truncate(path: &Path, len: u64) -> std::io::Result<()> {
    let f = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    f.set_len(len).await?;
    f.sync_all().await
}

/// read_items reads every complete record of the file at `path`.
pub async fn read_items(path: &Path) -> Result<Vec<TeaItem>> {
    let mut reader = TeaFileReader::open(path).await?;
    let mut items = Vec::with_capacity(reader.remaining());
    while let Some(item) = reader.next_item().await? {
        items.push(item);
    }
    reader.close().await?;
    Ok(items)
}

/// TeaFileReader walks the records of a memory mapped tea file in write order.
pub struct TeaFileReader {
    path: PathBuf,
    file: MmapReadableFile,
    offset: u64,
}

impl TeaFileReader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = MmapReadableFile::open(&path).await?;

        let header_len = TEA_FILE_HEADER_SIZE.min(file.len() as usize);
        TeaFileHeader::decode(&file.bytes()[..header_len], &path)?;

        Ok(Self {
            path,
            file,
            offset: TEA_FILE_HEADER_SIZE as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// remaining is the number of complete records not read yet. A torn
    /// trailing record is not counted.
    pub fn remaining(&self) -> usize {
        (self.file.len().saturating_sub(self.offset) / TEA_ITEM_SIZE as u64) as usize
    }

    pub async fn next_item(&mut self) -> Result<Option<TeaItem>> {
        if self.remaining() == 0 {
            return Ok(None);
        }

        let mut buf = [0_u8; TEA_ITEM_SIZE];
        self.file.read(self.offset, &mut buf).await?;
        self.offset += TEA_ITEM_SIZE as u64;

        TeaItem::decode(&buf, &self.path).map(Some)
    }

    pub async fn close(self) -> Result<()> {
        self.file.close().await?;
        Ok(())
    }
}

#[async_trait]
impl AsyncIterator for TeaFileReader {
    type Item = TeaItem;

    async fn try_next(&mut self) -> anyhow::Result<Option<Self::Item>> {
        Ok(self.next_item().await?)
    }
}
