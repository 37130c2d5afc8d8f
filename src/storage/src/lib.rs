#[macro_use]
extern crate async_trait;

use std::io;

pub mod dir;
pub mod file;
pub mod mmap;

pub use dir::{exists, list_files};
pub use file::writable_file::WritableFile;
pub use mmap::MmapReadableFile;

#[async_trait]
pub trait RandomAccessFile: Send + Sync {
    async fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
    fn len(&self) -> u64;
    async fn close(self) -> io::Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait Writable: Send {
    async fn append(&mut self, data: &[u8]) -> io::Result<usize>;
    async fn flush(&mut self) -> io::Result<()>;
    async fn sync(&self) -> io::Result<()>;
}
