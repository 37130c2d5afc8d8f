use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// list_files returns the regular files directly under `dir` whose names start
/// with `prefix` and end with `.{extension}`, sorted by path. A missing
/// directory yields an empty list.
pub async fn list_files(
    dir: impl AsRef<Path>,
    prefix: &str,
    extension: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut rd = match tokio::fs::read_dir(dir.as_ref()).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e),
    };

    let suffix = format!(".{}", extension);
    let mut files = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if name.starts_with(prefix) && name.ends_with(suffix.as_str()) {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

pub async fn exists(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}
