use async_trait::async_trait;
use serde::Serialize;
use std::{
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt},
};

use super::{path_locks::PathLocks, path_resolver::PathResolver};
use crate::UploadError;

/// A stored upload, as shown by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// A stored upload opened for a whole-file download.
#[derive(Debug)]
pub struct StoredFile {
    pub name: String,
    pub len: u64,
    pub file: File,
}

/// Backing store for resumable uploads.
///
/// The persisted length of a file is the only record of upload progress; there is no
/// session id and no sidecar metadata.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persisted length of `filename`, 0 if nothing has been written yet.
    async fn current_length(&self, filename: &str) -> Result<u64, UploadError>;
    /// Writes `data` at `offset` and returns the resulting file length.
    async fn write_chunk(&self, filename: &str, offset: u64, data: &[u8]) -> Result<u64, UploadError>;
    async fn list_files(&self) -> Result<Vec<FileEntry>, UploadError>;
    async fn open_file(&self, filename: &str) -> Result<StoredFile, UploadError>;
}

/// [`FileStore`] over a single flat directory on the local filesystem.
#[derive(Debug)]
pub struct LocalFileStore {
    resolver: PathResolver,
    locks: PathLocks,
    strict_offsets: bool,
}

impl LocalFileStore {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            resolver: PathResolver::new(root_path),
            locks: PathLocks::new(),
            strict_offsets: false,
        }
    }

    /// Creates the storage root if it does not exist yet.
    pub async fn open(root_path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let store = Self::new(root_path);
        let root = store.root();

        fs::create_dir_all(root)
            .await
            .map_err(|e| UploadError::storage("create storage root", root, e))?;

        Ok(store)
    }

    /// Rejects chunks that start past the current end of file instead of leaving a hole.
    pub fn with_strict_offsets(mut self, strict: bool) -> Self {
        self.strict_offsets = strict;
        self
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    async fn stat_len(path: &Path) -> Result<u64, UploadError> {
        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(UploadError::storage(
                "stat",
                path,
                std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(UploadError::storage("stat", path, e)),
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn current_length(&self, filename: &str) -> Result<u64, UploadError> {
        let path = self.resolver.resolve(filename)?;

        Self::stat_len(&path).await
    }

    async fn write_chunk(&self, filename: &str, offset: u64, data: &[u8]) -> Result<u64, UploadError> {
        let path = self.resolver.resolve(filename)?;
        let _guard = self.locks.lock(&path).await;

        if self.strict_offsets {
            let length = Self::stat_len(&path).await?;
            if offset > length {
                return Err(UploadError::OffsetGap { start: offset, length });
            }
        }

        // Never truncate: earlier chunks are the upload's progress.
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| UploadError::storage("open", &path, e))?;

        // Seeking past the end does not extend the file; the filesystem zero-fills the gap
        // (possibly sparsely) once the write lands.
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| UploadError::storage("seek", &path, e))?;

        // write_all reports a short write as WriteZero.
        file.write_all(data)
            .await
            .map_err(|e| UploadError::storage("write", &path, e))?;

        file.flush()
            .await
            .map_err(|e| UploadError::storage("flush", &path, e))?;

        file.sync_data()
            .await
            .map_err(|e| UploadError::storage("sync", &path, e))?;

        let length = file
            .metadata()
            .await
            .map_err(|e| UploadError::storage("stat", &path, e))?
            .len();

        tracing::debug!(
            path = %path.display(),
            offset,
            bytes = data.len(),
            length,
            "chunk written"
        );

        Ok(length)
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, UploadError> {
        let root = self.root();
        let mut entries = fs::read_dir(root)
            .await
            .map_err(|e| UploadError::storage("read directory", root, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| UploadError::storage("read directory", root, e))?
        {
            // An entry can vanish between readdir and stat; skip it rather than fail the listing.
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            files.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(files)
    }

    async fn open_file(&self, filename: &str) -> Result<StoredFile, UploadError> {
        let name = self.resolver.file_name(filename)?.to_string();
        let path = self.resolver.resolve(filename)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(UploadError::NotFound(name)),
            Err(e) => return Err(UploadError::storage("open", &path, e)),
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| UploadError::storage("stat", &path, e))?;

        if !metadata.is_file() {
            return Err(UploadError::NotFound(name));
        }

        Ok(StoredFile {
            name,
            len: metadata.len(),
            file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_status_of_unknown_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert_eq!(store.current_length("never-written.bin").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_tracks_appended_chunks() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert_eq!(store.write_chunk("a.bin", 0, &[1; 100]).await.unwrap(), 100);
        assert_eq!(store.current_length("a.bin").await.unwrap(), 100);

        assert_eq!(store.write_chunk("a.bin", 100, &[2; 30]).await.unwrap(), 130);
        assert_eq!(store.current_length("a.bin").await.unwrap(), 130);
    }

    #[tokio::test]
    async fn test_reassembly_matches_source() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        let data = pattern(10_007);

        let mut offset = 0;
        for size in [1, 4096, 17, 3000, 2893] {
            let end = offset + size;
            store.write_chunk("r.bin", offset as u64, &data[offset..end]).await.unwrap();
            offset = end;
        }
        assert_eq!(offset, data.len());

        let written = std::fs::read(dir.path().join("r.bin")).unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_resending_a_chunk_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        let data = pattern(2048);

        store.write_chunk("i.bin", 0, &data[..1024]).await.unwrap();
        store.write_chunk("i.bin", 1024, &data[1024..]).await.unwrap();
        let before = std::fs::read(dir.path().join("i.bin")).unwrap();

        assert_eq!(store.write_chunk("i.bin", 0, &data[..1024]).await.unwrap(), 2048);
        let after = std::fs::read(dir.path().join("i.bin")).unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_overwrite_below_end_keeps_length() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write_chunk("o.bin", 0, b"hello world").await.unwrap();
        assert_eq!(store.write_chunk("o.bin", 0, b"HELLO").await.unwrap(), 11);

        let written = std::fs::read(dir.path().join("o.bin")).unwrap();
        assert_eq!(written, b"HELLO world");
    }

    #[tokio::test]
    async fn test_gap_is_zero_filled() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert_eq!(store.write_chunk("g.bin", 4, b"tail").await.unwrap(), 8);

        let written = std::fs::read(dir.path().join("g.bin")).unwrap();
        assert_eq!(written, b"\0\0\0\0tail");
    }

    #[tokio::test]
    async fn test_strict_offsets_reject_gaps() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path()).with_strict_offsets(true);

        store.write_chunk("s.bin", 0, b"abcd").await.unwrap();

        let err = store.write_chunk("s.bin", 10, b"late").await.unwrap_err();
        assert!(matches!(err, UploadError::OffsetGap { start: 10, length: 4 }));
        assert_eq!(store.current_length("s.bin").await.unwrap(), 4);

        // Contiguous and overlapping chunks are still fine.
        assert_eq!(store.write_chunk("s.bin", 4, b"efgh").await.unwrap(), 8);
        assert_eq!(store.write_chunk("s.bin", 2, b"CD").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_empty_chunk_creates_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert_eq!(store.write_chunk("empty.bin", 0, &[]).await.unwrap(), 0);
        assert!(dir.path().join("empty.bin").is_file());
    }

    #[tokio::test]
    async fn test_traversal_stays_inside_root() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("uploads");
        let store = LocalFileStore::open(&root).await.unwrap();

        store.write_chunk("../escaped.txt", 0, b"x").await.unwrap();
        store.write_chunk("/tmp/absolute.txt", 0, b"y").await.unwrap();

        assert!(!parent.path().join("escaped.txt").exists());
        assert!(root.join("escaped.txt").is_file());
        assert!(root.join("absolute.txt").is_file());
        assert_eq!(store.current_length("../../escaped.txt").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(matches!(
            store.write_chunk("..", 0, b"x").await,
            Err(UploadError::InvalidName(_))
        ));
        assert!(matches!(
            store.current_length("").await,
            Err(UploadError::InvalidName(_))
        ));
        assert!(matches!(
            store.open_file("/").await,
            Err(UploadError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_in_place_of_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let store = LocalFileStore::new(dir.path());

        let status = store.current_length("nested").await.unwrap_err();
        assert!(matches!(status, UploadError::Storage { op: "stat", .. }));

        let write = store.write_chunk("nested", 0, b"x").await.unwrap_err();
        assert!(matches!(write, UploadError::Storage { op: "open", .. }));
    }

    #[tokio::test]
    async fn test_failed_write_releases_lock() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(store.write_chunk("nested", 0, b"x").await.is_err());
        assert_eq!(store.locks.active(), 0);

        let second = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.write_chunk("nested", 0, b"x"),
        )
        .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_writers() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalFileStore::new(dir.path()));
        let chunk = 64 * 1024;
        let chunks = 16;
        let data = Arc::new(pattern(chunk * chunks));

        // Reverse order so most writers land past the current end of file.
        let tasks: Vec<_> = (0..chunks)
            .rev()
            .map(|i| {
                let store = Arc::clone(&store);
                let data = Arc::clone(&data);
                tokio::spawn(async move {
                    let range = i * chunk..(i + 1) * chunk;
                    store.write_chunk("c.bin", range.start as u64, &data[range]).await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.current_length("c.bin").await.unwrap(), (chunk * chunks) as u64);
        let written = std::fs::read(dir.path().join("c.bin")).unwrap();
        assert!(written == *data);
    }

    #[tokio::test]
    async fn test_list_files_skips_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write_chunk("b.bin", 0, &[0; 5]).await.unwrap();
        store.write_chunk("a.bin", 0, &[0; 3]).await.unwrap();

        assert_eq!(
            store.list_files().await.unwrap(),
            vec![
                FileEntry { name: "a.bin".into(), size: 3 },
                FileEntry { name: "b.bin".into(), size: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_files_missing_root_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path().join("missing"));

        assert!(matches!(
            store.list_files().await,
            Err(UploadError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.write_chunk("d.txt", 0, b"download me").await.unwrap();

        let mut stored = store.open_file("some/dir/d.txt").await.unwrap();
        assert_eq!(stored.name, "d.txt");
        assert_eq!(stored.len, 11);

        let mut contents = Vec::new();
        stored.file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"download me");

        assert!(matches!(
            store.open_file("absent.txt").await,
            Err(UploadError::NotFound(name)) if name == "absent.txt"
        ));
    }
}
