use dfs_lib::{ApiClient, DfsError, DfsPath, DfsResult};
use log::info;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Raw byte store rooted at a local directory. The naming server drives
/// the command operations (create/delete/copy); clients drive
/// size/read/write directly. File payloads are UTF-8 text.
pub struct StorageService {
    root: PathBuf,
    client: ApiClient,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: ApiClient::new(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, path: &str) -> DfsResult<(DfsPath, PathBuf)> {
        let parsed = DfsPath::parse(path)?;
        let local = parsed.to_local(&self.root);
        Ok((parsed, local))
    }

    async fn file_len(&self, local: &PathBuf, path: &str) -> DfsResult<u64> {
        match fs::metadata(local).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            _ => Err(DfsError::NotFound(format!("no such file: {}", path))),
        }
    }

    pub async fn size(&self, path: &str) -> DfsResult<u64> {
        let (_, local) = self.resolve(path)?;
        self.file_len(&local, path).await
    }

    pub async fn read(&self, path: &str, offset: u64, length: u64) -> DfsResult<String> {
        let (_, local) = self.resolve(path)?;
        let len = self.file_len(&local, path).await?;
        if offset.checked_add(length).map(|end| end > len).unwrap_or(true) {
            return Err(DfsError::InvalidParam(format!(
                "read range {}+{} exceeds file size {}",
                offset, length, len
            )));
        }
        let mut file = fs::File::open(&local).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;
        String::from_utf8(buf)
            .map_err(|e| DfsError::InvalidParam(format!("file content is not UTF-8: {}", e)))
    }

    /// Positional write: seek to `offset` and write `data`, extending the
    /// file as needed. The file must already exist: creation is the
    /// naming server's decision, not the writer's.
    pub async fn write(&self, path: &str, offset: u64, data: &str) -> DfsResult<bool> {
        let (_, local) = self.resolve(path)?;
        self.file_len(&local, path).await?;
        let mut file = OpenOptions::new().write(true).open(&local).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data.as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }

    /// Create an empty file, materializing parent directories. An existing
    /// file reports false.
    pub async fn create(&self, path: &str) -> DfsResult<bool> {
        let (parsed, local) = self.resolve(path)?;
        if parsed.is_root() {
            return Err(DfsError::InvalidPath("cannot create the root".to_string()));
        }
        if fs::metadata(&local).await.is_ok() {
            return Ok(false);
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::File::create(&local).await?;
        Ok(true)
    }

    /// Remove a file or a whole directory tree. A missing path reports
    /// false.
    pub async fn delete(&self, path: &str) -> DfsResult<bool> {
        let (parsed, local) = self.resolve(path)?;
        if parsed.is_root() {
            return Err(DfsError::InvalidPath("cannot delete the root".to_string()));
        }
        let meta = match fs::metadata(&local).await {
            Ok(meta) => meta,
            Err(_) => return Ok(false),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&local).await?;
        } else {
            fs::remove_file(&local).await?;
        }
        Ok(true)
    }

    /// Replicate a file from a peer: fetch the full content through the
    /// peer's client interface and store it locally.
    pub async fn copy(&self, path: &str, server_ip: &str, server_port: u16) -> DfsResult<bool> {
        let (parsed, local) = self.resolve(path)?;
        if parsed.is_root() {
            return Err(DfsError::InvalidPath("cannot copy the root".to_string()));
        }
        let size = self.client.storage_size(server_ip, server_port, path).await?;
        let data = self
            .client
            .storage_read(server_ip, server_port, path, 0, size)
            .await?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&local, data.as_bytes()).await?;
        info!(
            "copied {} ({} bytes) from {}:{}",
            path, size, server_ip, server_port
        );
        Ok(true)
    }
}
