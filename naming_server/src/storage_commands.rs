use async_trait::async_trait;
use dfs_lib::{ApiClient, DfsResult};

/// Outbound calls the coordinator makes against storage servers. Kept
/// behind a trait object so the coordinator can be exercised without
/// sockets.
#[async_trait]
pub trait StorageCommands: Send + Sync {
    async fn create(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool>;

    async fn delete(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool>;

    async fn copy(
        &self,
        ip: &str,
        command_port: u16,
        path: &str,
        from_ip: &str,
        from_client_port: u16,
    ) -> DfsResult<bool>;

    async fn size(&self, ip: &str, client_port: u16, path: &str) -> DfsResult<u64>;

    async fn read(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        length: u64,
    ) -> DfsResult<String>;

    async fn write(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        data: &str,
    ) -> DfsResult<bool>;
}

/// The real thing: JSON POSTs to the storage servers' HTTP interfaces.
#[derive(Default)]
pub struct HttpStorageCommands {
    client: ApiClient,
}

impl HttpStorageCommands {
    pub fn new() -> Self {
        Self {
            client: ApiClient::new(),
        }
    }
}

#[async_trait]
impl StorageCommands for HttpStorageCommands {
    async fn create(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
        self.client.storage_create(ip, command_port, path).await
    }

    async fn delete(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
        self.client.storage_delete(ip, command_port, path).await
    }

    async fn copy(
        &self,
        ip: &str,
        command_port: u16,
        path: &str,
        from_ip: &str,
        from_client_port: u16,
    ) -> DfsResult<bool> {
        self.client
            .storage_copy(ip, command_port, path, from_ip, from_client_port)
            .await
    }

    async fn size(&self, ip: &str, client_port: u16, path: &str) -> DfsResult<u64> {
        self.client.storage_size(ip, client_port, path).await
    }

    async fn read(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        length: u64,
    ) -> DfsResult<String> {
        self.client
            .storage_read(ip, client_port, path, offset, length)
            .await
    }

    async fn write(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        data: &str,
    ) -> DfsResult<bool> {
        self.client
            .storage_write(ip, client_port, path, offset, data)
            .await
    }
}
