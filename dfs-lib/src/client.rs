use crate::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON-over-HTTP client shared by every component that talks to a naming
/// or storage server. One instance holds one connection pool.
#[derive(Clone, Default)]
pub struct ApiClient {
    http: Client,
}

fn endpoint(ip: &str, port: u16, route: &str) -> String {
    format!("http://{}:{}/{}", ip, port, route)
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// POST `body` as JSON and decode the response. A non-2xx status is
    /// decoded as an `ExceptionReturn` and mapped back to the matching
    /// `DfsError`.
    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> DfsResult<R> {
        let text = self.post_raw(url, body).await?;
        serde_json::from_str(&text)
            .map_err(|e| DfsError::RemoteError(format!("decode response of {} failed: {}", url, e)))
    }

    /// POST for endpoints that answer with an empty body on success.
    pub async fn post_no_content<B: Serialize>(&self, url: &str, body: &B) -> DfsResult<()> {
        self.post_raw(url, body).await.map(|_| ())
    }

    async fn post_raw<B: Serialize>(&self, url: &str, body: &B) -> DfsResult<String> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DfsError::RemoteError(format!("POST {} failed: {}", url, e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DfsError::RemoteError(format!("read response of {} failed: {}", url, e)))?;
        if !status.is_success() {
            if let Ok(exc) = serde_json::from_str::<ExceptionReturn>(&text) {
                return Err(DfsError::from_remote(&exc.exception_type, &exc.exception_info));
            }
            return Err(DfsError::RemoteError(format!(
                "POST {} answered {}",
                url, status
            )));
        }
        Ok(text)
    }

    // ---- storage server, client interface ----

    pub async fn storage_size(&self, ip: &str, client_port: u16, path: &str) -> DfsResult<u64> {
        let ret: SizeReturn = self
            .post(
                &endpoint(ip, client_port, "storage_size"),
                &PathRequest::new(path),
            )
            .await?;
        Ok(ret.size)
    }

    pub async fn storage_read(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        length: u64,
    ) -> DfsResult<String> {
        let req = ReadRequest {
            path: path.to_string(),
            offset,
            length,
        };
        let ret: DataReturn = self
            .post(&endpoint(ip, client_port, "storage_read"), &req)
            .await?;
        Ok(ret.data)
    }

    pub async fn storage_write(
        &self,
        ip: &str,
        client_port: u16,
        path: &str,
        offset: u64,
        data: &str,
    ) -> DfsResult<bool> {
        let req = WriteRequest {
            path: path.to_string(),
            offset,
            data: data.to_string(),
        };
        let ret: BooleanReturn = self
            .post(&endpoint(ip, client_port, "storage_write"), &req)
            .await?;
        Ok(ret.success)
    }

    // ---- storage server, command interface ----

    pub async fn storage_create(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
        let ret: BooleanReturn = self
            .post(
                &endpoint(ip, command_port, "storage_create"),
                &PathRequest::new(path),
            )
            .await?;
        Ok(ret.success)
    }

    pub async fn storage_delete(&self, ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
        let ret: BooleanReturn = self
            .post(
                &endpoint(ip, command_port, "storage_delete"),
                &PathRequest::new(path),
            )
            .await?;
        Ok(ret.success)
    }

    pub async fn storage_copy(
        &self,
        ip: &str,
        command_port: u16,
        path: &str,
        from_ip: &str,
        from_client_port: u16,
    ) -> DfsResult<bool> {
        let req = CopyRequest {
            path: path.to_string(),
            server_ip: from_ip.to_string(),
            server_port: from_client_port,
        };
        let ret: BooleanReturn = self
            .post(&endpoint(ip, command_port, "storage_copy"), &req)
            .await?;
        Ok(ret.success)
    }

    // ---- naming server ----

    /// Register a storage server inventory; returns the duplicate paths the
    /// registering server must delete locally.
    pub async fn register(
        &self,
        naming_ip: &str,
        registration_port: u16,
        req: &RegisterRequest,
    ) -> DfsResult<Vec<String>> {
        let ret: FilesReturn = self
            .post(&endpoint(naming_ip, registration_port, "register"), req)
            .await?;
        Ok(ret.files)
    }

    pub async fn lock(
        &self,
        naming_ip: &str,
        service_port: u16,
        req: &LockRequest,
    ) -> DfsResult<()> {
        self.post_no_content(&endpoint(naming_ip, service_port, "lock"), req)
            .await
    }

    pub async fn unlock(
        &self,
        naming_ip: &str,
        service_port: u16,
        req: &LockRequest,
    ) -> DfsResult<()> {
        self.post_no_content(&endpoint(naming_ip, service_port, "unlock"), req)
            .await
    }

    pub async fn get_storage(
        &self,
        naming_ip: &str,
        service_port: u16,
        path: &str,
    ) -> DfsResult<ServerInfo> {
        self.post(
            &endpoint(naming_ip, service_port, "getstorage"),
            &PathRequest::new(path),
        )
        .await
    }

    pub async fn create_file(
        &self,
        naming_ip: &str,
        service_port: u16,
        path: &str,
        publisher_id: Option<&str>,
    ) -> DfsResult<bool> {
        let req = PathRequest {
            path: path.to_string(),
            publisher_id: publisher_id.map(|p| p.to_string()),
        };
        let ret: BooleanReturn = self
            .post(&endpoint(naming_ip, service_port, "create_file"), &req)
            .await?;
        Ok(ret.success)
    }

    pub async fn replication(
        &self,
        naming_ip: &str,
        service_port: u16,
        req: &ReplicationRequest,
    ) -> DfsResult<bool> {
        let ret: BooleanReturn = self
            .post(&endpoint(naming_ip, service_port, "replication"), req)
            .await?;
        Ok(ret.success)
    }

    pub async fn publisher_register(
        &self,
        naming_ip: &str,
        service_port: u16,
        publisher_id: &str,
    ) -> DfsResult<AssignedServerReturn> {
        let req = PublisherRegisterRequest {
            publisher_id: publisher_id.to_string(),
        };
        self.post(&endpoint(naming_ip, service_port, "publisher_register"), &req)
            .await
    }

    pub async fn subscriber_register(
        &self,
        naming_ip: &str,
        service_port: u16,
        subscriber_id: &str,
        keywords: &[String],
    ) -> DfsResult<AssignedServerReturn> {
        let req = SubscriberRegisterRequest {
            subscriber_id: subscriber_id.to_string(),
            keywords: keywords.to_vec(),
        };
        self.post(
            &endpoint(naming_ip, service_port, "subscriber_register"),
            &req,
        )
        .await
    }
}
