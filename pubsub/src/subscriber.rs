use crate::NamingLocation;
use dfs_lib::{
    ApiClient, AssignedServerReturn, DfsError, DfsResult, LockRequest, ReplicationRequest,
};
use log::{info, warn};
use std::collections::HashMap;

/// A client that consumes content by keyword from its assigned storage
/// server.
///
/// Lifecycle: `register` announces the keyword interests and binds the
/// subscriber to a storage server; `set_ready` pulls every keyword file
/// that lives only elsewhere onto that server via the naming server's
/// replication transfer; `read_content` locks, reads, and unlocks each
/// keyword file, which also tells the naming server the content was
/// consumed.
pub struct Subscriber {
    id: String,
    keywords: Vec<String>,
    naming: NamingLocation,
    client: ApiClient,
    assigned: Option<AssignedServerReturn>,
}

impl Subscriber {
    pub fn new(id: impl Into<String>, keywords: Vec<String>, naming: NamingLocation) -> Self {
        Self {
            id: id.into(),
            keywords,
            naming,
            client: ApiClient::new(),
            assigned: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn assigned_server(&self) -> Option<&AssignedServerReturn> {
        self.assigned.as_ref()
    }

    fn assigned_or_err(&self) -> DfsResult<&AssignedServerReturn> {
        self.assigned
            .as_ref()
            .ok_or_else(|| DfsError::IllegalState(format!("subscriber {} is not registered", self.id)))
    }

    pub async fn register(&mut self) -> DfsResult<()> {
        let assigned = self
            .client
            .subscriber_register(
                &self.naming.ip,
                self.naming.service_port,
                &self.id,
                &self.keywords,
            )
            .await?;
        info!(
            "subscriber {} bound to storage server {}:{}",
            self.id, assigned.server_ip, assigned.client_port
        );
        self.assigned = Some(assigned);
        Ok(())
    }

    /// Make every existing keyword file reachable on the assigned server,
    /// driving the naming server's replication transfer for files that
    /// live only elsewhere. Keywords with no file yet are skipped.
    pub async fn set_ready(&self) -> DfsResult<bool> {
        let server = self.assigned_or_err()?;
        for keyword in &self.keywords {
            let path = format!("/{}", keyword);
            let existing = match self
                .client
                .get_storage(&self.naming.ip, self.naming.service_port, &path)
                .await
            {
                Ok(info) => info,
                Err(DfsError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if existing.server_port != server.client_port {
                let request = ReplicationRequest {
                    path,
                    existed_ip: existing.server_ip,
                    existed_client_port: existing.server_port,
                    copy_ip: server.server_ip.clone(),
                    copy_client_port: server.client_port,
                    copy_command_port: server.command_port,
                };
                if !self
                    .client
                    .replication(&self.naming.ip, self.naming.service_port, &request)
                    .await?
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Read every keyword file from the assigned server under a shared
    /// lock. A keyword whose file cannot be read maps to `None`.
    pub async fn read_content(&self) -> DfsResult<HashMap<String, Option<String>>> {
        let server = self.assigned_or_err()?;
        let mut out = HashMap::new();
        for keyword in &self.keywords {
            let path = format!("/{}", keyword);
            let request = LockRequest {
                path: path.clone(),
                exclusive: false,
                requester: Some(self.id.clone()),
            };
            if let Err(e) = self
                .client
                .lock(&self.naming.ip, self.naming.service_port, &request)
                .await
            {
                warn!("lock of {} failed: {}", path, e);
                out.insert(keyword.clone(), None);
                continue;
            }
            let text = match self
                .client
                .storage_size(&server.server_ip, server.client_port, &path)
                .await
            {
                Ok(size) => self
                    .client
                    .storage_read(&server.server_ip, server.client_port, &path, 0, size)
                    .await
                    .ok(),
                Err(_) => None,
            };
            out.insert(keyword.clone(), text);
            self.client
                .unlock(&self.naming.ip, self.naming.service_port, &request)
                .await?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unregistered_subscriber_cannot_read() {
        let subscriber = Subscriber::new(
            "s1",
            vec!["news".to_string()],
            NamingLocation::new("127.0.0.1", 8080),
        );
        assert!(matches!(
            subscriber.read_content().await,
            Err(DfsError::IllegalState(_))
        ));
        assert!(matches!(
            subscriber.set_ready().await,
            Err(DfsError::IllegalState(_))
        ));
    }
}
