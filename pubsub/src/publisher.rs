use crate::{Content, NamingLocation};
use dfs_lib::{ApiClient, AssignedServerReturn, DfsResult};
use log::info;
use std::collections::VecDeque;

/// A client that publishes content to its assigned storage server.
///
/// Lifecycle: `register` to be bound to a storage server, `set_ready` to
/// have the naming server create one file per keyword of the queued
/// content, `publish` to drain the queue onto the assigned server.
pub struct Publisher {
    id: String,
    naming: NamingLocation,
    queue: VecDeque<Content>,
    client: ApiClient,
    assigned: Option<AssignedServerReturn>,
}

impl Publisher {
    pub fn new(id: impl Into<String>, naming: NamingLocation) -> Self {
        Self::with_content(id, naming, VecDeque::new())
    }

    pub fn with_content(
        id: impl Into<String>,
        naming: NamingLocation,
        queue: VecDeque<Content>,
    ) -> Self {
        Self {
            id: id.into(),
            naming,
            queue,
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

    pub fn add_content(&mut self, content: Content) {
        self.queue.push_back(content);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Register with the naming server; it assigns the storage server all
    /// of this publisher's files will live on.
    pub async fn register(&mut self) -> DfsResult<()> {
        let assigned = self
            .client
            .publisher_register(&self.naming.ip, self.naming.service_port, &self.id)
            .await?;
        info!(
            "publisher {} bound to storage server {}:{}",
            self.id, assigned.server_ip, assigned.client_port
        );
        self.assigned = Some(assigned);
        Ok(())
    }

    /// Ask the naming server to create one file per keyword of every
    /// queued content item, pinned to this publisher's server.
    pub async fn set_ready(&self) -> DfsResult<()> {
        for content in &self.queue {
            for keyword in &content.keywords {
                self.client
                    .create_file(
                        &self.naming.ip,
                        self.naming.service_port,
                        &format!("/{}", keyword),
                        Some(&self.id),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Drain the queue: append each item's text to its keyword files on
    /// the assigned server. Reports false when `register` has not run.
    pub async fn publish(&mut self) -> DfsResult<bool> {
        let server = match &self.assigned {
            Some(s) => s.clone(),
            None => return Ok(false),
        };
        while let Some(content) = self.queue.pop_front() {
            for keyword in &content.keywords {
                let path = format!("/{}", keyword);
                let size = self
                    .client
                    .storage_size(&server.server_ip, server.client_port, &path)
                    .await?;
                self.client
                    .storage_write(
                        &server.server_ip,
                        server.client_port,
                        &path,
                        size,
                        &content.text,
                    )
                    .await?;
            }
        }
        Ok(true)
    }
}
