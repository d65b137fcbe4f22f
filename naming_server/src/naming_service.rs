use crate::directory_tree::{ChainEntry, DirectoryTree, ServerKey};
use crate::lock_node::RequestToken;
use crate::policy;
use crate::storage_commands::StorageCommands;
use dfs_lib::{
    AssignedServerReturn, DfsError, DfsPath, DfsResult, RegisterRequest, ReplicationRequest,
    ServerInfo,
};
use log::{info, warn};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// A connected storage server as the coordinator tracks it, with the
/// publishers and subscribers assigned to it for load balancing.
#[derive(Debug, Clone)]
pub struct StorageServerInfo {
    pub ip: String,
    pub client_port: u16,
    pub command_port: u16,
    pub publishers: HashSet<String>,
    pub subscribers: HashSet<String>,
}

impl StorageServerInfo {
    pub fn new(ip: String, client_port: u16, command_port: u16) -> Self {
        Self {
            ip,
            client_port,
            command_port,
            publishers: HashSet::new(),
            subscribers: HashSet::new(),
        }
    }

    pub fn key(&self) -> ServerKey {
        (self.client_port, self.command_port)
    }
}

/// The naming coordinator: binds the namespace, the storage-server
/// registry, and the publisher/subscriber bookkeeping into one state
/// machine, and runs the hierarchical lock-then-act protocol for every
/// request.
///
/// The tree guard protects map structure only and is never held across an
/// `.await`; lock chains are snapshotted as `Arc` handles first and
/// acquired afterwards. Registries are keyed by identity, not by path, so
/// each one is guarded independently of the path-locking protocol.
pub struct NamingService {
    tree: RwLock<DirectoryTree>,
    servers: Mutex<HashMap<ServerKey, StorageServerInfo>>,
    publishers: Mutex<HashMap<String, ServerKey>>,
    subscribers: Mutex<HashMap<String, ServerKey>>,
    /// Keyword -> subscribers with a pending interest in files of that name.
    interests: Mutex<HashMap<String, HashSet<String>>>,
    commands: Arc<dyn StorageCommands>,
    token_seq: AtomicU64,
}

impl NamingService {
    pub fn new(commands: Arc<dyn StorageCommands>) -> Self {
        Self {
            tree: RwLock::new(DirectoryTree::new()),
            servers: Mutex::new(HashMap::new()),
            publishers: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            interests: Mutex::new(HashMap::new()),
            commands,
            token_seq: AtomicU64::new(1),
        }
    }

    fn next_token(&self) -> RequestToken {
        self.token_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn parse_path(path: &str) -> DfsResult<DfsPath> {
        DfsPath::parse(path)
    }

    /// Snapshot the root-to-leaf lock handles for `path`.
    fn chain(&self, path: &DfsPath) -> DfsResult<Vec<ChainEntry>> {
        self.tree
            .read()
            .unwrap()
            .lock_chain(path)
            .ok_or_else(|| DfsError::NotFound(format!("path cannot be found: {}", path)))
    }

    /// Ancestors shared, root first; then the target in the requested mode.
    async fn acquire(&self, chain: &[ChainEntry], exclusive: bool, token: RequestToken) {
        let last = chain.len() - 1;
        for entry in &chain[..last] {
            entry.lock.acquire_shared(token).await;
        }
        if exclusive {
            chain[last].lock.acquire_exclusive(token).await;
        } else {
            chain[last].lock.acquire_shared(token).await;
        }
    }

    /// Reverse of `acquire`: target first, then ancestors leaf to root.
    /// Unconditional; a hold that cannot be released is a bug worth a log
    /// line, not a lost lock chain.
    fn release(&self, chain: &[ChainEntry], exclusive: bool) {
        let last = chain.len() - 1;
        let result = if exclusive {
            chain[last].lock.release_exclusive()
        } else {
            chain[last].lock.release_shared()
        };
        if let Err(e) = result {
            warn!("release of {} failed: {}", chain[last].path, e);
        }
        for entry in chain[..last].iter().rev() {
            if let Err(e) = entry.lock.release_shared() {
                warn!("release of {} failed: {}", entry.path, e);
            }
        }
    }

    fn server_info(&self, key: &ServerKey) -> Option<StorageServerInfo> {
        self.servers.lock().unwrap().get(key).cloned()
    }

    fn replica_infos(&self, keys: &HashSet<ServerKey>) -> Vec<StorageServerInfo> {
        let servers = self.servers.lock().unwrap();
        keys.iter().filter_map(|k| servers.get(k).cloned()).collect()
    }

    fn pick_random_server(&self) -> Option<StorageServerInfo> {
        let servers = self.servers.lock().unwrap();
        let all: Vec<&StorageServerInfo> = servers.values().collect();
        all.choose(&mut rand::thread_rng()).map(|s| (*s).clone())
    }

    // ---- registration ----

    /// A storage server announces itself with its file inventory. Paths the
    /// namespace does not know yet are created against this server; paths
    /// it already knows are returned for local deletion; the registering
    /// server is not the source of truth for those.
    pub fn register(&self, req: &RegisterRequest) -> DfsResult<Vec<String>> {
        let mut inventory = Vec::with_capacity(req.files.len());
        for file in &req.files {
            inventory.push(Self::parse_path(file)?);
        }
        let key = (req.client_port, req.command_port);
        {
            let mut servers = self.servers.lock().unwrap();
            if servers.contains_key(&key) {
                return Err(DfsError::AlreadyRegistered(format!(
                    "storage server {}:{}/{}",
                    req.storage_ip, req.client_port, req.command_port
                )));
            }
            servers.insert(
                key,
                StorageServerInfo::new(req.storage_ip.clone(), req.client_port, req.command_port),
            );
        }
        let mut duplicates = Vec::new();
        {
            let mut tree = self.tree.write().unwrap();
            for path in &inventory {
                if path.is_root() {
                    continue;
                }
                let key_str = path.to_string();
                if tree.has_node(&key_str) {
                    duplicates.push(key_str);
                } else {
                    tree.create_file(path, Some(key));
                }
            }
        }
        info!(
            "storage server {}:{}/{} registered: {} files, {} duplicates",
            req.storage_ip,
            req.client_port,
            req.command_port,
            req.files.len(),
            duplicates.len()
        );
        Ok(duplicates)
    }

    // ---- namespace queries ----

    pub fn is_valid_path(&self, path: &str) -> bool {
        DirectoryTree::is_valid_path(path)
    }

    pub async fn is_directory(&self, path: &str) -> DfsResult<bool> {
        let parsed = Self::parse_path(path)?;
        let chain = self.chain(&parsed)?;
        let token = self.next_token();
        self.acquire(&chain, false, token).await;
        let result = self
            .tree
            .read()
            .unwrap()
            .is_directory(&parsed.to_string())
            .ok_or_else(|| DfsError::NotFound(format!("path cannot be found: {}", path)));
        self.release(&chain, false);
        result
    }

    pub async fn list(&self, path: &str) -> DfsResult<Vec<String>> {
        let parsed = Self::parse_path(path)?;
        match self.tree.read().unwrap().is_directory(&parsed.to_string()) {
            Some(true) => {}
            _ => {
                return Err(DfsError::NotFound(format!(
                    "not an existing directory: {}",
                    path
                )))
            }
        }
        let chain = self.chain(&parsed)?;
        let token = self.next_token();
        self.acquire(&chain, false, token).await;
        let result = self
            .tree
            .read()
            .unwrap()
            .list_files(&parsed.to_string())
            .ok_or_else(|| DfsError::NotFound(format!("not an existing directory: {}", path)));
        self.release(&chain, false);
        result
    }

    // ---- namespace mutation ----

    pub async fn create_directory(&self, path: &str) -> DfsResult<bool> {
        let parsed = Self::parse_path(path)?;
        if parsed.is_root() {
            return Ok(false);
        }
        {
            let tree = self.tree.read().unwrap();
            if !tree.parent_directory_exists(&parsed) {
                return Err(DfsError::NotFound(format!(
                    "parent directory does not exist: {}",
                    path
                )));
            }
            if tree.has_node(&parsed.to_string()) {
                return Ok(false);
            }
        }
        let parent = parsed.parent()?;
        let chain = self.chain(&parent)?;
        let token = self.next_token();
        self.acquire(&chain, true, token).await;
        let created = {
            let mut tree = self.tree.write().unwrap();
            if tree.has_node(&parsed.to_string()) {
                false
            } else {
                tree.create_directory(&parsed);
                true
            }
        };
        self.release(&chain, true);
        Ok(created)
    }

    pub async fn create_file(&self, path: &str, publisher_id: Option<&str>) -> DfsResult<bool> {
        let parsed = Self::parse_path(path)?;
        if parsed.is_root() {
            return Ok(false);
        }
        if !self.tree.read().unwrap().parent_directory_exists(&parsed) {
            return Err(DfsError::NotFound(format!(
                "parent directory does not exist: {}",
                path
            )));
        }
        if self.servers.lock().unwrap().is_empty() {
            return Err(DfsError::NoServersAvailable(
                "no storage servers are connected".to_string(),
            ));
        }
        let server = match publisher_id {
            Some(id) => {
                let key = self
                    .publishers
                    .lock()
                    .unwrap()
                    .get(id)
                    .copied()
                    .ok_or_else(|| DfsError::NotFound(format!("unknown publisher: {}", id)))?;
                self.server_info(&key).ok_or_else(|| {
                    DfsError::Internal(format!("publisher {} bound to a vanished server", id))
                })?
            }
            None => self.pick_random_server().ok_or_else(|| {
                DfsError::NoServersAvailable("no storage servers are connected".to_string())
            })?,
        };

        let parent = parsed.parent()?;
        let chain = self.chain(&parent)?;
        let token = self.next_token();
        self.acquire(&chain, true, token).await;
        let created = {
            let mut tree = self.tree.write().unwrap();
            if tree.has_node(&parsed.to_string()) {
                false
            } else {
                tree.create_file(&parsed, Some(server.key()));
                self.attach_interested_subscribers(&mut tree, &parsed);
                true
            }
        };
        let result = if created {
            self.commands
                .create(&server.ip, server.command_port, &parsed.to_string())
                .await
                .map(|_| true)
        } else {
            Ok(false)
        };
        self.release(&chain, true);
        result
    }

    /// Subscribers that expressed interest in this file name are attached
    /// as pending readers of the new node.
    fn attach_interested_subscribers(&self, tree: &mut DirectoryTree, path: &DfsPath) {
        let keyword = match path.last() {
            Ok(k) => k.to_string(),
            Err(_) => return,
        };
        let interested: Vec<String> = {
            let interests = self.interests.lock().unwrap();
            interests
                .get(&keyword)
                .map(|subs| subs.iter().cloned().collect())
                .unwrap_or_default()
        };
        if interested.is_empty() {
            return;
        }
        if let Some(node) = tree.find_mut(&path.to_string()) {
            for sub in interested {
                node.pending_subscribers.insert(sub);
            }
            node.had_subscriber = true;
        }
    }

    pub async fn get_storage(&self, path: &str) -> DfsResult<ServerInfo> {
        let parsed = Self::parse_path(path)?;
        let key_str = parsed.to_string();
        match self.tree.read().unwrap().find(&key_str) {
            Some(node) if node.is_file() => {}
            _ => return Err(DfsError::NotFound(format!("no such file: {}", path))),
        }
        let chain = self.chain(&parsed)?;
        let token = self.next_token();
        self.acquire(&chain, false, token).await;
        let picked = {
            let tree = self.tree.read().unwrap();
            tree.find(&key_str).filter(|n| n.is_file()).and_then(|n| {
                let keys: Vec<ServerKey> = n.replicas.iter().copied().collect();
                keys.choose(&mut rand::thread_rng()).copied()
            })
        };
        self.release(&chain, false);
        let key = picked.ok_or_else(|| DfsError::NotFound(format!("no such file: {}", path)))?;
        let info = self
            .server_info(&key)
            .ok_or_else(|| DfsError::Internal(format!("replica on unknown server {:?}", key)))?;
        Ok(ServerInfo {
            server_ip: info.ip,
            server_port: info.client_port,
        })
    }

    pub async fn delete(&self, path: &str) -> DfsResult<bool> {
        let parsed = Self::parse_path(path)?;
        if parsed.is_root() {
            return Err(DfsError::InvalidPath("refusing to delete the root".to_string()));
        }
        let key_str = parsed.to_string();
        if !self.tree.read().unwrap().has_node(&key_str) {
            return Err(DfsError::NotFound(format!("path cannot be found: {}", path)));
        }
        let chain = self.chain(&parsed)?;
        let token = self.next_token();
        self.acquire(&chain, true, token).await;
        let result = self.delete_locked(&key_str).await;
        self.release(&chain, true);
        result.map(|_| true)
    }

    async fn delete_locked(&self, key_str: &str) -> DfsResult<()> {
        let victims: Vec<(String, Vec<StorageServerInfo>)> = {
            let tree = self.tree.read().unwrap();
            tree.list_all_files(key_str)
                .into_iter()
                .map(|file| {
                    let replicas = tree
                        .find(&file)
                        .map(|n| self.replica_infos(&n.replicas))
                        .unwrap_or_default();
                    (file, replicas)
                })
                .collect()
        };
        for (file, replicas) in &victims {
            for server in replicas {
                self.commands
                    .delete(&server.ip, server.command_port, file)
                    .await?;
            }
        }
        self.tree.write().unwrap().delete(key_str);
        Ok(())
    }

    // ---- locking ----

    /// Hierarchical lock acquisition for a client: shared on every strict
    /// ancestor root-first, then the target in the requested mode. A
    /// granted lock on a file acknowledges the requester's pending
    /// consumption, and the replication/invalidation policy runs while the
    /// target hold is in place.
    pub async fn lock(&self, path: &str, exclusive: bool, requester: Option<&str>) -> DfsResult<()> {
        let parsed = Self::parse_path(path)?;
        let key_str = parsed.to_string();
        let chain = self.chain(&parsed)?;
        let token = self.next_token();

        let last = chain.len() - 1;
        for entry in &chain[..last] {
            entry.lock.acquire_shared(token).await;
            entry.lock.add_read();
        }
        let target = &chain[last];
        if exclusive {
            target.lock.acquire_exclusive(token).await;
        } else {
            target.lock.acquire_shared(token).await;
            target.lock.add_read();
        }

        if target.is_file {
            if let Some(id) = requester {
                let mut tree = self.tree.write().unwrap();
                if let Some(node) = tree.find_mut(&key_str) {
                    node.pending_subscribers.remove(id);
                }
            }
            if exclusive {
                self.invalidate_if_needed(&key_str).await;
            } else {
                self.replicate_if_needed(&key_str, target);
            }
        }
        Ok(())
    }

    /// Releases mirror acquisition order: ancestors root-first, then the
    /// target. Afterwards a file every pending subscriber has consumed is
    /// withdrawn from storage and from the namespace.
    pub async fn unlock(
        &self,
        path: &str,
        exclusive: bool,
        _requester: Option<&str>,
    ) -> DfsResult<()> {
        let parsed = Self::parse_path(path)?;
        let key_str = parsed.to_string();
        let chain = self.chain(&parsed)?;

        let last = chain.len() - 1;
        for entry in &chain[..last] {
            entry.lock.release_shared()?;
        }
        if exclusive {
            chain[last].lock.release_exclusive()?;
        } else {
            chain[last].lock.release_shared()?;
        }

        if chain[last].is_file {
            self.delete_if_consumed(&key_str).await;
        }
        Ok(())
    }

    /// On a write grant, collapse the replica set to a single copy so only
    /// one replica stays authoritative until replication re-grows it.
    async fn invalidate_if_needed(&self, key_str: &str) {
        let dropped: Vec<StorageServerInfo> = {
            let mut tree = self.tree.write().unwrap();
            let node = match tree.find_mut(key_str) {
                Some(n) => n,
                None => return,
            };
            if !policy::needs_invalidation(node.is_file(), node.replicas.len()) {
                return;
            }
            let keep = node.replicas.iter().next().copied();
            let dropped_keys: Vec<ServerKey> = node
                .replicas
                .iter()
                .copied()
                .filter(|k| Some(*k) != keep)
                .collect();
            for k in &dropped_keys {
                node.replicas.remove(k);
            }
            let servers = self.servers.lock().unwrap();
            dropped_keys
                .iter()
                .filter_map(|k| servers.get(k).cloned())
                .collect()
        };
        for server in dropped {
            info!(
                "invalidating replica of {} on {}:{}",
                key_str, server.ip, server.command_port
            );
            if let Err(e) = self
                .commands
                .delete(&server.ip, server.command_port, key_str)
                .await
            {
                warn!(
                    "invalidation delete of {} on {}:{} failed: {}",
                    key_str, server.ip, server.command_port, e
                );
            }
        }
    }

    /// On a read grant, consult the replication policy and, when due,
    /// record the new replica and drive the copy in the background; the
    /// read that tripped the threshold is not held up.
    fn replicate_if_needed(&self, key_str: &str, target: &ChainEntry) {
        let read_count = target.lock.read_count();
        let work = {
            let mut tree = self.tree.write().unwrap();
            let node = match tree.find_mut(key_str) {
                Some(n) => n,
                None => return,
            };
            if !policy::needs_replication(node.is_file(), read_count, node.replicas.len()) {
                return;
            }
            let source = {
                let servers = self.servers.lock().unwrap();
                node.replicas
                    .iter()
                    .find_map(|k| servers.get(k).cloned())
            };
            let source = match source {
                Some(s) => s,
                None => return,
            };
            let candidate = {
                let servers = self.servers.lock().unwrap();
                let free: Vec<&StorageServerInfo> = servers
                    .values()
                    .filter(|s| !node.replicas.contains(&s.key()))
                    .collect();
                free.choose(&mut rand::thread_rng()).map(|s| (*s).clone())
            };
            match candidate {
                Some(new_replica) => {
                    node.replicas.insert(new_replica.key());
                    target.lock.reset_read_count();
                    Some((source, new_replica))
                }
                None => None,
            }
        };
        if let Some((source, new_replica)) = work {
            info!(
                "replicating {} from {}:{} to {}:{}",
                key_str, source.ip, source.client_port, new_replica.ip, new_replica.command_port
            );
            let commands = self.commands.clone();
            let path = key_str.to_string();
            tokio::spawn(async move {
                if let Err(e) = commands
                    .create(&new_replica.ip, new_replica.command_port, &path)
                    .await
                {
                    warn!(
                        "replication create of {} on {}:{} failed: {}",
                        path, new_replica.ip, new_replica.command_port, e
                    );
                    return;
                }
                if let Err(e) = commands
                    .copy(
                        &new_replica.ip,
                        new_replica.command_port,
                        &path,
                        &source.ip,
                        source.client_port,
                    )
                    .await
                {
                    warn!(
                        "replication copy of {} to {}:{} failed: {}",
                        path, new_replica.ip, new_replica.command_port, e
                    );
                }
            });
        }
    }

    /// Content is retained only until every interested subscriber has
    /// consumed it.
    async fn delete_if_consumed(&self, key_str: &str) {
        let replicas = {
            let tree = self.tree.read().unwrap();
            match tree.find(key_str) {
                Some(node)
                    if node.is_file()
                        && node.had_subscriber
                        && node.pending_subscribers.is_empty() =>
                {
                    self.replica_infos(&node.replicas)
                }
                _ => return,
            }
        };
        info!("every subscriber consumed {}, withdrawing it", key_str);
        for server in replicas {
            if let Err(e) = self
                .commands
                .delete(&server.ip, server.command_port, key_str)
                .await
            {
                warn!(
                    "withdrawal delete of {} on {}:{} failed: {}",
                    key_str, server.ip, server.command_port, e
                );
            }
        }
        self.tree.write().unwrap().delete(key_str);
    }

    // ---- publisher / subscriber registration ----

    pub fn publisher_register(&self, publisher_id: &str) -> DfsResult<AssignedServerReturn> {
        let mut servers = self.servers.lock().unwrap();
        if servers.is_empty() {
            return Err(DfsError::NoServersAvailable(
                "no storage server to assign".to_string(),
            ));
        }
        let mut publishers = self.publishers.lock().unwrap();
        if publishers.contains_key(publisher_id) {
            return Err(DfsError::AlreadyRegistered(format!(
                "publisher {}",
                publisher_id
            )));
        }
        let key = Self::least_loaded(&servers, |s| s.publishers.len());
        let server = match servers.get_mut(&key) {
            Some(s) => s,
            None => return Err(DfsError::Internal("server registry corrupted".to_string())),
        };
        server.publishers.insert(publisher_id.to_string());
        publishers.insert(publisher_id.to_string(), key);
        info!(
            "publisher {} assigned to {}:{}/{}",
            publisher_id, server.ip, server.client_port, server.command_port
        );
        Ok(AssignedServerReturn {
            server_ip: server.ip.clone(),
            client_port: server.client_port,
            command_port: server.command_port,
        })
    }

    pub fn subscriber_register(
        &self,
        subscriber_id: &str,
        keywords: &[String],
    ) -> DfsResult<AssignedServerReturn> {
        let mut servers = self.servers.lock().unwrap();
        if servers.is_empty() {
            return Err(DfsError::NoServersAvailable(
                "no storage server to assign".to_string(),
            ));
        }
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.contains_key(subscriber_id) {
            return Err(DfsError::AlreadyRegistered(format!(
                "subscriber {}",
                subscriber_id
            )));
        }
        {
            let mut interests = self.interests.lock().unwrap();
            for keyword in keywords {
                // only keywords that form a valid path component count
                if DfsPath::root().child(keyword).is_ok() {
                    interests
                        .entry(keyword.clone())
                        .or_default()
                        .insert(subscriber_id.to_string());
                }
            }
        }
        let key = Self::least_loaded(&servers, |s| s.subscribers.len());
        let server = match servers.get_mut(&key) {
            Some(s) => s,
            None => return Err(DfsError::Internal("server registry corrupted".to_string())),
        };
        server.subscribers.insert(subscriber_id.to_string());
        subscribers.insert(subscriber_id.to_string(), key);
        info!(
            "subscriber {} assigned to {}:{}/{}",
            subscriber_id, server.ip, server.client_port, server.command_port
        );
        Ok(AssignedServerReturn {
            server_ip: server.ip.clone(),
            client_port: server.client_port,
            command_port: server.command_port,
        })
    }

    /// Fewest-assigned wins; ties keep the first server seen.
    fn least_loaded<F: Fn(&StorageServerInfo) -> usize>(
        servers: &HashMap<ServerKey, StorageServerInfo>,
        load: F,
    ) -> ServerKey {
        let mut best = (0, 0);
        let mut best_load = usize::MAX;
        for (key, server) in servers.iter() {
            if load(server) < best_load {
                best = *key;
                best_load = load(server);
            }
        }
        best
    }

    // ---- replication transfer ----

    /// Copy a file from an existing replica to a target server: record the
    /// replica, create the file there, then move the full content across.
    pub async fn replication(&self, req: &ReplicationRequest) -> DfsResult<bool> {
        let parsed = Self::parse_path(&req.path)?;
        if parsed.is_root() {
            return Err(DfsError::InvalidPath("cannot replicate the root".to_string()));
        }
        if self.servers.lock().unwrap().is_empty() {
            return Err(DfsError::NoServersAvailable(
                "no storage server to copy to".to_string(),
            ));
        }
        let target_key = (req.copy_client_port, req.copy_command_port);
        if !self.servers.lock().unwrap().contains_key(&target_key) {
            return Err(DfsError::NotFound(format!(
                "copy target is not a registered storage server: {}:{}/{}",
                req.copy_ip, req.copy_client_port, req.copy_command_port
            )));
        }
        {
            let mut tree = self.tree.write().unwrap();
            tree.create_file(&parsed, Some(target_key));
            if let Some(node) = tree.find_mut(&parsed.to_string()) {
                if node.replicas.insert(target_key) {
                    node.lock().reset_read_count();
                }
            }
        }
        self.commands
            .create(&req.copy_ip, req.copy_command_port, &req.path)
            .await?;
        let size = self
            .commands
            .size(&req.existed_ip, req.existed_client_port, &req.path)
            .await?;
        let data = self
            .commands
            .read(&req.existed_ip, req.existed_client_port, &req.path, 0, size)
            .await?;
        self.commands
            .write(&req.copy_ip, req.copy_client_port, &req.path, 0, &data)
            .await?;
        Ok(true)
    }

    // ---- test introspection ----

    #[cfg(test)]
    pub fn replicas_of(&self, path: &str) -> Vec<ServerKey> {
        let tree = self.tree.read().unwrap();
        let mut keys: Vec<ServerKey> = tree
            .find(path)
            .map(|n| n.replicas.iter().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    #[cfg(test)]
    pub fn has_node(&self, path: &str) -> bool {
        self.tree.read().unwrap().has_node(path)
    }

    #[cfg(test)]
    pub fn read_count_of(&self, path: &str) -> u64 {
        self.tree
            .read()
            .unwrap()
            .find(path)
            .map(|n| n.lock().read_count())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn pending_subscribers_of(&self, path: &str) -> usize {
        self.tree
            .read()
            .unwrap()
            .find(path)
            .map(|n| n.pending_subscribers.len())
            .unwrap_or(0)
    }
}
