#[cfg(test)]
mod tests {
    use crate::naming_service::NamingService;
    use crate::storage_commands::StorageCommands;
    use async_trait::async_trait;
    use dfs_lib::{DfsError, DfsResult, RegisterRequest, ReplicationRequest};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    const S1: (u16, u16) = (7000, 7001);
    const S2: (u16, u16) = (8000, 8001);
    const IP: &str = "127.0.0.1";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum StorageCall {
        Create {
            port: u16,
            path: String,
        },
        Delete {
            port: u16,
            path: String,
        },
        Copy {
            port: u16,
            path: String,
            from_port: u16,
        },
        Write {
            port: u16,
            path: String,
            data: String,
        },
    }

    /// Stands in for the storage fleet: records every command and serves
    /// canned file contents for size/read.
    #[derive(Default)]
    struct RecordingStorage {
        calls: Mutex<Vec<StorageCall>>,
        contents: Mutex<HashMap<String, String>>,
    }

    impl RecordingStorage {
        fn put_content(&self, path: &str, data: &str) {
            self.contents
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_string());
        }

        fn calls(&self) -> Vec<StorageCall> {
            self.calls.lock().unwrap().clone()
        }

        fn copies(&self) -> Vec<StorageCall> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, StorageCall::Copy { .. }))
                .collect()
        }

        fn deletes(&self) -> Vec<StorageCall> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, StorageCall::Delete { .. }))
                .collect()
        }
    }

    #[async_trait]
    impl StorageCommands for RecordingStorage {
        async fn create(&self, _ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
            self.calls.lock().unwrap().push(StorageCall::Create {
                port: command_port,
                path: path.to_string(),
            });
            Ok(true)
        }

        async fn delete(&self, _ip: &str, command_port: u16, path: &str) -> DfsResult<bool> {
            self.calls.lock().unwrap().push(StorageCall::Delete {
                port: command_port,
                path: path.to_string(),
            });
            Ok(true)
        }

        async fn copy(
            &self,
            _ip: &str,
            command_port: u16,
            path: &str,
            _from_ip: &str,
            from_client_port: u16,
        ) -> DfsResult<bool> {
            self.calls.lock().unwrap().push(StorageCall::Copy {
                port: command_port,
                path: path.to_string(),
                from_port: from_client_port,
            });
            Ok(true)
        }

        async fn size(&self, _ip: &str, _client_port: u16, path: &str) -> DfsResult<u64> {
            self.contents
                .lock()
                .unwrap()
                .get(path)
                .map(|d| d.len() as u64)
                .ok_or_else(|| DfsError::NotFound(path.to_string()))
        }

        async fn read(
            &self,
            _ip: &str,
            _client_port: u16,
            path: &str,
            offset: u64,
            length: u64,
        ) -> DfsResult<String> {
            let contents = self.contents.lock().unwrap();
            let data = contents
                .get(path)
                .ok_or_else(|| DfsError::NotFound(path.to_string()))?;
            let end = (offset + length).min(data.len() as u64) as usize;
            Ok(data[offset as usize..end].to_string())
        }

        async fn write(
            &self,
            _ip: &str,
            client_port: u16,
            path: &str,
            _offset: u64,
            data: &str,
        ) -> DfsResult<bool> {
            self.calls.lock().unwrap().push(StorageCall::Write {
                port: client_port,
                path: path.to_string(),
                data: data.to_string(),
            });
            Ok(true)
        }
    }

    fn create_test_service() -> (Arc<NamingService>, Arc<RecordingStorage>) {
        let storage = Arc::new(RecordingStorage::default());
        let service = Arc::new(NamingService::new(storage.clone()));
        (service, storage)
    }

    fn register(svc: &NamingService, server: (u16, u16), files: &[&str]) -> DfsResult<Vec<String>> {
        svc.register(&RegisterRequest {
            storage_ip: IP.to_string(),
            client_port: server.0,
            command_port: server.1,
            files: files.iter().map(|f| f.to_string()).collect(),
        })
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    // ==================== Registration ====================

    #[tokio::test]
    async fn test_register_creates_inventory() {
        let (svc, _storage) = create_test_service();
        let dups = register(&svc, S1, &["/a/b", "/c"]).unwrap();
        assert!(dups.is_empty());
        assert!(svc.has_node("/a/b"));
        assert!(svc.has_node("/c"));
        assert_eq!(svc.replicas_of("/a/b"), vec![S1]);
        assert!(svc.is_directory("/a").await.unwrap());
        assert!(!svc.is_directory("/a/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_identity_rejected() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();
        assert!(matches!(
            register(&svc, S1, &[]),
            Err(DfsError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_register_reports_duplicates_for_local_deletion() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/a/b"]).unwrap();
        let dups = register(&svc, S2, &["/a/b"]).unwrap();
        // the namespace already knows /a/b: the second server must delete
        // its copy and S1 stays the only replica
        assert_eq!(dups, vec!["/a/b".to_string()]);
        assert_eq!(svc.replicas_of("/a/b"), vec![S1]);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_inventory_before_mutating() {
        let (svc, _storage) = create_test_service();
        assert!(matches!(
            register(&svc, S1, &["no-leading-slash"]),
            Err(DfsError::InvalidPath(_))
        ));
        // the identity was not consumed by the failed attempt
        register(&svc, S1, &["/ok"]).unwrap();
    }

    // ==================== Namespace operations ====================

    #[tokio::test]
    async fn test_create_file_without_servers_fails() {
        let (svc, _storage) = create_test_service();
        assert!(matches!(
            svc.create_file("/x", None).await,
            Err(DfsError::NoServersAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_create_file_issues_storage_create() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();

        assert!(svc.create_file("/x", None).await.unwrap());
        assert_eq!(svc.replicas_of("/x"), vec![S1]);
        assert_eq!(
            storage.calls(),
            vec![StorageCall::Create {
                port: S1.1,
                path: "/x".to_string()
            }]
        );

        // idempotent-create semantics: existing path reports false
        assert!(!svc.create_file("/x", None).await.unwrap());
        assert_eq!(storage.calls().len(), 1);

        assert!(matches!(
            svc.create_file("/missing/x", None).await,
            Err(DfsError::NotFound(_))
        ));
        assert!(matches!(
            svc.create_file("bad", None).await,
            Err(DfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_create_directory() {
        let (svc, _storage) = create_test_service();
        assert!(svc.create_directory("/d").await.unwrap());
        assert!(!svc.create_directory("/d").await.unwrap());
        assert!(matches!(
            svc.create_directory("/nope/d").await,
            Err(DfsError::NotFound(_))
        ));
        assert!(svc.is_directory("/d").await.unwrap());
    }

    #[tokio::test]
    async fn test_list() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/dir/a", "/dir/b"]).unwrap();

        let mut names = svc.list("/dir").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        assert!(matches!(svc.list("/dir/a").await, Err(DfsError::NotFound(_))));
        assert!(matches!(svc.list("/gone").await, Err(DfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_storage_returns_a_replica() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();

        let info = svc.get_storage("/f").await.unwrap();
        assert_eq!(info.server_ip, IP);
        assert_eq!(info.server_port, S1.0);

        assert!(matches!(svc.get_storage("/").await, Err(DfsError::NotFound(_))));
        assert!(matches!(
            svc.get_storage("/gone").await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_notifies_replicas_and_prunes_ancestors() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &["/d/x"]).unwrap();

        assert!(svc.delete("/d/x").await.unwrap());
        assert_eq!(
            storage.deletes(),
            vec![StorageCall::Delete {
                port: S1.1,
                path: "/d/x".to_string()
            }]
        );
        // /d became empty and was pruned, the root survives
        assert!(!svc.has_node("/d"));
        assert!(svc.has_node("/"));

        assert!(matches!(svc.delete("/d/x").await, Err(DfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_directory_deletes_every_file_under_it() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &["/d/a", "/d/sub/b"]).unwrap();

        assert!(svc.delete("/d").await.unwrap());
        let mut deleted: Vec<String> = storage
            .deletes()
            .into_iter()
            .map(|c| match c {
                StorageCall::Delete { path, .. } => path,
                _ => unreachable!(),
            })
            .collect();
        deleted.sort();
        assert_eq!(deleted, vec!["/d/a", "/d/sub/b"]);
        assert!(!svc.has_node("/d"));
    }

    // ==================== Locking ====================

    #[tokio::test]
    async fn test_lock_unlock_roundtrip_counts_reads() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();

        svc.lock("/f", false, None).await.unwrap();
        assert_eq!(svc.read_count_of("/f"), 1);
        svc.unlock("/f", false, None).await.unwrap();

        svc.lock("/f", true, None).await.unwrap();
        // an exclusive grant is not a read
        assert_eq!(svc.read_count_of("/f"), 1);
        svc.unlock("/f", true, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_without_hold_is_illegal_state() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();
        assert!(matches!(
            svc.unlock("/f", true, None).await,
            Err(DfsError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_missing_path_is_not_found() {
        let (svc, _storage) = create_test_service();
        assert!(matches!(
            svc.lock("/gone", false, None).await,
            Err(DfsError::NotFound(_))
        ));
        assert!(matches!(
            svc.lock("bad", false, None).await,
            Err(DfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_shared_holders_coexist_and_block_writer() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();

        svc.lock("/f", false, None).await.unwrap();
        svc.lock("/f", false, None).await.unwrap();

        // a writer cannot get in while two readers hold the file
        let writer = svc.clone();
        assert!(timeout(
            Duration::from_millis(50),
            writer.lock("/f", true, None)
        )
        .await
        .is_err());

        svc.unlock("/f", false, None).await.unwrap();
        svc.unlock("/f", false, None).await.unwrap();

        svc.lock("/f", true, None).await.unwrap();
        svc.unlock("/f", true, None).await.unwrap();
    }

    // ==================== Replication policy ====================

    #[tokio::test]
    async fn test_twentieth_read_grows_a_replica() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &["/hot"]).unwrap();
        register(&svc, S2, &[]).unwrap();
        storage.put_content("/hot", "payload");

        for _ in 0..19 {
            svc.lock("/hot", false, None).await.unwrap();
            svc.unlock("/hot", false, None).await.unwrap();
        }
        assert_eq!(svc.replicas_of("/hot"), vec![S1]);
        assert!(storage.copies().is_empty());

        // the 20th read trips the policy: the new replica is recorded at
        // once and the copy runs in the background
        svc.lock("/hot", false, None).await.unwrap();
        svc.unlock("/hot", false, None).await.unwrap();
        assert_eq!(svc.replicas_of("/hot"), vec![S1, S2]);
        assert_eq!(svc.read_count_of("/hot"), 0);

        let recorder = storage.clone();
        wait_until(move || !recorder.copies().is_empty()).await;
        assert_eq!(
            storage.copies(),
            vec![StorageCall::Copy {
                port: S2.1,
                path: "/hot".to_string(),
                from_port: S1.0
            }]
        );

        // the 21st read must not trigger another transfer
        svc.lock("/hot", false, None).await.unwrap();
        svc.unlock("/hot", false, None).await.unwrap();
        assert_eq!(svc.replicas_of("/hot"), vec![S1, S2]);
        assert_eq!(storage.copies().len(), 1);
    }

    #[tokio::test]
    async fn test_no_replication_without_a_spare_server() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &["/solo"]).unwrap();

        for _ in 0..20 {
            svc.lock("/solo", false, None).await.unwrap();
            svc.unlock("/solo", false, None).await.unwrap();
        }
        assert_eq!(svc.replicas_of("/solo"), vec![S1]);
        assert!(storage.copies().is_empty());
    }

    // ==================== Invalidation ====================

    #[tokio::test]
    async fn test_write_lock_collapses_replicas_to_one() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();
        register(&svc, S2, &[]).unwrap();
        storage.put_content("/f", "hello");

        let req = ReplicationRequest {
            path: "/f".to_string(),
            existed_ip: IP.to_string(),
            existed_client_port: S1.0,
            copy_ip: IP.to_string(),
            copy_client_port: S2.0,
            copy_command_port: S2.1,
        };
        assert!(svc.replication(&req).await.unwrap());
        assert_eq!(svc.replicas_of("/f"), vec![S1, S2]);
        // the transfer created the target copy and moved the bytes
        assert!(storage.calls().contains(&StorageCall::Create {
            port: S2.1,
            path: "/f".to_string()
        }));
        assert!(storage.calls().contains(&StorageCall::Write {
            port: S2.0,
            path: "/f".to_string(),
            data: "hello".to_string()
        }));

        svc.lock("/f", true, None).await.unwrap();
        let survivors = svc.replicas_of("/f");
        assert_eq!(survivors.len(), 1);
        let deletes = storage.deletes();
        assert_eq!(deletes.len(), 1);
        // the dropped replica, not the survivor, got the delete command
        let dropped_port = match &deletes[0] {
            StorageCall::Delete { port, path } => {
                assert_eq!(path, "/f");
                *port
            }
            _ => unreachable!(),
        };
        assert_ne!(dropped_port, survivors[0].1);
        svc.unlock("/f", true, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_replication_to_unregistered_target_rejected() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &["/f"]).unwrap();
        let req = ReplicationRequest {
            path: "/f".to_string(),
            existed_ip: IP.to_string(),
            existed_client_port: S1.0,
            copy_ip: IP.to_string(),
            copy_client_port: 9998,
            copy_command_port: 9999,
        };
        assert!(matches!(
            svc.replication(&req).await,
            Err(DfsError::NotFound(_))
        ));
    }

    // ==================== Publishers / subscribers ====================

    #[tokio::test]
    async fn test_publisher_register_requires_servers_and_unique_id() {
        let (svc, _storage) = create_test_service();
        assert!(matches!(
            svc.publisher_register("p1"),
            Err(DfsError::NoServersAvailable(_))
        ));
        register(&svc, S1, &[]).unwrap();
        svc.publisher_register("p1").unwrap();
        assert!(matches!(
            svc.publisher_register("p1"),
            Err(DfsError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_publishers_spread_across_servers() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();
        register(&svc, S2, &[]).unwrap();

        let first = svc.publisher_register("p1").unwrap();
        let second = svc.publisher_register("p2").unwrap();
        // fewest-assigned wins, so the two publishers land on different
        // servers
        assert_ne!(first.client_port, second.client_port);
    }

    #[tokio::test]
    async fn test_create_file_uses_publishers_bound_server() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();
        register(&svc, S2, &[]).unwrap();

        let assigned = svc.publisher_register("p1").unwrap();
        assert!(svc.create_file("/pub", Some("p1")).await.unwrap());
        let replicas = svc.replicas_of("/pub");
        assert_eq!(replicas, vec![(assigned.client_port, assigned.command_port)]);

        assert!(matches!(
            svc.create_file("/other", Some("ghost")).await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscriber_register_records_interests() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();

        svc.subscriber_register("sub1", &["news".to_string(), "bad/kw".to_string()])
            .unwrap();
        assert!(matches!(
            svc.subscriber_register("sub1", &[]),
            Err(DfsError::AlreadyRegistered(_))
        ));

        // a file named after the keyword picks up the pending interest
        assert!(svc.create_file("/news", None).await.unwrap());
        assert_eq!(svc.pending_subscribers_of("/news"), 1);
    }

    #[tokio::test]
    async fn test_subscriber_consumption_withdraws_file() {
        let (svc, storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();
        svc.subscriber_register("sub1", &["news".to_string()]).unwrap();
        svc.create_file("/news", None).await.unwrap();
        assert_eq!(svc.pending_subscribers_of("/news"), 1);

        // the read acknowledges consumption; the unlock then withdraws the
        // file from storage and from the namespace
        svc.lock("/news", false, Some("sub1")).await.unwrap();
        assert_eq!(svc.pending_subscribers_of("/news"), 0);
        svc.unlock("/news", false, Some("sub1")).await.unwrap();

        assert!(!svc.has_node("/news"));
        assert!(storage.deletes().contains(&StorageCall::Delete {
            port: S1.1,
            path: "/news".to_string()
        }));
    }

    #[tokio::test]
    async fn test_files_without_subscribers_survive_unlock() {
        let (svc, _storage) = create_test_service();
        register(&svc, S1, &[]).unwrap();
        svc.create_file("/plain", None).await.unwrap();

        svc.lock("/plain", false, None).await.unwrap();
        svc.unlock("/plain", false, None).await.unwrap();
        assert!(svc.has_node("/plain"));
    }
}
