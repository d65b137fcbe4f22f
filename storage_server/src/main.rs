mod http;
mod storage_service;


use crate::storage_service::StorageService;
use dfs_lib::{ApiClient, DfsPath, RegisterRequest};
use log::{error, info, warn};
use serde::Deserialize;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_STORAGE_CONFIG_PATH: &str = "/etc/dfs/storage_server.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StorageConfig {
    #[serde(alias = "ip")]
    storage_ip: String,
    client_port: u16,
    command_port: u16,
    naming_ip: String,
    naming_registration_port: u16,
    #[serde(alias = "root")]
    root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_ip: "127.0.0.1".to_string(),
            client_port: 7000,
            command_port: 7001,
            naming_ip: "127.0.0.1".to_string(),
            naming_registration_port: 8090,
            root_dir: PathBuf::from("/var/dfs/storage"),
        }
    }
}

fn usage() -> String {
    format!(
        "usage: storage_server [--config <path>]\n\
         defaults:\n\
         --config {}",
        DEFAULT_STORAGE_CONFIG_PATH
    )
}

fn parse_args() -> Result<PathBuf, String> {
    let args = env::args().skip(1).collect::<Vec<String>>();
    let mut config_path = PathBuf::from(DEFAULT_STORAGE_CONFIG_PATH);

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Err(usage()),
            "--config" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                config_path = PathBuf::from(value);
            }
            other => {
                return Err(format!("unknown argument: {}\n{}", other, usage()));
            }
        }
        i += 1;
    }

    Ok(config_path)
}

fn load_config(path: &PathBuf) -> StorageConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "config {} is malformed ({}), falling back to defaults",
                    path.display(),
                    e
                );
                StorageConfig::default()
            }
        },
        Err(_) => StorageConfig::default(),
    }
}

/// Announce the local inventory to the naming server and delete every
/// duplicate it reports back: the namespace, not this server, is the
/// source of truth for paths it already knows.
async fn register_with_naming(svc: &StorageService, config: &StorageConfig) -> Result<(), String> {
    let files = DfsPath::list_local(svc.root())
        .map_err(|e| format!("inventory of {} failed: {}", svc.root().display(), e))?;
    let request = RegisterRequest {
        storage_ip: config.storage_ip.clone(),
        client_port: config.client_port,
        command_port: config.command_port,
        files: files.iter().map(|p| p.to_string()).collect(),
    };
    let client = ApiClient::new();
    let duplicates = client
        .register(&config.naming_ip, config.naming_registration_port, &request)
        .await
        .map_err(|e| format!("registration failed: {}", e))?;
    info!(
        "registered with naming server {}:{}: {} files announced, {} duplicates to drop",
        config.naming_ip,
        config.naming_registration_port,
        request.files.len(),
        duplicates.len()
    );
    for path in &duplicates {
        if let Err(e) = svc.delete(path).await {
            warn!("deleting duplicate {} failed: {}", path, e);
        }
    }
    Ok(())
}

async fn run(config: StorageConfig, bind_ip: IpAddr) -> Result<(), String> {
    std::fs::create_dir_all(&config.root_dir)
        .map_err(|e| format!("create root {} failed: {}", config.root_dir.display(), e))?;
    let svc = Arc::new(StorageService::new(&config.root_dir));

    let server = tokio::spawn(http::run(
        svc.clone(),
        bind_ip,
        config.client_port,
        config.command_port,
    ));

    register_with_naming(&svc, &config).await?;

    server.await.map_err(|e| format!("server task failed: {}", e))
}

fn main() {
    env_logger::init();
    let config_path = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };
    let config = load_config(&config_path);
    let bind_ip: IpAddr = match config.storage_ip.parse() {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("invalid storage_ip {}: {}", config.storage_ip, e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("create tokio runtime failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(msg) = runtime.block_on(run(config, bind_ip)) {
        error!("{}", msg);
        std::process::exit(1);
    }
}
