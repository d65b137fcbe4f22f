mod directory_tree;
mod http;
mod lock_node;
mod naming_service;
mod policy;
mod storage_commands;

#[cfg(test)]
mod naming_service_tests;

use crate::naming_service::NamingService;
use crate::storage_commands::HttpStorageCommands;
use log::error;
use serde::Deserialize;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_NAMING_CONFIG_PATH: &str = "/etc/dfs/naming_server.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct NamingConfig {
    #[serde(alias = "ip", alias = "naming_ip")]
    bind_ip: String,
    service_port: u16,
    registration_port: u16,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".to_string(),
            service_port: 8080,
            registration_port: 8090,
        }
    }
}

fn usage() -> String {
    format!(
        "usage: naming_server [--config <path>]\n\
         defaults:\n\
         --config {}",
        DEFAULT_NAMING_CONFIG_PATH
    )
}

fn parse_args() -> Result<PathBuf, String> {
    let args = env::args().skip(1).collect::<Vec<String>>();
    let mut config_path = PathBuf::from(DEFAULT_NAMING_CONFIG_PATH);

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

fn load_config(path: &PathBuf) -> NamingConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "config {} is malformed ({}), falling back to defaults",
                    path.display(),
                    e
                );
                NamingConfig::default()
            }
        },
        Err(_) => NamingConfig::default(),
    }
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
    let bind_ip: IpAddr = match config.bind_ip.parse() {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("invalid bind_ip {}: {}", config.bind_ip, e);
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

    let service = Arc::new(NamingService::new(Arc::new(HttpStorageCommands::new())));
    runtime.block_on(http::run(
        service,
        bind_ip,
        config.service_port,
        config.registration_port,
    ));
}
