use crate::DfsError;
use serde::{Deserialize, Serialize};

/// Request bodies and response payloads exchanged between the naming
/// server, the storage servers, and the publisher/subscriber clients.
/// Every endpoint is a JSON POST; failures travel as [`ExceptionReturn`]
/// with a non-2xx status.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
    /// Present on create_file when a publisher wants its bound server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
}

impl PathRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            publisher_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    pub path: String,
    pub exclusive: bool,
    /// Identity of the requester; subscribers send theirs so a read
    /// acknowledges consumption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub storage_ip: String,
    pub client_port: u16,
    pub command_port: u16,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherRegisterRequest {
    pub publisher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberRegisterRequest {
    pub subscriber_id: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationRequest {
    pub path: String,
    pub existed_ip: String,
    pub existed_client_port: u16,
    pub copy_ip: String,
    pub copy_client_port: u16,
    pub copy_command_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub offset: u64,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    pub path: String,
    pub server_ip: String,
    pub server_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanReturn {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesReturn {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeReturn {
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataReturn {
    pub data: String,
}

/// Location of a storage server's client interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_ip: String,
    pub server_port: u16,
}

/// Registration response for publishers and subscribers: the storage
/// server they were assigned to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignedServerReturn {
    pub server_ip: String,
    pub client_port: u16,
    pub command_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionReturn {
    pub exception_type: String,
    pub exception_info: String,
}

impl From<&DfsError> for ExceptionReturn {
    fn from(e: &DfsError) -> Self {
        Self {
            exception_type: e.exception_type().to_string(),
            exception_info: e.to_string(),
        }
    }
}
