mod client;
mod path;
mod protocol;

pub use client::*;
pub use path::*;
pub use protocol::*;

use thiserror::Error;

#[macro_use]
extern crate log;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DfsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already registered: {0}")]
    AlreadyRegistered(String),
    #[error("no storage servers are connected: {0}")]
    NoServersAvailable(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("invalid param: {0}")]
    InvalidParam(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("remote error: {0}")]
    RemoteError(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type DfsResult<T> = Result<T, DfsError>;

impl DfsError {
    /// HTTP status carried on the wire for this error.
    pub fn status(&self) -> u16 {
        match self {
            DfsError::BadRequest(_) => 400,
            DfsError::InvalidPath(_) | DfsError::NotFound(_) | DfsError::InvalidParam(_) => 404,
            DfsError::AlreadyRegistered(_)
            | DfsError::NoServersAvailable(_)
            | DfsError::IllegalState(_) => 409,
            DfsError::IoError(_) | DfsError::RemoteError(_) | DfsError::Internal(_) => 500,
        }
    }

    /// Exception tag carried in the `ExceptionReturn` envelope.
    pub fn exception_type(&self) -> &'static str {
        match self {
            DfsError::BadRequest(_) => "Bad Request",
            DfsError::InvalidPath(_) | DfsError::InvalidParam(_) => "IllegalArgumentException",
            DfsError::NotFound(_) => "FileNotFoundException",
            DfsError::AlreadyRegistered(_)
            | DfsError::NoServersAvailable(_)
            | DfsError::IllegalState(_) => "IllegalStateException",
            DfsError::IoError(_) | DfsError::RemoteError(_) | DfsError::Internal(_) => {
                "InternalError"
            }
        }
    }

    /// Rebuild an error from a peer's `ExceptionReturn` envelope.
    pub fn from_remote(exception_type: &str, exception_info: &str) -> Self {
        let info = exception_info.to_string();
        match exception_type {
            "Bad Request" => DfsError::BadRequest(info),
            "IllegalArgumentException" => DfsError::InvalidPath(info),
            "FileNotFoundException" => DfsError::NotFound(info),
            "IllegalStateException" => DfsError::IllegalState(info),
            _ => DfsError::RemoteError(format!("{}: {}", exception_type, info)),
        }
    }
}

impl From<std::io::Error> for DfsError {
    fn from(e: std::io::Error) -> Self {
        DfsError::IoError(e.to_string())
    }
}
