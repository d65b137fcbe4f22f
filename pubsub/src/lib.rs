mod content;
mod publisher;
mod subscriber;

pub use content::*;
pub use publisher::*;
pub use subscriber::*;

/// Where the naming server's service interface lives.
#[derive(Debug, Clone)]
pub struct NamingLocation {
    pub ip: String,
    pub service_port: u16,
}

impl NamingLocation {
    pub fn new(ip: impl Into<String>, service_port: u16) -> Self {
        Self {
            ip: ip.into(),
            service_port,
        }
    }
}
