use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3002;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: String,
    /// The managed directory
    pub root: PathBuf,
    /// Deadline for each control-line read and each transfer chunk.
    /// `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Whether `upload` may replace an existing file
    pub allow_overwrite: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            root: PathBuf::from("ServerFiles"),
            io_timeout: None,
            allow_overwrite: true,
        }
    }
}
