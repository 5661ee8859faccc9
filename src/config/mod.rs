//! Server configuration.

/// Default address the server binds to.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default size of the single read taken from each connection (2 KiB).
///
/// This is the maximum request size: a request whose head does not fit in
/// one read of this many bytes is dropped without a response.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Settings for [`Server::with_config`](crate::server::Server::with_config).
///
/// # Examples
///
/// ```
/// use rspond::config::ServerConfig;
///
/// let config = ServerConfig::default()
///     .addr("0.0.0.0:9000")
///     .read_buffer_size(4096);
/// assert_eq!(config.addr, "0.0.0.0:9000");
/// assert_eq!(config.read_buffer_size, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`.
    pub addr: String,
    /// Bytes read from a connection before parsing.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Loads settings from `RSPOND_ADDR` and `RSPOND_READ_BUFFER`.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let addr = lookup("RSPOND_ADDR")
            .filter(|addr| !addr.trim().is_empty())
            .unwrap_or(defaults.addr);
        let read_buffer_size = lookup("RSPOND_READ_BUFFER")
            .and_then(|size| size.trim().parse::<usize>().ok())
            .filter(|&size| size > 0)
            .unwrap_or(defaults.read_buffer_size);
        Self {
            addr,
            read_buffer_size,
        }
    }

    #[must_use]
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Sets the read size; zero is raised to one byte.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}
