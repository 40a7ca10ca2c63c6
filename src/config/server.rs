use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Largest accepted request body, in bytes.
    pub max_upload_size: usize,
    /// Secret keying the identifier codec. Must be set before serving;
    /// changing it invalidates every previously issued token.
    pub secret_key: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("armory.db")
    }

    /// Staging area for in-flight uploads.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    /// Permanent content-addressed bundle store.
    #[must_use]
    pub fn bundle_dir(&self) -> PathBuf {
        self.data_dir.join("bundles")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            max_upload_size: 512 * 1024 * 1024,
            secret_key: String::new(),
        }
    }
}
