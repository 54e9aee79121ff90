use peerfs_core::{PeerfsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Root of the content store.
    pub data_dir: PathBuf,
    /// Metadata db; defaults to `{data_dir}/.peerfs/meta.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("PEERFS"))
            .build()
            .map_err(|e| PeerfsError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PeerfsError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(PeerfsError::Config("bind_addr cannot be empty".to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(PeerfsError::Config("data_dir cannot be empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(PeerfsError::Config(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Default tracing filter when RUST_LOG is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "peerfs=debug,peerfs_core=debug,tower_http=debug"
        } else {
            "peerfs=info,peerfs_core=info"
        }
    }
}
