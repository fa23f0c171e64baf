//! Relay settings resolved from flags, environment, an optional TOML file,
//! and built-in defaults, in that order of precedence.
//!
//! The file lives at `~/.config/peerlink-relay/config.toml` unless `--config`
//! names another one:
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:9100"
//! max_message_size = 16384
//! ```

use std::path::{Path, PathBuf};

/// Port used when neither flags nor the file pick an address.
const DEFAULT_PORT: u16 = 8080;

/// Errors that can occur when loading relay configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Contents of the TOML file; every key is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerSection,
}

/// The `[server]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_addr: Option<String>,
    max_message_size: Option<usize>,
}

/// Command-line flags, each also settable through the named variable.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "PeerLink signaling relay server")]
pub struct RelayCliArgs {
    /// Full socket address to listen on.
    #[arg(short, long, env = "PEERLINK_ADDR")]
    pub bind: Option<String>,

    /// Port to listen on all interfaces; ignored when `--bind` is given.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Config file to read instead of the default location.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest WebSocket message accepted from a peer, in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "PEERLINK_LOG")]
    pub log_level: String,
}

impl RelayCliArgs {
    /// Address picked on the command line, if any; `--bind` beats `--port`.
    fn bind_addr(&self) -> Option<String> {
        self.bind
            .clone()
            .or_else(|| self.port.map(|port| format!("0.0.0.0:{port}")))
    }
}

/// Settings the relay runs with.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Largest WebSocket message accepted from a peer, in bytes.
    pub max_message_size: usize,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_message_size: 64 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Reads the config file and layers the flags over it.
    ///
    /// A missing file at the default location counts as empty; a missing
    /// file named by `--config` is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &RelayCliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: cli
                .bind_addr()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_message_size: cli
                .max_message_size
                .or(file.server.max_message_size)
                .unwrap_or(defaults.max_message_size),
            log_level: cli.log_level.clone(),
        }
    }
}

/// `~/.config/peerlink-relay/config.toml`, when the platform has a config dir.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("peerlink-relay").join("config.toml"))
}

fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(ConfigFile::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ConfigFile::default())
        }
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
