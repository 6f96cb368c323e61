//! Bootstrap configuration and root folder resolution
//!
//! Bootstrap settings (where the database lives, which port to bind, how
//! verbose to log) come from the TOML file. Everything that can change at
//! runtime lives in the `settings` table instead (see [`crate::db`]).
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `BANDBOOK_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "BANDBOOK_ROOT_FOLDER";

/// SQLite file name stored inside the root folder
pub const DB_FILE_NAME: &str = "bandbook.db";

/// Default HTTP port for the setlist service
pub const DEFAULT_PORT: u16 = 5790;

/// Bootstrap configuration loaded from TOML
///
/// Cannot change while the service runs.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional, see resolution order above)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from an explicit path or the platform default
    ///
    /// An explicit path that cannot be read is an error. A missing default
    /// file is not: the compiled defaults are used and a warning is logged.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
            })?;
            info!("Loaded configuration from {}", path.display());
            return Self::from_toml_str(&content);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)
            }
            _ => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database file path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DB_FILE_NAME)
}

/// Platform config file location (`~/.config/bandbook/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("bandbook").join("config.toml"));
        if let Some(path) = user_config.filter(|p| p.exists()) {
            return Some(path);
        }
        Some(PathBuf::from("/etc/bandbook/config.toml"))
    } else {
        dirs::config_dir().map(|d| d.join("bandbook").join("config.toml"))
    }
}

/// Config file that [`TomlConfig::load`] reads, if any
///
/// An explicit path is reported only when it exists.
pub fn config_file_in_use(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    }
    .filter(|path| path.exists())
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("bandbook"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/bandbook"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("bandbook"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/bandbook"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("bandbook"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\bandbook"))
    } else {
        PathBuf::from("./bandbook_data")
    }
}
