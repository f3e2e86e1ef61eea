//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never prevents startup; it is logged and
//! the remaining tiers apply.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Environment variable naming the root folder
pub const ENV_ROOT_FOLDER: &str = "SCORM_ROOT_FOLDER";
/// Environment variable naming the HTTP bind address
pub const ENV_BIND_ADDRESS: &str = "SCORM_BIND_ADDRESS";
/// Environment variable naming the HTTP port
pub const ENV_PORT: &str = "SCORM_PORT";
/// Environment variable naming the grade publishing endpoint
pub const ENV_GRADE_ENDPOINT: &str = "SCORM_GRADE_ENDPOINT";
/// Environment variable naming the log level
pub const ENV_LOG_LEVEL: &str = "SCORM_LOG_LEVEL";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "scorm.db";
/// Extracted package directory inside the root folder
pub const PACKAGES_DIR: &str = "packages";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    /// Host endpoint receiving published grades; grades are only logged when unset
    pub grade_endpoint: Option<String>,
    /// Public URL prefix for extracted package files
    pub content_base_url: Option<String>,
    /// Upper bound on retrying a locked database write
    pub lock_wait_ms: Option<u64>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load the config file if one exists, falling back to empty config
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        if !path.exists() {
            if explicit.is_some() {
                warn!("Config file {} not found, using defaults", path.display());
            }
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Locate the platform config file
///
/// Tries the user config directory first, then `/etc/scorm-rt/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("scorm-rt").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    let system_config = PathBuf::from("/etc/scorm-rt/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }
    None
}

/// Compiled fallbacks for every setting
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub content_base_url: String,
    pub lock_wait_ms: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("scorm-rt"))
            .unwrap_or_else(|| PathBuf::from("./scorm_data"));
        Self {
            root_folder,
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
            log_level: "info".to_string(),
            content_base_url: "/content".to_string(),
            lock_wait_ms: 5000,
        }
    }
}

/// Root folder resolution across all four tiers
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_root: toml.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Some(path) = env_non_empty(ENV_ROOT_FOLDER) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.toml_root {
            return path.clone();
        }
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first start
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root folder and package directory; safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.packages_dir())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root_folder.join(PACKAGES_DIR)
    }
}

/// Command-line values; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub grade_endpoint: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub grade_endpoint: Option<String>,
    pub content_base_url: String,
    pub lock_wait_ms: u64,
}

impl ServiceConfig {
    pub fn resolve(cli: ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = RootFolderResolver::new(cli.root_folder, toml).resolve();

        let bind_address = cli
            .bind_address
            .or_else(|| env_non_empty(ENV_BIND_ADDRESS))
            .or_else(|| toml.bind_address.clone())
            .unwrap_or(defaults.bind_address);

        let port = match cli.port {
            Some(port) => port,
            None => match env_non_empty(ENV_PORT) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("{} is not a valid port: {}", ENV_PORT, raw)))?,
                None => toml.port.unwrap_or(defaults.port),
            },
        };

        let log_level = cli
            .log_level
            .or_else(|| env_non_empty(ENV_LOG_LEVEL))
            .or_else(|| toml.log_level.clone())
            .unwrap_or(defaults.log_level);

        let grade_endpoint = cli
            .grade_endpoint
            .or_else(|| env_non_empty(ENV_GRADE_ENDPOINT))
            .or_else(|| toml.grade_endpoint.clone());

        let content_base_url = toml
            .content_base_url
            .clone()
            .unwrap_or(defaults.content_base_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            root_folder,
            bind_address,
            port,
            log_level,
            grade_endpoint,
            content_base_url,
            lock_wait_ms: toml.lock_wait_ms.unwrap_or(defaults.lock_wait_ms),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
