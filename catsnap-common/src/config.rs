//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (handled by the caller, see [`RootFolderResolver::with_override`])
//! 2. `CATSNAP_ROOT_FOLDER`, then `CATSNAP_ROOT` environment variables
//! 3. `root_folder` key of the module's TOML config file
//! 4. OS-dependent compiled default
//!
//! A missing or unreadable config file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Primary root folder environment variable
pub const ROOT_FOLDER_ENV: &str = "CATSNAP_ROOT_FOLDER";
/// Alternative root folder environment variable
pub const ROOT_ENV: &str = "CATSNAP_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "catsnap.db";
/// Blob directory name inside the root folder
pub const IMAGES_DIR: &str = "images";

/// Compiled-in defaults, used when nothing else is configured
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
    pub worker_count: usize,
    pub queue_capacity: usize,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
            worker_count: 4,
            queue_capacity: 256,
        }
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("catsnap"))
        .unwrap_or_else(|| PathBuf::from("./catsnap_data"))
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// `[server]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Base URL blobs are served under, e.g. `https://cdn.example.com/cats`
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// `[worker]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub worker_count: Option<usize>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

/// Contents of `<config_dir>/catsnap/<module>.toml`
///
/// Every field is optional so partial files (or old files) still parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load the module's config file if there is one
    pub fn load(module_name: &str) -> Result<Option<Self>> {
        let Some(path) = config_file_path(module_name) else {
            debug!("No config directory on this platform");
            return Ok(None);
        };

        if !path.exists() {
            debug!("Config file {} not found", path.display());
            return Ok(None);
        }

        Self::from_file(&path).map(Some)
    }

    /// Load the module's config file, falling back to an empty config
    pub fn load_or_default(module_name: &str) -> Self {
        match Self::load(module_name) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring config file: {}", e);
                Self::default()
            }
        }
    }
}

/// Path of the module's TOML config file
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catsnap").join(format!("{}.toml", module_name)))
}

/// Resolves the root folder for one module
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
        }
    }

    /// Use a command-line value, which beats every other source
    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_override {
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(root_folder) = TomlConfig::load_or_default(&self.module_name).root_folder {
            return root_folder;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives the paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn images_path(&self) -> PathBuf {
        self.root_folder.join(IMAGES_DIR)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create the root folder and the image directory (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.images_path())?;
        Ok(())
    }
}
