//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: compiled defaults are
//! used and the binary logs a warning once tracing is up.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "LITREV_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "LITREV_CONFIG";

/// Environment variable overriding `[ai] api_key`
pub const AI_API_KEY_ENV: &str = "LITREV_AI_API_KEY";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "litrev.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address, e.g. "127.0.0.1:5780"
    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub signup: SignupConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API (without trailing slash)
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    #[serde(default = "default_ai_model")]
    pub model: String,

    /// API key; `LITREV_AI_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// Language translations are produced in
    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            api_key: None,
            target_language: default_target_language(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

/// Sign-up request endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests accepted per client within one window
    #[serde(default = "default_signup_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_signup_window_secs")]
    pub window_secs: u64,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_signup_max_requests(),
            window_secs: default_signup_window_secs(),
        }
    }
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Capacity of the change-event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_target_language() -> String {
    "English".to_string()
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_ai_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_signup_max_requests() -> u32 {
    5
}

fn default_signup_window_secs() -> u64 {
    3600
}

fn default_event_capacity() -> usize {
    1000
}

/// Default bind address when neither CLI, environment nor TOML sets one
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

impl TomlConfig {
    /// API key from the environment, falling back to TOML
    pub fn resolve_ai_api_key(&self) -> Option<String> {
        std::env::var(AI_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.ai
                    .api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
            })
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/litrev (or /var/lib/litrev for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("litrev"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/litrev"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("litrev"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/litrev"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("litrev"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\litrev"))
    } else {
        PathBuf::from("./litrev_data")
    }
}

/// Locate the TOML config file: explicit path, then `LITREV_CONFIG`,
/// then the user config dir, then `/etc/litrev/litrev.toml`
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("litrev").join("litrev.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/litrev/litrev.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Parse a TOML config file (errors on unreadable or malformed files)
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// How [`load_or_default`] arrived at its configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// File named but absent
    Missing(PathBuf),
    /// File present but unreadable or malformed
    Invalid(String),
    /// No file anywhere on the search path
    Defaults,
}

impl ConfigSource {
    /// Log the outcome; call once tracing is initialized
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found - using default configuration",
                path.display()
            ),
            ConfigSource::Invalid(error) => warn!("{} - using default configuration", error),
            ConfigSource::Defaults => info!("No config file found - using default configuration"),
        }
    }
}

/// Load the TOML config with graceful degradation
///
/// Missing or invalid files yield the compiled defaults. The config is read
/// before logging is set up (it carries the log level), so the outcome is
/// returned for the caller to log.
pub fn load_or_default(explicit: Option<&Path>) -> (TomlConfig, ConfigSource) {
    match find_config_file(explicit) {
        Some(path) if path.exists() => match load_toml_config(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (TomlConfig::default(), ConfigSource::Invalid(e.to_string())),
        },
        Some(path) => (TomlConfig::default(), ConfigSource::Missing(path)),
        None => (TomlConfig::default(), ConfigSource::Defaults),
    }
}

/// Root folder resolution (CLI → ENV → TOML → compiled default)
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    toml_config: Option<&'a TomlConfig>,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml_config: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &'a TomlConfig) -> Self {
        self.toml_config = Some(config);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml_config.and_then(|c| c.root_folder.clone()) {
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

impl Default for RootFolderResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
