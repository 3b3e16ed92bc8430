//! Configuration management for tmpdir
//!
//! This module handles loading, parsing, and managing configuration from:
//! 1. Embedded default_config.toml (compile-time defaults)
//! 2. User config at ~/.config/tmpdir/config.toml (or platform-specific location)
//! 3. An explicit file passed with `--config`

use crate::deletion::DeletionMode;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration embedded in binary
const DEFAULT_CONFIG: &str = include_str!("../../default_config.toml");

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shell and working-directory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Interactive shell started when no command is given on a terminal
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_shell_args")]
    pub shell_args: Vec<String>,
    /// Shell used for `--shell` scripts
    #[serde(default = "default_script_shell")]
    pub script_shell: String,
    /// Set `HISTFILE` to empty in the child environment
    #[serde(default = "default_true")]
    pub clear_histfile: bool,
    /// Shown when no command is given and stdin is not a terminal
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Where temporary directories are created (system temp dir when unset)
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_args: default_shell_args(),
            script_shell: default_script_shell(),
            clear_histfile: true,
            prompt: default_prompt(),
            base_dir: None,
        }
    }
}

impl GeneralConfig {
    pub fn base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Deletion defaults and the secure-remove utility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Mode for fresh, empty directories
    #[serde(default = "default_fresh_deletion")]
    pub default_fresh: DeletionMode,
    /// Mode for directories loaded from an archive
    #[serde(default = "default_loaded_deletion")]
    pub default_loaded: DeletionMode,
    #[serde(default = "default_srm_program")]
    pub srm_program: String,
    #[serde(default = "default_srm_args")]
    pub srm_args: Vec<String>,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            default_fresh: default_fresh_deletion(),
            default_loaded: default_loaded_deletion(),
            srm_program: default_srm_program(),
            srm_args: default_srm_args(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (overridden by `TMPDIR_LOG`)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub timestamps: bool,
    /// Show file and line numbers
    #[serde(default)]
    pub file_line: bool,
    /// Also write a daily-rotated log file
    #[serde(default)]
    pub file_output: bool,
    /// Log file directory path
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            timestamps: false,
            file_line: false,
            file_output: false,
            file_path: None,
        }
    }
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_shell_args() -> Vec<String> {
    vec!["--login".to_string()]
}

fn default_script_shell() -> String {
    "/bin/sh".to_string()
}

fn default_prompt() -> String {
    "Press enter to delete directory...".to_string()
}

fn default_fresh_deletion() -> DeletionMode {
    DeletionMode::AttemptSecure
}

fn default_loaded_deletion() -> DeletionMode {
    DeletionMode::NotSecure
}

fn default_srm_program() -> String {
    "srm".to_string()
}

fn default_srm_args() -> Vec<String> {
    vec!["-rfs".to_string()]
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Configuration loading
// ============================================================================

impl AppConfig {
    /// Load configuration with fallback chain:
    /// 1. `explicit` file, if given (errors are fatal)
    /// 2. User config ~/.config/tmpdir/config.toml (errors are logged)
    /// 3. Embedded default_config.toml
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse default config: {}", e))
        })?;

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let explicit_config = Self::load_from_file(path)?;
            tracing::info!("Loaded config from {:?}", path);
            return Ok(explicit_config);
        }

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::load_from_file(&user_config_path) {
                    Ok(user_config) => {
                        config = user_config;
                        tracing::info!("Loaded user config from {:?}", user_config_path);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load user config: {}", e);
                    }
                }
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file. Missing keys take their
    /// built-in defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the user config path (~/.config/tmpdir/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config_dir| config_dir.join("tmpdir").join("config.toml"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            general: GeneralConfig::default(),
            deletion: DeletionConfig::default(),
            logging: LoggingConfig::default(),
        })
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(input: &str) -> ConfigResult<PathBuf> {
    shellexpand::full(input)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::Expand {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

// ============================================================================
// Tests
// ============================================================================
