use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analytics::Window;
use crate::models::Priority;
use crate::timer::DEFAULT_TARGET_MINUTES;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_pomodoro_minutes")]
    pub pomodoro_minutes: u32,
    #[serde(default)]
    pub default_window: Window,
    #[serde(default)]
    pub default_priority: Priority,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_light_theme")]
    pub light_theme: String,
    #[serde(default = "default_dark_theme")]
    pub dark_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_list_up")]
    pub list_up: String,
    #[serde(default = "default_list_down")]
    pub list_down: String,
    #[serde(default = "default_next_window")]
    pub next_window: String,
    #[serde(default = "default_prev_window")]
    pub prev_window: String,
    #[serde(default = "default_toggle_task")]
    pub toggle_task: String,
    #[serde(default = "default_toggle_timer")]
    pub toggle_timer: String,
    #[serde(default = "default_reset_timer")]
    pub reset_timer: String,
    #[serde(default = "default_toggle_dark_mode")]
    pub toggle_dark_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    #[serde(default = "default_accent")]
    pub accent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            pomodoro_minutes: default_pomodoro_minutes(),
            default_window: Window::default(),
            default_priority: Priority::default(),
            key_bindings: KeyBindings::default(),
            light_theme: default_light_theme(),
            dark_theme: default_dark_theme(),
            themes: HashMap::new(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            list_up: default_list_up(),
            list_down: default_list_down(),
            next_window: default_next_window(),
            prev_window: default_prev_window(),
            toggle_task: default_toggle_task(),
            toggle_timer: default_toggle_timer(),
            reset_timer: default_reset_timer(),
            toggle_dark_mode: default_toggle_dark_mode(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            accent: default_accent(),
        }
    }
}

impl Theme {
    /// Preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let mut themes = HashMap::new();

        themes.insert("light".to_string(), Theme {
            fg: "black".to_string(),
            bg: "white".to_string(),
            highlight_bg: "blue".to_string(),
            accent: "magenta".to_string(),
        });

        themes.insert("dark".to_string(), Theme {
            fg: "white".to_string(),
            bg: "black".to_string(),
            highlight_bg: "cyan".to_string(),
            accent: "lightmagenta".to_string(),
        });

        themes
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("taskdash.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/taskdash/taskdash.db".to_string()
    }
}

fn default_pomodoro_minutes() -> u32 {
    DEFAULT_TARGET_MINUTES
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_list_up() -> String {
    "k".to_string()
}

fn default_list_down() -> String {
    "j".to_string()
}

fn default_next_window() -> String {
    "Right".to_string()
}

fn default_prev_window() -> String {
    "Left".to_string()
}

fn default_toggle_task() -> String {
    "Space".to_string()
}

fn default_toggle_timer() -> String {
    "p".to_string()
}

fn default_reset_timer() -> String {
    "r".to_string()
}

fn default_toggle_dark_mode() -> String {
    "Ctrl+d".to_string()
}

fn default_light_theme() -> String {
    "light".to_string()
}

fn default_dark_theme() -> String {
    "dark".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_accent() -> String {
    "magenta".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from the profile's config file, or create default if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        let mut config = Self::load_from_path(&config_path)?;

        // Database path always follows the profile unless the user pointed it elsewhere
        if config.database_path == default_database_path() {
            config.database_path = Self::default_database_path_for_profile(profile);
        }
        Ok(config)
    }

    /// Load configuration from an explicit file, writing defaults if it doesn't exist
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let config: Config = toml::from_str(&contents)?;
            tracing::debug!(path = %config_path.display(), "loaded config");
            Ok(config)
        } else {
            let mut config = Config::default();
            if let Err(err) = config.save_to_path(config_path) {
                tracing::error!(path = %config_path.display(), %err, "failed to save default config");
                return Err(err);
            }
            tracing::info!(path = %config_path.display(), "wrote default config");
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("taskdash.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/taskdash-dev/taskdash.db".to_string(),
                utils::Profile::Prod => "~/.local/share/taskdash/taskdash.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Theme for the current light/dark setting.
    /// User-defined themes shadow presets of the same name.
    pub fn get_active_theme(&self, dark_mode: bool) -> Theme {
        let name = if dark_mode { &self.dark_theme } else { &self.light_theme };
        let fallback = if dark_mode { "dark" } else { "light" };
        let presets = Theme::get_preset_themes();

        self.themes
            .get(name)
            .or_else(|| presets.get(name))
            .or_else(|| presets.get(fallback))
            .cloned()
            .unwrap_or_default()
    }
}
