//! Configuration for the area window manager
//!
//! Loads configuration from TOML file at `~/.config/area/wm.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::client_flags::FocusPolicy;
use crate::wm::keyboard::{KeyboardAction, default_bindings};
use crate::wm::placement::PlacementPolicy;
use crate::wm::rules::Rule;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspaces: WorkspacesConfig,
    pub focus: FocusConfig,
    pub decorations: DecorationsConfig,
    pub placement: PlacementConfig,
    pub move_resize: MoveResizeConfig,
    pub terminate: TerminateConfig,
    pub keybindings: KeybindingsConfig,
    pub rules: Vec<Rule>,
}

impl Config {
    /// Load configuration from the default location, writing defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {:#}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("area");

        Ok(config_dir.join("wm.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Virtual desktops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspacesConfig {
    pub count: u32,
    /// Missing names default to "Workspace N"
    pub names: Vec<String>,
}

impl Default for WorkspacesConfig {
    fn default() -> Self {
        Self {
            count: 4,
            names: Vec::new(),
        }
    }
}

/// Focus behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Policy for clients no hint or rule says anything about
    pub policy: FocusPolicy,
    /// Raise a client when it is clicked
    pub raise_on_click: bool,
    /// Raise a client whenever it gains focus
    pub raise_on_focus: bool,
    /// Newly mapped clients take focus
    pub focus_new: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            policy: FocusPolicy::ClickToFocus,
            raise_on_click: true,
            raise_on_focus: false,
            focus_new: true,
        }
    }
}

/// Window decoration geometry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationsConfig {
    /// Titlebar height in pixels
    pub titlebar_height: u32,
    /// Whether clients get a titlebar unless a hint or rule says otherwise
    pub titlebar: bool,
}

impl Default for DecorationsConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 24,
            titlebar: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub policy: PlacementPolicy,
}

/// Interactive move/resize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveResizeConfig {
    /// Pixels per arrow key press
    pub keyboard_step: i32,
    /// Perpendicular drift that turns a cardinal resize into a diagonal one
    pub direction_threshold: i32,
}

impl Default for MoveResizeConfig {
    fn default() -> Self {
        Self {
            keyboard_step: 10,
            direction_threshold: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminateConfig {
    /// Grace period between WM_DELETE_WINDOW and a forced kill
    pub patience_ms: u64,
}

impl Default for TerminateConfig {
    fn default() -> Self {
        Self { patience_ms: 5000 }
    }
}

/// Keyboard shortcuts: combo string ("Alt+Shift+Tab") to action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeybindingsConfig(pub HashMap<String, KeyboardAction>);

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self(default_bindings())
    }
}
