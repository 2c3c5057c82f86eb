// Configuration types for the menu bridge, deserialized from menusys.toml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configuration file name, looked up next to the host binary.
pub const CONFIG_FILE_NAME: &str = "menusys.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse menu bridge config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level config file. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub module: ModuleConfig,
    pub menus: MenusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Path to the native module, relative to the game directory unless absolute.
    pub path: String,
    /// Append the platform's shared-library extension when `path` has none.
    pub append_platform_extension: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            path: "addons/menu_system/bin/menu".to_string(),
            append_platform_extension: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MenusConfig {
    /// Profile used by `create_menu` when the caller names none.
    pub default_profile: String,
    /// Interface version the host publishes the native menu system under.
    pub interface_version: String,
}

impl Default for MenusConfig {
    fn default() -> Self {
        Self {
            default_profile: "default".to_string(),
            interface_version: menusys_ffi::MENU_SYSTEM_INTERFACE_VERSION.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&text)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve the native module path against `game_dir`.
    pub fn library_path(&self, game_dir: impl AsRef<Path>) -> PathBuf {
        let configured = Path::new(&self.module.path);
        let mut path = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            game_dir.as_ref().join(configured)
        };
        if self.module.append_platform_extension && path.extension().is_none() {
            path.set_extension(std::env::consts::DLL_EXTENSION);
        }
        path
    }
}
