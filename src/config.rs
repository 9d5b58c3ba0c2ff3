// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that trove uses to simplify
//! the process of serialization and deserialization. File I/O and validation
//! are left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Name of the store configuration file at the top-level of a store.
pub const CONFIG_FILE_NAME: &str = "trove.toml";

/// Store configuration layout.
///
/// Every store comes with a configuration file that records where the store
/// lives, and which entries it tracks.
///
/// # General Layout
///
/// The settings section holds the absolute root path of the store. Each
/// tracked entry is then listed as its own `[[entry]]` table.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Settings for the store.
    pub settings: StoreSettings,

    /// Listing of tracked entries.
    #[serde(rename = "entry", default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryRecord>,
}

impl FromStr for StoreConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl StoreConfig {
    /// Serialize into TOML text.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Serialize`] if serialization fails.
    pub fn render(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

impl Display for StoreConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.render()?.as_str())
    }
}

/// Store configuration settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    /// Absolute path to the directory holding entry content.
    pub root_path: PathBuf,
}

/// Persisted form of one tracked entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct EntryRecord {
    /// Unique name of the entry.
    pub name: String,

    /// Templated host path, e.g., `$HOME/.bashrc`.
    pub host_path: String,

    /// Location of entry content relative to the store root.
    pub store_path: PathBuf,

    /// Free-form tags used for filtering.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Locator record layout.
///
/// Small marker kept in the user's home directory that records which store
/// configuration file is currently active.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LocatorRecord {
    /// Absolute path to the active store configuration file.
    pub config_path: PathBuf,
}

impl FromStr for LocatorRecord {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl LocatorRecord {
    /// Serialize into TOML text.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Serialize`] if serialization fails.
    pub fn render(&self) -> Result<String> {
        toml::to_string(self).map_err(ConfigError::Serialize)
    }
}

impl Display for LocatorRecord {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.render()?.as_str())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
