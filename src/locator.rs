// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Locate the active store.
//!
//! Every command except `init` first needs to know which store configuration
//! file applies. By default that answer lives in a small marker file in the
//! user's home directory, `~/.trove`, written by `init` and only ever read
//! afterwards. Other strategies, e.g., an explicit path from the command line,
//! plug in through the [`Locator`] trait.

use crate::{
    config::{LocatorRecord, CONFIG_FILE_NAME},
    path::{home_dir, NoWayHome},
    store::{Store, StoreError},
};

use std::{
    fs::{create_dir_all, read_to_string, write},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Name of the locator record inside the home directory.
pub const MARKER_FILE_NAME: &str = ".trove";

/// Strategy to find the active store configuration file.
pub trait Locator {
    /// Determine absolute path to active store configuration file.
    fn locate(&self) -> Result<PathBuf>;
}

/// Locator record kept in the user's home directory.
#[derive(Debug, Default, Clone)]
pub struct HomeMarker {
    path: Option<PathBuf>,
}

impl HomeMarker {
    /// Use marker file at explicit path instead of the home directory.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Absolute path to the marker file.
    ///
    /// # Errors
    ///
    /// - Return [`LocatorError::NoWayHome`] if home directory is unknown.
    pub fn marker_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(home_dir()?.join(MARKER_FILE_NAME)),
        }
    }

    /// Check if a locator record has been written.
    pub fn exists(&self) -> bool {
        self.marker_path()
            .map(|path| path.symlink_metadata().is_ok())
            .unwrap_or(false)
    }

    /// Point locator record at store configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`LocatorError::Serialize`] if record cannot be serialized.
    /// - Return [`LocatorError::Write`] if marker file cannot be written.
    pub fn record(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let marker_path = self.marker_path()?;
        let record = LocatorRecord {
            config_path: config_path.as_ref().to_path_buf(),
        };

        write(&marker_path, record.render()?).map_err(|err| LocatorError::Write {
            source: err,
            marker_path: marker_path.clone(),
        })?;
        debug!(
            "locator {:?} now points to {:?}",
            marker_path.display(),
            config_path.as_ref().display()
        );

        Ok(())
    }
}

impl Locator for HomeMarker {
    fn locate(&self) -> Result<PathBuf> {
        let marker_path = self.marker_path()?;
        let content = read_to_string(&marker_path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LocatorError::NotInitialized {
                marker_path: marker_path.clone(),
            },
            _ => LocatorError::Read {
                source: err,
                marker_path: marker_path.clone(),
            },
        })?;

        let record = content
            .parse::<LocatorRecord>()
            .map_err(|err| LocatorError::Corrupt {
                marker_path: marker_path.clone(),
                reason: err.to_string(),
            })?;

        if !record.config_path.is_absolute() {
            return Err(LocatorError::Corrupt {
                marker_path,
                reason: format!(
                    "config path {:?} is not absolute",
                    record.config_path.display()
                ),
            });
        }

        Ok(record.config_path)
    }
}

/// Locator pinned to a known configuration file path.
#[derive(Debug, Clone)]
pub struct FixedLocator(PathBuf);

impl FixedLocator {
    /// Construct new fixed locator.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self(config_path.into())
    }
}

impl Locator for FixedLocator {
    fn locate(&self) -> Result<PathBuf> {
        crate::path::normalize(&self.0).map_err(|err| LocatorError::Read {
            source: err,
            marker_path: self.0.clone(),
        })
    }
}

/// Initialize store at target path, and point the locator at it.
///
/// Creates the store directory if missing. A directory that already holds a
/// store configuration file is adopted as is, without touching its entries.
/// Otherwise a fresh configuration with no entries is written. Either way, the
/// locator record is then (re)written to point at the store, which is how an
/// existing locator gets repointed.
///
/// # Errors
///
/// - Return [`LocatorError::Unusable`] if path exists but is not a
///   directory, or cannot be created.
/// - Return [`LocatorError::Store`] if existing store configuration is
///   corrupt, or new configuration cannot be saved.
/// - Return [`LocatorError::Write`] if locator record cannot be written.
#[instrument(skip(path, marker), level = "debug")]
pub fn init_store(path: impl AsRef<Path>, marker: &HomeMarker) -> Result<Store> {
    let path = crate::path::normalize(path.as_ref()).map_err(|err| LocatorError::Unusable {
        source: err,
        path: path.as_ref().to_path_buf(),
    })?;

    if path.exists() && !path.is_dir() {
        return Err(LocatorError::Unusable {
            source: io::Error::other("not a directory"),
            path,
        });
    }

    create_dir_all(&path).map_err(|err| LocatorError::Unusable {
        source: err,
        path: path.clone(),
    })?;
    let root = path.canonicalize().map_err(|err| LocatorError::Unusable {
        source: err,
        path: path.clone(),
    })?;

    let config_path = root.join(CONFIG_FILE_NAME);
    let store = if config_path.exists() {
        let (store, moved) = Store::load_relocated(&config_path)?;
        if moved {
            store.save()?;
            info!("adopt relocated store at {:?}", root.display());
        } else {
            info!("adopt existing store at {:?}", root.display());
        }
        store
    } else {
        let store = Store::new(&root);
        store.save()?;
        info!("initialize new store at {:?}", root.display());
        store
    };

    if marker.exists() {
        info!("repoint locator to {:?}", config_path.display());
    }
    marker.record(&config_path)?;

    Ok(store)
}

/// All possible error types for store location.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// No locator record exists yet.
    #[error("no store initialized, locator {:?} missing", marker_path.display())]
    NotInitialized { marker_path: PathBuf },

    /// Locator record cannot be read.
    #[error("failed to read locator {:?}", marker_path.display())]
    Read {
        #[source]
        source: io::Error,
        marker_path: PathBuf,
    },

    /// Locator record cannot be written.
    #[error("failed to write locator {:?}", marker_path.display())]
    Write {
        #[source]
        source: io::Error,
        marker_path: PathBuf,
    },

    /// Locator record fails validation.
    #[error("corrupt locator {:?}: {reason}", marker_path.display())]
    Corrupt { marker_path: PathBuf, reason: String },

    /// Locator record cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] crate::config::ConfigError),

    /// Path cannot hold a store.
    #[error("cannot use {:?} as store directory", path.display())]
    Unusable {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Store configuration handling fails.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Home directory is unknown.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

impl LocatorError {
    /// Classify error.
    pub fn kind(&self) -> crate::ErrorKind {
        use crate::ErrorKind;

        match self {
            Self::NotInitialized { .. } | Self::NoWayHome(_) => ErrorKind::NotInitialized,
            Self::Read { .. } | Self::Write { .. } | Self::Serialize(_) => ErrorKind::Io,
            Self::Corrupt { .. } => ErrorKind::ConfigCorrupt,
            Self::Unusable { .. } => ErrorKind::InvalidArgument,
            Self::Store(err) => err.kind(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = LocatorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn sealed_home() -> anyhow::Result<PathBuf> {
        let home = std::env::current_dir()?.canonicalize()?.join("home");
        create_dir_all(&home)?;
        std::env::set_var("HOME", &home);
        Ok(home)
    }

    #[sealed_test]
    fn locate_before_init() -> anyhow::Result<()> {
        sealed_home()?;
        let result = HomeMarker::default().locate();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotInitialized);
        Ok(())
    }

    #[sealed_test]
    fn init_fresh_store() -> anyhow::Result<()> {
        let home = sealed_home()?;
        let marker = HomeMarker::default();

        let store = init_store(home.join("dotfiles"), &marker)?;
        assert!(store.is_empty());
        assert_eq!(store.root_path(), home.join("dotfiles"));
        assert_eq!(marker.marker_path()?, home.join(MARKER_FILE_NAME));
        assert_eq!(marker.locate()?, home.join("dotfiles").join(CONFIG_FILE_NAME));
        assert_eq!(Store::load(marker.locate()?)?, store);

        Ok(())
    }

    #[sealed_test]
    fn init_repoints_to_existing_store() -> anyhow::Result<()> {
        let home = sealed_home()?;
        let marker = HomeMarker::default();

        let mut first = init_store(home.join("first"), &marker)?;
        first.insert("bashrc", "$HOME/.bashrc", ["shell"])?;
        first.save()?;
        init_store(home.join("second"), &marker)?;
        assert_eq!(marker.locate()?, home.join("second").join(CONFIG_FILE_NAME));

        let adopted = init_store(home.join("first"), &marker)?;
        assert_eq!(adopted.len(), 1);
        assert_eq!(adopted, first);
        assert_eq!(marker.locate()?, first.config_path());

        Ok(())
    }

    #[sealed_test]
    fn init_rejects_file_path() -> anyhow::Result<()> {
        let home = sealed_home()?;
        write(home.join("plain"), "not a directory")?;

        let result = init_store(home.join("plain"), &HomeMarker::default());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(!HomeMarker::default().exists());

        Ok(())
    }

    #[sealed_test]
    fn locate_rejects_corrupt_marker() -> anyhow::Result<()> {
        let home = sealed_home()?;
        write(home.join(MARKER_FILE_NAME), "config_path = \"relative/trove.toml\"\n")?;

        let result = HomeMarker::default().locate();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConfigCorrupt);

        Ok(())
    }

    #[test]
    fn fixed_locator_is_absolute() -> anyhow::Result<()> {
        let located = FixedLocator::new("trove.toml").locate()?;
        assert!(located.is_absolute());
        assert!(located.ends_with(CONFIG_FILE_NAME));
        Ok(())
    }
}
