// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Store management and manipulation.
//!
//! Trove groups all tracked content together into one place called the
//! __store__. The store houses the real content of every entry that the user
//! wants to manage.
//!
//! # Store Layout
//!
//! The store can generally be placed anywhere on the user's file system.
//! The store configuration file always sits at the top-level of the store as
//! `trove.toml`. Each entry is given its own unique name, and the name of an
//! entry is the name of the file or directory that holds its content inside
//! the store. So, `<store>/bashrc` means that the store contains an entry
//! named "bashrc".
//!
//! Trove only evaluates the top-level of the store. Thus, entries cannot be
//! nested inside one another.
//!
//! # Persistence
//!
//! Saving the store always goes through a temporary file in the same
//! directory as the configuration file, which is then renamed over the old
//! configuration. A crash mid-write never leaves a truncated configuration
//! behind for the next load.

use crate::{
    config::{EntryRecord, StoreConfig, StoreSettings, CONFIG_FILE_NAME},
    path::normalize,
};

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::read_to_string,
    io::{self, Write},
    path::{Component, Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// One tracked file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    host_path: String,
    store_path: PathBuf,
    categories: BTreeSet<String>,
}

impl Entry {
    /// Unique name of entry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Templated host path of entry.
    pub fn host_path(&self) -> &str {
        &self.host_path
    }

    /// Absolute location of entry content inside store.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Categories entry is tagged with.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    /// Check if entry is tagged with exact category.
    pub fn has_category(&self, category: impl AsRef<str>) -> bool {
        self.categories.contains(category.as_ref())
    }
}

/// The store itself.
///
/// # Invariants
///
/// - Entry names are unique.
/// - Entry store path is always `root_path/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    root_path: PathBuf,
    config_path: PathBuf,
    entries: BTreeMap<String, Entry>,
}

impl Store {
    /// Construct new empty store rooted at target path.
    ///
    /// Nothing is written to disk until [`Store::save`] is called.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let root_path = root_path.into();
        let config_path = root_path.join(CONFIG_FILE_NAME);

        Self {
            root_path,
            config_path,
            entries: BTreeMap::new(),
        }
    }

    /// Load store from configuration file.
    ///
    /// Validates configuration before handing out the store. Nothing is ever
    /// silently repaired.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if configuration file is missing.
    /// - Return [`StoreError::Read`] if configuration file cannot be read.
    /// - Return [`StoreError::Corrupt`] if configuration fails validation, or
    ///   the store was moved away from its recorded root path.
    #[instrument(skip(config_path), level = "debug")]
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        debug!("load store config {:?}", config_path.display());
        let config = read_config(config_path)?;

        if !same_location(&config.settings.root_path, config_dir(config_path)) {
            return Err(corrupt(
                config_path,
                format!(
                    "store moved away from recorded root {:?}, run init again to adopt it",
                    config.settings.root_path.display()
                ),
            ));
        }

        Self::from_config(config_path, config)
    }

    /// Load store from configuration file, adopting its current location.
    ///
    /// Like [`Store::load`], but a store that was moved or copied to another
    /// directory is repointed at the directory holding the configuration file.
    /// Returns whether the root path changed.
    ///
    /// # Errors
    ///
    /// - Same as [`Store::load`], minus the moved store check.
    #[instrument(skip(config_path), level = "debug")]
    pub fn load_relocated(config_path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let config_path = config_path.as_ref();
        let mut config = read_config(config_path)?;
        let location = config_dir(config_path).to_path_buf();
        let moved = !same_location(&config.settings.root_path, &location);
        if moved {
            debug!(
                "adopt store at {:?}, previously {:?}",
                location.display(),
                config.settings.root_path.display()
            );
            config.settings.root_path = location;
        }

        Ok((Self::from_config(config_path, config)?, moved))
    }

    fn from_config(config_path: &Path, config: StoreConfig) -> Result<Self> {
        let root_path = config.settings.root_path;
        if !root_path.is_absolute() {
            return Err(corrupt(
                config_path,
                format!("root path {:?} is not absolute", root_path.display()),
            ));
        }

        let mut store = Self {
            root_path,
            config_path: config_path.to_path_buf(),
            entries: BTreeMap::new(),
        };

        for record in config.entries {
            if record.store_path != Path::new(&record.name) {
                return Err(corrupt(
                    config_path,
                    format!(
                        "entry {:?} has store path {:?}, expected {:?}",
                        record.name,
                        record.store_path.display(),
                        record.name
                    ),
                ));
            }

            // INVARIANT: Categories in a file are never rewritten on load.
            if let Some(category) = record
                .categories
                .iter()
                .find(|category| category.trim() != category.as_str())
            {
                return Err(corrupt(
                    config_path,
                    format!(
                        "entry {:?} has padded category {category:?}",
                        record.name
                    ),
                ));
            }

            // INVARIANT: Duplicate categories in a file are not silently merged.
            let unique = record.categories.iter().collect::<BTreeSet<_>>();
            if unique.len() != record.categories.len() {
                return Err(corrupt(
                    config_path,
                    format!("entry {:?} lists a category twice", record.name),
                ));
            }

            let literal = !record.host_path.contains('$') && !record.host_path.starts_with('~');
            if literal && store.contains_location(&record.host_path) {
                return Err(corrupt(
                    config_path,
                    format!(
                        "entry {:?} has host path {:?} inside the store",
                        record.name, record.host_path
                    ),
                ));
            }

            store
                .insert(record.name, record.host_path, record.categories)
                .map_err(|err| corrupt(config_path, err.to_string()))?;
        }

        Ok(store)
    }

    /// Persist store to its configuration file atomically.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Serialize`] if configuration cannot be serialized.
    /// - Return [`StoreError::Save`] if configuration cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn save(&self) -> Result<()> {
        let content = self.to_config().render()?;
        let save_err = |source: io::Error| StoreError::Save {
            source,
            config_path: self.config_path.clone(),
        };

        let mut temp = NamedTempFile::new_in(config_dir(&self.config_path)).map_err(save_err)?;
        temp.write_all(content.as_bytes()).map_err(save_err)?;
        temp.as_file().sync_all().map_err(save_err)?;
        temp.persist(&self.config_path)
            .map_err(|err| save_err(err.error))?;
        debug!("saved store config {:?}", self.config_path.display());

        Ok(())
    }

    /// Absolute path to store root.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Absolute path to store configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Location of content for entry name.
    pub fn store_path(&self, name: impl AsRef<str>) -> PathBuf {
        self.root_path.join(name.as_ref())
    }

    /// Iterate through entries ordered by name.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Lookup entry by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&Entry> {
        self.entries.get(name.as_ref())
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if store tracks nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if path lives inside the store, or is the store itself.
    pub fn contains_path(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if path.starts_with(&self.root_path) {
            return true;
        }

        match (path.canonicalize(), self.root_path.canonicalize()) {
            (Ok(path), Ok(root)) => path.starts_with(root),
            _ => false,
        }
    }

    /// Check if path lies inside store without following a symlink at path.
    ///
    /// Unlike [`Store::contains_path`], a host path holding a deployed link
    /// into the store does not count, only a location that is itself inside
    /// the store does.
    pub fn contains_location(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if path.starts_with(&self.root_path) {
            return true;
        }

        match (normalize(path), self.root_path.canonicalize()) {
            (Ok(path), Ok(root)) => path.starts_with(root),
            _ => false,
        }
    }

    /// Track new entry.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is not a plain file name.
    /// - Return [`StoreError::InvalidCategory`] if a category is blank.
    /// - Return [`StoreError::DuplicateEntry`] if name is already tracked.
    pub(crate) fn insert(
        &mut self,
        name: impl Into<String>,
        host_path: impl Into<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<&Entry> {
        let name = name.into();
        validate_name(&name)?;

        let host_path = host_path.into();
        if host_path.trim().is_empty() {
            return Err(StoreError::EmptyHostPath { name });
        }

        let mut set = BTreeSet::new();
        for category in categories {
            let category = category.into();
            let trimmed = category.trim();
            if trimmed.is_empty() {
                return Err(StoreError::InvalidCategory { name, category });
            }
            set.insert(trimmed.to_owned());
        }

        if self.entries.contains_key(&name) {
            return Err(StoreError::DuplicateEntry { name });
        }

        let entry = Entry {
            store_path: self.store_path(&name),
            name: name.clone(),
            host_path,
            categories: set,
        };

        Ok(self.entries.entry(name).or_insert(entry))
    }

    /// Stop tracking entry.
    pub(crate) fn remove(&mut self, name: impl AsRef<str>) -> Option<Entry> {
        self.entries.remove(name.as_ref())
    }

    /// Track previously removed entry again.
    pub(crate) fn restore(&mut self, entry: Entry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    fn to_config(&self) -> StoreConfig {
        StoreConfig {
            settings: StoreSettings {
                root_path: self.root_path.clone(),
            },
            entries: self
                .entries
                .values()
                .map(|entry| EntryRecord {
                    name: entry.name.clone(),
                    host_path: entry.host_path.clone(),
                    store_path: PathBuf::from(&entry.name),
                    categories: entry.categories.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

/// Check that name can be used as entry name.
///
/// Entry names become file names at the top-level of the store, so they must
/// be a single normal path component, and must not shadow the store
/// configuration file.
///
/// # Errors
///
/// - Return [`StoreError::InvalidName`] if name is unusable.
pub fn validate_name(name: impl AsRef<str>) -> Result<()> {
    let name = name.as_ref();
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name == CONFIG_FILE_NAME {
        Some("name is reserved for the store configuration file")
    } else {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => None,
            _ => Some("name must be a single plain file name"),
        }
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

fn read_config(config_path: &Path) -> Result<StoreConfig> {
    let content = read_to_string(config_path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound {
            config_path: config_path.to_path_buf(),
        },
        _ => StoreError::Read {
            source: err,
            config_path: config_path.to_path_buf(),
        },
    })?;

    content
        .parse::<StoreConfig>()
        .map_err(|err| corrupt(config_path, err.to_string()))
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn same_location(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }

    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn corrupt(config_path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        config_path: config_path.to_path_buf(),
        reason: reason.into(),
    }
}

/// All possible error types for store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store configuration file does not exist.
    #[error("no store configuration at {:?}", config_path.display())]
    NotFound { config_path: PathBuf },

    /// Store configuration file cannot be read.
    #[error("failed to read store configuration at {:?}", config_path.display())]
    Read {
        #[source]
        source: io::Error,
        config_path: PathBuf,
    },

    /// Store configuration fails validation.
    #[error("corrupt store configuration at {:?}: {reason}", config_path.display())]
    Corrupt { config_path: PathBuf, reason: String },

    /// Store configuration cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] crate::config::ConfigError),

    /// Store configuration cannot be written.
    #[error("failed to save store configuration at {:?}", config_path.display())]
    Save {
        #[source]
        source: io::Error,
        config_path: PathBuf,
    },

    /// Entry name is unusable.
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Entry category is blank.
    #[error("entry {name:?} has invalid category {category:?}")]
    InvalidCategory { name: String, category: String },

    /// Entry host path is blank.
    #[error("entry {name:?} has an empty host path")]
    EmptyHostPath { name: String },

    /// Entry name already tracked.
    #[error("entry {name:?} already exists")]
    DuplicateEntry { name: String },
}

impl StoreError {
    /// Classify error.
    pub fn kind(&self) -> crate::ErrorKind {
        use crate::ErrorKind;

        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Corrupt { .. } => ErrorKind::ConfigCorrupt,
            Self::Read { .. } | Self::Save { .. } | Self::Serialize(_) => ErrorKind::Io,
            Self::InvalidName { .. } | Self::InvalidCategory { .. } | Self::EmptyHostPath { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::DuplicateEntry { .. } => ErrorKind::Conflict,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use indoc::{formatdoc, indoc};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::{read_dir, write};

    fn write_config(root: &Path, body: &str) -> anyhow::Result<PathBuf> {
        let config_path = root.join(CONFIG_FILE_NAME);
        let content = formatdoc! {r#"
            [settings]
            root_path = "{}"

            {body}
        "#, root.display()};
        write(&config_path, content)?;
        Ok(config_path)
    }

    #[test]
    fn save_then_load_store() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let mut store = Store::new(root.path());
        store.insert("bashrc", "$HOME/.bashrc", ["shell"])?;
        store.insert("nvim", "$XDG_CONFIG_HOME/nvim", ["editor", "shell"])?;
        store.save()?;

        let loaded = Store::load(root.path().join(CONFIG_FILE_NAME))?;
        assert_eq!(loaded, store);

        let nvim = loaded.get("nvim").unwrap();
        assert_eq!(nvim.store_path(), root.path().join("nvim"));
        assert_eq!(nvim.categories().collect::<Vec<_>>(), vec!["editor", "shell"]);

        Ok(())
    }

    #[test]
    fn save_replaces_config_without_leftovers() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let mut store = Store::new(root.path());
        store.save()?;
        store.insert("bashrc", "$HOME/.bashrc", ["shell"])?;
        store.save()?;

        let names = read_dir(root.path())?
            .map(|entry| entry.map(|entry| entry.file_name()))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(names, vec![std::ffi::OsString::from(CONFIG_FILE_NAME)]);
        assert_eq!(Store::load(store.config_path())?.len(), 1);

        Ok(())
    }

    #[test]
    fn load_missing_config() {
        let result = Store::load("/definitely/not/here/trove.toml");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bashrc"
            store_path = "bashrc"

            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bash_profile"
            store_path = "bashrc"
        "#};
        "duplicate names"
    )]
    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bashrc"
            store_path = "shell/bashrc"
        "#};
        "inconsistent store path"
    )]
    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bashrc"
            store_path = "bashrc"
            categories = ["shell", "  "]
        "#};
        "blank category"
    )]
    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bashrc"
            store_path = "bashrc"
            categories = ["shell", "shell"]
        "#};
        "repeated category"
    )]
    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "../escape"
            host_path = "$HOME/.bashrc"
            store_path = "../escape"
        "#};
        "name escapes store"
    )]
    #[test_case(
        indoc! {r#"
            [[entry]]
            name = "bashrc"
            host_path = "$HOME/.bashrc"
            store_path = "bashrc"
            categories = [" shell"]
        "#};
        "padded category"
    )]
    #[test_case("this is not toml"; "garbage")]
    #[test]
    fn load_rejects_corrupt_config(body: &str) {
        let root = tempfile::tempdir().unwrap();
        let config_path = write_config(root.path(), body).unwrap();

        let result = Store::load(config_path);
        pretty_assertions::assert_eq!(result.unwrap_err().kind(), ErrorKind::ConfigCorrupt);
    }

    #[test]
    fn load_rejects_moved_store() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let config_path = root.path().join(CONFIG_FILE_NAME);
        write(
            &config_path,
            indoc! {r#"
                [settings]
                root_path = "/somewhere/else"
            "#},
        )?;

        assert_eq!(Store::load(&config_path).unwrap_err().kind(), ErrorKind::ConfigCorrupt);

        let (store, moved) = Store::load_relocated(&config_path)?;
        assert!(moved);
        assert_eq!(store.root_path(), root.path());

        Ok(())
    }

    #[test_case("", ErrorKind::InvalidArgument; "empty name")]
    #[test_case("a/b", ErrorKind::InvalidArgument; "nested name")]
    #[test_case("..", ErrorKind::InvalidArgument; "parent name")]
    #[test_case(CONFIG_FILE_NAME, ErrorKind::InvalidArgument; "config name")]
    #[test_case("bashrc", ErrorKind::Conflict; "taken name")]
    #[test]
    fn insert_rejects_bad_names(name: &str, kind: ErrorKind) {
        let mut store = Store::new("/home/blah/dotfiles");
        store.insert("bashrc", "$HOME/.bashrc", ["shell"]).unwrap();

        let result = store.insert(name, "$HOME/.other", Vec::<String>::new());
        pretty_assertions::assert_eq!(result.unwrap_err().kind(), kind);
        pretty_assertions::assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_rejects_literal_host_path_inside_store() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let body = formatdoc! {r#"
            [[entry]]
            name = "a"
            host_path = "{}"
            store_path = "a"
        "#, root.path().join("b").display()};
        let config_path = write_config(root.path(), &body)?;

        let result = Store::load(config_path);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConfigCorrupt);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn contains_location_ignores_deployed_links() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().canonicalize()?.join("store");
        std::fs::create_dir_all(&root)?;
        write(root.join("bashrc"), "alias ll='ls -l'\n")?;
        let link = temp.path().join(".bashrc");
        std::os::unix::fs::symlink(root.join("bashrc"), &link)?;

        let store = Store::new(&root);
        assert!(store.contains_path(&link));
        assert!(!store.contains_location(&link));
        assert!(store.contains_location(root.join("other")));

        Ok(())
    }

    #[test]
    fn contains_path_inside_store() {
        let store = Store::new("/home/blah/dotfiles");
        assert!(store.contains_path("/home/blah/dotfiles"));
        assert!(store.contains_path("/home/blah/dotfiles/bashrc"));
        assert!(!store.contains_path("/home/blah/dotfiles-old"));
        assert!(!store.contains_path("/home/blah/.bashrc"));
    }
}
