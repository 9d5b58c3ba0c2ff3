// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Entry management for a loaded store.
//!
//! A [`Trove`] bundles a loaded [`Store`] together with everything needed to
//! act on it: a [`PathResolver`] to turn templated host paths into real
//! locations, and a [`Linker`] to create and destroy the symlinks that make up
//! a deployment. One trove is built per command invocation, and handed to the
//! operation that command performs.
//!
//! # Entry States
//!
//! Once added, the real content of an entry always lives in the store. What
//! changes is the host path:
//!
//! - __Deployed__: a symlink at the host path points into the store.
//! - __Packed__: nothing at the host path, content stays in the store.
//!
//! Anything else found at the host path belongs to the user, and trove will
//! never overwrite it.
//!
//! # See Also
//!
//! 1. [`lifecycle`]: add and remove entries.
//! 2. [`deploy`]: deploy and pack entries.
//! 3. [`status`]: inspect entries.

pub mod deploy;
pub mod lifecycle;
pub mod link;
pub mod status;
pub mod transfer;

use crate::{
    path::{normalize, PathError, PathResolver, SystemTokens, TokenSource},
    store::{Entry, Store, StoreError},
    trove::link::{Linker, SymLinker},
};

use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::warn;

/// A loaded store ready for entry management.
#[derive(Debug)]
pub struct Trove<L = SymLinker, T = SystemTokens>
where
    L: Linker,
    T: TokenSource,
{
    pub(crate) store: Store,
    pub(crate) resolver: PathResolver<T>,
    pub(crate) linker: L,
}

impl Trove {
    /// Construct new trove over store using the current user environment.
    pub fn open(store: Store) -> Self {
        Self::with_parts(store, PathResolver::default(), SymLinker)
    }
}

impl<L, T> Trove<L, T>
where
    L: Linker,
    T: TokenSource,
{
    /// Construct new trove from its parts.
    pub fn with_parts(store: Store, resolver: PathResolver<T>, linker: L) -> Self {
        Self {
            store,
            resolver,
            linker,
        }
    }

    /// Loaded store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Give back loaded store.
    pub fn into_store(self) -> Store {
        self.store
    }

    /// Literal host path of entry in the current environment.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::Path`] if host path template cannot be resolved.
    /// - Return [`TroveError::SelfReference`] if host path resolves to a
    ///   location inside the store.
    pub fn host_path(&self, entry: &Entry) -> Result<PathBuf> {
        let host_path = self.resolver.resolve(entry.host_path())?;
        if self.store.contains_location(&host_path) {
            return Err(TroveError::SelfReference {
                name: entry.name().to_owned(),
                path: host_path,
            });
        }

        Ok(host_path)
    }

    /// Create symlink at host path pointing to store path, creating missing
    /// parent directories first.
    pub(crate) fn link_into_place(&self, store_path: &Path, host_path: &Path) -> Result<()> {
        if let Some(parent) = host_path.parent() {
            mkdirp::mkdirp(parent).map_err(io_error("create parent directories of", host_path))?;
        }

        self.linker
            .link(store_path, host_path)
            .map_err(io_error("create symlink at", host_path))
    }
}

/// Run compensating action after a failed step.
///
/// Hands back the original error if compensation works, or wraps both if it
/// does not, so the caller learns that manual cleanup is needed.
pub(crate) fn compensate(
    cause: TroveError,
    path: &Path,
    undo: impl FnOnce() -> io::Result<()>,
) -> TroveError {
    match undo() {
        Ok(()) => cause,
        Err(source) => {
            warn!("failed to roll back {:?}: {source}", path.display());
            TroveError::RollbackFailed {
                source,
                path: path.to_path_buf(),
                cause: Box::new(cause),
            }
        }
    }
}

/// Check if two literal paths name the same location, without following a
/// symlink at either path itself.
pub(crate) fn same_location(left: &Path, right: &Path) -> bool {
    left == right
        || matches!(
            (normalize(left), normalize(right)),
            (Ok(left), Ok(right)) if left == right
        )
}

pub(crate) fn io_error<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> TroveError + 'a {
    move |source| TroveError::Io {
        source,
        action,
        path: path.to_path_buf(),
    }
}

/// All possible error types for entry management.
#[derive(Debug, thiserror::Error)]
pub enum TroveError {
    /// No entry tracked under name.
    #[error("no entry named {name:?}")]
    EntryNotFound { name: String },

    /// No entry tracked at host path.
    #[error("no entry tracks host path {:?}", path.display())]
    UntrackedPath { path: PathBuf },

    /// Path to add does not exist.
    #[error("source path {:?} does not exist", path.display())]
    SourceNotFound { path: PathBuf },

    /// Store copy of entry is gone.
    #[error("content of entry {name:?} is missing from store at {:?}", path.display())]
    StoreContentMissing { name: String, path: PathBuf },

    /// Host path holds something other than the managed symlink.
    #[error("host path {:?} of entry {name:?} holds unexpected content", path.display())]
    HostConflict { name: String, path: PathBuf },

    /// Host path of entry resolves inside the store.
    #[error("host path {:?} of entry {name:?} points inside the store", path.display())]
    SelfReference { name: String, path: PathBuf },

    /// Another entry already claims the host path.
    #[error("host path {:?} is already claimed by entry {owner:?}", path.display())]
    HostPathClaimed { path: PathBuf, owner: String },

    /// Store location for entry name is already taken on disk.
    #[error("store path {:?} for entry {name:?} is already occupied", path.display())]
    StoreOccupied { name: String, path: PathBuf },

    /// Path points inside the store.
    #[error("path {:?} lies inside store {:?}", path.display(), root.display())]
    InsideStore { path: PathBuf, root: PathBuf },

    /// Path contains the store itself.
    #[error("path {:?} contains store {:?}", path.display(), root.display())]
    ContainsStore { path: PathBuf, root: PathBuf },

    /// Path cannot be added as an entry.
    #[error("path {:?} cannot be tracked", path.display())]
    InvalidSource { path: PathBuf },

    /// Selectors were combined or left out incorrectly.
    #[error("invalid selection: {0}")]
    InvalidSelector(&'static str),

    /// More than one entry claims the same host path.
    #[error("host path {:?} is claimed by both {first:?} and {second:?}", path.display())]
    AmbiguousHostPath {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// Filesystem operation fails.
    #[error("failed to {action} {:?}", path.display())]
    Io {
        #[source]
        source: io::Error,
        action: &'static str,
        path: PathBuf,
    },

    /// Compensating action after a failure fails too.
    #[error("failed to restore {:?} after error: {cause}", path.display())]
    RollbackFailed {
        #[source]
        source: io::Error,
        path: PathBuf,
        cause: Box<TroveError>,
    },

    /// Store handling fails.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Path templating fails.
    #[error(transparent)]
    Path(#[from] PathError),
}

impl TroveError {
    /// Classify error.
    pub fn kind(&self) -> crate::ErrorKind {
        use crate::ErrorKind;

        match self {
            Self::EntryNotFound { .. }
            | Self::UntrackedPath { .. }
            | Self::SourceNotFound { .. }
            | Self::StoreContentMissing { .. } => ErrorKind::NotFound,
            Self::HostConflict { .. }
            | Self::SelfReference { .. }
            | Self::HostPathClaimed { .. }
            | Self::StoreOccupied { .. } => ErrorKind::Conflict,
            Self::InsideStore { .. }
            | Self::ContainsStore { .. }
            | Self::InvalidSource { .. }
            | Self::InvalidSelector(_) => ErrorKind::InvalidArgument,
            Self::AmbiguousHostPath { .. } => ErrorKind::ConfigCorrupt,
            Self::Io { .. } | Self::RollbackFailed { .. } => ErrorKind::Io,
            Self::Store(err) => err.kind(),
            Self::Path(err) => err.kind(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = TroveError> = std::result::Result<T, E>;
