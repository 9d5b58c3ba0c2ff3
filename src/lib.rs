// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep dotfiles in one place, and link them back where they belong.
//!
//! Trove relocates the real content of tracked files and directories into a
//! single directory called the __store__, then toggles their presence at the
//! original __host path__ through symbolic links. The store is plain
//! directory content, so the user is free to put it under version control,
//! but trove itself never runs version control operations.
//!
//! # Entry Lifecycle
//!
//! Each tracked file or directory is an __entry__ with a unique name. An entry
//! is created by `add`, which moves the content into the store and leaves a
//! symlink behind. Afterwards the entry can be packed (link removed, content
//! stays in the store) or deployed (link recreated) at will. Finally, `remove`
//! stops tracking the entry and puts its content back at the host path.
//!
//! # Portability
//!
//! Host paths are persisted in __templated__ form, e.g., `$HOME/.bashrc`, so
//! the same store can be deployed on machines with different home
//! directories. See [`path::PathResolver`].
//!
//! # Layout
//!
//! - [`config`]: serialization layout of persisted files.
//! - [`path`]: path templating.
//! - [`store`]: the persisted entry list.
//! - [`locator`]: find the active store.
//! - [`trove`]: add, remove, deploy, pack, and status operations.

pub mod config;
pub mod locator;
pub mod path;
pub mod store;
pub mod trove;

pub use crate::{
    locator::{init_store, FixedLocator, HomeMarker, Locator},
    path::{PathResolver, SystemTokens, TokenSource},
    store::{Entry, Store},
    trove::{
        deploy::{Action, Selection, SyncReport},
        lifecycle::Selector,
        link::{Linker, SymLinker},
        status::{LinkStatus, StatusReport},
        Trove, TroveError,
    },
};

/// Broad classification of every error trove can report.
///
/// Each module error maps onto one of these through its `kind` method, so
/// callers can react to a category of failure without matching on every
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing path, entry name, or store.
    NotFound,

    /// Name collision, or unexpected content where a managed link belongs.
    Conflict,

    /// Mutually exclusive or missing selectors, malformed names or paths.
    InvalidArgument,

    /// Persisted state failed validation.
    ConfigCorrupt,

    /// Templated path references an unknown token.
    UnresolvedTemplate,

    /// Underlying filesystem operation failed.
    Io,

    /// No locator record could be found.
    NotInitialized,
}
