// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, and convert host paths to and from their portable
//! __templated__ form.
//!
//! # Templated Paths
//!
//! A templated path replaces a well known prefix of a literal path with a
//! token, e.g., `/home/awkless/.bashrc` becomes `$HOME/.bashrc`. The store
//! only ever persists templated host paths, so the same store can be deployed
//! on another machine whose home directory lives somewhere else. Token values
//! are looked up every time a templated path is resolved, never cached.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

/// Tokens that may appear in a templated path.
pub const KNOWN_TOKENS: [&str; 2] = ["HOME", "XDG_CONFIG_HOME"];

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf, NoWayHome> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Make path absolute relative to current working directory.
///
/// Parent directory is canonicalized if it exists, but the final component is
/// left alone such that a symlink at the given path is not followed.
///
/// # Errors
///
/// - Return [`io::Error`] if current working directory cannot be determined.
pub fn normalize(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = std::path::absolute(path.as_ref())?;
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(path),
        },
        _ => Ok(path),
    }
}

/// Source of token values for templated paths.
pub trait TokenSource {
    /// Current value of token, if it can be determined.
    fn lookup(&self, token: &str) -> Option<PathBuf>;
}

/// Token values taken from the current user environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTokens;

impl TokenSource for SystemTokens {
    fn lookup(&self, token: &str) -> Option<PathBuf> {
        match token {
            "HOME" => dirs::home_dir(),
            "XDG_CONFIG_HOME" => dirs::config_dir(),
            _ => None,
        }
    }
}

impl TokenSource for HashMap<String, PathBuf> {
    fn lookup(&self, token: &str) -> Option<PathBuf> {
        self.get(token).cloned()
    }
}

/// Bidirectional mapping between literal and templated paths.
#[derive(Debug, Default, Clone)]
pub struct PathResolver<T = SystemTokens>
where
    T: TokenSource,
{
    tokens: T,
}

impl<T> PathResolver<T>
where
    T: TokenSource,
{
    /// Construct new path resolver over given token source.
    pub fn new(tokens: T) -> Self {
        Self { tokens }
    }

    /// Convert literal path into templated form.
    ///
    /// Replaces the longest known token value that prefixes the path. Paths
    /// that no token value prefixes are returned verbatim.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::NotAbsolute`] if path is relative.
    /// - Return [`PathError::Unrepresentable`] if path is not valid UTF-8,
    ///   or would be mistaken for a template itself.
    pub fn templatize(&self, literal: impl AsRef<Path>) -> Result<String> {
        let literal = literal.as_ref();
        if !literal.is_absolute() {
            return Err(PathError::NotAbsolute {
                path: literal.into(),
            });
        }

        // INVARIANT: Literal text must never expand into something else.
        let text = literal
            .to_str()
            .filter(|text| !text.contains('$') && !text.starts_with('~'))
            .ok_or_else(|| PathError::Unrepresentable {
                path: literal.into(),
            })?;

        // INVARIANT: Token values behind symlinks match in canonical form too.
        let best = KNOWN_TOKENS
            .iter()
            .filter_map(|token| self.tokens.lookup(token).map(|value| (*token, value)))
            .filter(|(_, value)| value.is_absolute())
            .flat_map(|(token, value)| {
                let canonical = value.canonicalize().ok().filter(|real| *real != value);
                std::iter::once((token, value)).chain(canonical.map(|real| (token, real)))
            })
            .filter_map(|(token, value)| {
                literal
                    .strip_prefix(&value)
                    .ok()
                    .map(|rest| (token, value.components().count(), rest.to_path_buf()))
            })
            .max_by_key(|(_, depth, _)| *depth);

        let Some((token, _, rest)) = best else {
            return Ok(text.to_owned());
        };

        if rest.as_os_str().is_empty() {
            Ok(format!("${token}"))
        } else {
            Ok(format!("${token}/{}", rest.display()))
        }
    }

    /// Convert templated path into literal path for current environment.
    ///
    /// Accepts `$TOKEN`, `${TOKEN}`, and a leading `~` for the home
    /// directory.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::Unresolved`] if template references an unknown
    ///   token, or a token whose value cannot be determined.
    /// - Return [`PathError::NotAbsolute`] if resolved path is relative.
    pub fn resolve(&self, template: impl AsRef<str>) -> Result<PathBuf> {
        let template = template.as_ref();
        let expanded = shellexpand::full_with_context(
            template,
            || {
                self.tokens
                    .lookup("HOME")
                    .map(|home| home.to_string_lossy().into_owned())
            },
            |token| self.lookup_token(token),
        )
        .map_err(|err| PathError::Unresolved {
            template: template.into(),
            token: err.var_name,
        })?;

        // INVARIANT: Tilde is left alone when home directory is unknown.
        if expanded.starts_with('~') {
            return Err(PathError::Unresolved {
                template: template.into(),
                token: "~".into(),
            });
        }

        let path = PathBuf::from(expanded.into_owned());
        if !path.is_absolute() {
            return Err(PathError::NotAbsolute { path });
        }

        Ok(path)
    }

    fn lookup_token(&self, token: &str) -> std::result::Result<Option<String>, UnknownToken> {
        if !KNOWN_TOKENS.contains(&token) {
            return Err(UnknownToken);
        }

        self.tokens
            .lookup(token)
            .map(|value| Some(value.to_string_lossy().into_owned()))
            .ok_or(UnknownToken)
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

#[derive(Clone, Copy, Debug)]
struct UnknownToken;

/// Path templating error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PathError {
    /// Templated path references token that has no value.
    #[error("cannot resolve token {token:?} in templated path {template:?}")]
    Unresolved { template: String, token: String },

    /// Path is not absolute.
    #[error("path {:?} is not absolute", path.display())]
    NotAbsolute { path: PathBuf },

    /// Path cannot be stored in templated form.
    #[error("path {:?} cannot be represented as a templated path", path.display())]
    Unrepresentable { path: PathBuf },
}

impl PathError {
    /// Classify error.
    pub fn kind(&self) -> crate::ErrorKind {
        match self {
            Self::Unresolved { .. } => crate::ErrorKind::UnresolvedTemplate,
            Self::NotAbsolute { .. } | Self::Unrepresentable { .. } => {
                crate::ErrorKind::InvalidArgument
            }
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
