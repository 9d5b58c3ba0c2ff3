// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink handling.
//!
//! Creating and removing the links at host paths goes through the [`Linker`]
//! trait, so the rest of the engine never touches link primitives directly.

use std::{
    fs::{read_link, remove_file, symlink_metadata},
    io,
    path::Path,
};

/// Layer of indirection for symlink manipulation.
pub trait Linker {
    /// Create symlink at `link` pointing to `target`.
    fn link(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Remove symlink at `link`, leaving its target alone.
    fn unlink(&self, link: &Path) -> io::Result<()>;
}

/// Plain filesystem symlinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymLinker;

impl Linker for SymLinker {
    #[cfg(unix)]
    fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }

    #[cfg(unix)]
    fn unlink(&self, link: &Path) -> io::Result<()> {
        remove_file(link)
    }

    #[cfg(windows)]
    fn unlink(&self, link: &Path) -> io::Result<()> {
        match remove_file(link) {
            Ok(()) => Ok(()),
            Err(_) => std::fs::remove_dir(link),
        }
    }
}

/// What currently sits at a host path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Symlink pointing at the expected store path.
    Linked,

    /// Nothing at all.
    Absent,

    /// Regular file, directory, or symlink to somewhere else.
    Foreign,
}

/// Inspect host path against expected store path.
///
/// Symlinks are never followed when looking at the host path itself, so a
/// dangling link still counts as present.
///
/// # Errors
///
/// - Return [`io::Error`] if host path cannot be inspected for reasons other
///   than it being absent.
pub fn inspect(host_path: &Path, store_path: &Path) -> io::Result<HostState> {
    let metadata = match symlink_metadata(host_path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HostState::Absent),
        Err(err) => return Err(err),
    };

    if !metadata.file_type().is_symlink() {
        return Ok(HostState::Foreign);
    }

    let target = read_link(host_path)?;
    let target = match host_path.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target,
    };

    if target == store_path {
        return Ok(HostState::Linked);
    }

    match (target.canonicalize(), store_path.canonicalize()) {
        (Ok(target), Ok(store_path)) if target == store_path => Ok(HostState::Linked),
        _ => Ok(HostState::Foreign),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{fs::write, os::unix::fs::symlink};

    #[test]
    fn inspect_host_states() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store_path = root.path().join("store-bashrc");
        let other = root.path().join("other");
        write(&store_path, "export EDITOR=vim\n")?;
        write(&other, "unrelated\n")?;

        let host = root.path().join(".bashrc");
        assert_eq!(inspect(&host, &store_path)?, HostState::Absent);

        SymLinker.link(&store_path, &host)?;
        assert_eq!(inspect(&host, &store_path)?, HostState::Linked);

        SymLinker.unlink(&host)?;
        assert_eq!(inspect(&host, &store_path)?, HostState::Absent);
        assert!(store_path.exists());

        symlink(&other, &host)?;
        assert_eq!(inspect(&host, &store_path)?, HostState::Foreign);
        remove_file(&host)?;

        write(&host, "export EDITOR=nano\n")?;
        assert_eq!(inspect(&host, &store_path)?, HostState::Foreign);

        Ok(())
    }

    #[test]
    fn inspect_relative_link() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store_path = root.path().join("bashrc");
        write(&store_path, "alias ll='ls -l'\n")?;

        let host = root.path().join(".bashrc");
        symlink("bashrc", &host)?;
        assert_eq!(inspect(&host, &store_path)?, HostState::Linked);

        Ok(())
    }

    #[test]
    fn inspect_dangling_link_is_present() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let host = root.path().join(".bashrc");
        symlink(root.path().join("gone"), &host)?;

        assert_eq!(
            inspect(&host, &root.path().join("bashrc"))?,
            HostState::Foreign
        );

        Ok(())
    }
}
