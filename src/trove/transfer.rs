// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Move and copy file trees.
//!
//! Entry content is either a single file or a whole directory tree. Moves
//! prefer a plain rename, and fall back to copy then delete when source and
//! destination sit on different filesystems. Symlinks nested inside a tree are
//! recreated as symlinks, never followed.

use ignore::WalkBuilder;
use std::{
    fs::{self, create_dir, read_link, remove_dir_all, remove_file, rename, symlink_metadata, FileType},
    io,
    path::Path,
};
use tracing::debug;

/// Move file or directory tree.
///
/// # Errors
///
/// - Return [`io::Error`] if destination already exists, or the move fails.
///   A cross-device move that fails while copying leaves the source
///   untouched. One that fails while removing the source keeps the complete
///   copy at the destination, and names both paths in the error.
pub fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    ensure_vacant(to)?;
    match rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "rename {:?} crosses devices, copy then delete instead",
                from.display()
            );
            copy_then_remove(from, to, remove_path)
        }
        Err(err) => Err(err),
    }
}

fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    copy_path(from, to)?;

    // INVARIANT: Once copied, the destination is the only complete copy left.
    remove(from).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!(
                "copied {:?} to {:?}, but failed to remove source: {err}",
                from.display(),
                to.display()
            ),
        )
    })
}

/// Copy file or directory tree.
///
/// # Errors
///
/// - Return [`io::Error`] if destination already exists, or the copy fails.
///   Partial copies are cleaned up.
pub fn copy_path(from: &Path, to: &Path) -> io::Result<()> {
    ensure_vacant(to)?;
    let file_type = symlink_metadata(from)?.file_type();
    let result = if file_type.is_dir() {
        copy_tree(from, to)
    } else {
        copy_node(from, to, file_type)
    };

    if result.is_err() {
        let _ = remove_path(to);
    }

    result
}

/// Remove file, symlink, or directory tree.
///
/// # Errors
///
/// - Return [`io::Error`] if removal fails.
pub fn remove_path(path: &Path) -> io::Result<()> {
    if symlink_metadata(path)?.file_type().is_dir() {
        remove_dir_all(path)
    } else {
        remove_file(path)
    }
}

fn ensure_vacant(path: &Path) -> io::Result<()> {
    if symlink_metadata(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{:?} already exists", path.display()),
        ));
    }

    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let walker = WalkBuilder::new(from)
        .standard_filters(false)
        .follow_links(false)
        .build();

    // INVARIANT: Walk yields every directory before its contents.
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            create_dir(&target)?;
        } else {
            copy_node(entry.path(), &target, file_type)?;
        }
    }

    Ok(())
}

fn copy_node(from: &Path, to: &Path, file_type: FileType) -> io::Result<()> {
    if file_type.is_symlink() {
        return copy_symlink(from, to);
    }

    fs::copy(from, to).map(|_| ())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(read_link(from)?, to)
}

#[cfg(windows)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = read_link(from)?;
    if from.is_dir() {
        std::os::windows::fs::symlink_dir(target, to)
    } else {
        std::os::windows::fs::symlink_file(target, to)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir_all, read_to_string, write},
        os::unix::fs::symlink,
    };

    fn sample_tree(root: &Path) -> anyhow::Result<()> {
        create_dir_all(root.join("lua/plugins"))?;
        write(root.join("init.lua"), "require('plugins')\n")?;
        write(root.join("lua/plugins/init.lua"), "return {}\n")?;
        write(root.join(".hidden"), "still copied\n")?;
        write(root.join(".gitignore"), "*.lua\n")?;
        symlink("init.lua", root.join("alias.lua"))?;
        Ok(())
    }

    #[test]
    fn copy_directory_tree() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let from = temp.path().join("nvim");
        let to = temp.path().join("copy");
        sample_tree(&from)?;

        copy_path(&from, &to)?;

        assert_eq!(read_to_string(to.join("lua/plugins/init.lua"))?, "return {}\n");
        assert_eq!(read_to_string(to.join(".hidden"))?, "still copied\n");
        assert_eq!(read_to_string(to.join("init.lua"))?, "require('plugins')\n");
        assert_eq!(read_link(to.join("alias.lua"))?, Path::new("init.lua"));
        assert!(from.join("init.lua").exists());

        Ok(())
    }

    #[test]
    fn copy_refuses_existing_destination() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let from = temp.path().join("a");
        let to = temp.path().join("b");
        write(&from, "new\n")?;
        write(&to, "old\n")?;

        let result = copy_path(&from, &to);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(read_to_string(&to)?, "old\n");

        Ok(())
    }

    #[test]
    fn failed_source_removal_keeps_copy() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let from = temp.path().join("nvim");
        let to = temp.path().join("moved");
        sample_tree(&from)?;

        let result = copy_then_remove(&from, &to, |path| {
            remove_file(path.join("init.lua"))?;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
        });

        let err = result.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(err.to_string().contains(&format!("{:?}", from.display())));
        assert!(err.to_string().contains(&format!("{:?}", to.display())));
        assert!(symlink_metadata(from.join("init.lua")).is_err());
        assert_eq!(read_to_string(to.join("init.lua"))?, "require('plugins')\n");
        assert_eq!(read_to_string(to.join("lua/plugins/init.lua"))?, "return {}\n");

        Ok(())
    }

    #[test]
    fn move_then_remove_tree() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let from = temp.path().join("nvim");
        let to = temp.path().join("moved");
        sample_tree(&from)?;

        move_path(&from, &to)?;
        assert!(!from.exists());
        assert_eq!(read_to_string(to.join("init.lua"))?, "require('plugins')\n");

        remove_path(&to)?;
        assert!(symlink_metadata(&to).is_err());

        Ok(())
    }
}
