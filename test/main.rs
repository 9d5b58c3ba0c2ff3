// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use std::{
    collections::HashMap,
    fs::{create_dir_all, remove_file, write},
    io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use trove::{Linker, PathResolver, Store, SymLinker, Trove};

pub(crate) type Tokens = HashMap<String, PathBuf>;

/// Sandbox holding a fake home directory and an initialized store.
pub(crate) struct TroveFixture {
    _temp: TempDir,
    home: PathBuf,
    root: PathBuf,
}

impl TroveFixture {
    pub(crate) fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;

        // INVARIANT: Work with canonical paths only.
        //   - Temporary directories may sit behind symlinks, e.g., /tmp on macOS.
        let base = temp.path().canonicalize()?;
        let home = base.join("home");
        let root = base.join("store");
        create_dir_all(home.join(".config"))?;
        create_dir_all(&root)?;
        Store::new(&root).save()?;

        Ok(Self {
            _temp: temp,
            home,
            root,
        })
    }

    pub(crate) fn home(&self) -> &Path {
        &self.home
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn tokens(&self) -> Tokens {
        HashMap::from([
            ("HOME".to_string(), self.home.clone()),
            ("XDG_CONFIG_HOME".to_string(), self.home.join(".config")),
        ])
    }

    pub(crate) fn store(&self) -> Result<Store> {
        Ok(Store::load(self.root.join("trove.toml"))?)
    }

    pub(crate) fn trove(&self) -> Result<Trove<SymLinker, Tokens>> {
        self.trove_with(SymLinker, self.tokens())
    }

    pub(crate) fn trove_with<L: Linker>(&self, linker: L, tokens: Tokens) -> Result<Trove<L, Tokens>> {
        Ok(Trove::with_parts(
            self.store()?,
            PathResolver::new(tokens),
            linker,
        ))
    }

    /// Make every later save fail by putting a directory where the store
    /// configuration file belongs.
    pub(crate) fn break_config(&self) -> Result<()> {
        let config_path = self.root.join("trove.toml");
        remove_file(&config_path)?;
        create_dir_all(config_path.join("blocker"))?;

        Ok(())
    }

    pub(crate) fn write_file(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<PathBuf> {
        let path = self.home.join(relative);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(&path, contents.as_ref())?;

        Ok(path)
    }
}

/// Linker that refuses to create links.
pub(crate) struct FailingLinker;

impl Linker for FailingLinker {
    fn link(&self, _: &Path, _: &Path) -> io::Result<()> {
        Err(io::Error::other("link refused"))
    }

    fn unlink(&self, link: &Path) -> io::Result<()> {
        SymLinker.unlink(link)
    }
}

pub(crate) fn is_symlink(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
}
