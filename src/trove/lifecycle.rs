// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Add and remove entries.
//!
//! Both operations take several filesystem steps in a row. Whenever a step
//! fails, every earlier step is undone before the error is reported, so the
//! caller either sees the whole operation happen or none of it.

use crate::{
    path::{normalize, TokenSource},
    store::{validate_name, Entry, StoreError},
    trove::{
        compensate, io_error, same_location,
        link::{inspect, HostState, Linker},
        transfer::{copy_path, move_path, remove_path},
        Result, Trove, TroveError,
    },
};

use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Way to pick the entry to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Entry with exact name.
    Name(String),

    /// Entry whose resolved host path is exactly this path.
    Path(PathBuf),
}

impl Selector {
    /// Build selector out of optional name and path.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::InvalidSelector`] unless exactly one of the two
    ///   is given.
    pub fn from_options(name: Option<String>, path: Option<PathBuf>) -> Result<Self> {
        match (name, path) {
            (Some(name), None) => Ok(Self::Name(name)),
            (None, Some(path)) => Ok(Self::Path(path)),
            (Some(_), Some(_)) => Err(TroveError::InvalidSelector(
                "select entry by name or by path, not both",
            )),
            (None, None) => Err(TroveError::InvalidSelector(
                "select entry by name or by path",
            )),
        }
    }
}

impl<L, T> Trove<L, T>
where
    L: Linker,
    T: TokenSource,
{
    /// Start tracking file or directory at path under name.
    ///
    /// Moves content into the store, leaves a symlink at the host path, and
    /// persists the new entry. The host path is the templated form of `path`,
    /// unless `save_path` supplies a template of its own, in which case the
    /// symlink goes wherever that template resolves to.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::SourceNotFound`] if path does not exist.
    /// - Return [`TroveError::Store`] if name is invalid or already tracked.
    /// - Return [`TroveError::InsideStore`] or [`TroveError::ContainsStore`]
    ///   if path overlaps the store.
    /// - Return [`TroveError::HostConflict`] if save path is occupied.
    /// - Return [`TroveError::HostPathClaimed`] if another entry already
    ///   uses the host path, deployed or not.
    /// - Return [`TroveError::StoreOccupied`] if store already holds content
    ///   under name.
    /// - Return [`TroveError::Path`] if path cannot be templated, or save
    ///   path cannot be resolved.
    /// - Return [`TroveError::Io`] if a filesystem step fails. All prior
    ///   steps are undone first.
    #[instrument(skip(self, path, name, save_path, categories), level = "debug")]
    pub fn add(
        &mut self,
        path: impl AsRef<Path>,
        name: impl Into<String>,
        save_path: Option<&str>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<&Entry> {
        let name = name.into();
        validate_name(&name)?;
        if self.store.get(&name).is_some() {
            return Err(StoreError::DuplicateEntry { name }.into());
        }

        let categories = categories.into_iter().map(Into::into).collect::<Vec<String>>();
        if let Some(category) = categories.iter().find(|category| category.trim().is_empty()) {
            return Err(StoreError::InvalidCategory {
                category: category.clone(),
                name,
            }
            .into());
        }

        let source = self.check_source(path.as_ref())?;
        let host_path = match save_path {
            Some(template) => template.to_owned(),
            None => self.resolver.templatize(&source)?,
        };
        let link_path = self.resolver.resolve(&host_path)?;
        if self.store.contains_location(&link_path) {
            return Err(TroveError::InsideStore {
                path: link_path,
                root: self.store.root_path().into(),
            });
        }

        // INVARIANT: No two entries ever claim the same host path.
        if let Some(owner) = self.claimant(&link_path) {
            return Err(TroveError::HostPathClaimed {
                path: link_path,
                owner: owner.to_owned(),
            });
        }

        // INVARIANT: Relocating through save path never clobbers anything.
        if !same_location(&link_path, &source) && link_path.symlink_metadata().is_ok() {
            return Err(TroveError::HostConflict {
                name,
                path: link_path,
            });
        }

        let store_path = self.store.store_path(&name);
        if store_path.symlink_metadata().is_ok() {
            return Err(TroveError::StoreOccupied {
                name,
                path: store_path,
            });
        }

        move_path(&source, &store_path).map_err(io_error("move content out of", &source))?;
        debug!(
            "moved {:?} into store at {:?}",
            source.display(),
            store_path.display()
        );

        if let Err(err) = self.link_into_place(&store_path, &link_path) {
            return Err(compensate(err, &source, || move_path(&store_path, &source)));
        }

        let tracked = self
            .store
            .insert(name.clone(), host_path, categories)
            .map(|_| ())
            .and_then(|()| self.store.save());
        if let Err(err) = tracked {
            self.store.remove(&name);
            return Err(compensate(err.into(), &source, || {
                self.linker.unlink(&link_path)?;
                move_path(&store_path, &source)
            }));
        }

        info!("add {name:?} from {:?}", source.display());
        self.store
            .get(&name)
            .ok_or(TroveError::EntryNotFound { name })
    }

    /// Stop tracking entry, and put its content back at the host path.
    ///
    /// The symlink at the host path is replaced by the real content. With
    /// `delete` set, content is moved out of the store. Without it, content
    /// is copied, so an untracked copy stays behind in the store.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::InvalidSelector`] if selector is malformed.
    /// - Return [`TroveError::EntryNotFound`] or [`TroveError::UntrackedPath`]
    ///   if no entry matches.
    /// - Return [`TroveError::AmbiguousHostPath`] if several entries match.
    /// - Return [`TroveError::HostConflict`] if host path holds anything but
    ///   the managed symlink.
    /// - Return [`TroveError::SelfReference`] if host path points inside the
    ///   store.
    /// - Return [`TroveError::StoreContentMissing`] if store copy is gone.
    /// - Return [`TroveError::Io`] if a filesystem step fails. All prior
    ///   steps are undone first.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&mut self, selector: Selector, delete: bool) -> Result<Entry> {
        let name = self.select_for_removal(&selector)?;
        let entry = self
            .store
            .get(&name)
            .cloned()
            .ok_or_else(|| TroveError::EntryNotFound { name: name.clone() })?;
        let host_path = self.host_path(&entry)?;
        let store_path = entry.store_path().to_path_buf();

        let state = inspect(&host_path, &store_path).map_err(io_error("inspect", &host_path))?;
        if state == HostState::Foreign {
            return Err(TroveError::HostConflict {
                name,
                path: host_path,
            });
        }

        if store_path.symlink_metadata().is_err() {
            return Err(TroveError::StoreContentMissing {
                name,
                path: store_path,
            });
        }

        let was_linked = state == HostState::Linked;
        if was_linked {
            self.linker
                .unlink(&host_path)
                .map_err(io_error("remove symlink at", &host_path))?;
        }

        let relink = || -> io::Result<()> {
            if was_linked {
                self.linker.link(&store_path, &host_path)?;
            }
            Ok(())
        };

        if let Some(parent) = host_path.parent() {
            if let Err(err) = mkdirp::mkdirp(parent) {
                let err = io_error("create parent directories of", &host_path)(err);
                return Err(compensate(err, &host_path, relink));
            }
        }

        let transfer = if delete {
            move_path(&store_path, &host_path)
        } else {
            copy_path(&store_path, &host_path)
        };
        if let Err(err) = transfer {
            let err = io_error("restore content to", &host_path)(err);
            return Err(compensate(err, &host_path, relink));
        }

        let removed = self
            .store
            .remove(&name)
            .ok_or_else(|| TroveError::EntryNotFound { name: name.clone() })?;
        if let Err(err) = self.store.save() {
            self.store.restore(removed);
            return Err(compensate(err.into(), &host_path, || {
                if delete {
                    move_path(&host_path, &store_path)?;
                } else {
                    remove_path(&host_path)?;
                }

                if was_linked {
                    self.linker.link(&store_path, &host_path)?;
                }

                Ok(())
            }));
        }

        if delete {
            info!("remove {name:?} and delete its store copy");
        } else {
            info!(
                "remove {name:?}, untracked copy left at {:?}",
                store_path.display()
            );
        }

        Ok(removed)
    }

    fn check_source(&self, path: &Path) -> Result<PathBuf> {
        let source = normalize(path).map_err(io_error("locate", path))?;
        if source.file_name().is_none() {
            return Err(TroveError::InvalidSource { path: source });
        }

        match source.symlink_metadata() {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(TroveError::SourceNotFound { path: source });
            }
            Err(err) => return Err(io_error("inspect", &source)(err)),
        }

        let root = self.store.root_path();
        if self.store.contains_path(&source) {
            return Err(TroveError::InsideStore {
                path: source,
                root: root.into(),
            });
        }

        let contains_root = root.starts_with(&source)
            || matches!(
                (root.canonicalize(), source.canonicalize()),
                (Ok(root), Ok(source)) if root.starts_with(&source)
            );
        if contains_root {
            return Err(TroveError::ContainsStore {
                path: source,
                root: root.into(),
            });
        }

        Ok(source)
    }

    fn claimant(&self, path: &Path) -> Option<&str> {
        self.store
            .entries()
            .find(|entry| {
                self.host_path(entry)
                    .is_ok_and(|host_path| same_location(&host_path, path))
            })
            .map(Entry::name)
    }

    fn select_for_removal(&self, selector: &Selector) -> Result<String> {
        let wanted = match selector {
            Selector::Name(name) => {
                return self
                    .store
                    .get(name)
                    .map(|entry| entry.name().to_owned())
                    .ok_or_else(|| TroveError::EntryNotFound { name: name.clone() });
            }
            Selector::Path(path) => normalize(path).map_err(io_error("locate", path))?,
        };

        let mut found: Option<&Entry> = None;
        for entry in self.store.entries() {
            let host_path = match self.host_path(entry) {
                Ok(host_path) => host_path,
                Err(err) => {
                    warn!("skip entry {:?}: {err}", entry.name());
                    continue;
                }
            };

            if !same_location(&host_path, &wanted) {
                continue;
            }

            if let Some(first) = found {
                return Err(TroveError::AmbiguousHostPath {
                    path: wanted,
                    first: first.name().to_owned(),
                    second: entry.name().to_owned(),
                });
            }
            found = Some(entry);
        }

        found
            .map(|entry| entry.name().to_owned())
            .ok_or(TroveError::UntrackedPath { path: wanted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn selector_requires_exactly_one_option() {
        assert_eq!(
            Selector::from_options(Some("bashrc".into()), None).unwrap(),
            Selector::Name("bashrc".into())
        );
        assert_eq!(
            Selector::from_options(None, Some("/tmp/.bashrc".into())).unwrap(),
            Selector::Path("/tmp/.bashrc".into())
        );
        assert_eq!(
            Selector::from_options(Some("bashrc".into()), Some("/tmp/.bashrc".into()))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Selector::from_options(None, None).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
