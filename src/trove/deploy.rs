// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deploy and pack entries.
//!
//! Deploying an entry creates the symlink at its host path, packing removes
//! it again. Neither touches the persisted entry list, or the content inside
//! the store. Both walk every selected entry even when some of them fail, and
//! report the outcome of each one.

use crate::{
    path::TokenSource,
    store::Entry,
    trove::{
        io_error,
        link::{inspect, HostState, Linker},
        Result, Trove, TroveError,
    },
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Entries to operate on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every tracked entry.
    #[default]
    All,

    /// Entries tagged with exact category.
    Category(String),

    /// Single entry with exact name.
    Name(String),
}

impl Selection {
    /// Build selection out of optional category and name.
    ///
    /// Selects everything when neither is given.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::InvalidSelector`] if both are given.
    pub fn from_options(category: Option<String>, name: Option<String>) -> Result<Self> {
        match (category, name) {
            (None, None) => Ok(Self::All),
            (Some(category), None) => Ok(Self::Category(category)),
            (None, Some(name)) => Ok(Self::Name(name)),
            (Some(_), Some(_)) => Err(TroveError::InvalidSelector(
                "select entries by category or by name, not both",
            )),
        }
    }
}

/// What happened to one entry.
#[derive(Debug)]
pub enum Action {
    /// Symlink created.
    Linked,

    /// Symlink removed.
    Unlinked,

    /// Host path already in the desired state.
    Unchanged,

    /// Host path holds unexpected content, entry skipped.
    Conflict { path: PathBuf },

    /// Entry could not be processed.
    Failed(TroveError),
}

impl Action {
    /// Check if entry ended up in the desired state.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Linked | Self::Unlinked | Self::Unchanged)
    }
}

/// Outcome of deploy or pack for one entry.
#[derive(Debug)]
pub struct EntryOutcome {
    /// Name of entry.
    pub name: String,

    /// What happened to it.
    pub action: Action,
}

/// Outcome of deploy or pack across a selection.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Outcome per selected entry, ordered by name.
    pub outcomes: Vec<EntryOutcome>,
}

impl SyncReport {
    /// Check if every selected entry ended up in the desired state.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.action.is_success())
    }

    /// Entries that did not end up in the desired state.
    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.action.is_success())
    }

    /// Lookup outcome of entry by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&Action> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.name == name.as_ref())
            .map(|outcome| &outcome.action)
    }
}

impl Display for EntryOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.action {
            Action::Linked => write!(fmt, "{}: linked", self.name),
            Action::Unlinked => write!(fmt, "{}: unlinked", self.name),
            Action::Unchanged => write!(fmt, "{}: unchanged", self.name),
            Action::Conflict { path } => write!(
                fmt,
                "{}: conflict, {:?} holds unexpected content",
                self.name,
                path.display()
            ),
            Action::Failed(err) => write!(fmt, "{}: {err}", self.name),
        }
    }
}

impl<L, T> Trove<L, T>
where
    L: Linker,
    T: TokenSource,
{
    /// Create symlinks at host paths of selected entries.
    ///
    /// Entries already linked are left alone. Entries whose host path holds
    /// anything else are reported as conflicts and skipped.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::EntryNotFound`] if selected name is not tracked.
    ///   Per-entry problems go into the returned report instead.
    #[instrument(skip(self), level = "debug")]
    pub fn deploy(&self, selection: &Selection) -> Result<SyncReport> {
        let outcomes = self
            .select(selection)?
            .into_iter()
            .map(|entry| EntryOutcome {
                name: entry.name().to_owned(),
                action: self.deploy_entry(entry),
            })
            .collect();

        Ok(SyncReport { outcomes })
    }

    /// Remove symlinks at host paths of selected entries.
    ///
    /// Entries that are not deployed are left alone. Entries whose host path
    /// holds anything but the managed symlink are reported as conflicts and
    /// skipped.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::EntryNotFound`] if selected name is not tracked.
    ///   Per-entry problems go into the returned report instead.
    #[instrument(skip(self), level = "debug")]
    pub fn pack(&self, selection: &Selection) -> Result<SyncReport> {
        let outcomes = self
            .select(selection)?
            .into_iter()
            .map(|entry| EntryOutcome {
                name: entry.name().to_owned(),
                action: self.pack_entry(entry),
            })
            .collect();

        Ok(SyncReport { outcomes })
    }

    /// Entries picked by selection, ordered by name.
    ///
    /// # Errors
    ///
    /// - Return [`TroveError::EntryNotFound`] if selected name is not tracked.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&Entry>> {
        let entries = match selection {
            Selection::All => self.store.entries().collect::<Vec<_>>(),
            Selection::Category(category) => self
                .store
                .entries()
                .filter(|entry| entry.has_category(category))
                .collect(),
            Selection::Name(name) => {
                let entry = self
                    .store
                    .get(name)
                    .ok_or_else(|| TroveError::EntryNotFound { name: name.clone() })?;
                vec![entry]
            }
        };

        if entries.is_empty() {
            warn!("selection {selection:?} matches no entries");
        }

        Ok(entries)
    }

    fn deploy_entry(&self, entry: &Entry) -> Action {
        let host_path = match self.host_path(entry) {
            Ok(host_path) => host_path,
            Err(err) => return Action::Failed(err),
        };
        let store_path = entry.store_path();

        match inspect(&host_path, store_path) {
            Ok(HostState::Linked) => {
                debug!("{:?} already deployed", entry.name());
                Action::Unchanged
            }
            Ok(HostState::Foreign) => {
                warn!(
                    "skip {:?}, unexpected content at {:?}",
                    entry.name(),
                    host_path.display()
                );
                Action::Conflict { path: host_path }
            }
            Ok(HostState::Absent) => {
                // INVARIANT: Never leave a dangling symlink behind.
                if store_path.symlink_metadata().is_err() {
                    return Action::Failed(TroveError::StoreContentMissing {
                        name: entry.name().to_owned(),
                        path: store_path.to_path_buf(),
                    });
                }

                match self.link_into_place(store_path, &host_path) {
                    Ok(()) => {
                        info!("deploy {:?} to {:?}", entry.name(), host_path.display());
                        Action::Linked
                    }
                    Err(err) => Action::Failed(err),
                }
            }
            Err(err) => Action::Failed(io_error("inspect", &host_path)(err)),
        }
    }

    fn pack_entry(&self, entry: &Entry) -> Action {
        let host_path = match self.host_path(entry) {
            Ok(host_path) => host_path,
            Err(err) => return Action::Failed(err),
        };

        match inspect(&host_path, entry.store_path()) {
            Ok(HostState::Linked) => match self.linker.unlink(&host_path) {
                Ok(()) => {
                    info!("pack {:?} from {:?}", entry.name(), host_path.display());
                    Action::Unlinked
                }
                Err(err) => Action::Failed(io_error("remove symlink at", &host_path)(err)),
            },
            Ok(HostState::Absent) => {
                debug!("{:?} already packed", entry.name());
                Action::Unchanged
            }
            Ok(HostState::Foreign) => {
                warn!(
                    "skip {:?}, unexpected content at {:?}",
                    entry.name(),
                    host_path.display()
                );
                Action::Conflict { path: host_path }
            }
            Err(err) => Action::Failed(io_error("inspect", &host_path)(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn selection_defaults_to_all() {
        assert_eq!(Selection::from_options(None, None).unwrap(), Selection::All);
        assert_eq!(
            Selection::from_options(Some("shell".into()), None).unwrap(),
            Selection::Category("shell".into())
        );
        assert_eq!(
            Selection::from_options(None, Some("bashrc".into())).unwrap(),
            Selection::Name("bashrc".into())
        );
        assert_eq!(
            Selection::from_options(Some("shell".into()), Some("bashrc".into()))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn report_success_ignores_noops() {
        let report = SyncReport {
            outcomes: vec![
                EntryOutcome {
                    name: "bashrc".into(),
                    action: Action::Linked,
                },
                EntryOutcome {
                    name: "vimrc".into(),
                    action: Action::Unchanged,
                },
            ],
        };
        assert!(report.is_success());
        assert_eq!(report.failures().count(), 0);

        let report = SyncReport {
            outcomes: vec![EntryOutcome {
                name: "gitconfig".into(),
                action: Action::Conflict {
                    path: "/home/blah/.gitconfig".into(),
                },
            }],
        };
        assert!(!report.is_success());
        assert_eq!(
            report.failures().map(ToString::to_string).collect::<Vec<_>>(),
            vec![r#"gitconfig: conflict, "/home/blah/.gitconfig" holds unexpected content"#]
        );
    }
}
