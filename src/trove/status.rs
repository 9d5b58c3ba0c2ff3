// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inspect entries without touching anything.

use crate::{
    path::TokenSource,
    trove::{
        link::{inspect, HostState, Linker},
        Trove,
    },
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::warn;

/// Deployment state of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Symlink at host path points at store path.
    Deployed,

    /// Nothing at host path.
    NotDeployed,

    /// Host path holds something other than the managed symlink, or cannot
    /// be determined at all.
    Broken,
}

impl Display for LinkStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Deployed => fmt.write_str("deployed"),
            Self::NotDeployed => fmt.write_str("not-deployed"),
            Self::Broken => fmt.write_str("broken"),
        }
    }
}

/// Status of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    /// Name of entry.
    pub name: String,

    /// Host path in templated form, as persisted.
    pub host_path: String,

    /// Categories of entry, sorted.
    pub categories: Vec<String>,

    /// What currently sits at the host path.
    pub status: LinkStatus,
}

/// Status of every entry, ordered by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Status per entry, ordered by name.
    pub entries: Vec<EntryStatus>,
}

impl StatusReport {
    /// Lookup status of entry by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<LinkStatus> {
        self.entries
            .iter()
            .find(|entry| entry.name == name.as_ref())
            .map(|entry| entry.status)
    }
}

impl Display for StatusReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .entries
            .iter()
            .map(|entry| entry.name.len())
            .max()
            .unwrap_or(0);

        for entry in &self.entries {
            let categories = if entry.categories.is_empty() {
                "-".to_string()
            } else {
                entry.categories.join(",")
            };
            writeln!(
                fmt,
                "{:<width$}  {:<12}  {:<20}  {}",
                entry.name,
                entry.status.to_string(),
                categories,
                entry.host_path,
            )?;
        }

        Ok(())
    }
}

impl<L, T> Trove<L, T>
where
    L: Linker,
    T: TokenSource,
{
    /// Classify every entry by what currently sits at its host path.
    pub fn status(&self) -> StatusReport {
        let entries = self
            .store
            .entries()
            .map(|entry| {
                let status = match self.host_path(entry) {
                    Ok(host_path) => match inspect(&host_path, entry.store_path()) {
                        Ok(HostState::Linked) => LinkStatus::Deployed,
                        Ok(HostState::Absent) => LinkStatus::NotDeployed,
                        Ok(HostState::Foreign) => LinkStatus::Broken,
                        Err(err) => {
                            warn!("cannot inspect {:?}: {err}", host_path.display());
                            LinkStatus::Broken
                        }
                    },
                    Err(err) => {
                        warn!("{:?}: {err}", entry.name());
                        LinkStatus::Broken
                    }
                };

                EntryStatus {
                    name: entry.name().to_owned(),
                    host_path: entry.host_path().to_owned(),
                    categories: entry.categories().map(str::to_owned).collect(),
                    status,
                }
            })
            .collect();

        StatusReport { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_status_report() {
        let report = StatusReport {
            entries: vec![
                EntryStatus {
                    name: "bashrc".into(),
                    host_path: "$HOME/.bashrc".into(),
                    categories: vec!["shell".into()],
                    status: LinkStatus::Deployed,
                },
                EntryStatus {
                    name: "nvim".into(),
                    host_path: "$XDG_CONFIG_HOME/nvim".into(),
                    categories: Vec::new(),
                    status: LinkStatus::Broken,
                },
            ],
        };

        let expect = indoc! {"
            bashrc  deployed      shell                 $HOME/.bashrc
            nvim    broken        -                     $XDG_CONFIG_HOME/nvim
        "};
        assert_eq!(report.to_string(), expect);
        assert_eq!(report.get("nvim"), Some(LinkStatus::Broken));
        assert_eq!(report.get("vimrc"), None);
    }
}
