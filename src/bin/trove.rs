// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use trove::{
    init_store, FixedLocator, HomeMarker, Locator, Selection, Selector, Store, SyncReport, Trove,
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "trove [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Use store configuration file at path instead of the one in ~/.trove.
    #[arg(long, global = true, env = "TROVE_CONFIG", value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Init(opts) => run_init(opts),
            Command::Add(opts) => run_add(self.config, opts),
            Command::Remove(opts) => run_remove(self.config, opts),
            Command::Deploy(opts) => run_deploy(self.config, opts),
            Command::Pack(opts) => run_pack(self.config, opts),
            Command::Status => run_status(self.config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Initialize store, or point trove at an existing one.
    #[command(override_usage = "trove init <path>")]
    Init(InitOptions),

    /// Move file or directory into store, and link it back.
    #[command(override_usage = "trove add [options] <path> <name>")]
    Add(AddOptions),

    /// Stop tracking entry, and restore its content to the host path.
    #[command(override_usage = "trove remove [options] (--name <name> | --path <path>)")]
    Remove(RemoveOptions),

    /// Link selected entries into place.
    #[command(override_usage = "trove deploy [options]")]
    Deploy(SelectOptions),

    /// Unlink selected entries, keeping their content in store.
    #[command(override_usage = "trove pack [options]")]
    Pack(SelectOptions),

    /// Show deployment state of every entry.
    #[command(override_usage = "trove status")]
    Status,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Directory to hold the store.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// File or directory to track.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    /// Unique name of entry.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Templated host path to record instead of the one derived from path.
    #[arg(short, long, value_name = "template")]
    pub save_path: Option<String>,

    /// Category to tag entry with.
    #[arg(short, long = "category", value_name = "category", value_delimiter = ',')]
    pub categories: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Name of entry to remove.
    #[arg(short, long, group = "selector", value_name = "name")]
    pub name: Option<String>,

    /// Host path of entry to remove.
    #[arg(short, long, group = "selector", value_name = "path")]
    pub path: Option<PathBuf>,

    /// Move content out of store instead of leaving a copy behind.
    #[arg(short, long)]
    pub delete: bool,
}

#[derive(Args, Clone, Debug)]
struct SelectOptions {
    /// Select entries tagged with category.
    #[arg(short, long, group = "selection", value_name = "category")]
    pub category: Option<String>,

    /// Select single entry by name.
    #[arg(short, long, group = "selection", value_name = "name")]
    pub name: Option<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn open_trove(config: Option<PathBuf>) -> Result<Trove> {
    let config_path = match config {
        Some(path) => FixedLocator::new(path).locate()?,
        None => HomeMarker::default().locate()?,
    };

    Ok(Trove::open(Store::load(config_path)?))
}

fn run_init(opts: InitOptions) -> Result<()> {
    let store = init_store(opts.path, &HomeMarker::default())?;
    info!(
        "store ready at {:?} with {} entries",
        store.root_path().display(),
        store.len()
    );

    Ok(())
}

fn run_add(config: Option<PathBuf>, opts: AddOptions) -> Result<()> {
    let mut trove = open_trove(config)?;
    let entry = trove.add(
        opts.path,
        opts.name,
        opts.save_path.as_deref(),
        opts.categories,
    )?;
    info!("track {:?} at {:?}", entry.name(), entry.host_path());

    Ok(())
}

fn run_remove(config: Option<PathBuf>, opts: RemoveOptions) -> Result<()> {
    let mut trove = open_trove(config)?;
    let selector = Selector::from_options(opts.name, opts.path)?;
    trove.remove(selector, opts.delete)?;

    Ok(())
}

fn run_deploy(config: Option<PathBuf>, opts: SelectOptions) -> Result<()> {
    let trove = open_trove(config)?;
    let selection = Selection::from_options(opts.category, opts.name)?;
    check_report("deploy", &trove.deploy(&selection)?)
}

fn run_pack(config: Option<PathBuf>, opts: SelectOptions) -> Result<()> {
    let trove = open_trove(config)?;
    let selection = Selection::from_options(opts.category, opts.name)?;
    check_report("pack", &trove.pack(&selection)?)
}

fn run_status(config: Option<PathBuf>) -> Result<()> {
    let trove = open_trove(config)?;
    print!("{}", trove.status());

    Ok(())
}

fn check_report(action: &str, report: &SyncReport) -> Result<()> {
    for failure in report.failures() {
        error!("{failure}");
    }

    let failed = report.failures().count();
    if failed != 0 {
        bail!(
            "failed to {action} {failed} of {} entries",
            report.outcomes.len()
        );
    }

    Ok(())
}
