//! CLI argument parsing for `singleton`.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Singleton: process-level mutual exclusion over a shared lock store.
///
/// Every process pointing at the same store (a lock directory or a SQLite
/// database) contends for the same named locks:
/// - `acquire` takes a lock and keeps it until `release`
/// - `run` holds a lock only while a command runs
/// - expired locks are replaced when `--expire` is set
#[derive(Parser, Debug)]
#[command(name = "singleton")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults are used when the file does not exist).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Lock directory for the file backend (overrides config).
    #[arg(long, global = true, value_name = "DIR")]
    pub lock_dir: Option<PathBuf>,

    /// Replace locks older than this many seconds (overrides config).
    #[arg(long, global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub expire: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire a lock and keep it.
    ///
    /// Exits 0 when the lock was obtained and 3 when another holder has it.
    Acquire(NameArgs),

    /// Release a lock.
    ///
    /// Releasing a lock that does not exist succeeds.
    Release(NameArgs),

    /// Print whether a lock is currently held.
    Status(NameArgs),

    /// Run a command while holding a lock.
    ///
    /// The lock is released when the command exits or when this process
    /// receives SIGINT/SIGTERM. The exit code mirrors the command's.
    Run(RunArgs),
}

/// Arguments naming a single lock.
#[derive(Parser, Debug)]
pub struct NameArgs {
    /// Lock name.
    pub name: String,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Lock name.
    pub name: String,

    /// Command and arguments to run (after `--`).
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
