//! Command implementations for `singleton`.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Each command returns the process exit code on success;
//! failures are `LockError`s whose `exit_code()` the caller uses.

mod run;

use crate::cli::{Cli, Command, NameArgs};
use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::exit_codes;

/// Dispatch a command to its implementation.
pub async fn dispatch(cli: Cli) -> Result<i32> {
    let ctx = LockContext::resolve(&cli.global)?;
    dispatch_in(&ctx, cli.command).await
}

/// Dispatch against an already resolved context.
pub async fn dispatch_in(ctx: &LockContext, command: Command) -> Result<i32> {
    match command {
        Command::Acquire(args) => cmd_acquire(ctx, args).await,
        Command::Release(args) => cmd_release(ctx, args).await,
        Command::Status(args) => cmd_status(ctx, args).await,
        Command::Run(args) => run::cmd_run(ctx, args).await,
    }
}

async fn cmd_acquire(ctx: &LockContext, args: NameArgs) -> Result<i32> {
    let singleton = ctx.singleton(&args.name).await?;

    if !singleton.acquire().await? {
        return Err(held_elsewhere(&args.name));
    }

    println!("Acquired lock '{}'.", args.name);
    Ok(exit_codes::SUCCESS)
}

async fn cmd_release(ctx: &LockContext, args: NameArgs) -> Result<i32> {
    let singleton = ctx.singleton(&args.name).await?;
    singleton.release().await?;

    println!("Released lock '{}'.", args.name);
    Ok(exit_codes::SUCCESS)
}

async fn cmd_status(ctx: &LockContext, args: NameArgs) -> Result<i32> {
    let singleton = ctx.singleton(&args.name).await?;
    let state = if singleton.check_exists().await? {
        "locked"
    } else {
        "unlocked"
    };

    println!("{}", state);
    Ok(exit_codes::SUCCESS)
}

pub(crate) fn held_elsewhere(name: &str) -> LockError {
    LockError::Conflict(format!("lock '{}' is held by another process", name))
}
