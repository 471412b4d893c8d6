//! Implementation of the `singleton run` command.
//!
//! `run` holds a lock for the lifetime of a child process:
//! - acquire the lock (exit 3 when it is held elsewhere)
//! - spawn the command and wait for it
//! - release the lock when the command exits, mirroring its exit code
//!
//! Signal handlers are installed before the lock is taken. A SIGINT/SIGTERM
//! received while the command runs kills the child and hands the lock to
//! the shutdown registry, which releases it and exits.

use super::held_elsewhere;
use crate::cli::RunArgs;
use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::shutdown::ShutdownRegistry;
use crate::singleton::Singleton;
use std::future::Future;
use std::process::ExitStatus;
use tokio::process::{Child, Command};

pub(super) async fn cmd_run(ctx: &LockContext, args: RunArgs) -> Result<i32> {
    let registry = ShutdownRegistry::new();
    let singleton = ctx.singleton(&args.name).await?.with_shutdown(&registry);
    let mut listener = ShutdownRegistry::listen()?;

    supervise(&singleton, &registry, &args.command, listener.recv()).await
}

/// Acquire, run `command` to completion (or until `shutdown` resolves),
/// and release.
///
/// When `shutdown` fails the child is still stopped and the lock released
/// before the error is returned.
async fn supervise<F>(
    singleton: &Singleton,
    registry: &ShutdownRegistry,
    command: &[String],
    shutdown: F,
) -> Result<i32>
where
    F: Future<Output = std::io::Result<()>>,
{
    let Some((program, program_args)) = command.split_first() else {
        return Err(LockError::Command("no command given".to_string()));
    };

    if !singleton.acquire().await? {
        return Err(held_elsewhere(singleton.name()));
    }

    let mut child = match Command::new(program).args(program_args).spawn() {
        Ok(child) => child,
        Err(e) => {
            singleton.release().await?;
            return Err(LockError::Command(format!("'{}': {}", program, e)));
        }
    };
    tracing::info!(singleton = singleton.name(), program = %program, pid = ?child.id(), "command started");

    tokio::select! {
        status = child.wait() => {
            // Release even when the wait itself failed.
            let released = singleton.release().await;
            let status = status?;
            released?;
            Ok(exit_code_of(status))
        }
        signaled = shutdown => {
            stop_child(&mut child).await;
            if let Err(e) = signaled {
                tracing::error!(singleton = singleton.name(), error = %e, "signal listener failed");
                singleton.release().await?;
                return Err(e.into());
            }
            match registry.shutdown().await.into_iter().next() {
                Some((_, Err(err))) => Err(err),
                // All releases succeeded and the exit hook returned.
                _ => Ok(crate::exit_codes::SUCCESS),
            }
        }
    }
}

/// Kill the child and reap it.
async fn stop_child(child: &mut Child) {
    // On Unix this is SIGKILL; on Windows it is TerminateProcess.
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to stop command");
    }
}

/// Exit code to report for a finished child.
///
/// A child killed by a signal reports `128 + signal`, as shells do.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::persister::{MemoryPersister, Persister};
    use crate::singleton::LockOptions;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn controller(persister: &Arc<dyn Persister>, registry: &ShutdownRegistry) -> Singleton {
        Singleton::new("job", persister.clone(), LockOptions::default())
            .unwrap()
            .with_shutdown(registry)
    }

    fn never() -> impl Future<Output = std::io::Result<()>> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_exit_code_is_mirrored_and_lock_released() {
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        let registry = ShutdownRegistry::with_exit(|_| {});
        let singleton = controller(&persister, &registry);

        let code = supervise(&singleton, &registry, &sh("exit 7"), never())
            .await
            .unwrap();

        assert_eq!(code, 7);
        assert!(!persister.lock_exists("job").await.unwrap());
        assert!(!singleton.is_held());
    }

    #[tokio::test]
    async fn test_lock_is_held_while_command_runs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let persister: Arc<dyn Persister> =
            Arc::new(crate::persister::FilePersister::new(temp_dir.path()));
        let registry = ShutdownRegistry::with_exit(|_| {});
        let singleton = controller(&persister, &registry);
        let lock_file = temp_dir.path().join("job.lock");
        let script = format!("test -f '{}'", lock_file.display());

        let code = supervise(&singleton, &registry, &sh(&script), never())
            .await
            .unwrap();

        assert_eq!(code, exit_codes::SUCCESS);
        assert!(!lock_file.exists());
    }

    #[tokio::test]
    async fn test_conflict_does_not_run_command() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("ran");
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        persister.persist_lock("job").await.unwrap();
        let registry = ShutdownRegistry::with_exit(|_| {});
        let singleton = controller(&persister, &registry);

        let err = supervise(
            &singleton,
            &registry,
            &sh(&format!("touch '{}'", marker.display())),
            never(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::LOCK_CONFLICT);
        assert!(!marker.exists());
        assert!(persister.lock_exists("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_program_releases_lock() {
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        let registry = ShutdownRegistry::with_exit(|_| {});
        let singleton = controller(&persister, &registry);
        let command = vec!["definitely-not-a-real-program-4711".to_string()];

        let err = supervise(&singleton, &registry, &command, never())
            .await
            .unwrap_err();

        assert!(matches!(err, LockError::Command(_)));
        assert!(!persister.lock_exists("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_signal_stops_child_and_releases() {
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        let exited = Arc::new(AtomicI32::new(-1));
        let sink = exited.clone();
        let registry = ShutdownRegistry::with_exit(move |code| sink.store(code, Ordering::SeqCst));
        let singleton = controller(&persister, &registry);

        let signal = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok::<(), std::io::Error>(())
        };
        let code = supervise(&singleton, &registry, &sh("sleep 30"), signal)
            .await
            .unwrap();

        assert_eq!(code, exit_codes::SUCCESS);
        assert_eq!(exited.load(Ordering::SeqCst), 0);
        assert!(!persister.lock_exists("job").await.unwrap());
        assert!(singleton.is_signaled_for_shutdown());
    }

    #[tokio::test]
    async fn test_signal_listener_failure_stops_child_and_releases() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("finished");
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        let exited = Arc::new(AtomicI32::new(-1));
        let sink = exited.clone();
        let registry = ShutdownRegistry::with_exit(move |code| sink.store(code, Ordering::SeqCst));
        let singleton = controller(&persister, &registry);

        let failed = async { Err::<(), _>(std::io::Error::other("no signals")) };
        let script = format!("sleep 1; touch '{}'", marker.display());
        let err = supervise(&singleton, &registry, &sh(&script), failed)
            .await
            .unwrap_err();

        assert!(matches!(err, LockError::Io(_)));
        assert!(err.to_string().contains("no signals"));
        assert!(!persister.lock_exists("job").await.unwrap());
        assert!(!singleton.is_held());
        assert_eq!(exited.load(Ordering::SeqCst), -1);

        // The child was killed, not left running.
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_listen_installs_handlers() {
        assert!(ShutdownRegistry::listen().is_ok());
    }

    #[test]
    fn test_signal_exit_code() {
        use std::os::unix::process::ExitStatusExt;
        // Raw wait status: terminated by SIGKILL (9)
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), 137);
        // Raw wait status: exited with code 3
        assert_eq!(exit_code_of(ExitStatus::from_raw(3 << 8)), 3);
    }
}
