//! Signal-driven release of held locks.
//!
//! The application creates one [`ShutdownRegistry`] and hands it to each
//! controller with [`Singleton::with_shutdown`]. A controller joins the
//! registry at most once, after its first successful acquire. When the
//! application observes SIGINT or SIGTERM it calls
//! [`ShutdownRegistry::run_until_signal`] (or drives
//! [`ShutdownRegistry::release_all`] itself), which releases every lock still
//! held and then exits.
//!
//! The registry holds weak references: dropping every clone of a controller
//! removes it from shutdown handling.

use crate::error::Result;
use crate::singleton::{Singleton, WeakSingleton};
use std::sync::{Arc, Mutex, MutexGuard};

type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Process-wide set of controllers to release on termination.
#[derive(Clone)]
pub struct ShutdownRegistry {
    members: Arc<Mutex<Vec<WeakSingleton>>>,
    exit: ExitHook,
}

impl Default for ShutdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownRegistry {
    /// Registry that exits the process with `std::process::exit`.
    pub fn new() -> Self {
        Self::with_exit(|code| std::process::exit(code))
    }

    /// Registry with a custom exit action (used by tests and embedders).
    pub fn with_exit<F>(exit: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        Self {
            members: Arc::new(Mutex::new(Vec::new())),
            exit: Arc::new(exit),
        }
    }

    /// Add `singleton`. Adding the same controller twice is a no-op.
    pub fn register(&self, singleton: &Singleton) {
        let mut members = self.members();
        members.retain(|m| m.upgrade().is_some());
        if members.iter().any(|m| m.is(singleton)) {
            return;
        }
        tracing::debug!(singleton = singleton.name(), "registered for shutdown release");
        members.push(singleton.downgrade());
    }

    /// Number of live registered controllers.
    pub fn len(&self) -> usize {
        self.members()
            .iter()
            .filter(|m| m.upgrade().is_some())
            .count()
    }

    /// Whether no live controller is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every registered controller that still holds its lock.
    ///
    /// Each release is marked as signal-triggered. Results are returned in
    /// registration order; one failure does not stop the others.
    pub async fn release_all(&self) -> Vec<(String, Result<()>)> {
        let held: Vec<Singleton> = self
            .members()
            .iter()
            .filter_map(WeakSingleton::upgrade)
            .filter(Singleton::is_held)
            .collect();

        let mut results = Vec::with_capacity(held.len());
        for singleton in held {
            let result = singleton.release_on_signal().await;
            if let Err(err) = &result {
                tracing::error!(singleton = singleton.name(), error = %err, "release on shutdown failed");
            }
            results.push((singleton.name().to_string(), result));
        }
        results
    }

    /// Install SIGINT/SIGTERM handlers now and return a listener for them.
    ///
    /// Signals delivered after this call are queued for the listener
    /// instead of terminating the process.
    pub fn listen() -> std::io::Result<SignalListener> {
        SignalListener::install()
    }

    /// Wait for SIGINT or SIGTERM.
    pub async fn wait_for_signal() -> std::io::Result<()> {
        Self::listen()?.recv().await
    }

    /// Release everything and exit with code 0 if all releases succeeded.
    ///
    /// When a release fails the exit hook is not called and the failures are
    /// returned, leaving the decision to the caller.
    pub async fn shutdown(&self) -> Vec<(String, Result<()>)> {
        let results = self.release_all().await;
        let failures: Vec<_> = results.into_iter().filter(|(_, r)| r.is_err()).collect();
        if failures.is_empty() {
            (self.exit)(0);
        }
        failures
    }

    /// Block until a termination signal, then [`shutdown`](Self::shutdown).
    pub async fn run_until_signal(&self) -> std::io::Result<Vec<(String, Result<()>)>> {
        Self::wait_for_signal().await?;
        Ok(self.shutdown().await)
    }

    fn members(&self) -> MutexGuard<'_, Vec<WeakSingleton>> {
        self.members
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Installed termination-signal handlers.
#[derive(Debug)]
pub struct SignalListener {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl SignalListener {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next SIGINT or SIGTERM.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> std::io::Result<()> {
        tokio::select! {
            _ = self.terminate.recv() => tracing::info!("received SIGTERM"),
            _ = self.interrupt.recv() => tracing::info!("received SIGINT"),
        }
        Ok(())
    }

    /// Wait for Ctrl-C.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl-C");
        Ok(())
    }
}

impl std::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownRegistry")
            .field("members", &self.len())
            .finish()
    }
}
