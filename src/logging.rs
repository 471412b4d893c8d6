//! Diagnostic logging.
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for
//! command output. `RUST_LOG` overrides the verbosity flag when set.

use crate::notify::{EventKind, SubscriptionId};
use crate::singleton::Singleton;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Calling this more than once is harmless.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Mirror every notification of `singleton` into the log.
///
/// Conflicts and expirations are warnings, failures are errors, and the
/// rest of the lifecycle is informational.
pub fn attach(singleton: &Singleton) -> SubscriptionId {
    singleton.subscribe_all(|n| match n.kind {
        EventKind::Error => {
            tracing::error!(singleton = n.singleton, event = %n.kind, "{}", n.message)
        }
        EventKind::Conflict | EventKind::Expired => {
            tracing::warn!(singleton = n.singleton, event = %n.kind, "{}", n.message)
        }
        _ => tracing::info!(singleton = n.singleton, event = %n.kind, "{}", n.message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persister::MemoryPersister;
    use crate::singleton::LockOptions;
    use std::sync::Arc;

    #[test]
    fn test_verbosity_maps_to_levels() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "info");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "trace");
    }

    #[tokio::test]
    async fn test_attach_adds_one_subscription() {
        init(0);
        let singleton =
            Singleton::new("logged", Arc::new(MemoryPersister::new()), LockOptions::default())
                .unwrap();

        attach(&singleton);
        assert_eq!(singleton.notifier().subscriber_count(), 1);
        assert!(singleton.acquire().await.unwrap());
    }
}
