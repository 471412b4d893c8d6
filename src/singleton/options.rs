//! Controller configuration.

use serde::{Deserialize, Serialize};

/// Options accepted when constructing a [`Singleton`](super::Singleton).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// Age in seconds after which a conflicting lock is considered expired
    /// and forcibly replaced. `None` (or `0`) disables expiry, making every
    /// conflicting lock permanent until released.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_expire_seconds: Option<u64>,
}

impl LockOptions {
    /// Options with expiry after `seconds`.
    pub fn expiring_after(seconds: u64) -> Self {
        Self {
            lock_expire_seconds: Some(seconds),
        }
    }

    /// Effective expiry, if enabled.
    pub fn expiry_seconds(&self) -> Option<u64> {
        self.lock_expire_seconds.filter(|&s| s > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_disables_expiry() {
        assert_eq!(LockOptions::default().expiry_seconds(), None);
    }

    #[test]
    fn test_zero_disables_expiry() {
        assert_eq!(LockOptions::expiring_after(0).expiry_seconds(), None);
    }

    #[test]
    fn test_positive_enables_expiry() {
        assert_eq!(LockOptions::expiring_after(300).expiry_seconds(), Some(300));
    }
}
