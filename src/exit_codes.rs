//! Exit code constants for the singleton CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, unusable lock name)
//! - 2: Backend failure (the persister could not be reached or written)
//! - 3: Lock conflict (another live lock holds the name)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or invalid lock name.
pub const USER_ERROR: i32 = 1;

/// Backend failure: I/O, connectivity, or query errors from the persister.
pub const BACKEND_FAILURE: i32 = 2;

/// Lock conflict: a live lock for the requested name already exists.
pub const LOCK_CONFLICT: i32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, BACKEND_FAILURE, LOCK_CONFLICT];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn test_success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
