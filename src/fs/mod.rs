//! Filesystem utilities for singleton locks.
//!
//! The file backend needs one primitive the standard create/rename calls
//! don't give: publish a complete file under a name only if that name is
//! free, without readers ever observing a partially written file.

mod exclusive;

pub use exclusive::publish_new;
