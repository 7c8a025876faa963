//! Foundational low-level utilities shared across Corvid crates.
//!
//! Provides atomic file-write helpers and unix-time utilities used by the
//! document store and credential-expiry checks.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, is_expired_unix, parse_rfc3339_unix};
