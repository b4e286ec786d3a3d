//! Wall-clock helpers for handshake timestamps.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::error::constants;

/// Milliseconds since the UNIX epoch.
///
/// A clock set before the epoch yields 0 rather than failing the reply it is stamped on.
pub fn current_timestamp() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis() as u64,
        Err(_) => {
            warn!("{}", constants::ERR_SYSTEM_TIME);
            0
        }
    }
}
