//! Timing attack protection utilities
//!
//! Used where a comparison or a failure path could otherwise reveal how close
//! a guess was, or whether an account exists.

use std::time::Duration;
use tokio::time::Instant;

/// Case-insensitive (ASCII) comparison whose running time depends only on length
pub fn constant_time_eq_ignore_case(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a.to_ascii_lowercase() ^ byte_b.to_ascii_lowercase();
    }

    result == 0
}

/// Pads an operation to a minimum duration
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    /// Start timing now
    pub fn start(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until the minimum duration has elapsed
    pub async fn wait(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
    }
}
