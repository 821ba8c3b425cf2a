//! # Global Throttle Flag
//!
//! Set whenever the provider signals a rate-limit violation. While engaged,
//! new transfer attempts are parked as `restricted` pending transfers and
//! scheduled capacity checks skip themselves. The flag expires on its own
//! after the configured TTL.
//!
//! Only the single-flight queue's consumer engages the flag; any component
//! may read it.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug)]
pub struct ThrottleFlag {
    ttl: Duration,
    engaged_at: Mutex<Option<Instant>>,
}

impl ThrottleFlag {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            engaged_at: Mutex::new(None),
        }
    }

    /// Engage the flag, restarting the TTL if already engaged.
    pub fn engage(&self) {
        let mut engaged = self.engaged_at.lock().unwrap();
        if engaged.is_none() {
            warn!(ttl_secs = self.ttl.as_secs(), "provider throttling detected, engaging flag");
        }
        *engaged = Some(Instant::now());
    }

    /// True while the flag is engaged and unexpired. Expiry clears the
    /// flag lazily on the first read past the TTL.
    pub fn is_active(&self) -> bool {
        let mut engaged = self.engaged_at.lock().unwrap();
        match *engaged {
            Some(at) if at.elapsed() < self.ttl => true,
            Some(_) => {
                info!("throttle flag expired");
                *engaged = None;
                false
            }
            None => false,
        }
    }

    /// Clear the flag explicitly.
    pub fn clear(&self) {
        *self.engaged_at.lock().unwrap() = None;
    }
}
