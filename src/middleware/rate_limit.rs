//! Rate limiting middleware
//!
//! Throttles password sign-in attempts per email address.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::utils::errors::{ClubError, Result};

pub struct SignInRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl SignInRateLimiter {
    /// `attempts_per_minute` of zero is treated as one
    pub fn new(attempts_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    pub fn check(&self, email: &str) -> Result<()> {
        let key = email.trim().to_lowercase();
        match self.limiter.check_key(&key) {
            Ok(()) => {
                debug!(email = %key, "Sign-in attempt allowed");
                Ok(())
            }
            Err(_) => {
                warn!(email = %key, "Sign-in rate limit exceeded");
                Err(ClubError::RateLimitExceeded)
            }
        }
    }
}
