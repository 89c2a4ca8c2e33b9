//! In-process sliding-window rate limiter for unauthenticated signup.
//! Per-source-address counters only; a distributed rate limiter is
//! explicitly out of this service's scope, but the endpoint still needs
//! *a* limiter to honor the 429 contract in isolation or behind a single
//! instance.

use std::net::IpAddr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

const HOURLY_LIMIT: usize = 5;
const DAILY_LIMIT: usize = 20;

#[derive(Default)]
struct Bucket {
    hits: Mutex<Vec<DateTime<Utc>>>,
}

pub struct SignupRateLimiter {
    buckets: DashMap<IpAddr, Bucket>,
}

impl Default for SignupRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SignupRateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Returns `Ok(())` if `addr` is still under both windows, recording the
    /// attempt as a side effect. Returns `Err(retry_after_secs)` otherwise.
    pub fn check(&self, addr: IpAddr) -> Result<(), u64> {
        let bucket = self.buckets.entry(addr).or_default();
        let mut hits = bucket.hits.lock().unwrap();
        let now = Utc::now();
        hits.retain(|t| now.signed_duration_since(*t) < Duration::days(1));

        let hour_count = hits.iter().filter(|t| now.signed_duration_since(**t) < Duration::hours(1)).count();
        if hour_count >= HOURLY_LIMIT {
            let oldest = hits.iter().filter(|t| now.signed_duration_since(**t) < Duration::hours(1)).min().copied().unwrap_or(now);
            let retry_after = (oldest + Duration::hours(1)) - now;
            return Err(retry_after.num_seconds().max(1) as u64);
        }
        if hits.len() >= DAILY_LIMIT {
            let oldest = hits.iter().min().copied().unwrap_or(now);
            let retry_after = (oldest + Duration::days(1)) - now;
            return Err(retry_after.num_seconds().max(1) as u64);
        }

        hits.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_hourly_limit() {
        let limiter = SignupRateLimiter::new();
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..HOURLY_LIMIT {
            assert!(limiter.check(addr).is_ok());
        }
        assert!(limiter.check(addr).is_err());
    }

    #[test]
    fn distinct_addresses_are_independent() {
        let limiter = SignupRateLimiter::new();
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        for _ in 0..HOURLY_LIMIT {
            limiter.check(a).unwrap();
        }
        assert!(limiter.check(a).is_err());
        assert!(limiter.check(b).is_ok());
    }
}
