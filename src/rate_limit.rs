use crate::config::RateLimitConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Bucket shared by requests that carry no user id
pub const ANONYMOUS_USER: &str = "anonymous";

/// Sliding-window request limiter keyed by user id.
///
/// Each user keeps the timestamps of their admitted requests inside the
/// current window; a request is rejected once that count reaches the limit.
pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.requests.max(1),
            window: Duration::from_secs(config.window_seconds),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Admit one request for `user_id`, or fail with [`AppError::UserRateLimited`]
    pub fn check(&self, user_id: Option<&str>) -> Result<()> {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: Option<&str>, now: Instant) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let user = match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => ANONYMOUS_USER,
        };

        let mut requests = self.lock();
        let history = requests.entry(user.to_string()).or_default();
        while history
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            history.pop_front();
        }

        if history.len() >= self.max_requests as usize {
            let retry_after_secs = history.front().map(|oldest| {
                let waited = now.saturating_duration_since(*oldest);
                self.window.saturating_sub(waited).as_secs().max(1)
            });
            warn!(user = %user, limit = self.max_requests, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Err(AppError::UserRateLimited {
                user: user.to_string(),
                limit: self.max_requests,
                window_secs: self.window.as_secs(),
                retry_after_secs,
            });
        }

        history.push_back(now);
        Ok(())
    }

    /// Requests admitted for `user_id` in the window ending now
    pub fn usage(&self, user_id: &str) -> usize {
        let now = Instant::now();
        self.lock()
            .get(user_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn limiter(requests: u32, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests,
            window_seconds,
        })
    }

    #[test]
    fn test_rejects_requests_over_limit() {
        let limiter = limiter(2, 60);
        let now = Instant::now();
        assert!(limiter.check_at(Some("alice"), now).is_ok());
        assert!(limiter.check_at(Some("alice"), now).is_ok());

        let err = limiter.check_at(Some("alice"), now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        match err {
            AppError::UserRateLimited {
                user,
                limit,
                retry_after_secs,
                ..
            } => {
                assert_eq!(user, "alice");
                assert_eq!(limit, 2);
                assert_eq!(retry_after_secs, Some(60));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(limiter.usage("alice"), 2);
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(1, 60);
        let start = Instant::now();
        assert!(limiter.check_at(Some("alice"), start).is_ok());
        assert!(limiter.check_at(Some("alice"), start + Duration::from_secs(30)).is_err());
        assert!(limiter.check_at(Some("alice"), start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_users_are_limited_independently() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at(Some("alice"), now).is_ok());
        assert!(limiter.check_at(Some("bob"), now).is_ok());
        assert!(limiter.check_at(Some("alice"), now).is_err());
    }

    #[test]
    fn test_missing_user_shares_anonymous_bucket() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at(None, now).is_ok());
        assert!(limiter.check_at(Some("  "), now).is_err());
        assert_eq!(limiter.usage(ANONYMOUS_USER), 1);
    }

    #[test]
    fn test_disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests: 1,
            window_seconds: 60,
        });
        for _ in 0..10 {
            assert!(limiter.check(Some("alice")).is_ok());
        }
    }
}
