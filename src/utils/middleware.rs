use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension,
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{warn, Instrument};
use uuid::Uuid;

/// Live windows tolerated before expired ones are swept.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u64,
    pub window_start: Instant,
}

/// Fixed-window request counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    pub requests_per_second: u64,
    pub window_duration: Duration,
    pub entries: DashMap<String, RateLimitEntry>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u64, window_duration_secs: u64) -> Self {
        Self {
            requests_per_second,
            window_duration: Duration::from_secs(window_duration_secs),
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let allowed = {
            let mut entry = self.entries.entry(key.to_string()).or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

            if now.duration_since(entry.window_start) >= self.window_duration {
                entry.count = 0;
                entry.window_start = now;
            }
            if entry.count >= self.requests_per_second {
                false
            } else {
                entry.count += 1;
                true
            }
        };

        self.sweep_expired(now);
        allowed
    }

    /// Drops expired windows, at most once per window and only past the
    /// size threshold. Returns whether a sweep ran.
    fn sweep_expired(&self, now: Instant) -> bool {
        if self.entries.len() <= SWEEP_THRESHOLD {
            return false;
        }
        // Another request already sweeping is as good as sweeping here.
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return false;
        };
        if now.duration_since(*last_sweep) < self.window_duration {
            return false;
        }
        *last_sweep = now;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < self.window_duration);
        true
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limiter_middleware(
    Extension(limiter): Extension<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = client_key(&request);
    if !limiter.check_rate_limit(&ip) {
        warn!(action = "rate_limit_exceeded", ip = %ip, uri = %request.uri());
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());
    let span = tracing::info_span!("request", request_id = %request_id, method = %req.method(), uri = %req.uri());
    next.run(req).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_per_key() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.2"));
    }

    #[test]
    fn test_expired_windows_are_swept_once_per_window() {
        let limiter = RateLimiter::new(5, 1);
        let now = Instant::now();
        let stale = now.checked_sub(Duration::from_secs(2)).unwrap();
        for i in 0..SWEEP_THRESHOLD + 10 {
            limiter.entries.insert(
                format!("10.1.{}.{}", i / 256, i % 256),
                RateLimitEntry { count: 1, window_start: stale },
            );
        }
        *limiter.last_sweep.lock().unwrap() = now;

        // A sweep ran just now, so a crowded map is left alone until the window passes.
        assert!(!limiter.sweep_expired(now));
        assert_eq!(limiter.entries.len(), SWEEP_THRESHOLD + 10);

        let later = now + Duration::from_secs(1);
        assert!(limiter.sweep_expired(later));
        assert!(limiter.entries.is_empty());
    }

    #[test]
    fn test_small_maps_are_never_swept() {
        let limiter = RateLimiter::new(5, 0);
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.sweep_expired(Instant::now() + Duration::from_secs(5)));
        assert_eq!(limiter.entries.len(), 1);
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
    }
}
