use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::{auth::bearer_token, ApiError};

/// Requests counted for one API key in its current window
struct KeyWindow {
    count: u32,
    started: Instant,
}

struct Windows {
    by_key: HashMap<String, KeyWindow>,
    last_sweep: Instant,
}

/// Fixed-window request limit per agent API key
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<Windows>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(Windows {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Count a request for `key`, or say how long until its window reopens
    pub fn check_rate_limit(&self, key: &str) -> Result<(), String> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), String> {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Once per window, forget keys whose window has already closed
        if now.saturating_duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            windows
                .by_key
                .retain(|_, w| now.saturating_duration_since(w.started) < window);
            windows.last_sweep = now;
        }

        let entry = windows.by_key.entry(key.to_string()).or_insert(KeyWindow {
            count: 0,
            started: now,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        } else if entry.count >= self.max_requests {
            return Err(format!(
                "Rate limit exceeded. Try again in {} seconds.",
                (self.window - elapsed).as_secs().max(1)
            ));
        }
        entry.count += 1;
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.by_key.len()).unwrap_or(0)
    }
}

/// Middleware applying the per-key limit to authenticated requests
pub async fn rate_limit_middleware(
    axum::Extension(limiter): axum::Extension<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(key) = bearer_token(request.headers()) {
        if let Err(msg) = limiter.check_rate_limit(key) {
            return ApiError::TooManyRequests(msg).into_response();
        }
    }

    next.run(request).await
}
