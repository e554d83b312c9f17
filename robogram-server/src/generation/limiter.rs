use reqwest::header::HeaderMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Longest pause a provider header can impose
const MAX_PAUSE: Duration = Duration::from_secs(3600);

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    paused_until: Option<Instant>,
}

/// Token bucket pacing calls to one provider.
///
/// Holds up to `capacity` tokens and refills `capacity` tokens per minute.
/// Provider rate-limit headers can pause the bucket until a reset time.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                paused_until: None,
            }),
        }
    }

    /// Take a token if one is available right now; otherwise report how long to wait
    fn try_take(&self) -> Result<(), Duration> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();

        if let Some(until) = state.paused_until {
            if until > now {
                return Err(until - now);
            }
            state.paused_until = None;
        }

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        loop {
            match self.try_take() {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!("Rate limiter waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Stop handing out tokens for `duration` and drain what is left
    pub fn pause_for(&self, duration: Duration) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let until = now.checked_add(duration.min(MAX_PAUSE)).unwrap_or(now);
        state.tokens = 0.0;
        state.last_refill = until;
        state.paused_until = Some(match state.paused_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Feed provider rate-limit headers into the bucket.
    ///
    /// `retry-after` wins; otherwise an exhausted `x-ratelimit-remaining-*`
    /// pauses until the matching `x-ratelimit-reset-*`.
    pub fn observe_headers(&self, headers: &HeaderMap) {
        if let Some(wait) = retry_after(headers) {
            self.pause_for(wait);
            return;
        }

        for kind in ["requests", "tokens"] {
            let remaining = headers
                .get(format!("x-ratelimit-remaining-{}", kind))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            if remaining != Some(0) {
                continue;
            }
            let reset = headers
                .get(format!("x-ratelimit-reset-{}", kind))
                .and_then(|v| v.to_str().ok())
                .and_then(parse_reset);
            if let Some(wait) = reset {
                tracing::info!("Provider {} quota exhausted, pausing {:?}", kind, wait);
                self.pause_for(wait);
            }
        }
    }
}

pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(seconds_to_wait)
}

/// Seconds from a header as a bounded wait; negative or NaN values are ignored
fn seconds_to_wait(seconds: f64) -> Option<Duration> {
    if seconds.is_nan() || seconds < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(seconds).map_or(MAX_PAUSE, |wait| wait.min(MAX_PAUSE)))
}

/// Parse reset values like `1s`, `250ms`, `6m0s` or a bare number of seconds
fn parse_reset(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return seconds_to_wait(seconds.max(0.0));
    }

    let mut total_ms = 0.0;
    let mut number = String::new();
    let mut chars = value.chars().peekable();
    let mut parsed_any = false;

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let amount: f64 = number.parse().ok()?;
        number.clear();
        let unit_ms = match c {
            'h' => 3_600_000.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1.0
            }
            'm' => 60_000.0,
            's' => 1000.0,
            _ => return None,
        };
        total_ms += amount * unit_ms;
        parsed_any = true;
    }

    if !number.is_empty() || !parsed_any {
        return None;
    }
    seconds_to_wait(total_ms / 1000.0)
}
