use chrono::Utc;
use derive_more::Constructor;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub(crate) const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Spaces out requests by at least `interval`.
///
/// Callers queue on a fair mutex, so a caller already waiting is never overtaken.
#[derive(Debug)]
pub struct Throttler {
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        Throttler {
            interval,
            last_start: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let mut last_start = self.last_start.lock().await;
        let now = Instant::now();
        let start = match *last_start {
            Some(last) if last + self.interval > now => {
                let start = last + self.interval;
                debug!("Throttling request for {} ms", (start - now).as_millis());
                tokio::time::sleep_until(start).await;
                start
            }
            _ => now,
        };
        *last_start = Some(start);
    }
}

/// Rate limit state reported by a failed response.
#[derive(Constructor, Debug, PartialEq)]
pub(crate) struct RateLimit {
    pub(crate) remaining: u32,
    pub(crate) reset: i64,
}

impl RateLimit {
    /// `None` unless the response says no requests are left.
    pub(crate) fn exceeded(headers: &HeaderMap<HeaderValue>) -> Option<RateLimit> {
        let remaining = read_header::<u32>(headers, RATE_LIMIT_REMAINING)?;
        if remaining > 0 {
            return None;
        }
        let reset = read_header::<i64>(headers, RATE_LIMIT_RESET).unwrap_or(0);
        Some(RateLimit::new(remaining, reset))
    }

    /// Time left until the limit resets, zero if already past.
    pub(crate) fn time_to_wait(&self) -> Duration {
        let wait = self.reset.saturating_mul(1000).saturating_sub(Utc::now().timestamp_millis());
        Duration::from_millis(u64::try_from(wait).unwrap_or(0))
    }
}

fn read_header<T: FromStr>(headers: &HeaderMap<HeaderValue>, header: &str) -> Option<T> {
    headers.get(header)?.to_str().ok()?.trim().parse::<T>().ok()
}

#[tokio::test(start_paused = true)]
async fn throttler_spacing_test() {
    let throttler = Throttler::new(Duration::from_millis(300));
    let started = Instant::now();

    throttler.acquire().await;
    assert_eq!(started.elapsed(), Duration::ZERO, "First call should not wait");

    let (_, _, _) = tokio::join!(throttler.acquire(), throttler.acquire(), throttler.acquire());
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(900) && elapsed < Duration::from_millis(1000),
        "Concurrent callers should be serialized, took {:?}",
        elapsed
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    let idle = Instant::now();
    throttler.acquire().await;
    assert_eq!(idle.elapsed(), Duration::ZERO, "Idle throttler should not wait");
}

#[tokio::test(start_paused = true)]
async fn throttler_zero_interval_test() {
    let throttler = Throttler::new(Duration::ZERO);
    let started = Instant::now();
    for _ in 0..5 {
        throttler.acquire().await;
    }
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[test]
fn rate_limit_exceeded_test() -> anyhow::Result<()> {
    let mut headers = HeaderMap::new();
    assert_eq!(RateLimit::exceeded(&headers), None, "No headers, no rate limit");

    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from_str("12")?);
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from_str("1600000000")?);
    assert_eq!(RateLimit::exceeded(&headers), None, "Requests left, no rate limit");

    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from_str("0")?);
    assert_eq!(RateLimit::exceeded(&headers), Some(RateLimit::new(0, 1600000000)));

    headers.remove(RATE_LIMIT_RESET);
    assert_eq!(RateLimit::exceeded(&headers), Some(RateLimit::new(0, 0)));
    Ok(())
}

#[test]
fn rate_limit_wait_test() {
    let past = RateLimit::new(0, Utc::now().timestamp() - 10);
    assert_eq!(past.time_to_wait(), Duration::ZERO, "Wait is clamped to zero");

    let future = RateLimit::new(0, Utc::now().timestamp() + 5);
    let wait = future.time_to_wait();
    assert!(wait > Duration::from_secs(3) && wait <= Duration::from_secs(5));
}

#[test]
fn rate_limit_wait_out_of_range_test() {
    assert_eq!(RateLimit::new(0, i64::MIN).time_to_wait(), Duration::ZERO);
    assert!(RateLimit::new(0, i64::MAX).time_to_wait() > Duration::from_secs(365 * 24 * 3600));

    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from_static("99999999999999999"));
    let limit = RateLimit::exceeded(&headers);
    assert!(limit.map(|limit| limit.time_to_wait() > Duration::ZERO).unwrap_or(false));
}
