use crate::FetchError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Politeness delay between consecutive requests of one source
///
/// Every request after the first waits at least `delay`, plus a jitter in
/// `0..=jitter` taken from sub-second clock noise.
#[derive(Debug, Clone)]
pub struct Throttle {
    delay: Duration,
    jitter: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration, jitter: Duration) -> Self {
        Self {
            delay,
            jitter,
            last_request: None,
        }
    }

    /// Records that a request was just sent
    pub fn record_request(&mut self) {
        self.last_request = Some(Instant::now());
    }

    /// Calculates how long to wait before the next request
    ///
    /// Returns `Duration::ZERO` before the first request or once the pause
    /// has already elapsed.
    pub fn time_until_next_request(&self, now: Instant) -> Duration {
        let Some(last) = self.last_request else {
            return Duration::ZERO;
        };
        let pause = self.delay + self.sample_jitter();
        pause.saturating_sub(now.saturating_duration_since(last))
    }

    /// Sleeps for the politeness pause
    ///
    /// Fails with `DeadlineExceeded` instead of sleeping past `deadline`.
    pub async fn wait(&self, deadline: Instant) -> Result<(), FetchError> {
        let now = Instant::now();
        let pause = self.time_until_next_request(now);
        if pause.is_zero() {
            return Ok(());
        }
        let until = now + pause;
        if until >= deadline {
            return Err(FetchError::DeadlineExceeded);
        }
        tokio::time::sleep_until(until).await;
        Ok(())
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        let noise = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::from(d.subsec_nanos()))
            .unwrap_or(0);
        Duration::from_millis(noise % (max + 1))
    }
}
