//! Process-wide request spacing for upstream data calls.
//!
//! Unlike a token bucket there is no burst allowance: consecutive releases
//! are always at least `min_interval` apart, measured from the moment the
//! gate lets a caller through. Callers queue on a fair async mutex, so they
//! are released in FIFO order and a waiting caller never blocks unrelated
//! tasks.

use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global throttle shared by every upstream data request.
pub struct RateGate {
    min_interval: Duration,
    /// Release time of the previous caller.
    last_call_at: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_at: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `min_interval` has passed since the last release, then
    /// record this release and return its time.
    ///
    /// The lock is held across the sleep so the next caller measures its wait
    /// from this caller's release, not from when it started waiting.
    pub async fn acquire(&self) -> Instant {
        let mut last_call_at = self.last_call_at.lock().await;

        if let Some(last) = *last_call_at {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!("Rate gate: waiting {:?} before next upstream call", wait);
                tokio::time::sleep(wait).await;
            }
        }

        let released_at = Instant::now();
        *last_call_at = Some(released_at);
        released_at
    }

    /// Time until the gate would release a caller immediately.
    pub async fn time_until_ready(&self) -> Duration {
        let last_call_at = self.last_call_at.lock().await;
        match *last_call_at {
            Some(last) => (last + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let gate = RateGate::new(Duration::from_millis(200));
        assert_eq!(gate.time_until_ready().await, Duration::ZERO);

        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_back_to_back_calls_are_spaced() {
        let gate = RateGate::new(Duration::from_millis(50));

        let first = gate.acquire().await;
        let second = gate.acquire().await;

        assert!(second - first >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_release_within_interval() {
        let gate = Arc::new(RateGate::new(Duration::from_millis(30)));
        let releases = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let gate = gate.clone();
            let releases = releases.clone();
            handles.push(tokio::spawn(async move {
                let released_at = gate.acquire().await;
                releases.lock().await.push(released_at);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut releases = releases.lock().await.clone();
        releases.sort();
        assert_eq!(releases.len(), 5);
        for pair in releases.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(30));
        }
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_elapsed() {
        let gate = RateGate::new(Duration::from_millis(20));
        gate.acquire().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(gate.time_until_ready().await, Duration::ZERO);
        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(15));
    }
}
