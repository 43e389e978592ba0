//! Explicit retry policy for the ingestion worker: capped exponential backoff
//! with additive random jitter and a bounded attempt count.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Policy used while waiting for referenced teams to appear.
    pub fn resolution_default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            ..Self::default()
        }
    }

    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_with_jitter(attempt, |cap| {
            if cap == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=cap)
            }
        })
    }

    /// `jitter_fn` receives the jitter bound in milliseconds.
    fn backoff_with_jitter(&self, attempt: u32, jitter_fn: impl Fn(u64) -> u64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as u64;
        let exponential = (base_ms * self.multiplier.max(1.0).powi(exponent)).min(max_ms as f64);
        let total = (exponential as u64).saturating_add(jitter_fn(self.jitter.as_millis() as u64));
        Duration::from_millis(total.min(max_ms))
    }
}

/// Cloneable shutdown signal. Backoff sleeps race against it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: Some(self.tx.subscribe()),
        }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, Shutdown { rx: Some(rx) })
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().map_or(false, |rx| *rx.borrow())
    }

    pub async fn triggered(&mut self) {
        match self.rx.as_mut() {
            Some(rx) => {
                // A dropped trigger counts as shutdown.
                let _ = rx.wait_for(|stop| *stop).await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Sleeps for `delay`; returns `false` if shutdown interrupted the sleep.
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.triggered() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_backoff_schedule_without_jitter() {
        let policy = policy();
        let none = |_: u64| 0;
        assert_eq!(policy.backoff_with_jitter(1, none), Duration::from_millis(100));
        assert_eq!(policy.backoff_with_jitter(2, none), Duration::from_millis(200));
        assert_eq!(policy.backoff_with_jitter(3, none), Duration::from_millis(400));
        assert_eq!(policy.backoff_with_jitter(4, none), Duration::from_millis(800));
        assert_eq!(policy.backoff_with_jitter(5, none), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_is_added_but_capped() {
        let policy = policy();
        let full = |cap: u64| cap;
        assert_eq!(policy.backoff_with_jitter(1, full), Duration::from_millis(150));
        assert_eq!(policy.backoff_with_jitter(4, full), Duration::from_millis(850));
        assert_eq!(policy.backoff_with_jitter(30, full), Duration::from_millis(1000));
    }

    #[test]
    fn test_random_backoff_stays_within_bounds() {
        let policy = policy();
        for attempt in 1..=10 {
            let delay = policy.backoff(attempt);
            assert!(delay <= policy.max_delay);
            assert!(delay >= policy.backoff_with_jitter(attempt, |_| 0));
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (trigger, mut shutdown) = shutdown_channel();
        trigger.trigger();
        assert!(!shutdown.sleep(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_never_sleeps_to_completion() {
        let mut shutdown = Shutdown::never();
        assert!(shutdown.sleep(Duration::from_millis(1)).await);
    }
}
