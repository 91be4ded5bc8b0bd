//! Provider call budget
//!
//! Every provider call in the process goes through one [`CallBudget`]:
//! - a daily window: at most `daily_limit` calls per UTC day
//! - a minimum spacing between the end of one call and the start of the next
//! - a single lane, so only one provider call is in flight at a time

use crate::error::{AppError, Result};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Calls used in the current UTC day
#[derive(Debug)]
pub struct DailyWindow {
    capacity: u32,
    used: u32,
    day: NaiveDate,
}

impl DailyWindow {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            used: 0,
            day: Utc::now().date_naive(),
        }
    }

    /// Update the daily capacity (calls already used today still count)
    pub fn update_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
    }

    fn roll(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.used = 0;
        }
    }

    /// Try to consume one call, returns true if allowed
    pub fn try_acquire(&mut self) -> bool {
        self.roll();
        if self.used < self.capacity {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn remaining(&mut self) -> u32 {
        self.roll();
        self.capacity.saturating_sub(self.used)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Shared provider call budget
#[derive(Debug)]
pub struct CallBudget {
    window: Mutex<DailyWindow>,
    min_interval: Mutex<Duration>,
    last_call_end: Arc<Mutex<Option<Instant>>>,
    lane: Arc<AsyncMutex<()>>,
}

/// Held for the duration of one provider call
#[derive(Debug)]
pub struct CallPermit {
    _lane: OwnedMutexGuard<()>,
    last_call_end: Arc<Mutex<Option<Instant>>>,
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        *self.last_call_end.lock() = Some(Instant::now());
    }
}

impl CallBudget {
    pub fn new(daily_limit: u32, min_interval: Duration) -> Self {
        Self {
            window: Mutex::new(DailyWindow::new(daily_limit)),
            min_interval: Mutex::new(min_interval),
            last_call_end: Arc::new(Mutex::new(None)),
            lane: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Update limits from settings
    pub fn update_config(&self, daily_limit: u32, min_interval: Duration) {
        self.window.lock().update_capacity(daily_limit);
        *self.min_interval.lock() = min_interval;
    }

    /// Calls left today
    pub fn remaining(&self) -> u32 {
        self.window.lock().remaining()
    }

    pub fn daily_limit(&self) -> u32 {
        self.window.lock().capacity()
    }

    /// Time to wait before the spacing rule allows another call
    pub fn time_until_available(&self) -> Duration {
        let min_interval = *self.min_interval.lock();
        match *self.last_call_end.lock() {
            Some(last) => min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait for the lane and the spacing, then consume one call
    ///
    /// Fails immediately with [`AppError::RateLimit`] once today's budget is
    /// used up; waiting for the next UTC day is left to the caller.
    pub async fn acquire(&self) -> Result<CallPermit> {
        let lane = self.lane.clone().lock_owned().await;

        if self.remaining() == 0 {
            return Err(self.exhausted());
        }

        let wait = self.time_until_available();
        if !wait.is_zero() {
            tracing::debug!("Spacing provider calls, waiting {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }

        if !self.window.lock().try_acquire() {
            return Err(self.exhausted());
        }

        Ok(CallPermit {
            _lane: lane,
            last_call_end: self.last_call_end.clone(),
        })
    }

    fn exhausted(&self) -> AppError {
        let limit = self.daily_limit();
        tracing::warn!("Provider call budget exhausted ({} calls/day)", limit);
        AppError::RateLimit(format!("daily budget of {} provider calls exhausted", limit))
    }

    #[cfg(test)]
    fn rewind_window(&self, days: i64) {
        let mut window = self.window.lock();
        window.day -= chrono::Duration::days(days);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_window_basic() {
        let mut window = DailyWindow::new(3);

        for _ in 0..3 {
            assert!(window.try_acquire());
        }
        assert!(!window.try_acquire());
        assert_eq!(window.remaining(), 0);
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let budget = CallBudget::new(2, Duration::ZERO);

        drop(budget.acquire().await.unwrap());
        drop(budget.acquire().await.unwrap());

        let err = budget.acquire().await.unwrap_err();
        assert_eq!(err.code(), "RATE_LIMIT");
        assert!(err.to_string().contains("2 provider calls"));
    }

    #[tokio::test]
    async fn test_window_resets_next_day() {
        let budget = CallBudget::new(1, Duration::ZERO);
        drop(budget.acquire().await.unwrap());
        assert_eq!(budget.remaining(), 0);

        // Simulate the UTC day rolling over
        budget.rewind_window(1);
        assert_eq!(budget.remaining(), 1);
        assert!(budget.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_update_config() {
        let budget = CallBudget::new(1, Duration::ZERO);
        drop(budget.acquire().await.unwrap());
        assert!(budget.acquire().await.is_err());

        budget.update_config(5, Duration::ZERO);
        assert_eq!(budget.remaining(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_calls() {
        let budget = CallBudget::new(10, Duration::from_secs(1));

        let started = Instant::now();
        drop(budget.acquire().await.unwrap());
        assert!(started.elapsed() < Duration::from_millis(10));

        drop(budget.acquire().await.unwrap());
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_lane() {
        let budget = Arc::new(CallBudget::new(10, Duration::ZERO));
        let permit = budget.acquire().await.unwrap();

        let contender = {
            let budget = budget.clone();
            tokio::spawn(async move { budget.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(permit);
        assert!(contender.await.unwrap().is_ok());
    }
}
