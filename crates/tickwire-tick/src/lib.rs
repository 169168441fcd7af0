//! Fixed-rate cadence for tickwire rooms.
//!
//! A [`Ticker`] hands out ticks at a fixed period (60 Hz by default) and
//! keeps statistics about how long each tick took to process. Rooms call
//! [`Ticker::wait_for_tick`], do their work, then report back with
//! [`Ticker::record_tick_end`]:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => break,
//!         info = ticker.wait_for_tick() => {
//!             room.tick();
//!             ticker.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! All timing goes through `tokio::time`, so tests can drive the ticker
//! with a paused clock.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the ticker wakes up after one or more deadlines passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Forget the missed deadlines and restart the cadence from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, at most `max_burst` of them; any
    /// deficit beyond that is skipped.
    Burst { max_burst: u32 },
}

/// Settings for a [`Ticker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second.
    pub rate_hz: u32,
    pub policy: OverrunPolicy,
    /// Fraction of the period (0.0–1.0) above which a slow tick is
    /// logged.
    pub budget_warn_ratio: f64,
    /// Upper bound for the random delay added before the first tick, in
    /// microseconds. Spreads out rooms created at the same moment.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 60,
            policy: OverrunPolicy::Skip,
            budget_warn_ratio: 0.8,
            initial_jitter_us: 1_000,
        }
    }
}

impl TickConfig {
    pub const MAX_RATE_HZ: u32 = 1_000;

    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Self::default()
        }
    }

    /// The tick period.
    ///
    /// # Errors
    /// [`TickError::InvalidRate`] for a rate of 0 or above
    /// [`Self::MAX_RATE_HZ`].
    pub fn period(&self) -> Result<Duration, TickError> {
        if self.rate_hz == 0 || self.rate_hz > Self::MAX_RATE_HZ {
            return Err(TickError::InvalidRate(self.rate_hz));
        }
        Ok(Duration::from_secs_f64(1.0 / f64::from(self.rate_hz)))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("tick rate must be between 1 and {max} Hz, got {0}", max = TickConfig::MAX_RATE_HZ)]
    InvalidRate(u32),
}

// ---------------------------------------------------------------------------
// Tick info & statistics
// ---------------------------------------------------------------------------

/// Returned by [`Ticker::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// 1-based tick counter.
    pub tick: u64,
    /// The fixed period. Use this, not wall-clock time, as the step size.
    pub dt: Duration,
    /// `true` if this tick fired more than a tenth of a period late.
    pub late: bool,
    /// Deadlines dropped while catching up to this tick.
    pub skipped: u64,
}

/// Running statistics, updated by [`Ticker::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub ticks: u64,
    pub late_ticks: u64,
    pub skipped_ticks: u64,
    /// Exponential moving average of processing time.
    pub avg_busy: Duration,
    pub max_busy: Duration,
    /// Processing time of the last tick divided by the period.
    pub last_utilization: f64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

const EMA_WEIGHT: f64 = 0.1;

/// Fixed-period tick source for one room.
pub struct Ticker {
    period: Duration,
    policy: OverrunPolicy,
    warn_ratio: f64,
    next_deadline: Instant,
    /// Ticks still owed under [`OverrunPolicy::Burst`].
    burst_remaining: u64,
    busy_since: Option<Instant>,
    tick: u64,
    stats: TickStats,
}

impl Ticker {
    /// # Errors
    /// Propagates [`TickConfig::period`] validation.
    pub fn new(config: &TickConfig) -> Result<Self, TickError> {
        let period = config.period()?;
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        debug!(
            rate_hz = config.rate_hz,
            policy = ?config.policy,
            jitter_us = jitter.as_micros() as u64,
            "ticker created"
        );
        Ok(Self {
            period,
            policy: config.policy,
            warn_ratio: config.budget_warn_ratio.clamp(0.0, 1.0),
            next_deadline: Instant::now() + period + jitter,
            burst_remaining: 0,
            busy_since: None,
            tick: 0,
            stats: TickStats::default(),
        })
    }

    /// Sleeps until the next deadline and returns its [`TickInfo`].
    ///
    /// Cancel-safe: dropping the future before it completes leaves the
    /// schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_deadline;
        time::sleep_until(deadline).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(deadline);
        let late = late_by > self.period / 10;
        let behind = (late_by.as_nanos() / self.period.as_nanos()) as u64;
        let mut skipped = 0;

        self.next_deadline = match self.policy {
            OverrunPolicy::Skip if behind == 0 => deadline + self.period,
            OverrunPolicy::Skip => {
                skipped = behind;
                now + self.period
            }
            OverrunPolicy::Burst { max_burst } => {
                if behind > 0 && self.burst_remaining == 0 {
                    self.burst_remaining = behind.min(u64::from(max_burst));
                    skipped = behind - self.burst_remaining;
                }
                if self.burst_remaining > 0 {
                    self.burst_remaining -= 1;
                    now
                } else if skipped > 0 {
                    now + self.period
                } else {
                    deadline + self.period
                }
            }
        };

        if skipped > 0 {
            warn!(tick = self.tick + 1, skipped, late_ms = late_by.as_secs_f64() * 1000.0, "tick overrun");
        }

        self.tick += 1;
        self.busy_since = Some(now);
        self.stats.ticks += 1;
        self.stats.skipped_ticks += skipped;
        if late {
            self.stats.late_ticks += 1;
        }
        trace!(tick = self.tick, late, "tick");

        TickInfo {
            tick: self.tick,
            dt: self.period,
            late,
            skipped,
        }
    }

    /// Marks the end of the current tick's work. Without this call the
    /// busy-time statistics stay at zero.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.busy_since.take() else {
            return;
        };
        let busy = start.elapsed();
        let utilization = busy.as_secs_f64() / self.period.as_secs_f64();
        self.stats.last_utilization = utilization;
        self.stats.max_busy = self.stats.max_busy.max(busy);
        let avg = self.stats.avg_busy.as_secs_f64();
        self.stats.avg_busy =
            Duration::from_secs_f64(avg * (1.0 - EMA_WEIGHT) + busy.as_secs_f64() * EMA_WEIGHT);

        if utilization >= self.warn_ratio {
            warn!(
                tick = self.tick,
                busy_ms = busy.as_secs_f64() * 1000.0,
                period_ms = self.period.as_secs_f64() * 1000.0,
                "tick used most of its budget"
            );
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_rejects_zero_rate() {
        assert_eq!(
            TickConfig::with_rate(0).period(),
            Err(TickError::InvalidRate(0))
        );
    }

    #[test]
    fn test_period_rejects_excessive_rate() {
        assert!(TickConfig::with_rate(5_000).period().is_err());
    }

    #[test]
    fn test_config_deserializes_burst_policy() {
        let cfg: TickConfig =
            serde_json::from_str(r#"{"rate_hz": 30, "policy": {"burst": {"max_burst": 3}}}"#)
                .unwrap();
        assert_eq!(cfg.rate_hz, 30);
        assert_eq!(cfg.policy, OverrunPolicy::Burst { max_burst: 3 });
        assert_eq!(cfg.initial_jitter_us, 1_000);
    }
}
