//! Delay policy protecting the upstream from bursts.
//!
//! Every suspension the pipeline makes on purpose (retry backoff, success
//! jitter, inter-item/stage/batch/day/block pauses) goes through a [`Pacer`],
//! so tests can swap in [`RecordingPacer`] and run without wall-clock waits.

use crate::shared::config::AppConfig;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Real sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Remembers every requested pause and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.pauses().len()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }

    pub fn clear(&self) {
        self.pauses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(delay);
    }
}

/// Inclusive range a jittered delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

/// All the pauses the pipeline takes, in one place.
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    /// After every successful upstream call
    pub success_jitter: DelayRange,
    /// Between items of one stage
    pub item: DelayRange,
    pub stage: Duration,
    pub batch: Duration,
    pub day: Duration,
    pub block: Duration,
    pub league: Duration,
}

impl PacingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            success_jitter: DelayRange::new(config.success_jitter_min, config.success_jitter_max),
            item: DelayRange::new(config.item_delay_min, config.item_delay_max),
            stage: config.stage_delay,
            batch: config.batch_delay,
            day: config.day_delay,
            block: config.block_delay,
            league: config.league_delay,
        }
    }

    /// No waiting anywhere; pairs with [`RecordingPacer`] in tests.
    pub fn immediate() -> Self {
        Self {
            success_jitter: DelayRange::fixed(Duration::ZERO),
            item: DelayRange::fixed(Duration::ZERO),
            stage: Duration::ZERO,
            batch: Duration::ZERO,
            day: Duration::ZERO,
            block: Duration::ZERO,
            league: Duration::ZERO,
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
