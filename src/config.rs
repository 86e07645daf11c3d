//! Proposer configuration: conflict backoff, sleeping, randomness.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Randomized exponential backoff applied between conflicted iterations.
///
/// Each conflicted iteration sleeps `unit * r * multiplier` with `r` drawn
/// uniformly from `1..=8`; the multiplier doubles per conflict up to
/// `cap`.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Base delay unit.
    pub unit: Duration,
    /// Upper bound on the doubling multiplier.
    pub cap: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_millis(100),
            cap: 64,
        }
    }
}

impl BackoffConfig {
    /// Delay for the current multiplier, with fresh jitter.
    #[must_use]
    pub fn delay(&self, multiplier: u32, rng: &mut impl Rng) -> Duration {
        self.unit * rng.random_range(1..=8u32) * multiplier
    }

    /// The multiplier to use after one more conflict.
    #[must_use]
    pub fn escalate(&self, multiplier: u32) -> u32 {
        (multiplier * 2).min(self.cap)
    }
}

/// Sleep hook so tests can substitute or pause time.
pub trait Sleep {
    /// Suspend the calling task for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Tokio-timer sleep.
#[derive(Clone, Copy, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Proposer configuration with RNG for jitter.
pub struct ProposerConfig<S: Sleep = TokioSleep, R: Rng = StdRng> {
    /// Backoff parameters for conflicted iterations.
    pub backoff: BackoffConfig,
    /// Whether conflicted iterations sleep before retrying.
    pub conflict_backoff: bool,
    /// Sleep implementation.
    pub sleep: S,
    /// RNG for jitter (seeded for deterministic tests).
    pub rng: R,
}

impl<S: Sleep, R: Rng> ProposerConfig<S, R> {
    /// Create a proposer config with a custom RNG.
    pub fn new(backoff: BackoffConfig, sleep: S, rng: R) -> Self {
        Self {
            backoff,
            conflict_backoff: true,
            sleep,
            rng,
        }
    }
}

impl<S: Sleep> ProposerConfig<S, StdRng> {
    /// Create a proposer config with a seeded RNG for deterministic tests.
    #[must_use]
    pub fn with_seed(backoff: BackoffConfig, sleep: S, seed: u64) -> Self {
        Self::new(backoff, sleep, StdRng::seed_from_u64(seed))
    }
}

impl Default for ProposerConfig<TokioSleep, StdRng> {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            conflict_backoff: true,
            sleep: TokioSleep,
            rng: StdRng::from_os_rng(),
        }
    }
}
