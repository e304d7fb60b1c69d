//! Injectable delay policies modelling asynchronous message propagation.
//! Every policy draws from an explicitly seeded generator so a run can be
//! reproduced exactly.

use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct Poisson<R: Rng + ?Sized> {
    pub rng: Box<R>,
    pub rate: f64,
}

impl Poisson<SmallRng> {
    pub fn new(rate: f64, seed: u64) -> Self {
        Self {
            rng: Box::new(SmallRng::seed_from_u64(seed)),
            rate,
        }
    }

    /// Inter-event time, in seconds, of a Poisson process with the
    /// configured rate.
    pub fn time_for_next_event(&mut self) -> f64 {
        -(1.0f64 - self.rng.random::<f64>()).log2() / self.rate
    }
}

/// Declarative description of a delay policy, as it appears in a simulation
/// config. `Uniform { max_ms: 1000 }` reproduces the original behavior of
/// sleeping up to a second before consuming each reply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelaySpec {
    /// No delay at all, for deterministic tests.
    None,
    /// Uniform delay in `0..max_ms` milliseconds.
    Uniform { max_ms: u64 },
    /// Exponentially distributed delay with `rate` events per second.
    Poisson { rate: f64 },
}

impl Default for DelaySpec {
    fn default() -> Self {
        Self::Uniform { max_ms: 1000 }
    }
}

impl DelaySpec {
    /// Instantiates the policy with its own generator, so concurrent cycles
    /// never share mutable randomness.
    pub fn build(self, seed: u64) -> DelayPolicy {
        match self {
            Self::None => DelayPolicy::None,
            Self::Uniform { max_ms } => DelayPolicy::Uniform {
                rng: SmallRng::seed_from_u64(seed),
                max_ms,
            },
            Self::Poisson { rate } => DelayPolicy::Poisson(Poisson::new(rate, seed)),
        }
    }
}

/// A stateful source of propagation delays for one request cycle.
pub enum DelayPolicy {
    None,
    Uniform { rng: SmallRng, max_ms: u64 },
    Poisson(Poisson<SmallRng>),
}

impl DelayPolicy {
    pub fn next_delay(&mut self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Uniform { rng, max_ms } => {
                if *max_ms == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rng.random_range(0..*max_ms))
                }
            }
            Self::Poisson(poisson) => {
                Duration::from_secs_f64(poisson.time_for_next_event().max(0.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_policy_never_sleeps() {
        let mut policy = DelaySpec::None.build(0);
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Duration::ZERO);
        }
    }

    #[test]
    fn uniform_policy_stays_below_its_bound() {
        let mut policy = DelaySpec::Uniform { max_ms: 50 }.build(7);
        for _ in 0..100 {
            assert!(policy.next_delay() < Duration::from_millis(50));
        }
    }

    #[test]
    fn equal_seeds_reproduce_the_same_delays() {
        let spec = DelaySpec::Uniform { max_ms: 1000 };
        let mut a = spec.build(42);
        let mut b = spec.build(42);
        for _ in 0..20 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }

    #[test]
    fn poisson_delays_are_finite_and_non_negative() {
        let mut poisson = Poisson::new(10.0, 3);
        for _ in 0..100 {
            let t = poisson.time_for_next_event();
            assert!(t.is_finite());
            assert!(t >= 0.0);
        }
    }
}
