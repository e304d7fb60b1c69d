//! Simulation inputs: process count, coterie, number of critical-section
//! attempts, plus the timing and seeding knobs. The built-in scenarios stand
//! in for the original program's compile-time input packages.

use crate::coterie::{Coterie, CoterieViolation};
use crate::poisson::DelaySpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the simulation needs at least one process")]
    NoProcesses,
    #[error("the coterie assigns {got} voting sets but the simulation has {expected} processes")]
    CoterieSize { expected: usize, got: usize },
    #[error(transparent)]
    Coterie(#[from] CoterieViolation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_processes: usize,
    pub coterie: Coterie,
    /// Number of critical-section attempts to run.
    pub accesses: usize,
    /// Seed for process selection and delay injection. Equal seeds under
    /// equal configs draw the same random choices.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Pause between spawning attempts, and the re-poll interval while no
    /// process is idle.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// How long a process holds the critical section once granted.
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    /// Propagation-delay policy applied before consuming each reply.
    #[serde(default)]
    pub delay: DelaySpec,
}

fn default_pacing_ms() -> u64 {
    1000
}

fn default_hold_ms() -> u64 {
    1500
}

impl SimulationConfig {
    pub fn new(num_processes: usize, coterie: Coterie, accesses: usize) -> Self {
        Self {
            num_processes,
            coterie,
            accesses,
            seed: None,
            pacing_ms: default_pacing_ms(),
            hold_ms: default_hold_ms(),
            delay: DelaySpec::default(),
        }
    }

    /// Five processes under cyclic quorums `{i, i+1, i+2}` mod 5: every pair
    /// of voting sets intersects and none contains another.
    pub fn valid_five() -> Self {
        Self::new(
            5,
            Coterie(vec![
                vec![0, 1, 2],
                vec![1, 2, 3],
                vec![2, 3, 4],
                vec![3, 4, 0],
                vec![4, 0, 1],
            ]),
            5,
        )
    }

    /// Three processes whose voting sets do not all pairwise intersect; the
    /// validator must refuse to run this.
    pub fn intersection_invalid() -> Self {
        Self::new(3, Coterie(vec![vec![1], vec![0, 2], vec![1]]), 3)
    }

    /// Four processes where the voting set of process 0 is contained in the
    /// voting set of process 1; the validator must refuse to run this.
    pub fn minimality_invalid() -> Self {
        Self::new(
            4,
            Coterie(vec![vec![1, 2], vec![1, 2, 3], vec![2, 3], vec![1, 3]]),
            4,
        )
    }

    /// Fatal-if-wrong checks, run once before any process starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if self.coterie.len() != self.num_processes {
            return Err(ConfigError::CoterieSize {
                expected: self.num_processes,
                got: self.coterie.len(),
            });
        }
        self.coterie.validate()?;
        Ok(())
    }

    /// Function that returns the config as a JSON formatted `String`.
    pub fn to_json_string(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(serde_json::to_string(self)?)
    }

    /// Function that parses a config from a JSON formatted `String`.
    pub fn from_json_string(token: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(serde_json::from_str::<Self>(token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_valid_scenario_validates() {
        assert_eq!(SimulationConfig::valid_five().validate(), Ok(()));
    }

    #[test]
    fn the_intersection_scenario_is_refused() {
        assert_eq!(
            SimulationConfig::intersection_invalid().validate(),
            Err(ConfigError::Coterie(CoterieViolation::Intersection {
                i: 0,
                j: 1
            }))
        );
    }

    #[test]
    fn the_minimality_scenario_is_refused() {
        assert_eq!(
            SimulationConfig::minimality_invalid().validate(),
            Err(ConfigError::Coterie(CoterieViolation::Minimality {
                i: 0,
                j: 1
            }))
        );
    }

    #[test]
    fn zero_processes_are_refused() {
        let config = SimulationConfig::new(0, Coterie(vec![]), 1);
        assert_eq!(config.validate(), Err(ConfigError::NoProcesses));
    }

    #[test]
    fn coterie_size_must_match_process_count() {
        let config = SimulationConfig::new(3, Coterie(vec![vec![1], vec![0]]), 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CoterieSize {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let json = r#"{"num_processes":2,"coterie":[[0,1],[1,0]],"accesses":4}"#;
        let config = SimulationConfig::from_json_string(json).unwrap();
        assert_eq!(config.num_processes, 2);
        assert_eq!(config.accesses, 4);
        assert_eq!(config.pacing_ms, 1000);
        assert_eq!(config.hold_ms, 1500);
        assert_eq!(config.delay, DelaySpec::Uniform { max_ms: 1000 });
        assert_eq!(config.seed, None);

        let round = SimulationConfig::from_json_string(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(round, config);
    }
}
