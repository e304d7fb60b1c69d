//! The simulation driver: owns the process arena, repeatedly picks an idle
//! process at random and runs its full request/execute/release cycle
//! concurrently with any cycles already in flight.

use crate::bus::Bus;
use crate::config::{ConfigError, SimulationConfig};
use crate::process::{CycleOutcome, ProcessAgent, ProcessState, ProtocolError, VoterLoop};
use crate::sync::{CriticalSectionGauge, SharedCell};
use crate::{log, ProcessId, INITIAL_SHARED_VALUE};
use color_print::cformat;
use futures::future::join_all;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("a simulation task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What a finished run looked like, for callers and tests.
#[derive(Debug)]
pub struct SimulationReport {
    /// Outcome of every attempt, in completion order of the spawn sequence.
    pub outcomes: Vec<CycleOutcome>,
    /// The shared value once every cycle finished.
    pub final_value: i64,
    /// Most processes ever simultaneously in the critical section. Mutual
    /// exclusion held iff this never exceeded one.
    pub peak_critical: usize,
}

impl SimulationReport {
    pub fn granted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CycleOutcome::Granted { .. }))
            .count()
    }
}

pub struct Driver {
    config: SimulationConfig,
}

impl Driver {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Validates the configuration (fatal before anything runs), wires up
    /// the arena and drives the configured number of attempts to completion.
    pub async fn run(&self) -> Result<SimulationReport, SimulationError> {
        self.config.validate()?;

        let n = self.config.num_processes;
        let (bus, endpoints) = Bus::new(n);
        let bus = Arc::new(bus);
        let shared = SharedCell::new(INITIAL_SHARED_VALUE);
        let gauge = CriticalSectionGauge::new();
        let hold = Duration::from_millis(self.config.hold_ms);
        let pacing = Duration::from_millis(self.config.pacing_ms);

        let mut voters = Vec::with_capacity(n);
        let mut agents: Vec<Arc<Mutex<ProcessAgent>>> = Vec::with_capacity(n);
        for (id, endpoint) in endpoints.into_iter().enumerate() {
            let voter = VoterLoop::new(id, endpoint.requests, endpoint.releases, bus.reply_router());
            voters.push(tokio::spawn(voter.run()));
            agents.push(Arc::new(Mutex::new(ProcessAgent::new(
                id,
                self.config.coterie.voting_set(id).to_vec(),
                endpoint.replies,
                bus.clone(),
                shared.clone(),
                gauge.clone(),
                hold,
            ))));
        }

        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let mut cycles = Vec::with_capacity(self.config.accesses);
        for _ in 0..self.config.accesses {
            let picked = loop {
                if let Some(id) = self.pick_idle(&agents, &mut rng) {
                    break id;
                }
                sleep(pacing).await;
            };

            // Hold the agent's lock for the whole cycle so no later
            // iteration can pick this process until it is back to Idle.
            let guard = agents[picked].clone().lock_owned().await;
            let mut delays = self.config.delay.build(rng.random());
            cycles.push(tokio::spawn(async move {
                let mut agent = guard;
                agent.run_cycle(&mut delays).await
            }));

            sleep(pacing).await;
        }

        let mut outcomes = Vec::with_capacity(cycles.len());
        for joined in join_all(cycles).await {
            outcomes.push(joined??);
        }

        // Dropping the agents and the bus closes every request and release
        // mailbox; the voter loops drain and exit.
        drop(agents);
        drop(bus);
        for voter in voters {
            voter.await?;
        }

        Ok(SimulationReport {
            outcomes,
            final_value: shared.read(),
            peak_critical: gauge.peak(),
        })
    }

    /// Uniform random pick over the processes that are idle right now. An
    /// agent whose lock is held is mid-cycle and therefore not idle.
    fn pick_idle(
        &self,
        agents: &[Arc<Mutex<ProcessAgent>>],
        rng: &mut SmallRng,
    ) -> Option<ProcessId> {
        let idle: Vec<ProcessId> = agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| {
                agent
                    .try_lock()
                    .map(|guard| guard.state() == ProcessState::Idle)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id)
            .collect();
        if idle.is_empty() {
            None
        } else {
            Some(idle[rng.random_range(0..idle.len())])
        }
    }
}

/// Prints the quorum table the way the original console output did.
pub fn print_quorums(config: &SimulationConfig) {
    log::heading("Quorums");
    for id in 0..config.coterie.len() {
        let members: Vec<String> = config
            .coterie
            .voting_set(id)
            .iter()
            .map(ToString::to_string)
            .collect();
        log::info(&cformat!(
            "process <bold>{}</bold>: {}",
            id,
            members.join(" ")
        ));
    }
}
