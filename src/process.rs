//! The per-process protocol: a voter loop arbitrating one vote among
//! competing requesters, and the request/execute/release cycle a process
//! runs when it wants the critical section.

use crate::bus::{Bus, BusError, ReplyRouter};
use crate::sync::{CriticalSectionGauge, SharedCell};
use crate::{log, Message, ProcessId};
use color_print::cformat;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::poisson::DelayPolicy;

/// Protocol state of a process. Transitions outside [`ProcessState::can_advance`]
/// are rejected as harness bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not seeking the critical section; its voter loop still serves peers.
    Idle,
    /// Requests sent to the voting set, replies not yet awaited.
    Requesting,
    /// Collecting replies, one per voting-set member.
    Waiting,
    /// Holds the critical section and may mutate the shared resource.
    Critical,
    /// The request cycle finished without a single grant.
    Blocked,
}

impl ProcessState {
    pub fn can_advance(self, next: ProcessState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Requesting)
                | (Self::Requesting, Self::Waiting)
                | (Self::Waiting, Self::Critical)
                | (Self::Waiting, Self::Blocked)
                | (Self::Critical, Self::Idle)
                | (Self::Blocked, Self::Idle)
        )
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("process {process}: illegal state transition {from:?} -> {to:?}")]
    InvalidTransition {
        process: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },
    #[error("process {process}: reply channel closed while awaiting grants")]
    ReplyChannelClosed { process: ProcessId },
    #[error("process {process}: critical section executed from state {state:?}")]
    ExecuteOutsideCriticalSection {
        process: ProcessId,
        state: ProcessState,
    },
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// How one critical-section attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The process entered the critical section and wrote `value`.
    Granted { process: ProcessId, value: i64 },
    /// The process saw no grant and backed off without touching the resource.
    Blocked { process: ProcessId },
}

/// The message-handling half of a process: sole owner of its request queue.
/// One vote, granted to the queue head, FIFO among competing requesters.
pub struct VoterLoop {
    id: ProcessId,
    queue: VecDeque<ProcessId>,
    requests: mpsc::Receiver<ProcessId>,
    releases: mpsc::Receiver<ProcessId>,
    replies: ReplyRouter,
}

impl VoterLoop {
    pub fn new(
        id: ProcessId,
        requests: mpsc::Receiver<ProcessId>,
        releases: mpsc::Receiver<ProcessId>,
        replies: ReplyRouter,
    ) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            requests,
            releases,
            replies,
        }
    }

    /// Serves the request and release mailboxes until both are closed and
    /// drained.
    pub async fn run(mut self) {
        loop {
            let step = tokio::select! {
                Some(from) = self.requests.recv() => self.on_request(from).await,
                Some(from) = self.releases.recv() => self.on_release(from).await,
                else => break,
            };
            if let Err(e) = step {
                log::error(&format!("voter loop of process {}: {e}", self.id));
                break;
            }
        }
    }

    /// An empty queue means the vote is free: enqueue and grant immediately.
    /// Otherwise the requester waits its turn at the tail.
    async fn on_request(&mut self, from: ProcessId) -> Result<(), BusError> {
        self.queue.push_back(from);
        if self.queue.len() == 1 {
            self.replies.grant(from, self.id).await?;
        }
        Ok(())
    }

    /// The head of the queue is the process that just released. Pop it and,
    /// if anyone is still queued, grant the new head.
    async fn on_release(&mut self, _from: ProcessId) -> Result<(), BusError> {
        self.queue.pop_front();
        if let Some(&next) = self.queue.front() {
            self.replies.grant(next, self.id).await?;
        }
        Ok(())
    }
}

/// The requesting half of a process: owns its protocol state, its voting
/// set and its reply channel. The driver locks an agent for the whole of a
/// cycle, so a process never runs two overlapping attempts.
pub struct ProcessAgent {
    id: ProcessId,
    state: ProcessState,
    voting_set: Vec<ProcessId>,
    replies: mpsc::Receiver<ProcessId>,
    bus: Arc<Bus>,
    shared: SharedCell,
    gauge: CriticalSectionGauge,
    hold: Duration,
}

impl ProcessAgent {
    pub fn new(
        id: ProcessId,
        voting_set: Vec<ProcessId>,
        replies: mpsc::Receiver<ProcessId>,
        bus: Arc<Bus>,
        shared: SharedCell,
        gauge: CriticalSectionGauge,
        hold: Duration,
    ) -> Self {
        Self {
            id,
            state: ProcessState::Idle,
            voting_set,
            replies,
            bus,
            shared,
            gauge,
            hold,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    fn advance(&mut self, to: ProcessState) -> Result<(), ProtocolError> {
        if !self.state.can_advance(to) {
            return Err(ProtocolError::InvalidTransition {
                process: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Sends `REQUEST` to every voting-set member, then consumes exactly one
    /// reply per member, sleeping a policy-drawn delay before each receive
    /// to model asynchronous propagation. There is no timeout: if a member
    /// never answers, this blocks forever, which the simplified protocol
    /// accepts as a liveness limitation.
    pub async fn request_cs(&mut self, delays: &mut DelayPolicy) -> Result<(), ProtocolError> {
        log::info(&cformat!(
            "<cyan>process <bold>{}</bold> requests the critical section</cyan>",
            self.id
        ));
        for &member in &self.voting_set {
            self.bus.send(member, Message::Request(self.id)).await?;
        }
        self.advance(ProcessState::Waiting)?;

        let mut granted = false;
        for _ in 0..self.voting_set.len() {
            sleep(delays.next_delay()).await;
            let from = self
                .replies
                .recv()
                .await
                .ok_or(ProtocolError::ReplyChannelClosed { process: self.id })?;
            log::info(&cformat!(
                "process <bold>{}</bold> receives a reply from process <bold>{}</bold>",
                self.id,
                from
            ));
            // A reply only counts as a grant when it comes from a peer and
            // this process has not already entered the critical section.
            // Kept exactly as the original wrote it, quirks included.
            if from != self.id && self.state != ProcessState::Critical {
                granted = true;
            }
        }

        if granted {
            self.advance(ProcessState::Critical)?;
            self.gauge.enter();
            log::info(&cformat!(
                "<red>process <bold>{}</bold> enters the critical section</red>",
                self.id
            ));
        } else {
            self.advance(ProcessState::Blocked)?;
            log::info(&cformat!(
                "<red>process <bold>{}</bold> is blocked</red>",
                self.id
            ));
        }
        Ok(())
    }

    /// The critical-section body: the one place the shared resource is
    /// written. Derives the new value from the process id and holds the
    /// section for the configured duration.
    pub async fn execute_cs(&mut self) -> Result<i64, ProtocolError> {
        if self.state != ProcessState::Critical {
            return Err(ProtocolError::ExecuteOutsideCriticalSection {
                process: self.id,
                state: self.state,
            });
        }
        let value = (self.id * self.id) as i64;
        let previous = self.shared.write(value);
        log::info(&cformat!(
            "<cyan>process <bold>{}</bold> updates the shared value from <green>{}</green> to <green>{}</green></cyan>",
            self.id,
            previous,
            value
        ));
        sleep(self.hold).await;
        Ok(value)
    }

    /// Returns the vote to every voting-set member and goes back to Idle,
    /// whether or not the critical section was actually entered. A blocked
    /// process was still enqueued at its members, so it releases too.
    pub async fn release_cs(&mut self) -> Result<(), ProtocolError> {
        if self.state == ProcessState::Critical {
            self.gauge.exit();
        }
        log::info(&cformat!(
            "<red>process <bold>{}</bold> releases the critical section</red>",
            self.id
        ));
        for &member in &self.voting_set {
            self.bus.send(member, Message::Release(self.id)).await?;
        }
        self.advance(ProcessState::Idle)
    }

    /// One full critical-section attempt: request, execute when granted,
    /// release either way.
    pub async fn run_cycle(
        &mut self,
        delays: &mut DelayPolicy,
    ) -> Result<CycleOutcome, ProtocolError> {
        log::info(&cformat!(
            "<yellow>process <bold>{}</bold> wants to get into the critical section</yellow>",
            self.id
        ));
        self.advance(ProcessState::Requesting)?;
        self.request_cs(delays).await?;

        let outcome = if self.state == ProcessState::Critical {
            let value = self.execute_cs().await?;
            CycleOutcome::Granted {
                process: self.id,
                value,
            }
        } else {
            log::info(&cformat!(
                "<red>process <bold>{}</bold> cannot get into the critical section</red>",
                self.id
            ));
            CycleOutcome::Blocked { process: self.id }
        };

        self.release_cs().await?;
        Ok(outcome)
    }
}
