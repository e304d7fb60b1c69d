//! Delivery substrate between processes: one request mailbox and one release
//! mailbox per process, consumed by its voter loop, plus one reply channel,
//! consumed by its request cycle. Channels preserve send order per pair of
//! processes; there is no ordering across senders beyond arrival order at
//! the receiver, and arrival order is exactly what drives queue order.

use crate::{log, Message, ProcessId};
use color_print::cformat;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("no mailbox exists for process {0}")]
    UnknownProcess(ProcessId),
    #[error("the mailbox of process {0} is closed")]
    Closed(ProcessId),
}

/// Receiver ends of one process's mailboxes, handed out once at startup.
pub struct Endpoints {
    pub requests: mpsc::Receiver<ProcessId>,
    pub releases: mpsc::Receiver<ProcessId>,
    pub replies: mpsc::Receiver<ProcessId>,
}

/// The grant-delivery half of the bus. Voter loops hold this instead of the
/// whole [`Bus`] so that dropping the agents and the bus closes the request
/// and release mailboxes and lets every voter loop run down.
#[derive(Clone)]
pub struct ReplyRouter {
    replies: Vec<mpsc::Sender<ProcessId>>,
}

impl ReplyRouter {
    /// Delivers `REPLY(from)` to process `to`.
    pub async fn grant(&self, to: ProcessId, from: ProcessId) -> Result<(), BusError> {
        log::debug(&cformat!(
            "process <bold>{}</bold> sends {} to process <bold>{}</bold>",
            from,
            Message::Reply(from),
            to
        ));
        self.replies
            .get(to)
            .ok_or(BusError::UnknownProcess(to))?
            .send(from)
            .await
            .map_err(|_| BusError::Closed(to))
    }
}

/// Sender ends of every process's mailboxes, shared by all agents.
pub struct Bus {
    requests: Vec<mpsc::Sender<ProcessId>>,
    releases: Vec<mpsc::Sender<ProcessId>>,
    replies: ReplyRouter,
}

impl Bus {
    /// Builds the mailboxes for `num_processes` processes. Every channel
    /// gets capacity `num_processes`: each process sends at most one
    /// outstanding request and one release to any mailbox, so a sender can
    /// never block and stall the whole system.
    pub fn new(num_processes: usize) -> (Self, Vec<Endpoints>) {
        let capacity = num_processes.max(1);
        let mut requests = Vec::with_capacity(num_processes);
        let mut releases = Vec::with_capacity(num_processes);
        let mut replies = Vec::with_capacity(num_processes);
        let mut endpoints = Vec::with_capacity(num_processes);

        for _ in 0..num_processes {
            let (req_tx, req_rx) = mpsc::channel(capacity);
            let (rel_tx, rel_rx) = mpsc::channel(capacity);
            let (rep_tx, rep_rx) = mpsc::channel(capacity);
            requests.push(req_tx);
            releases.push(rel_tx);
            replies.push(rep_tx);
            endpoints.push(Endpoints {
                requests: req_rx,
                releases: rel_rx,
                replies: rep_rx,
            });
        }

        let bus = Self {
            requests,
            releases,
            replies: ReplyRouter { replies },
        };
        (bus, endpoints)
    }

    pub fn reply_router(&self) -> ReplyRouter {
        self.replies.clone()
    }

    /// Delivers a message to the matching mailbox of process `to`.
    pub async fn send(&self, to: ProcessId, message: Message) -> Result<(), BusError> {
        let mailbox = match message {
            Message::Reply(from) => return self.replies.grant(to, from).await,
            Message::Request(_) => &self.requests,
            Message::Release(_) => &self.releases,
        };
        log::debug(&cformat!(
            "process <bold>{}</bold> sends {} to process <bold>{}</bold>",
            message.sender(),
            message,
            to
        ));
        mailbox
            .get(to)
            .ok_or(BusError::UnknownProcess(to))?
            .send(message.sender())
            .await
            .map_err(|_| BusError::Closed(to))
    }
}
