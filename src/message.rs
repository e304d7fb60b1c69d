//! Module that contains the protocol messages exchanged between processes.

use crate::ProcessId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// A protocol message. Each kind carries only the sender's identity: the
/// simplified Maekawa protocol has no payload, no timestamps and no sequence
/// numbers (a real-network port would need to add them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Ask a voting-set member for its vote.
    Request(ProcessId),
    /// A member grants its vote to the head of its request queue.
    Reply(ProcessId),
    /// Give every voting-set member its vote back.
    Release(ProcessId),
}

impl Message {
    pub fn sender(&self) -> ProcessId {
        match self {
            Self::Request(from) | Self::Reply(from) | Self::Release(from) => *from,
        }
    }

    /// Function that returns the message as a JSON formatted `String`.
    pub fn to_json_string(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(serde_json::to_string(self)?)
    }

    /// Function that parses a message from a JSON formatted `String`.
    pub fn from_json_string(token: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(serde_json::from_str::<Self>(token)?)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(from) => write!(f, "REQUEST({from})"),
            Self::Reply(from) => write!(f, "REPLY({from})"),
            Self::Release(from) => write!(f, "RELEASE({from})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_the_only_payload() {
        assert_eq!(Message::Request(3).sender(), 3);
        assert_eq!(Message::Reply(0).sender(), 0);
        assert_eq!(Message::Release(7).sender(), 7);
    }

    #[test]
    fn json_round_trip() {
        let msg = Message::Release(2);
        let json = msg.to_json_string().unwrap();
        assert_eq!(Message::from_json_string(&json).unwrap(), msg);
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(Message::Request(1).to_string(), "REQUEST(1)");
        assert_eq!(Message::Reply(4).to_string(), "REPLY(4)");
    }
}
