pub mod bus;
pub mod config;
pub mod coterie;
pub mod driver;
pub mod log;
pub mod message;
pub mod poisson;
pub mod process;
pub mod sync;

pub use bus::{Bus, BusError, Endpoints, ReplyRouter};
pub use config::{ConfigError, SimulationConfig};
pub use coterie::{Coterie, CoterieViolation};
pub use driver::{Driver, SimulationError, SimulationReport};
pub use message::Message;
pub use poisson::{DelayPolicy, DelaySpec};
pub use process::{CycleOutcome, ProcessAgent, ProcessState, ProtocolError, VoterLoop};
pub use sync::{CriticalSectionGauge, SharedCell};

/// Identity of a logical process, `0..num_processes`.
pub type ProcessId = usize;

/// Value held by the shared resource before any process has entered the
/// critical section.
pub const INITIAL_SHARED_VALUE: i64 = -1;
