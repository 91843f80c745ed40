//! # umbra-node
//!
//! Light peer for Monero-family networks.
//!
//! - **Sessions**: dial, handshake, chain walk and timed sync over the levin
//!   protocol, supervised across several peers
//! - **Scanning**: view-tag prefilter, one-time key match, amount decryption
//!   and commitment check for every received output
//! - **Construction**: ring-CT transactions with Bulletproof-Plus range
//!   proofs and CLSAG signatures, decoys fetched from a daemon
//!
//! Persistence and reporting go through the [`Database`] and [`Notifier`]
//! collaborator traits.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod nodes;
pub mod pool;
pub mod rpc;
pub mod scanner;
pub mod session;
pub mod supervisor;
pub mod telemetry;

/// Re-export commonly used types at crate root
pub use error::{NodeError, NodeResult};

// Configuration and telemetry
pub use config::{KeyConfig, NodeConfig};
pub use telemetry::init_telemetry;

// Collaborators
pub use collaborators::{Database, MemoryDatabase, Notifier, NotifyLevel, TracingNotifier};

// Scanning and the block pool
pub use pool::{BlockPool, PendingBlock};
pub use scanner::{AmountStatus, OwnedOutput, ScanOutcome, Scanner};

// Sessions
pub use nodes::NodeList;
pub use session::{Session, SessionContext, SessionReport, SessionState};
pub use supervisor::Supervisor;

// Construction
pub use builder::{BuiltTransaction, Destination, SpendableInput, TransactionBuilder};
pub use rpc::{DaemonRpc, DecoySource, RingMember, RingSelector};
