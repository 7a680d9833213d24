//! Neuromesh Bus - weighted message routing between units
//!
//! Architecture:
//! - [`Neuron`]: an addressable, topic-subscribed processor with an async
//!   mailbox loop
//! - [`Topology`]: a weighted directed graph between unit identities with
//!   online (Hebbian) learning
//! - [`Network`]: registers units, routes and broadcasts messages, applies
//!   weight modulation and pluggable filters
//!
//! Publishing enqueues to each matching unit's mailbox channel without
//! blocking the publisher; delivery-side effects (persistence) run on a
//! bounded work queue drained at shutdown.

pub mod filter;
pub mod network;
pub mod topology;
pub mod unit;

pub use filter::{MessageFilter, TopicBlockFilter};
pub use network::{MessageStore, Network, NetworkBuilder, NetworkStats};
pub use topology::{Connection, EdgeView, Topology, DEFAULT_PLASTICITY};
pub use unit::{Neuron, NeuronContext};
