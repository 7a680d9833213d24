//! Neuromesh Governance - the intention approval/execution state machine
//!
//! Every state-changing proposal in the runtime passes through one
//! [`IntentionBoard`]. Intentions are proposed as Pending, resolved through
//! approval or rejection, claimed atomically for execution, and terminated
//! as Completed, Failed, Expired, or Cancelled. Invalid transitions fail
//! deterministically; nothing is ever silently dropped.

pub mod board;

pub use board::IntentionBoard;
