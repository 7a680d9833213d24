//! Neuromesh Runtime - coordination loops over the bus and governance layer
//!
//! The [`Coordinator`] owns one [`Network`](neuromesh_bus::Network), one
//! [`IntentionBoard`](neuromesh_governance::IntentionBoard), and the injected
//! [`Collaborators`]. It runs two cancellable loops: a coordination loop that
//! ticks the approval policy, and an execution loop that claims approved
//! intentions and runs them to completion. Operators steer it through a
//! slash-command surface; everything user-visible flows through the
//! [`Notifier`].

pub mod commands;
pub mod config;
pub mod coordinator;
mod dispatch;
pub mod hooks;
pub mod notify;

pub use config::{ApprovalConfig, RuntimeConfig};
pub use coordinator::Coordinator;
pub use hooks::{
    ChatProcessor, Collaborators, Embedder, IntentionStore, Presenter, SafetyValidator,
    SafetyVerdict, SymbolicEngine, ThoughtProvider, ToolExecutor, TopicScout, VectorStore,
};
pub use notify::{Notification, Notifier, NOTIFICATION_HISTORY_LIMIT};
