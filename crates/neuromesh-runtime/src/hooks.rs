//! Injected collaborator hooks.
//!
//! Every hook is optional. A missing hook degrades to its documented
//! fallback (a log line and/or a literal result string) — it never raises.
//! Implementations live outside this workspace and are injected at wiring
//! time as `Arc<dyn Trait>`.

use neuromesh_core::{Intention, IntentionDraft};
use serde_json::Value;
use std::sync::Arc;

/// Executes a named external tool. Fallback: the action completes with a
/// "no tool executor attached" result.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &Value) -> anyhow::Result<String>;
}

/// Embeds text into a vector. Fallback: memory/exploration dispatch skips
/// the vector path.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Vector persistence and similarity search. Fallback: memory writes are
/// skipped, exploration reports nothing found.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, key: &str, vector: &[f32], payload: &Value) -> anyhow::Result<()>;
    async fn search(&self, vector: &[f32], limit: usize) -> anyhow::Result<Vec<(String, f64)>>;
}

/// Persists intentions for external storage/UI. Fallback: intentions live
/// only in the board's memory.
#[async_trait::async_trait]
pub trait IntentionStore: Send + Sync {
    async fn save(&self, intention: &Intention) -> anyhow::Result<()>;
}

/// LLM "think" generation. Fallback: reflective dispatch returns a literal
/// note that no thought provider is attached.
#[async_trait::async_trait]
pub trait ThoughtProvider: Send + Sync {
    async fn think(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Symbolic reasoning engine. Fallback: queries return nothing, facts are
/// not recorded, verification is skipped.
#[async_trait::async_trait]
pub trait SymbolicEngine: Send + Sync {
    async fn query(&self, question: &str) -> anyhow::Result<String>;
    async fn assert_fact(&self, fact: &str) -> anyhow::Result<()>;
    async fn verify(&self, claim: &str) -> anyhow::Result<bool>;
}

/// Free-text chat processing. Fallback: communication dispatch falls through
/// to the presenter or a broadcast.
#[async_trait::async_trait]
pub trait ChatProcessor: Send + Sync {
    async fn process(&self, text: &str) -> anyhow::Result<String>;
}

/// Display / voice output. Fallback: text goes to the notification stream
/// only.
#[async_trait::async_trait]
pub trait Presenter: Send + Sync {
    async fn display(&self, text: &str) -> anyhow::Result<()>;
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct SafetyVerdict {
    pub approved: bool,
    pub reason: String,
}

/// Pre-execution validation gate. Fallback: execution proceeds. A hook error
/// is logged and treated as a permit — absence and failure degrade alike.
#[async_trait::async_trait]
pub trait SafetyValidator: Send + Sync {
    async fn validate(&self, intention: &Intention) -> anyhow::Result<SafetyVerdict>;
}

/// Synthesizes a new intention from recent context on the discovery
/// interval. Fallback: the discovery pass is skipped.
#[async_trait::async_trait]
pub trait TopicScout: Send + Sync {
    async fn discover(&self) -> anyhow::Result<Option<IntentionDraft>>;
}

/// The full set of injected collaborators, all optional.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub tools: Option<Arc<dyn ToolExecutor>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub vectors: Option<Arc<dyn VectorStore>>,
    pub intention_store: Option<Arc<dyn IntentionStore>>,
    pub thoughts: Option<Arc<dyn ThoughtProvider>>,
    pub symbolic: Option<Arc<dyn SymbolicEngine>>,
    pub chat: Option<Arc<dyn ChatProcessor>>,
    pub presenter: Option<Arc<dyn Presenter>>,
    pub validator: Option<Arc<dyn SafetyValidator>>,
    pub scout: Option<Arc<dyn TopicScout>>,
    /// Names of currently-available external tools, for `/tools`.
    pub available_tools: Vec<String>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }
}
