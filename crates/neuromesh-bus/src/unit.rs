//! The neuron abstraction: an addressable, topic-subscribed processor with
//! an async mailbox loop.

use crate::network::Network;
use chrono::Utc;
use neuromesh_core::{Message, MessagePriority, NeuronId, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A unit on the bus. Implement this to add a new processor.
///
/// The network owns the mailbox and run loop; implementations only supply
/// identity, subscriptions, and the per-message / periodic handlers.
#[async_trait::async_trait]
pub trait Neuron: Send + Sync {
    /// Stable unique identity for the process lifetime.
    fn id(&self) -> &NeuronId;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Unit type tag (e.g. "memory", "safety").
    fn kind(&self) -> &str {
        "generic"
    }

    /// Topics this unit receives. `prefix.*` subscribes to a topic family,
    /// `*` to everything.
    fn subscriptions(&self) -> Vec<String>;

    /// Handle one delivered message. Errors are logged by the run loop and
    /// never kill it.
    async fn on_message(&self, msg: Message, ctx: &NeuronContext) -> Result<()>;

    /// Periodic hook invoked after each mailbox drain.
    async fn on_tick(&self, _ctx: &NeuronContext) -> Result<()> {
        Ok(())
    }
}

/// Handed to a neuron's handlers; sends messages stamped with the unit's id.
#[derive(Clone)]
pub struct NeuronContext {
    id: NeuronId,
    network: Network,
}

impl NeuronContext {
    pub(crate) fn new(id: NeuronId, network: Network) -> Self {
        Self { id, network }
    }

    pub fn id(&self) -> &NeuronId {
        &self.id
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Publish on a topic, fanned out by subscription.
    pub async fn send(&self, topic: impl Into<String>, payload: Value) -> Result<()> {
        self.network
            .route(Message::new(self.id.clone(), topic, payload))
            .await
    }

    /// Unicast to a specific unit.
    pub async fn send_to(
        &self,
        target: impl Into<NeuronId>,
        topic: impl Into<String>,
        payload: Value,
    ) -> Result<()> {
        self.network
            .route(Message::new(self.id.clone(), topic, payload).to(target))
            .await
    }

    pub async fn send_with_priority(
        &self,
        topic: impl Into<String>,
        payload: Value,
        priority: MessagePriority,
    ) -> Result<()> {
        self.network
            .route(Message::new(self.id.clone(), topic, payload).with_priority(priority))
            .await
    }

    /// Respond to a message: `.response` topic suffix, correlation id set,
    /// unicast back to the sender.
    pub async fn respond(&self, original: &Message, payload: Value) -> Result<()> {
        self.network
            .route(Message::response_to(original, self.id.clone(), payload))
            .await
    }

    /// Route a pre-built message. The source must be this unit's id.
    pub async fn route(&self, msg: Message) -> Result<()> {
        self.network.route(msg).await
    }
}

/// Drive one neuron's mailbox until cancelled.
///
/// Drains queued messages through the handler, invokes the periodic hook,
/// idles briefly, repeats. A failing handler is logged and the loop moves to
/// the next message; only cancellation stops the loop.
pub(crate) async fn run_mailbox(
    neuron: Arc<dyn Neuron>,
    mut mailbox: mpsc::UnboundedReceiver<Message>,
    ctx: NeuronContext,
    idle: Duration,
    cancel: CancellationToken,
) {
    debug!(unit = %ctx.id(), "mailbox loop started");
    loop {
        while let Ok(msg) = mailbox.try_recv() {
            if cancel.is_cancelled() {
                debug!(unit = %ctx.id(), "mailbox loop stopped");
                return;
            }
            if msg.is_expired(Utc::now()) {
                debug!(unit = %ctx.id(), topic = %msg.topic, "dropping expired message");
                continue;
            }
            let topic = msg.topic.clone();
            if let Err(e) = neuron.on_message(msg, &ctx).await {
                warn!(unit = %ctx.id(), %topic, "handler error: {e}");
            }
        }

        if let Err(e) = neuron.on_tick(&ctx).await {
            warn!(unit = %ctx.id(), "periodic hook error: {e}");
        }

        tokio::select! {
            _ = tokio::time::sleep(idle) => {}
            _ = cancel.cancelled() => {
                debug!(unit = %ctx.id(), "mailbox loop stopped");
                return;
            }
        }
    }
}
