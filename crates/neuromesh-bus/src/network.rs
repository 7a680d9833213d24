//! The network: registers units, routes and broadcasts messages.
//!
//! Routing order: bounded history -> observation stream -> persistence
//! side-effect queue -> filter conjunction -> delivery. Delivery is unicast
//! when the message carries a target, otherwise topic fan-out with wildcard
//! matching and per-edge weight modulation. The sender never receives its
//! own message.

use crate::filter::MessageFilter;
use crate::topology::Topology;
use crate::unit::{run_mailbox, Neuron, NeuronContext};
use neuromesh_core::{Error, Message, MessagePriority, NeuronId, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dashmap::DashMap;

/// Weight at or below which delivery to an edge is suppressed entirely.
const SUPPRESS_THRESHOLD: f64 = -0.8;
/// Weight above which delivery is upgraded to High priority.
const BOOST_THRESHOLD: f64 = 0.8;

/// Persistence hook for routed messages. Called from the side-effect worker;
/// errors are logged and never gate delivery.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, msg: &Message) -> anyhow::Result<()>;
}

enum SideEffect {
    Persist(Message),
}

struct UnitEntry {
    neuron: Arc<dyn Neuron>,
    subscriptions: Vec<String>,
    mailbox: mpsc::UnboundedSender<Message>,
    pending_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

/// Counters and sizes for the operator `/bus` view.
#[derive(Clone, Debug, Serialize)]
pub struct NetworkStats {
    pub units: usize,
    pub routed: u64,
    pub broadcasts: u64,
    pub dropped: u64,
    pub suppressed: u64,
    pub history_len: usize,
    pub edges: usize,
}

struct Inner {
    units: DashMap<NeuronId, UnitEntry>,
    topics: DashMap<String, Vec<NeuronId>>,
    topology: Option<Topology>,
    filters: Vec<Arc<dyn MessageFilter>>,
    store: Option<Arc<dyn MessageStore>>,
    history: Mutex<VecDeque<Message>>,
    history_limit: usize,
    idle_interval: Duration,
    observe_tx: broadcast::Sender<Message>,
    effects_tx: mpsc::Sender<SideEffect>,
    effects_rx: Mutex<Option<mpsc::Receiver<SideEffect>>>,
    cancel: CancellationToken,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    routed: AtomicU64,
    broadcasts: AtomicU64,
    dropped: AtomicU64,
    suppressed: AtomicU64,
}

/// Builds a [`Network`]. Topology, filters, and the persistence hook are
/// fixed at build time.
pub struct NetworkBuilder {
    topology: Option<Topology>,
    filters: Vec<Arc<dyn MessageFilter>>,
    store: Option<Arc<dyn MessageStore>>,
    history_limit: usize,
    idle_interval: Duration,
    effect_queue: usize,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            topology: None,
            filters: Vec::new(),
            store: None,
            history_limit: 200,
            idle_interval: Duration::from_millis(50),
            effect_queue: 256,
        }
    }

    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn filter(mut self, filter: Arc<dyn MessageFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn message_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn idle_interval(mut self, idle: Duration) -> Self {
        self.idle_interval = idle;
        self
    }

    pub fn build(self) -> Network {
        let (observe_tx, _) = broadcast::channel(1024);
        let (effects_tx, effects_rx) = mpsc::channel(self.effect_queue);
        Network {
            inner: Arc::new(Inner {
                units: DashMap::new(),
                topics: DashMap::new(),
                topology: self.topology,
                filters: self.filters,
                store: self.store,
                history: Mutex::new(VecDeque::new()),
                history_limit: self.history_limit,
                idle_interval: self.idle_interval,
                observe_tx,
                effects_tx,
                effects_rx: Mutex::new(Some(effects_rx)),
                cancel: CancellationToken::new(),
                running: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                routed: AtomicU64::new(0),
                broadcasts: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                suppressed: AtomicU64::new(0),
            }),
        }
    }
}

/// The weighted message router. Cheaply cloneable handle.
#[derive(Clone)]
pub struct Network {
    inner: Arc<Inner>,
}

impl Network {
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    /// Register a unit: index by id and by each subscribed topic, and seed
    /// default connections toward every unit sharing at least one topic.
    ///
    /// Seeded weight is `min(0.5 + 0.1 * shared_topics, 0.9)`, bidirectional,
    /// inserted only where no connection already exists in that direction.
    pub async fn register(&self, neuron: Arc<dyn Neuron>) -> Result<()> {
        let id = neuron.id().clone();
        if self.inner.units.contains_key(&id) {
            return Err(Error::DuplicateNeuron(id.to_string()));
        }
        let subscriptions = neuron.subscriptions();

        if let Some(topology) = &self.inner.topology {
            for other in self.inner.units.iter() {
                let shared = other
                    .value()
                    .subscriptions
                    .iter()
                    .filter(|t| subscriptions.contains(t))
                    .count();
                if shared > 0 {
                    let weight = (0.5 + 0.1 * shared as f64).min(0.9);
                    topology.connect_default(&id, other.key(), weight);
                    topology.connect_default(other.key(), &id, weight);
                }
            }
        }

        for topic in &subscriptions {
            self.inner
                .topics
                .entry(topic.clone())
                .or_default()
                .push(id.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.units.insert(
            id.clone(),
            UnitEntry {
                neuron,
                subscriptions,
                mailbox: tx,
                pending_rx: Mutex::new(Some(rx)),
            },
        );
        debug!(unit = %id, "unit registered");

        // Late registration on a live network activates immediately.
        if self.inner.running.load(Ordering::SeqCst) {
            self.spawn_runner(&id).await;
        }
        Ok(())
    }

    pub fn is_registered(&self, id: &NeuronId) -> bool {
        self.inner.units.contains_key(id)
    }

    pub fn unit_ids(&self) -> Vec<NeuronId> {
        let mut ids: Vec<NeuronId> = self.inner.units.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.inner.topology.as_ref()
    }

    /// Subscribe to the bus-wide observation stream (telemetry).
    pub fn observe(&self) -> broadcast::Receiver<Message> {
        self.inner.observe_tx.subscribe()
    }

    /// Route one message through history, filters, and delivery.
    pub async fn route(&self, msg: Message) -> Result<()> {
        if msg.topic.is_empty() {
            return Err(Error::invalid_message("topic must be non-empty"));
        }
        if msg.source.as_str().is_empty() {
            return Err(Error::invalid_message("source must be non-empty"));
        }

        self.push_history(msg.clone()).await;
        let _ = self.inner.observe_tx.send(msg.clone());

        // Persistence never blocks or gates delivery; a full queue drops the
        // side effect, not the message.
        if self.inner.store.is_some() {
            if let Err(e) = self
                .inner
                .effects_tx
                .try_send(SideEffect::Persist(msg.clone()))
            {
                debug!("persistence queue rejected message: {e}");
            }
        }

        for filter in &self.inner.filters {
            if !filter.permit(&msg).await {
                debug!(filter = filter.name(), topic = %msg.topic, "message vetoed");
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        match msg.target.clone() {
            Some(target) => self.deliver_unicast(&target, msg)?,
            None => self.fan_out(msg),
        }
        self.inner.routed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Unconditional delivery to every other unit. Bypasses filters, weights,
    /// and fan-out rules; reserved for system control signals.
    pub fn broadcast(&self, topic: impl Into<String>, payload: Value, source: &NeuronId) {
        let msg = Message::new(source.clone(), topic, payload);
        let _ = self.inner.observe_tx.send(msg.clone());
        for entry in self.inner.units.iter() {
            if entry.key() == source {
                continue;
            }
            if entry.value().mailbox.send(msg.clone()).is_err() {
                debug!(unit = %entry.key(), "mailbox closed, broadcast skipped");
            }
        }
        self.inner.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Start the side-effect worker and every registered unit's mailbox
    /// loop. Idempotent: a second call is a no-op.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("network already running");
            return;
        }
        info!(units = self.inner.units.len(), "network starting");

        if self.inner.store.is_some() {
            if let Some(rx) = self.inner.effects_rx.lock().await.take() {
                let store = self.inner.store.clone();
                let cancel = self.inner.cancel.clone();
                let handle = tokio::spawn(run_effects_worker(store, rx, cancel));
                self.inner.tasks.lock().await.push(handle);
            }
        }

        let ids = self.unit_ids();
        for id in ids {
            self.spawn_runner(&id).await;
        }
    }

    /// Stop the network: cancel every loop and await all unit shutdowns and
    /// the drained side-effect worker before returning. Idempotent.
    pub async fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            debug!("network not running");
            return;
        }
        info!("network stopping");
        self.inner.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().await.drain(..).collect();
        futures::future::join_all(handles).await;
        info!("network stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Most recent routed messages, oldest first.
    pub async fn history(&self) -> Vec<Message> {
        self.inner.history.lock().await.iter().cloned().collect()
    }

    pub async fn stats(&self) -> NetworkStats {
        NetworkStats {
            units: self.inner.units.len(),
            routed: self.inner.routed.load(Ordering::Relaxed),
            broadcasts: self.inner.broadcasts.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            suppressed: self.inner.suppressed.load(Ordering::Relaxed),
            history_len: self.inner.history.lock().await.len(),
            edges: self.inner.topology.as_ref().map(|t| t.len()).unwrap_or(0),
        }
    }

    async fn spawn_runner(&self, id: &NeuronId) {
        // try_lock keeps the map guard await-free; a contended lock means
        // another caller is already activating this unit.
        let (neuron, rx) = {
            let Some(entry) = self.inner.units.get(id) else {
                return;
            };
            let rx = entry
                .value()
                .pending_rx
                .try_lock()
                .ok()
                .and_then(|mut pending| pending.take());
            (entry.value().neuron.clone(), rx)
        };
        let Some(rx) = rx else {
            debug!(unit = %id, "runner already active");
            return;
        };

        let ctx = NeuronContext::new(id.clone(), self.clone());
        let handle = tokio::spawn(run_mailbox(
            neuron,
            rx,
            ctx,
            self.inner.idle_interval,
            self.inner.cancel.clone(),
        ));
        self.inner.tasks.lock().await.push(handle);
    }

    async fn push_history(&self, msg: Message) {
        let mut history = self.inner.history.lock().await;
        history.push_back(msg);
        while history.len() > self.inner.history_limit {
            history.pop_front();
        }
    }

    fn deliver_unicast(&self, target: &NeuronId, msg: Message) -> Result<()> {
        let entry = self
            .inner
            .units
            .get(target)
            .ok_or_else(|| Error::unknown_neuron(target.to_string()))?;
        if entry.value().mailbox.send(msg).is_err() {
            debug!(unit = %target, "mailbox closed, unicast dropped");
        }
        Ok(())
    }

    /// Topic fan-out: exact subscribers, `family.*` wildcard subscribers, and
    /// global `*` subscribers, minus the sender, with weight modulation.
    fn fan_out(&self, msg: Message) {
        let mut seen: HashSet<NeuronId> = HashSet::new();
        let mut targets: Vec<NeuronId> = Vec::new();

        let mut collect = |topic: &str| {
            if let Some(subs) = self.inner.topics.get(topic) {
                for id in subs.iter() {
                    if id != &msg.source && seen.insert(id.clone()) {
                        targets.push(id.clone());
                    }
                }
            }
        };

        collect(&msg.topic);
        if let Some(idx) = msg.topic.rfind('.') {
            collect(&format!("{}.*", &msg.topic[..idx]));
        }
        collect("*");

        for target in targets {
            let mut delivery = msg.clone();
            if let Some(topology) = &self.inner.topology {
                let weight = topology.weight(&msg.source, &target);
                if weight <= SUPPRESS_THRESHOLD {
                    debug!(unit = %target, topic = %msg.topic, weight, "delivery suppressed");
                    self.inner.suppressed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                if weight < 0.0 {
                    delivery.priority = MessagePriority::Low;
                } else if weight > BOOST_THRESHOLD {
                    delivery.priority = MessagePriority::High;
                }
                topology.record_activation(&msg.source, &target);
            }
            if let Some(entry) = self.inner.units.get(&target) {
                if entry.value().mailbox.send(delivery).is_err() {
                    debug!(unit = %target, "mailbox closed, delivery dropped");
                }
            }
        }
    }
}

/// Drain persistence side effects until cancelled, then finish whatever is
/// still queued so shutdown is deterministic.
async fn run_effects_worker(
    store: Option<Arc<dyn MessageStore>>,
    mut rx: mpsc::Receiver<SideEffect>,
    cancel: CancellationToken,
) {
    let Some(store) = store else { return };
    debug!("side-effect worker started");
    loop {
        tokio::select! {
            effect = rx.recv() => match effect {
                Some(SideEffect::Persist(msg)) => {
                    if let Err(e) = store.save(&msg).await {
                        warn!(topic = %msg.topic, "message persistence failed: {e}");
                    }
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(SideEffect::Persist(msg)) = rx.try_recv() {
                    if let Err(e) = store.save(&msg).await {
                        warn!(topic = %msg.topic, "message persistence failed: {e}");
                    }
                }
                break;
            }
        }
    }
    debug!("side-effect worker stopped");
}
