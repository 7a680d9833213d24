//! The coordinator: owns the network, the board, and the control loops.
//!
//! Two loops share one cancellation token: the coordination loop ticks the
//! approval policy, runs topic discovery on a longer cadence, and emits the
//! heartbeat; the execution loop claims approved intentions and runs them to
//! completion. A failing iteration is logged and swallowed — only `stop`
//! ends a loop, and `stop` awaits both tasks before returning.

use crate::config::{ApprovalConfig, RuntimeConfig};
use crate::dispatch;
use crate::hooks::Collaborators;
use crate::notify::Notifier;
use chrono::Utc;
use neuromesh_bus::Network;
use neuromesh_core::{Intention, IntentionCategory, MessagePriority, NeuronId};
use neuromesh_governance::IntentionBoard;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct CoordInner {
    network: Network,
    board: Arc<IntentionBoard>,
    collab: Collaborators,
    notifier: Arc<Notifier>,
    config: RuntimeConfig,
    approvals: Mutex<ApprovalConfig>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    identity: NeuronId,
}

/// Cheaply cloneable handle to the running coordination layer.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordInner>,
}

impl Coordinator {
    pub fn new(
        network: Network,
        board: Arc<IntentionBoard>,
        collab: Collaborators,
        config: RuntimeConfig,
    ) -> Self {
        let approvals = config.approvals.clone();
        Self {
            inner: Arc::new(CoordInner {
                network,
                board,
                collab,
                notifier: Arc::new(Notifier::new()),
                config,
                approvals: Mutex::new(approvals),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                identity: NeuronId::new("coordinator"),
            }),
        }
    }

    pub fn network(&self) -> &Network {
        &self.inner.network
    }

    pub fn board(&self) -> &Arc<IntentionBoard> {
        &self.inner.board
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.inner.notifier
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.inner.collab
    }

    pub async fn approvals(&self) -> ApprovalConfig {
        self.inner.approvals.lock().await.clone()
    }

    /// Start the network and both control loops. Idempotent: a second call
    /// spawns nothing.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("coordinator already started");
            return;
        }
        info!("coordinator starting");
        self.inner.network.start().await;

        let mut tasks = self.inner.tasks.lock().await;
        tasks.push(tokio::spawn(run_coordination_loop(self.clone())));
        tasks.push(tokio::spawn(run_execution_loop(self.clone())));
        tasks.push(tokio::spawn(run_attention_listener(self.clone())));
    }

    /// Cancel the shared signal, await both loops, then stop the network.
    /// No loop body executes after this returns. Idempotent.
    pub async fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            debug!("coordinator not started");
            return;
        }
        info!("coordinator stopping");
        self.inner.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().await.drain(..).collect();
        futures::future::join_all(handles).await;
        self.inner.network.shutdown().await;
        info!("coordinator stopped");
    }

    /// Flip the global override. Enabling it immediately mass-approves every
    /// currently-Pending intention with an audit comment; this is a
    /// governance side effect, not merely a flag flip. Returns the number of
    /// intentions approved.
    pub async fn set_yolo(&self, on: bool) -> usize {
        self.inner.approvals.lock().await.yolo = on;
        if !on {
            info!("override mode disabled");
            return 0;
        }
        let approved = self
            .inner
            .board
            .approve_all_pending("auto-approved (yolo mode)")
            .await;
        info!(approved, "override mode enabled");
        approved
    }

    // ------------------------------------------------------------------
    // Coordination loop internals
    // ------------------------------------------------------------------

    async fn coordination_tick(&self) -> anyhow::Result<()> {
        let approved = self.auto_approval_pass().await;
        if approved > 0 {
            debug!(approved, "auto-approval pass");
        }

        let pending = self.inner.board.pending_count().await;
        if pending > self.inner.config.pending_ceiling {
            self.inner
                .notifier
                .notify(
                    format!(
                        "{pending} intentions awaiting review (ceiling {})",
                        self.inner.config.pending_ceiling
                    ),
                    MessagePriority::High,
                    "coordinator",
                )
                .await;
        }

        self.inner.network.broadcast(
            "system.tick",
            json!({ "time": Utc::now(), "pending": pending }),
            &self.inner.identity,
        );
        Ok(())
    }

    /// One pass over all Pending intentions. The override approves
    /// everything; otherwise always-require categories are skipped and the
    /// per-category / low-risk flags decide.
    async fn auto_approval_pass(&self) -> usize {
        let policy = self.inner.approvals.lock().await.clone();
        if policy.yolo {
            return self
                .inner
                .board
                .approve_all_pending("auto-approved (yolo mode)")
                .await;
        }

        let mut approved = 0;
        for intention in self.inner.board.pending().await {
            if policy.always_require.contains(&intention.category) {
                continue;
            }
            let low_risk = intention.priority <= MessagePriority::Low;
            let auto = !intention.requires_approval
                || (low_risk && policy.auto_approve_low_risk)
                || (intention.category == IntentionCategory::SelfReflection
                    && policy.auto_approve_self_reflection)
                || (intention.category == IntentionCategory::MemoryManagement
                    && policy.auto_approve_memory);
            if auto
                && self
                    .inner
                    .board
                    .approve(intention.id, Some("auto-approved by policy"))
                    .await
                    .is_ok()
            {
                approved += 1;
            }
        }
        approved
    }

    async fn discovery_pass(&self) -> anyhow::Result<()> {
        let Some(scout) = &self.inner.collab.scout else {
            return Ok(());
        };
        if let Some(draft) = scout.discover().await? {
            let intention = self.inner.board.propose(draft).await;
            self.inner
                .notifier
                .notify(
                    format!(
                        "New intention proposed: {} [{}]",
                        intention.title,
                        intention.short_id()
                    ),
                    MessagePriority::Normal,
                    "discovery",
                )
                .await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution loop internals
    // ------------------------------------------------------------------

    /// Run one claimed intention to completion. The claim
    /// (Approved -> Executing) happens before the safety gate so an unsafe
    /// verdict lands as a legal Executing -> Failed transition.
    async fn execute_intention(&self, intention: Intention) {
        let id = intention.id;
        if let Err(e) = self.inner.board.mark_executing(id).await {
            warn!(id = %intention.short_id(), "could not claim intention: {e}");
            return;
        }
        info!(id = %intention.short_id(), title = %intention.title, "executing intention");

        if let Some(reason) = self.rejected_by_validator(&intention).await {
            let message = format!("safety validation rejected: {reason}");
            self.finish(&intention, &message, false).await;
            return;
        }

        match dispatch::execute(&self.inner.network, &self.inner.collab, &intention).await {
            Ok(result) => self.finish(&intention, &result, true).await,
            Err(e) => self.finish(&intention, &e.to_string(), false).await,
        }
    }

    async fn rejected_by_validator(&self, intention: &Intention) -> Option<String> {
        let validator = self.inner.collab.validator.as_ref()?;
        match validator.validate(intention).await {
            Ok(verdict) if !verdict.approved => Some(verdict.reason),
            Ok(_) => None,
            Err(e) => {
                warn!("safety validator unavailable, proceeding: {e}");
                None
            }
        }
    }

    /// Terminal bookkeeping shared by success and failure: board status,
    /// audit fact, persistence, completion broadcast, user notification.
    async fn finish(&self, intention: &Intention, result: &str, succeeded: bool) {
        let outcome = if succeeded {
            self.inner.board.mark_completed(intention.id, result).await
        } else {
            self.inner.board.mark_failed(intention.id, result).await
        };
        if let Err(e) = outcome {
            warn!(id = %intention.short_id(), "terminal transition failed: {e}");
        }

        if let Some(symbolic) = &self.inner.collab.symbolic {
            let fact = format!(
                "executed_intention('{}', {})",
                intention.id,
                if succeeded { "completed" } else { "failed" }
            );
            if let Err(e) = symbolic.assert_fact(&fact).await {
                debug!("audit fact not recorded: {e}");
            }
        }

        if let Some(store) = &self.inner.collab.intention_store {
            if let Some(current) = self.inner.board.get(intention.id).await {
                if let Err(e) = store.save(&current).await {
                    debug!("intention not persisted: {e}");
                }
            }
        }

        self.inner.network.broadcast(
            "intention.completed",
            dispatch::completion_payload(intention, result, succeeded),
            &self.inner.identity,
        );

        let (label, priority) = if succeeded {
            ("Completed", intention.priority)
        } else {
            ("Failed", MessagePriority::High)
        };
        self.inner
            .notifier
            .notify(
                format!("{label}: {} — {result}", intention.title),
                priority,
                "executor",
            )
            .await;
    }
}

// ----------------------------------------------------------------------
// Loop bodies
// ----------------------------------------------------------------------

async fn run_coordination_loop(coordinator: Coordinator) {
    info!("coordination loop started");
    let tick = coordinator.inner.config.tick_interval();
    let discovery_every = coordinator.inner.config.discovery_interval();
    let cancel = coordinator.inner.cancel.clone();
    let mut last_discovery = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {
                if let Err(e) = coordinator.coordination_tick().await {
                    warn!("coordination tick failed: {e}");
                }
                if last_discovery.elapsed() >= discovery_every {
                    last_discovery = tokio::time::Instant::now();
                    if let Err(e) = coordinator.discovery_pass().await {
                        warn!("discovery pass failed: {e}");
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    info!("coordination loop stopped");
}

async fn run_execution_loop(coordinator: Coordinator) {
    info!("execution loop started");
    let poll = coordinator.inner.config.poll_interval();
    let cancel = coordinator.inner.cancel.clone();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        match coordinator.inner.board.next_approved().await {
            Some(intention) => coordinator.execute_intention(intention).await,
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(poll) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }
    info!("execution loop stopped");
}

/// Bridge attention events to the notifier and the persistence hook.
async fn run_attention_listener(coordinator: Coordinator) {
    let mut rx = coordinator.inner.board.attention();
    let cancel = coordinator.inner.cancel.clone();
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(intention) => {
                    if intention.requires_approval {
                        coordinator.inner.notifier.notify(
                            format!(
                                "Intention requires attention: {} [{}]",
                                intention.title,
                                intention.short_id()
                            ),
                            MessagePriority::High,
                            "governance",
                        ).await;
                    }
                    if let Some(store) = &coordinator.inner.collab.intention_store {
                        if let Err(e) = store.save(&intention).await {
                            debug!("intention not persisted: {e}");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("attention stream lagged by {n}");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}
