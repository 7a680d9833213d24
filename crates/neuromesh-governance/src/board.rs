//! The intention board: single choke point for the intention lifecycle.

use chrono::Utc;
use neuromesh_core::{
    Error, Intention, IntentionDraft, IntentionStatus, MessagePriority, Result,
};
use std::collections::{HashMap, VecDeque};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

struct BoardState {
    intentions: HashMap<Uuid, Intention>,
    /// Creation order, backing the pending snapshot.
    order: Vec<Uuid>,
    /// Approval order. `next_approved` pops strictly FIFO from here.
    approved: VecDeque<Uuid>,
}

/// Tracks every intention from proposal to terminal status.
///
/// All mutation goes through one lock, which is what makes
/// [`next_approved`](IntentionBoard::next_approved) an atomic
/// remove-and-return: concurrent execution loops can never claim the same
/// intention twice. Expiry is applied lazily before every query.
pub struct IntentionBoard {
    state: Mutex<BoardState>,
    attention_tx: broadcast::Sender<Intention>,
}

impl Default for IntentionBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentionBoard {
    pub fn new() -> Self {
        let (attention_tx, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(BoardState {
                intentions: HashMap::new(),
                order: Vec::new(),
                approved: VecDeque::new(),
            }),
            attention_tx,
        }
    }

    /// Subscribe to "intention requires attention" events, raised once per
    /// proposal for external persistence and UI.
    pub fn attention(&self) -> broadcast::Receiver<Intention> {
        self.attention_tx.subscribe()
    }

    /// Create a Pending intention from a draft and raise an attention event.
    pub async fn propose(&self, draft: IntentionDraft) -> Intention {
        let intention = draft.build();
        let mut state = self.state.lock().await;
        state.order.push(intention.id);
        state.intentions.insert(intention.id, intention.clone());
        drop(state);
        info!(id = %intention.short_id(), title = %intention.title, "intention proposed");
        let _ = self.attention_tx.send(intention.clone());
        intention
    }

    pub async fn get(&self, id: Uuid) -> Option<Intention> {
        self.state.lock().await.intentions.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.intentions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.intentions.is_empty()
    }

    /// Pending intentions in creation order, after the expiry sweep.
    pub async fn pending(&self) -> Vec<Intention> {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        state
            .order
            .iter()
            .filter_map(|id| state.intentions.get(id))
            .filter(|i| i.status == IntentionStatus::Pending)
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending().await.len()
    }

    /// Approve a Pending intention. Fails if the id is unknown or the
    /// intention is no longer Pending.
    pub async fn approve(&self, id: Uuid, comment: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        let intention = transition(
            &mut state.intentions,
            id,
            IntentionStatus::Pending,
            IntentionStatus::Approved,
        )?;
        intention.user_comment = comment.map(String::from);
        let title = intention.title.clone();
        state.approved.push_back(id);
        drop(state);
        info!(id = %short(id), %title, "intention approved");
        Ok(())
    }

    /// Reject a Pending intention, recording the reason as the user comment.
    pub async fn reject(&self, id: Uuid, reason: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        let intention = transition(
            &mut state.intentions,
            id,
            IntentionStatus::Pending,
            IntentionStatus::Rejected,
        )?;
        intention.user_comment = reason.map(String::from);
        let title = intention.title.clone();
        drop(state);
        info!(id = %short(id), %title, "intention rejected");
        Ok(())
    }

    /// Cancel a Pending intention.
    pub async fn cancel(&self, id: Uuid, comment: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        let intention = transition(
            &mut state.intentions,
            id,
            IntentionStatus::Pending,
            IntentionStatus::Cancelled,
        )?;
        intention.user_comment = comment.map(String::from);
        Ok(())
    }

    /// Resolve a partial id against the full id space. The prefix must match
    /// exactly one intention; ambiguity is an error, never a silent pick.
    pub async fn resolve_prefix(&self, prefix: &str) -> Result<Uuid> {
        let needle = prefix.to_lowercase();
        if needle.is_empty() {
            return Err(Error::unknown_intention(prefix));
        }
        let state = self.state.lock().await;
        let matches: Vec<Uuid> = state
            .intentions
            .keys()
            .filter(|id| id.to_string().starts_with(&needle))
            .copied()
            .collect();
        match matches.len() {
            0 => Err(Error::unknown_intention(prefix)),
            1 => Ok(matches[0]),
            n => Err(Error::AmbiguousPrefix {
                prefix: prefix.to_string(),
                matches: n,
            }),
        }
    }

    pub async fn approve_by_prefix(&self, prefix: &str, comment: Option<&str>) -> Result<Intention> {
        let id = self.resolve_prefix(prefix).await?;
        self.approve(id, comment).await?;
        self.get(id).await.ok_or_else(|| Error::unknown_intention(prefix))
    }

    pub async fn reject_by_prefix(&self, prefix: &str, reason: Option<&str>) -> Result<Intention> {
        let id = self.resolve_prefix(prefix).await?;
        self.reject(id, reason).await?;
        self.get(id).await.ok_or_else(|| Error::unknown_intention(prefix))
    }

    /// Approve every Pending intention with priority at or below Low.
    /// Returns how many were approved.
    pub async fn approve_all_low_risk(&self, comment: &str) -> usize {
        self.approve_where(comment, |i| i.priority <= MessagePriority::Low)
            .await
    }

    /// Approve every Pending intention unconditionally (the override path).
    /// Returns how many were approved.
    pub async fn approve_all_pending(&self, comment: &str) -> usize {
        self.approve_where(comment, |_| true).await
    }

    async fn approve_where(&self, comment: &str, keep: impl Fn(&Intention) -> bool) -> usize {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        let ids: Vec<Uuid> = state
            .order
            .iter()
            .filter(|id| {
                state
                    .intentions
                    .get(id)
                    .is_some_and(|i| i.status == IntentionStatus::Pending && keep(i))
            })
            .copied()
            .collect();
        for id in &ids {
            if let Ok(intention) = transition(
                &mut state.intentions,
                *id,
                IntentionStatus::Pending,
                IntentionStatus::Approved,
            ) {
                intention.user_comment = Some(comment.to_string());
                state.approved.push_back(*id);
            }
        }
        if !ids.is_empty() {
            info!(count = ids.len(), %comment, "bulk approval");
        }
        ids.len()
    }

    /// Atomically remove and return the next Approved intention, strictly
    /// FIFO by approval order. Entries that expired or otherwise left
    /// Approved while queued are skipped.
    pub async fn next_approved(&self) -> Option<Intention> {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        while let Some(id) = state.approved.pop_front() {
            if let Some(intention) = state.intentions.get(&id) {
                if intention.status == IntentionStatus::Approved {
                    return Some(intention.clone());
                }
                debug!(id = %short(id), status = %intention.status, "skipping stale approved entry");
            }
        }
        None
    }

    /// Approved -> Executing, invoked by the executor after claiming.
    pub async fn mark_executing(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        transition(
            &mut state.intentions,
            id,
            IntentionStatus::Approved,
            IntentionStatus::Executing,
        )?;
        Ok(())
    }

    /// Executing -> Completed with a human-readable result.
    pub async fn mark_completed(&self, id: Uuid, result: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let intention = transition(
            &mut state.intentions,
            id,
            IntentionStatus::Executing,
            IntentionStatus::Completed,
        )?;
        intention.execution_result = Some(result.to_string());
        Ok(())
    }

    /// Executing -> Failed with the error message.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let intention = transition(
            &mut state.intentions,
            id,
            IntentionStatus::Executing,
            IntentionStatus::Failed,
        )?;
        intention.execution_result = Some(error.to_string());
        Ok(())
    }

    /// Status counts for operator listings: (pending, approved, executing, terminal).
    pub async fn counts(&self) -> (usize, usize, usize, usize) {
        let mut state = self.state.lock().await;
        sweep_expired(&mut state);
        let mut counts = (0usize, 0usize, 0usize, 0usize);
        for intention in state.intentions.values() {
            match intention.status {
                IntentionStatus::Pending => counts.0 += 1,
                IntentionStatus::Approved => counts.1 += 1,
                IntentionStatus::Executing => counts.2 += 1,
                _ => counts.3 += 1,
            }
        }
        counts
    }
}

/// Enforce one state-machine step. The intention must currently hold
/// `expected`; anything else is an [`Error::InvalidTransition`].
fn transition(
    intentions: &mut HashMap<Uuid, Intention>,
    id: Uuid,
    expected: IntentionStatus,
    next: IntentionStatus,
) -> Result<&mut Intention> {
    let intention = intentions
        .get_mut(&id)
        .ok_or_else(|| Error::unknown_intention(id.to_string()))?;
    if intention.status != expected {
        return Err(Error::invalid_transition(id, intention.status, expected));
    }
    intention.status = next;
    intention.acted_at = Some(Utc::now());
    Ok(intention)
}

/// Expire Pending/Approved intentions whose deadline has passed.
fn sweep_expired(state: &mut BoardState) {
    let now = Utc::now();
    for intention in state.intentions.values_mut() {
        if intention.is_expired(now) {
            debug!(id = %intention.short_id(), title = %intention.title, "intention expired");
            intention.status = IntentionStatus::Expired;
            intention.acted_at = Some(now);
        }
    }
}

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}
