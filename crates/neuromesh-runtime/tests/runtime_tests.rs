//! Tests for neuromesh-runtime: coordinator loops, auto-approval policy,
//! the override, execution dispatch, notifications, and the command surface

use neuromesh_bus::{Network, Topology};
use neuromesh_core::{
    Intention, IntentionAction, IntentionCategory, IntentionDraft, IntentionStatus,
    MessagePriority, NeuronId,
};
use neuromesh_governance::IntentionBoard;
use neuromesh_runtime::{
    ApprovalConfig, Collaborators, Coordinator, Notifier, RuntimeConfig, SafetyValidator,
    SafetyVerdict, ToolExecutor, NOTIFICATION_HISTORY_LIMIT,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// Test helpers
// ===========================================================================

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        tick_ms: 50,
        poll_ms: 25,
        discovery_secs: 3_600,
        pending_ceiling: 100,
        history_limit: 50,
        idle_ms: 10,
        approvals: ApprovalConfig::default(),
    }
}

fn build_coordinator(collab: Collaborators, config: RuntimeConfig) -> Coordinator {
    let network = Network::builder()
        .topology(Topology::new())
        .history_limit(config.history_limit)
        .idle_interval(config.idle_interval())
        .build();
    let board = Arc::new(IntentionBoard::new());
    Coordinator::new(network, board, collab, config)
}

fn draft(title: &str, category: IntentionCategory) -> IntentionDraft {
    IntentionDraft::new(title, category, "proposer")
        .description("test work")
        .rationale("requested by a test")
}

/// Poll until the intention reaches `status`, or panic after 3 seconds.
async fn wait_for_status(coordinator: &Coordinator, intention: &Intention, status: IntentionStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let current = coordinator
            .board()
            .get(intention.id)
            .await
            .expect("intention exists")
            .status;
        if current == status {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {status}, stuck at {current}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

struct RecordingTool {
    calls: tokio::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: tokio::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl ToolExecutor for RecordingTool {
    async fn execute(&self, name: &str, args: &Value) -> anyhow::Result<String> {
        self.calls.lock().await.push((name.to_string(), args.clone()));
        Ok("tool ran".to_string())
    }
}

struct RejectEverything;

#[async_trait::async_trait]
impl SafetyValidator for RejectEverything {
    async fn validate(&self, _intention: &Intention) -> anyhow::Result<SafetyVerdict> {
        Ok(SafetyVerdict {
            approved: false,
            reason: "blanket refusal".into(),
        })
    }
}

// ===========================================================================
// Override ("YOLO") mode
// ===========================================================================

#[tokio::test]
async fn enabling_override_mass_approves_pending() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let board = coordinator.board();

    let mut proposed = Vec::new();
    for n in 0..3 {
        proposed.push(
            board
                .propose(
                    draft(&format!("risky {n}"), IntentionCategory::GoalPursuit)
                        .priority(MessagePriority::High),
                )
                .await,
        );
    }
    assert_eq!(board.pending().await.len(), 3);

    let approved = coordinator.set_yolo(true).await;
    assert_eq!(approved, 3);

    for intention in &proposed {
        let current = board.get(intention.id).await.unwrap();
        assert_eq!(current.status, IntentionStatus::Approved);
        assert_eq!(
            current.user_comment.as_deref(),
            Some("auto-approved (yolo mode)")
        );
    }
}

#[tokio::test]
async fn disabling_override_approves_nothing() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator
        .board()
        .propose(draft("waiting", IntentionCategory::GoalPursuit))
        .await;

    assert_eq!(coordinator.set_yolo(false).await, 0);
    assert_eq!(coordinator.board().pending().await.len(), 1);
}

#[tokio::test]
async fn override_ticks_approve_new_proposals_too() {
    let mut config = fast_config();
    config.approvals.yolo = true;
    let coordinator = build_coordinator(Collaborators::new(), config);
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(draft("late arrival", IntentionCategory::GoalPursuit).priority(MessagePriority::Critical))
        .await;

    // The next coordination tick approves it; the execution loop then runs it.
    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    coordinator.stop().await;
}

// ===========================================================================
// Auto-approval policy
// ===========================================================================

#[tokio::test]
async fn low_risk_intentions_auto_approve_and_execute() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(draft("tidy up", IntentionCategory::General).priority(MessagePriority::Low))
        .await;

    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    coordinator.stop().await;
}

#[tokio::test]
async fn always_require_categories_stay_pending() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(
            draft("rewrite the kernel", IntentionCategory::CodeModification)
                .priority(MessagePriority::Low),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        coordinator.board().get(intention.id).await.unwrap().status,
        IntentionStatus::Pending
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn no_approval_required_is_approved_on_tick() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(
            draft("routine", IntentionCategory::General)
                .priority(MessagePriority::Normal)
                .requires_approval(false),
        )
        .await;

    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    coordinator.stop().await;
}

#[tokio::test]
async fn category_flags_gate_self_reflection() {
    let mut config = fast_config();
    config.approvals.auto_approve_low_risk = false;
    config.approvals.auto_approve_self_reflection = true;
    let coordinator = build_coordinator(Collaborators::new(), config);
    coordinator.start().await;

    let reflected = coordinator
        .board()
        .propose(draft("ponder", IntentionCategory::SelfReflection))
        .await;
    let unreflected = coordinator
        .board()
        .propose(draft("wander", IntentionCategory::Exploration))
        .await;

    wait_for_status(&coordinator, &reflected, IntentionStatus::Completed).await;
    assert_eq!(
        coordinator.board().get(unreflected.id).await.unwrap().status,
        IntentionStatus::Pending
    );

    coordinator.stop().await;
}

// ===========================================================================
// Execution loop
// ===========================================================================

#[tokio::test]
async fn approved_tool_action_executes_and_completes() {
    let tool = RecordingTool::new();
    let mut collab = Collaborators::new();
    collab.tools = Some(tool.clone());

    let coordinator = build_coordinator(collab, fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(
            draft("run search", IntentionCategory::GoalPursuit).action(IntentionAction::Tool {
                name: "search".into(),
                args: json!({"q": "rust"}),
            }),
        )
        .await;
    coordinator
        .board()
        .approve(intention.id, Some("operator ok"))
        .await
        .unwrap();

    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    let calls = tool.calls.lock().await.clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "search");
    assert_eq!(calls[0].1, json!({"q": "rust"}));

    let finished = coordinator.board().get(intention.id).await.unwrap();
    assert!(finished
        .execution_result
        .as_deref()
        .unwrap()
        .contains("tool 'search' executed"));

    coordinator.stop().await;
}

#[tokio::test]
async fn tool_action_without_executor_degrades() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(
            draft("run search", IntentionCategory::GoalPursuit).action(IntentionAction::Tool {
                name: "search".into(),
                args: Value::Null,
            }),
        )
        .await;
    coordinator.board().approve(intention.id, None).await.unwrap();

    // Missing collaborator is a degraded completion, not a failure.
    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;
    let finished = coordinator.board().get(intention.id).await.unwrap();
    assert!(finished
        .execution_result
        .as_deref()
        .unwrap()
        .contains("no tool executor attached"));

    coordinator.stop().await;
}

#[tokio::test]
async fn safety_validator_rejection_marks_failed() {
    let mut collab = Collaborators::new();
    collab.validator = Some(Arc::new(RejectEverything));

    let coordinator = build_coordinator(collab, fast_config());
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(draft("sketchy", IntentionCategory::GoalPursuit))
        .await;
    coordinator.board().approve(intention.id, None).await.unwrap();

    wait_for_status(&coordinator, &intention, IntentionStatus::Failed).await;
    let failed = coordinator.board().get(intention.id).await.unwrap();
    assert!(failed
        .execution_result
        .as_deref()
        .unwrap()
        .contains("safety validation rejected"));

    coordinator.stop().await;
}

#[tokio::test]
async fn failed_execution_keeps_the_loop_alive() {
    struct FailingTool;
    #[async_trait::async_trait]
    impl ToolExecutor for FailingTool {
        async fn execute(&self, _name: &str, _args: &Value) -> anyhow::Result<String> {
            anyhow::bail!("exploded")
        }
    }

    let mut collab = Collaborators::new();
    collab.tools = Some(Arc::new(FailingTool));
    let coordinator = build_coordinator(collab, fast_config());
    coordinator.start().await;

    let doomed = coordinator
        .board()
        .propose(
            draft("will fail", IntentionCategory::GoalPursuit).action(IntentionAction::Tool {
                name: "boom".into(),
                args: Value::Null,
            }),
        )
        .await;
    coordinator.board().approve(doomed.id, None).await.unwrap();
    wait_for_status(&coordinator, &doomed, IntentionStatus::Failed).await;

    // The loop survives and executes the next intention.
    let healthy = coordinator
        .board()
        .propose(draft("still works", IntentionCategory::GoalPursuit))
        .await;
    coordinator.board().approve(healthy.id, None).await.unwrap();
    wait_for_status(&coordinator, &healthy, IntentionStatus::Completed).await;

    coordinator.stop().await;
}

#[tokio::test]
async fn execution_completion_is_broadcast() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let mut observer = coordinator.network().observe();
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(draft("observable", IntentionCategory::GoalPursuit))
        .await;
    coordinator.board().approve(intention.id, None).await.unwrap();
    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let observed = tokio::time::timeout_at(deadline, observer.recv())
            .await
            .expect("timed out waiting for completion broadcast")
            .expect("stream closed");
        if observed.topic == "intention.completed" {
            assert_eq!(observed.payload["succeeded"], json!(true));
            break;
        }
    }

    coordinator.stop().await;
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn start_twice_executes_once() {
    let tool = RecordingTool::new();
    let mut collab = Collaborators::new();
    collab.tools = Some(tool.clone());

    let coordinator = build_coordinator(collab, fast_config());
    coordinator.start().await;
    coordinator.start().await;

    let intention = coordinator
        .board()
        .propose(
            draft("single shot", IntentionCategory::GoalPursuit).action(IntentionAction::Tool {
                name: "once".into(),
                args: Value::Null,
            }),
        )
        .await;
    coordinator.board().approve(intention.id, None).await.unwrap();
    wait_for_status(&coordinator, &intention, IntentionStatus::Completed).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(tool.calls.lock().await.len(), 1);

    coordinator.stop().await;
}

#[tokio::test]
async fn stop_halts_both_loops() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator.start().await;
    coordinator.stop().await;
    coordinator.stop().await;

    // With the loops gone, an approved intention is never claimed.
    let intention = coordinator
        .board()
        .propose(draft("orphaned", IntentionCategory::GoalPursuit))
        .await;
    coordinator.board().approve(intention.id, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        coordinator.board().get(intention.id).await.unwrap().status,
        IntentionStatus::Approved
    );
}

#[tokio::test]
async fn heartbeat_is_broadcast_each_tick() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let mut observer = coordinator.network().observe();
    coordinator.start().await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let observed = tokio::time::timeout_at(deadline, observer.recv())
            .await
            .expect("timed out waiting for heartbeat")
            .expect("stream closed");
        if observed.topic == "system.tick" {
            assert!(observed.payload["pending"].is_number());
            break;
        }
    }

    coordinator.stop().await;
}

#[tokio::test]
async fn pending_ceiling_raises_advisory() {
    let mut config = fast_config();
    config.pending_ceiling = 2;
    let coordinator = build_coordinator(Collaborators::new(), config);
    let mut notifications = coordinator.notifier().subscribe();
    coordinator.start().await;

    for n in 0..4 {
        coordinator
            .board()
            .propose(draft(&format!("backlog {n}"), IntentionCategory::CodeModification))
            .await;
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let notification = tokio::time::timeout_at(deadline, notifications.recv())
            .await
            .expect("timed out waiting for advisory")
            .expect("stream closed");
        if notification.message.contains("awaiting review") {
            break;
        }
    }

    coordinator.stop().await;
}

// ===========================================================================
// Notifier
// ===========================================================================

#[tokio::test]
async fn notification_history_is_bounded_and_ordered() {
    let notifier = Notifier::new();
    for n in 0..(NOTIFICATION_HISTORY_LIMIT + 20) {
        notifier
            .notify(format!("event {n}"), MessagePriority::Normal, "test")
            .await;
    }
    let history = notifier.history().await;
    assert_eq!(history.len(), NOTIFICATION_HISTORY_LIMIT);
    assert_eq!(history[0].message, "event 20");
    assert_eq!(
        history[NOTIFICATION_HISTORY_LIMIT - 1].message,
        format!("event {}", NOTIFICATION_HISTORY_LIMIT + 19)
    );
}

// ===========================================================================
// Command surface
// ===========================================================================

async fn last_notification(coordinator: &Coordinator) -> String {
    coordinator
        .notifier()
        .history()
        .await
        .last()
        .expect("a notification")
        .message
        .clone()
}

#[tokio::test]
async fn non_slash_input_is_not_handled() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    assert!(!coordinator.handle_command("hello there").await);
    assert!(coordinator.notifier().history().await.is_empty());
}

#[tokio::test]
async fn unknown_command_notifies() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    assert!(coordinator.handle_command("/frobnicate").await);
    assert!(last_notification(&coordinator).await.contains("Unknown command"));
}

#[tokio::test]
async fn approve_command_approves_by_prefix() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let intention = coordinator
        .board()
        .propose(draft("needs a nod", IntentionCategory::GoalPursuit))
        .await;

    let line = format!("/approve {} ship it", intention.short_id());
    assert!(coordinator.handle_command(&line).await);
    assert!(last_notification(&coordinator).await.contains("Approved"));

    let approved = coordinator.board().get(intention.id).await.unwrap();
    assert_eq!(approved.status, IntentionStatus::Approved);
    assert_eq!(approved.user_comment.as_deref(), Some("ship it"));
}

#[tokio::test]
async fn approve_command_reports_failures() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    assert!(coordinator.handle_command("/approve deadbeef").await);
    assert!(last_notification(&coordinator).await.contains("Approve failed"));

    assert!(coordinator.handle_command("/approve").await);
    assert!(last_notification(&coordinator).await.contains("Usage"));
}

#[tokio::test]
async fn reject_command_records_reason() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let intention = coordinator
        .board()
        .propose(draft("no thanks", IntentionCategory::GoalPursuit))
        .await;

    let line = format!("/reject {} too vague", intention.short_id());
    assert!(coordinator.handle_command(&line).await);

    let rejected = coordinator.board().get(intention.id).await.unwrap();
    assert_eq!(rejected.status, IntentionStatus::Rejected);
    assert_eq!(rejected.user_comment.as_deref(), Some("too vague"));
}

#[tokio::test]
async fn approve_all_safe_command_counts() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator
        .board()
        .propose(draft("small", IntentionCategory::General).priority(MessagePriority::Low))
        .await;
    coordinator
        .board()
        .propose(draft("large", IntentionCategory::General).priority(MessagePriority::High))
        .await;

    assert!(coordinator.handle_command("/approve-all-safe").await);
    assert!(last_notification(&coordinator).await.contains("Approved 1"));
}

#[tokio::test]
async fn intentions_command_lists_pending() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    coordinator
        .board()
        .propose(draft("visible work", IntentionCategory::GoalPursuit))
        .await;

    assert!(coordinator.handle_command("/intentions").await);
    let text = last_notification(&coordinator).await;
    assert!(text.contains("1 pending"));
    assert!(text.contains("visible work"));
}

#[tokio::test]
async fn yolo_command_toggles_and_reports() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    for n in 0..3 {
        coordinator
            .board()
            .propose(draft(&format!("pending {n}"), IntentionCategory::GoalPursuit))
            .await;
    }

    assert!(coordinator.handle_command("/yolo").await);
    assert!(last_notification(&coordinator).await.contains("off"));

    assert!(coordinator.handle_command("/yolo on").await);
    assert!(last_notification(&coordinator)
        .await
        .contains("3 pending intentions auto-approved"));

    assert!(coordinator.handle_command("/yolo off").await);
    assert!(last_notification(&coordinator).await.contains("disabled"));
}

#[tokio::test]
async fn auto_solve_command_proposes_goal() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    assert!(coordinator.handle_command("/auto solve fix the build").await);

    let pending = coordinator.board().pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "Solve: fix the build");
    assert_eq!(pending[0].category, IntentionCategory::GoalPursuit);
    assert!(matches!(
        pending[0].action,
        Some(IntentionAction::Goal { ref goal }) if goal == "fix the build"
    ));
}

#[tokio::test]
async fn training_command_freezes_learning() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    let topology = coordinator.network().topology().unwrap();
    let a = NeuronId::new("a");
    let b = NeuronId::new("b");
    topology.set_connection(&a, &b, 0.5, 0.1);

    assert!(coordinator.handle_command("/training freeze").await);
    topology.hebbian_update(&a, &b, true, true);
    assert_eq!(topology.weight(&a, &b), 0.5);

    assert!(coordinator.handle_command("/training thaw").await);
    topology.hebbian_update(&a, &b, true, true);
    assert!(topology.weight(&a, &b) > 0.5);

    assert!(coordinator.handle_command("/training status").await);
    assert!(last_notification(&coordinator).await.contains("1 connections"));
}

#[tokio::test]
async fn tools_command_lists_available_tools() {
    let mut collab = Collaborators::new();
    collab.available_tools = vec!["search".into(), "summarize".into()];
    let coordinator = build_coordinator(collab, fast_config());

    assert!(coordinator.handle_command("/tools").await);
    let text = last_notification(&coordinator).await;
    assert!(text.contains("search"));
    assert!(text.contains("summarize"));

    let bare = build_coordinator(Collaborators::new(), fast_config());
    assert!(bare.handle_command("/tools").await);
    assert!(last_notification(&bare).await.contains("No external tools"));
}

#[tokio::test]
async fn bus_and_network_commands_report() {
    let coordinator = build_coordinator(Collaborators::new(), fast_config());
    assert!(coordinator.handle_command("/bus").await);
    assert!(last_notification(&coordinator).await.starts_with("Bus:"));

    assert!(coordinator.handle_command("/network").await);
    assert!(last_notification(&coordinator).await.contains("no connections"));
}
