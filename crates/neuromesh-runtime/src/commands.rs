//! Operator text-command protocol.
//!
//! Slash commands steer the runtime from any text surface. Each recognized
//! command replies with a formatted string through the notification channel
//! and reports a handled flag; malformed input becomes a usage notification,
//! never an error across the boundary. This is an operator surface, not a
//! machine API.

use crate::coordinator::Coordinator;
use neuromesh_core::{IntentionAction, IntentionCategory, IntentionDraft, MessagePriority, NeuronId};
use serde_json::json;

impl Coordinator {
    /// Handle one operator input line. Returns whether the line was consumed
    /// as a command; non-slash input is left to the caller.
    pub async fn handle_command(&self, line: &str) -> bool {
        let line = line.trim();
        if !line.starts_with('/') {
            return false;
        }
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let reply = match command {
            "/approve" => self.cmd_approve(&args).await,
            "/reject" => self.cmd_reject(&args).await,
            "/approve-all-safe" => self.cmd_approve_all_safe().await,
            "/intentions" => self.cmd_intentions().await,
            "/network" => self.cmd_network(),
            "/bus" => self.cmd_bus().await,
            "/yolo" => self.cmd_yolo(&args).await,
            "/auto" => self.cmd_auto(&args).await,
            "/training" => self.cmd_training(&args),
            "/tools" => self.cmd_tools(),
            "/help" => help_text(),
            other => format!("Unknown command: {other}. Try /help."),
        };
        self.notifier()
            .notify(reply, MessagePriority::Normal, "command")
            .await;
        true
    }

    async fn cmd_approve(&self, args: &[&str]) -> String {
        let Some(prefix) = args.first() else {
            return "Usage: /approve <id-prefix> [comment]".to_string();
        };
        let comment = join_rest(args, 1);
        match self
            .board()
            .approve_by_prefix(prefix, comment.as_deref())
            .await
        {
            Ok(intention) => format!("Approved: {} [{}]", intention.title, intention.short_id()),
            Err(e) => format!("Approve failed: {e}"),
        }
    }

    async fn cmd_reject(&self, args: &[&str]) -> String {
        let Some(prefix) = args.first() else {
            return "Usage: /reject <id-prefix> [reason]".to_string();
        };
        let reason = join_rest(args, 1);
        match self
            .board()
            .reject_by_prefix(prefix, reason.as_deref())
            .await
        {
            Ok(intention) => format!("Rejected: {} [{}]", intention.title, intention.short_id()),
            Err(e) => format!("Reject failed: {e}"),
        }
    }

    async fn cmd_approve_all_safe(&self) -> String {
        let count = self
            .board()
            .approve_all_low_risk("approved via /approve-all-safe")
            .await;
        format!("Approved {count} low-risk intentions")
    }

    async fn cmd_intentions(&self) -> String {
        let (pending, approved, executing, resolved) = self.board().counts().await;
        let mut out = format!(
            "Intentions: {pending} pending, {approved} approved, {executing} executing, {resolved} resolved"
        );
        for intention in self.board().pending().await {
            out.push_str(&format!(
                "\n  [{}] {} ({}, {})",
                intention.short_id(),
                intention.title,
                intention.category,
                intention.priority
            ));
        }
        out
    }

    fn cmd_network(&self) -> String {
        let Some(topology) = self.network().topology() else {
            return "No topology attached".to_string();
        };
        let edges = topology.snapshot();
        if edges.is_empty() {
            return "Topology: no connections".to_string();
        }
        let mut out = format!("Topology: {} connections", edges.len());
        for edge in edges {
            out.push_str(&format!(
                "\n  {} -> {}  weight {:+.2}  ({} activations{})",
                edge.source,
                edge.target,
                edge.connection.weight,
                edge.connection.activations,
                if edge.connection.frozen { ", frozen" } else { "" }
            ));
        }
        out
    }

    async fn cmd_bus(&self) -> String {
        let stats = self.network().stats().await;
        format!(
            "Bus: {} units, {} routed, {} broadcast, {} filtered, {} suppressed, history {}, {} edges",
            stats.units,
            stats.routed,
            stats.broadcasts,
            stats.dropped,
            stats.suppressed,
            stats.history_len,
            stats.edges
        )
    }

    async fn cmd_yolo(&self, args: &[&str]) -> String {
        match args.first().copied() {
            None => {
                let on = self.approvals().await.yolo;
                format!("Override mode is {}", if on { "on" } else { "off" })
            }
            Some("on") => {
                let approved = self.set_yolo(true).await;
                format!("Override enabled — {approved} pending intentions auto-approved")
            }
            Some("off") => {
                self.set_yolo(false).await;
                "Override disabled".to_string()
            }
            Some(_) => "Usage: /yolo [on|off]".to_string(),
        }
    }

    async fn cmd_auto(&self, args: &[&str]) -> String {
        match args.first().copied() {
            Some("stop") => {
                self.network().broadcast(
                    "goal.abandon",
                    json!({ "reason": "operator stop" }),
                    &NeuronId::new("operator"),
                );
                "Autonomous goal abandoned".to_string()
            }
            Some("solve") => {
                let text = join_rest(args, 1);
                let Some(text) = text else {
                    return "Usage: /auto solve <text>".to_string();
                };
                let draft = IntentionDraft::new(
                    format!("Solve: {text}"),
                    IntentionCategory::GoalPursuit,
                    "operator",
                )
                .description(text.clone())
                .rationale("operator-initiated goal")
                .action(IntentionAction::Goal { goal: text });
                let intention = self.board().propose(draft).await;
                format!(
                    "Goal proposed: {} [{}] — awaiting approval",
                    intention.title,
                    intention.short_id()
                )
            }
            _ => "Usage: /auto [stop|solve <text>]".to_string(),
        }
    }

    fn cmd_training(&self, args: &[&str]) -> String {
        let Some(topology) = self.network().topology() else {
            return "No topology attached".to_string();
        };
        match args.first().copied() {
            Some("freeze") => {
                topology.freeze_all();
                "Learning frozen on all connections".to_string()
            }
            Some("thaw") => {
                topology.thaw_all();
                "Learning resumed on all connections".to_string()
            }
            Some("status") | None => {
                let edges = topology.snapshot();
                let frozen = edges.iter().filter(|e| e.connection.frozen).count();
                format!(
                    "Training: {} connections, {frozen} frozen",
                    edges.len()
                )
            }
            Some(_) => "Usage: /training [freeze|thaw|status]".to_string(),
        }
    }

    fn cmd_tools(&self) -> String {
        let tools = &self.collaborators().available_tools;
        if tools.is_empty() {
            "No external tools available".to_string()
        } else {
            format!("Available tools: {}", tools.join(", "))
        }
    }
}

fn join_rest(args: &[&str], from: usize) -> Option<String> {
    if args.len() > from {
        Some(args[from..].join(" "))
    } else {
        None
    }
}

fn help_text() -> String {
    [
        "Commands:",
        "  /approve <id-prefix> [comment]   approve a pending intention",
        "  /reject <id-prefix> [reason]     reject a pending intention",
        "  /approve-all-safe                approve all low-risk intentions",
        "  /intentions                      list intentions",
        "  /network                         show connection topology",
        "  /bus                             show bus statistics",
        "  /yolo [on|off]                   toggle the approval override",
        "  /auto [stop|solve <text>]        steer autonomous goals",
        "  /training [freeze|thaw|status]   control Hebbian learning",
        "  /tools                           list available external tools",
    ]
    .join("\n")
}
