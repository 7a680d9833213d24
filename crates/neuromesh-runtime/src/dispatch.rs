//! Intention dispatch: one exhaustive match per action kind, with a
//! category fallback for intentions that carry no structured action.
//!
//! Every arm delegates to an injected collaborator or to a bus broadcast
//! and returns a human-readable result string. Missing collaborators
//! degrade to a literal result, never an error.

use crate::hooks::Collaborators;
use neuromesh_bus::Network;
use neuromesh_core::{Intention, IntentionAction, IntentionCategory, Message};
use serde_json::{json, Value};
use tracing::debug;

/// Run the work an intention describes. Errors here mark the intention
/// Failed; fallback strings mark it Completed with a degraded result.
pub(crate) async fn execute(
    network: &Network,
    collab: &Collaborators,
    intention: &Intention,
) -> anyhow::Result<String> {
    match &intention.action {
        Some(action) => execute_action(network, collab, intention, action).await,
        None => execute_by_category(network, collab, intention).await,
    }
}

async fn execute_action(
    network: &Network,
    collab: &Collaborators,
    intention: &Intention,
    action: &IntentionAction,
) -> anyhow::Result<String> {
    match action {
        IntentionAction::Tool { name, args } => match &collab.tools {
            Some(tools) => {
                let output = tools.execute(name, args).await?;
                Ok(format!("tool '{name}' executed: {output}"))
            }
            None => Ok(format!("tool '{name}' skipped: no tool executor attached")),
        },

        IntentionAction::Message {
            topic,
            payload,
            target,
        } => {
            let mut msg = Message::new(intention.source.clone(), topic.clone(), payload.clone());
            if let Some(target) = target {
                msg = msg.to(target.clone());
            }
            network.route(msg).await?;
            Ok(format!("message routed on '{topic}'"))
        }

        IntentionAction::CodeChange { path, description } => {
            network.broadcast(
                "code.change",
                json!({ "path": path, "description": description }),
                &intention.source,
            );
            Ok(format!("code change request broadcast for {path}"))
        }

        IntentionAction::Goal { goal } => {
            network.broadcast("goal.adopted", json!({ "goal": goal }), &intention.source);
            Ok(format!("goal adopted: {goal}"))
        }

        IntentionAction::TaskExecution { task } => match &collab.thoughts {
            Some(thoughts) => {
                let outcome = thoughts.think(task).await?;
                Ok(format!("task executed: {outcome}"))
            }
            None => {
                network.broadcast("task.execute", json!({ "task": task }), &intention.source);
                Ok("task broadcast: no thought provider attached".to_string())
            }
        },

        IntentionAction::Other { detail } => {
            network.broadcast("intention.generic", detail.clone(), &intention.source);
            Ok("generic action broadcast".to_string())
        }
    }
}

async fn execute_by_category(
    network: &Network,
    collab: &Collaborators,
    intention: &Intention,
) -> anyhow::Result<String> {
    debug!(category = %intention.category, "dispatching by category");
    match intention.category {
        IntentionCategory::SelfReflection => match &collab.thoughts {
            Some(thoughts) => {
                let thought = thoughts.think(&intention.rationale).await?;
                Ok(format!("reflection: {thought}"))
            }
            None => Ok("reflection skipped: no thought provider attached".to_string()),
        },

        IntentionCategory::CodeModification => {
            network.broadcast(
                "code.review_requested",
                json!({ "title": intention.title, "description": intention.description }),
                &intention.source,
            );
            Ok("code review requested".to_string())
        }

        IntentionCategory::GoalPursuit => {
            network.broadcast(
                "goal.pursue",
                json!({ "title": intention.title, "description": intention.description }),
                &intention.source,
            );
            Ok(format!("pursuing goal: {}", intention.title))
        }

        IntentionCategory::Communication => match &collab.chat {
            Some(chat) => {
                let reply = chat.process(&intention.description).await?;
                Ok(format!("communication handled: {reply}"))
            }
            None => match &collab.presenter {
                Some(presenter) => {
                    presenter.display(&intention.description).await?;
                    Ok("communication displayed".to_string())
                }
                None => Ok("communication skipped: no chat processor attached".to_string()),
            },
        },

        IntentionCategory::Exploration => match (&collab.embedder, &collab.vectors) {
            (Some(embedder), Some(vectors)) => {
                let vector = embedder.embed(&intention.description).await?;
                let hits = vectors.search(&vector, 5).await?;
                Ok(format!("exploration found {} related memories", hits.len()))
            }
            _ => {
                network.broadcast(
                    "explore",
                    json!({ "description": intention.description }),
                    &intention.source,
                );
                Ok("exploration broadcast: no vector store attached".to_string())
            }
        },

        IntentionCategory::MemoryManagement => match (&collab.embedder, &collab.vectors) {
            (Some(embedder), Some(vectors)) => {
                let vector = embedder.embed(&intention.description).await?;
                vectors
                    .upsert(
                        &intention.id.to_string(),
                        &vector,
                        &json!({ "title": intention.title, "description": intention.description }),
                    )
                    .await?;
                Ok("memory stored".to_string())
            }
            _ => Ok("memory update skipped: no vector store attached".to_string()),
        },

        IntentionCategory::Learning => {
            network.broadcast(
                "learning.request",
                json!({ "title": intention.title, "description": intention.description }),
                &intention.source,
            );
            Ok("learning request broadcast".to_string())
        }

        IntentionCategory::SafetyCheck => match &collab.symbolic {
            Some(symbolic) => {
                let sound = symbolic.verify(&intention.description).await?;
                Ok(format!(
                    "safety check {}",
                    if sound { "passed" } else { "flagged concerns" }
                ))
            }
            None => Ok("safety check skipped: no symbolic engine attached".to_string()),
        },

        IntentionCategory::NeuronCommunication => {
            network.broadcast(
                "units.notice",
                json!({ "title": intention.title, "description": intention.description }),
                &intention.source,
            );
            Ok("unit notice broadcast".to_string())
        }

        IntentionCategory::General => match &collab.presenter {
            Some(presenter) => {
                presenter.display(&intention.description).await?;
                Ok("displayed".to_string())
            }
            None => Ok(format!("noted: {}", intention.title)),
        },
    }
}

/// Payload for the completion broadcast.
pub(crate) fn completion_payload(intention: &Intention, result: &str, succeeded: bool) -> Value {
    json!({
        "id": intention.id,
        "title": intention.title,
        "category": intention.category,
        "succeeded": succeeded,
        "result": result,
    })
}
