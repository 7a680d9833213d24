//! Tests for neuromesh-core: ids, messages, priorities, intentions, errors

use neuromesh_core::*;
use std::time::Duration;

// ===========================================================================
// NeuronId
// ===========================================================================

#[test]
fn neuron_id_new_and_display() {
    let id = NeuronId::new("unit-7");
    assert_eq!(id.as_str(), "unit-7");
    assert_eq!(format!("{}", id), "unit-7");
}

#[test]
fn neuron_id_clone_is_cheap() {
    let id = NeuronId::new("memory");
    let cloned = id.clone();
    assert_eq!(id, cloned);
    assert_eq!(id.as_str(), cloned.as_str());
}

#[test]
fn neuron_id_from_string() {
    let a: NeuronId = "safety".into();
    assert_eq!(a.as_str(), "safety");
    let b: NeuronId = String::from("comms").into();
    assert_eq!(b.as_str(), "comms");
}

#[test]
fn neuron_id_equality_and_hash() {
    use std::collections::HashSet;
    let a = NeuronId::new("same");
    let b = NeuronId::new("same");
    let c = NeuronId::new("different");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&c));
}

#[test]
fn neuron_id_serde_roundtrip() {
    let id = NeuronId::new("unit-1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, r#""unit-1""#);
    let back: NeuronId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

// ===========================================================================
// MessagePriority
// ===========================================================================

#[test]
fn priority_ordering() {
    assert!(MessagePriority::Low < MessagePriority::Normal);
    assert!(MessagePriority::Normal < MessagePriority::High);
    assert!(MessagePriority::High < MessagePriority::Critical);
}

#[test]
fn priority_default_is_normal() {
    assert_eq!(MessagePriority::default(), MessagePriority::Normal);
}

#[test]
fn priority_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&MessagePriority::Low).unwrap(),
        r#""low""#
    );
    assert_eq!(
        serde_json::to_string(&MessagePriority::Critical).unwrap(),
        r#""critical""#
    );
}

// ===========================================================================
// Message
// ===========================================================================

#[test]
fn message_new_defaults() {
    let msg = Message::new("unit-a", "code.analyze", serde_json::json!({"x": 1}));
    assert_eq!(msg.source.as_str(), "unit-a");
    assert_eq!(msg.topic, "code.analyze");
    assert_eq!(msg.priority, MessagePriority::Normal);
    assert!(msg.target.is_none());
    assert!(msg.correlation_id.is_none());
    assert!(!msg.expects_response);
    assert!(msg.ttl.is_none());
}

#[test]
fn message_ids_are_unique() {
    let a = Message::new("u", "t", serde_json::Value::Null);
    let b = Message::new("u", "t", serde_json::Value::Null);
    assert_ne!(a.id, b.id);
}

#[test]
fn message_builder_chain() {
    let msg = Message::new("u", "t", serde_json::Value::Null)
        .to("v")
        .with_priority(MessagePriority::High)
        .with_ttl(Duration::from_secs(30))
        .expecting_response();
    assert_eq!(msg.target.as_ref().map(|t| t.as_str()), Some("v"));
    assert_eq!(msg.priority, MessagePriority::High);
    assert_eq!(msg.ttl, Some(Duration::from_secs(30)));
    assert!(msg.expects_response);
}

#[test]
fn message_response_carries_correlation_and_suffix() {
    let original = Message::new("asker", "memory.query", serde_json::Value::Null);
    let response = Message::response_to(&original, "memory", serde_json::json!({"hits": 3}));
    assert_eq!(response.topic, "memory.query.response");
    assert_eq!(response.correlation_id, Some(original.id));
    assert_eq!(response.source.as_str(), "memory");
    assert_eq!(response.target, Some(original.source.clone()));
}

#[test]
fn message_ttl_expiry() {
    let now = chrono::Utc::now();
    let fresh = Message::new("u", "t", serde_json::Value::Null);
    assert!(!fresh.is_expired(now));

    let short = Message::new("u", "t", serde_json::Value::Null).with_ttl(Duration::from_secs(60));
    assert!(!short.is_expired(now));
    assert!(short.is_expired(now + chrono::Duration::seconds(61)));
}

#[test]
fn message_serde_roundtrip() {
    let msg = Message::new("u", "sys.ping", serde_json::json!({"n": 1}))
        .with_priority(MessagePriority::Low);
    let json = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, msg.id);
    assert_eq!(back.topic, "sys.ping");
    assert_eq!(back.priority, MessagePriority::Low);
}

// ===========================================================================
// IntentionStatus state machine
// ===========================================================================

#[test]
fn status_legal_transitions() {
    use IntentionStatus::*;
    assert!(Pending.can_advance_to(Approved));
    assert!(Pending.can_advance_to(Rejected));
    assert!(Pending.can_advance_to(Expired));
    assert!(Pending.can_advance_to(Cancelled));
    assert!(Approved.can_advance_to(Executing));
    assert!(Executing.can_advance_to(Completed));
    assert!(Executing.can_advance_to(Failed));
}

#[test]
fn status_illegal_transitions() {
    use IntentionStatus::*;
    assert!(!Pending.can_advance_to(Executing));
    assert!(!Pending.can_advance_to(Completed));
    assert!(!Approved.can_advance_to(Completed));
    assert!(!Executing.can_advance_to(Approved));
    assert!(!Completed.can_advance_to(Executing));
    assert!(!Rejected.can_advance_to(Approved));
    assert!(!Failed.can_advance_to(Pending));
}

#[test]
fn status_terminal_set() {
    use IntentionStatus::*;
    for status in [Rejected, Expired, Cancelled, Completed, Failed] {
        assert!(status.is_terminal(), "{status} should be terminal");
    }
    for status in [Pending, Approved, Executing] {
        assert!(!status.is_terminal(), "{status} should not be terminal");
    }
}

// ===========================================================================
// IntentionDraft / Intention
// ===========================================================================

#[test]
fn draft_builds_pending_intention() {
    let intention = IntentionDraft::new("tidy memory", IntentionCategory::MemoryManagement, "memory")
        .description("compact old entries")
        .rationale("store is growing")
        .priority(MessagePriority::Low)
        .build();
    assert_eq!(intention.status, IntentionStatus::Pending);
    assert_eq!(intention.category, IntentionCategory::MemoryManagement);
    assert_eq!(intention.priority, MessagePriority::Low);
    assert_eq!(intention.source.as_str(), "memory");
    assert!(intention.requires_approval);
    assert!(intention.acted_at.is_none());
    assert!(intention.execution_result.is_none());
}

#[test]
fn draft_ids_are_unique() {
    let a = IntentionDraft::new("a", IntentionCategory::General, "u").build();
    let b = IntentionDraft::new("a", IntentionCategory::General, "u").build();
    assert_ne!(a.id, b.id);
}

#[test]
fn intention_expiry_only_before_terminal() {
    let past = chrono::Utc::now() - chrono::Duration::minutes(5);
    let mut intention = IntentionDraft::new("stale", IntentionCategory::General, "u")
        .expires_at(past)
        .build();
    assert!(intention.is_expired(chrono::Utc::now()));

    intention.status = IntentionStatus::Completed;
    assert!(!intention.is_expired(chrono::Utc::now()));
}

#[test]
fn intention_short_id_is_prefix() {
    let intention = IntentionDraft::new("x", IntentionCategory::General, "u").build();
    assert_eq!(intention.short_id().len(), 8);
    assert!(intention.id.to_string().starts_with(&intention.short_id()));
}

// ===========================================================================
// IntentionAction serde
// ===========================================================================

#[test]
fn action_tool_serde_tag() {
    let action = IntentionAction::Tool {
        name: "search".into(),
        args: serde_json::json!({"q": "rust"}),
    };
    let json = serde_json::to_string(&action).unwrap();
    assert!(json.contains(r#""kind":"tool""#));
    let back: IntentionAction = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, IntentionAction::Tool { name, .. } if name == "search"));
}

#[test]
fn action_code_change_serde_tag() {
    let action = IntentionAction::CodeChange {
        path: "src/lib.rs".into(),
        description: "rename module".into(),
    };
    let json = serde_json::to_string(&action).unwrap();
    assert!(json.contains(r#""kind":"code_change""#));
}

#[test]
fn action_message_skips_missing_target() {
    let action = IntentionAction::Message {
        topic: "x".into(),
        payload: serde_json::Value::Null,
        target: None,
    };
    let json = serde_json::to_string(&action).unwrap();
    assert!(!json.contains("target"));
}

#[test]
fn category_serde_roundtrip() {
    for category in [
        IntentionCategory::SelfReflection,
        IntentionCategory::CodeModification,
        IntentionCategory::GoalPursuit,
        IntentionCategory::Communication,
        IntentionCategory::Exploration,
        IntentionCategory::MemoryManagement,
        IntentionCategory::Learning,
        IntentionCategory::SafetyCheck,
        IntentionCategory::NeuronCommunication,
        IntentionCategory::General,
    ] {
        let json = serde_json::to_string(&category).unwrap();
        let back: IntentionCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, category);
    }
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_invalid_transition_display() {
    let id = uuid::Uuid::new_v4();
    let e = Error::invalid_transition(id, IntentionStatus::Completed, IntentionStatus::Pending);
    let text = e.to_string();
    assert!(text.contains("completed"));
    assert!(text.contains("pending"));
}

#[test]
fn error_ambiguous_prefix_display() {
    let e = Error::AmbiguousPrefix {
        prefix: "ab".into(),
        matches: 3,
    };
    assert!(e.to_string().contains("ab"));
    assert!(e.to_string().contains('3'));
}

#[test]
fn error_display_all_variants() {
    let errors: Vec<Error> = vec![
        Error::UnknownIntention("x".into()),
        Error::UnknownNeuron("x".into()),
        Error::DuplicateNeuron("x".into()),
        Error::InvalidMessage("x".into()),
        Error::Execution("x".into()),
        Error::Internal("x".into()),
    ];
    for e in errors {
        assert!(!format!("{}", e).is_empty());
    }
}
