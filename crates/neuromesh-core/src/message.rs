//! Messages and unit identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Unit identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct NeuronId(Arc<str>);

impl NeuronId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NeuronId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NeuronId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for NeuronId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for NeuronId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NeuronId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

/// Message priority. Orderable: `Low < Normal < High < Critical`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An immutable unit of communication on the bus.
///
/// Built once by a unit (or the coordinator), routed, consumed, discarded.
/// Only the bounded routing history retains delivered messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub source: NeuronId,
    /// When set, the message is unicast to this unit only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<NeuronId>,
    pub topic: String,
    pub payload: Value,
    pub priority: MessagePriority,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    pub expects_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl Message {
    pub fn new(source: impl Into<NeuronId>, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            target: None,
            topic: topic.into(),
            payload,
            priority: MessagePriority::Normal,
            created_at: Utc::now(),
            ttl: None,
            expects_response: false,
            correlation_id: None,
        }
    }

    /// Unicast to a specific unit, bypassing topic fan-out.
    pub fn to(mut self, target: impl Into<NeuronId>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn expecting_response(mut self) -> Self {
        self.expects_response = true;
        self
    }

    /// Build a response to `original`: topic gains a `.response` suffix, the
    /// correlation id carries the original message id, and delivery is
    /// unicast back to the original sender.
    pub fn response_to(original: &Message, source: impl Into<NeuronId>, payload: Value) -> Self {
        let mut msg = Self::new(source, format!("{}.response", original.topic), payload);
        msg.correlation_id = Some(original.id);
        msg.target = Some(original.source.clone());
        msg
    }

    /// Whether the TTL has elapsed at `now`. Messages without a TTL never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => match chrono::Duration::from_std(ttl) {
                Ok(d) => self.created_at + d <= now,
                Err(_) => false,
            },
            None => false,
        }
    }
}
