//! Pluggable delivery filters.
//!
//! Filters are evaluated in registration order and ANDed: every filter must
//! permit a message before it is delivered. A veto drops the message
//! silently (logged by the network). Filters may await, so evaluation is not
//! guaranteed to complete synchronously.

use neuromesh_core::Message;

#[async_trait::async_trait]
pub trait MessageFilter: Send + Sync {
    /// Filter name, used in drop logs.
    fn name(&self) -> &str;

    /// Return false to veto delivery.
    async fn permit(&self, msg: &Message) -> bool;
}

/// Vetoes messages whose topic matches a deny list. Entries may be exact
/// topics or `prefix.*` families.
pub struct TopicBlockFilter {
    blocked: Vec<String>,
}

impl TopicBlockFilter {
    pub fn new(blocked: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            blocked: blocked.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl MessageFilter for TopicBlockFilter {
    fn name(&self) -> &str {
        "topic-block"
    }

    async fn permit(&self, msg: &Message) -> bool {
        !self.blocked.iter().any(|b| {
            if let Some(prefix) = b.strip_suffix(".*") {
                msg.topic
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
            } else {
                b == &msg.topic
            }
        })
    }
}
