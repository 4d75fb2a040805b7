//! Events flowing through the router

use document_model::Node;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where an event came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Handed to `process_events` by the host
    External,
    /// Emitted by a contract or by the engine itself
    Internal,
    /// Re-emitted by a channel adapter under its own channel name
    Channel,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventSource::External => "external",
            EventSource::Internal => "internal",
            EventSource::Channel => "channel",
        };
        write!(f, "{}", s)
    }
}

/// Why an internal event was emitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionKind {
    /// A document change made by a workflow step
    Update,
}

/// An event plus its routing metadata.
///
/// The payload is shared: adapters re-emit the same `Arc`, which is how
/// the checkpoint handler recognises a channel event that still carries
/// the originating external payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub payload: Arc<Node>,
    pub source: EventSource,
    /// Node whose contract emitted this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_node_path: Option<String>,
    /// Set on channel events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    /// Routes the event to exactly this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_path: Option<String>,
    /// Assigned on first routing; orders distinct originating events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// The event that started the causal chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_event: Option<Arc<Event>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emission: Option<EmissionKind>,
    /// `<nodePath>#<contractName>` hops already taken by this chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl Event {
    pub fn new(payload: impl Into<Arc<Node>>, source: EventSource) -> Self {
        Self {
            payload: payload.into(),
            source,
            origin_node_path: None,
            channel_name: None,
            dispatch_path: None,
            seq: None,
            root_event: None,
            emission: None,
            trace: Vec::new(),
        }
    }

    pub fn external(payload: impl Into<Arc<Node>>) -> Self {
        Self::new(payload, EventSource::External)
    }

    pub fn internal(payload: impl Into<Arc<Node>>) -> Self {
        Self::new(payload, EventSource::Internal)
    }

    /// Channel event sharing `payload` with the event it adapts
    pub fn channel(payload: &Arc<Node>, channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: Some(channel_name.into()),
            ..Self::new(Arc::clone(payload), EventSource::Channel)
        }
    }

    pub fn with_dispatch_path(mut self, path: impl Into<String>) -> Self {
        self.dispatch_path = Some(path.into());
        self
    }

    pub fn with_emission(mut self, kind: EmissionKind) -> Self {
        self.emission = Some(kind);
        self
    }

    pub fn payload_type(&self) -> Option<&str> {
        self.payload.type_id()
    }

    pub fn is_channel(&self) -> bool {
        self.source == EventSource::Channel
    }

    /// The originating event, or this event when it starts the chain
    pub fn root(&self) -> &Event {
        self.root_event.as_deref().unwrap_or(self)
    }

    /// True when this event still carries the exact payload object of its
    /// root event
    pub fn shares_root_payload(&self) -> bool {
        Arc::ptr_eq(&self.payload, &self.root().payload)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event {}",
            self.source,
            self.payload_type().unwrap_or("<untyped>")
        )?;
        if let Some(channel) = &self.channel_name {
            write!(f, " on {}", channel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_event_shares_payload() {
        let root = Event::external(Node::typed("Timeline Entry"));
        let mut channel = Event::channel(&root.payload, "timeline");
        channel.root_event = Some(Arc::new(root.clone()));

        assert!(channel.shares_root_payload());
        assert_eq!(channel.channel_name.as_deref(), Some("timeline"));

        let copied = Event {
            payload: Arc::new((*root.payload).clone()),
            ..channel
        };
        assert!(!copied.shares_root_payload());
    }

    #[test]
    fn test_root_defaults_to_self() {
        let event = Event::internal(Node::typed("Ping"));
        assert!(std::ptr::eq(event.root(), &event));
        assert!(event.shares_root_payload());
    }

    #[test]
    fn test_serde_shape() {
        let event = Event::external(Node::typed("Ping"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "external");
        assert_eq!(json["payload"]["type"], "Ping");
        assert!(json.get("trace").is_none());
    }
}
