//! Per-event checkpoint cache
//!
//! While one external event is drained, the checkpoint handler records the
//! content id of that event under each `(scope, channel)` it reached. The
//! first record for a key wins. After the drain succeeds the cache is
//! turned into patches against each scope's `checkpoint` contract; on
//! failure it is simply cleared.

use crate::contract_types::{CHANNEL_EVENT_CHECKPOINT, KEY_CHECKPOINT};
use crate::event::{Event, EventSource};
use document_model::node::KEY_CONTENT_REF;
use document_model::{path, ContentId, Node, NodePatch};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

const LAST_EVENTS: &str = "lastEvents";

/// A pending checkpoint write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointEntry {
    /// Node path of the scope owning the checkpoint contract
    pub scope: String,
    pub channel: String,
    pub content_id: ContentId,
}

/// Records checkpoint writes for the event being processed
#[derive(Debug, Default)]
pub struct CheckpointCache {
    entries: BTreeMap<(String, String), ContentId>,
}

impl CheckpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `content_id` for `(scope, channel)` unless one is already
    /// recorded. Returns true when this call stored the entry.
    pub fn record(
        &mut self,
        scope: impl Into<String>,
        channel: impl Into<String>,
        content_id: ContentId,
    ) -> bool {
        match self.entries.entry((scope.into(), channel.into())) {
            Entry::Vacant(slot) => {
                slot.insert(content_id);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, scope: &str, channel: &str) -> Option<ContentId> {
        self.entries
            .get(&(scope.to_string(), channel.to_string()))
            .copied()
    }

    /// Pending entries in `(scope, channel)` order
    pub fn entries(&self) -> Vec<CheckpointEntry> {
        self.entries
            .iter()
            .map(|((scope, channel), id)| CheckpointEntry {
                scope: scope.clone(),
                channel: channel.clone(),
                content_id: *id,
            })
            .collect()
    }

    /// Patches that write every pending entry into `document`.
    ///
    /// A scope whose checkpoint contract (or its `lastEvents` map) has
    /// disappeared is scaffolded again first. Scopes that no longer exist
    /// are skipped.
    pub fn flush(&self, document: &Node) -> Vec<NodePatch> {
        let mut patches = Vec::new();
        let mut scaffolded: BTreeSet<&str> = BTreeSet::new();
        for ((scope, channel), id) in &self.entries {
            if document.get(scope).is_none() {
                continue;
            }
            let contract_path = path::join(scope, &format!("/contracts/{}", KEY_CHECKPOINT));
            let events_path = format!("{}/{}", contract_path, LAST_EVENTS);
            let entry_path = format!("{}/{}", events_path, path::encode(channel));
            let marker = Node::new().with_property(KEY_CONTENT_REF, Node::scalar(id.to_hex()));

            if !scaffolded.contains(scope.as_str()) {
                match document.get(&contract_path) {
                    None => {
                        patches.push(NodePatch::add(contract_path, scaffold()));
                        scaffolded.insert(scope.as_str());
                    }
                    Some(contract) if contract.property(LAST_EVENTS).is_none() => {
                        patches.push(NodePatch::add(events_path, Node::new()));
                        scaffolded.insert(scope.as_str());
                    }
                    Some(_) => {}
                }
            }

            let existing = if scaffolded.contains(scope.as_str()) {
                None
            } else {
                document.get(&entry_path)
            };
            match existing {
                Some(entry) if entry.property(KEY_CONTENT_REF).is_some() => {
                    patches.push(NodePatch::replace(
                        format!("{}/{}", entry_path, KEY_CONTENT_REF),
                        Node::scalar(id.to_hex()),
                    ))
                }
                Some(_) => patches.push(NodePatch::add(
                    format!("{}/{}", entry_path, KEY_CONTENT_REF),
                    Node::scalar(id.to_hex()),
                )),
                None => patches.push(NodePatch::add(entry_path, marker)),
            }
        }
        patches
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fresh `checkpoint` contract with no recorded events
pub fn scaffold() -> Node {
    Node::typed(CHANNEL_EVENT_CHECKPOINT).with_property(LAST_EVENTS, Node::new())
}

/// Only channel events that still carry the payload of a sequenced
/// external root event are checkpointed.
pub fn is_eligible(event: &Event) -> bool {
    let root = event.root();
    event.source == EventSource::Channel
        && event.channel_name.is_some()
        && root.source == EventSource::External
        && root.seq.is_some()
        && event.shares_root_payload()
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_model::apply_patches;
    use std::sync::Arc;

    fn id(byte: u8) -> ContentId {
        ContentId([byte; 32])
    }

    fn doc_with_checkpoint() -> Node {
        Node::new()
            .with_contract(KEY_CHECKPOINT, scaffold())
            .with_property(
                "child",
                Node::new().with_contract(KEY_CHECKPOINT, scaffold()),
            )
    }

    #[test]
    fn test_first_write_wins() {
        let mut cache = CheckpointCache::new();
        assert!(cache.record("/", "timeline", id(1)));
        assert!(!cache.record("/", "timeline", id(2)));
        assert!(cache.record("/child", "timeline", id(3)));

        assert_eq!(cache.get("/", "timeline"), Some(id(1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_flush_adds_then_replaces() {
        let mut cache = CheckpointCache::new();
        cache.record("/", "timeline", id(1));
        cache.record("/child", "updates", id(2));

        let doc = doc_with_checkpoint();
        let doc = apply_patches(&doc, &cache.flush(&doc)).unwrap();
        assert_eq!(
            doc.get("/contracts/checkpoint/lastEvents/timeline/blueId")
                .and_then(Node::as_str),
            Some(id(1).to_hex().as_str())
        );
        assert_eq!(
            doc.get("/child/contracts/checkpoint/lastEvents/updates/blueId")
                .and_then(Node::as_str),
            Some(id(2).to_hex().as_str())
        );

        let mut next = CheckpointCache::new();
        next.record("/", "timeline", id(9));
        let patches = next.flush(&doc);
        assert_eq!(patches[0].op, document_model::PatchOp::Replace);
        let doc = apply_patches(&doc, &patches).unwrap();
        assert_eq!(
            doc.get("/contracts/checkpoint/lastEvents/timeline/blueId")
                .and_then(Node::as_str),
            Some(id(9).to_hex().as_str())
        );
    }

    #[test]
    fn test_flush_recreates_missing_contract() {
        let mut cache = CheckpointCache::new();
        cache.record("/", "a", id(4));
        cache.record("/", "b", id(5));
        cache.record("/gone", "a", id(6));
        let doc = Node::new();
        let doc = apply_patches(&doc, &cache.flush(&doc)).unwrap();
        assert_eq!(
            doc.get("/contracts/checkpoint").and_then(Node::type_id),
            Some(CHANNEL_EVENT_CHECKPOINT)
        );
        assert!(doc.get("/contracts/checkpoint/lastEvents/a/blueId").is_some());
        assert!(doc.get("/contracts/checkpoint/lastEvents/b/blueId").is_some());
        assert!(doc.get("/gone").is_none());
    }

    #[test]
    fn test_eligibility() {
        let mut root = Event::external(Node::typed("Timeline Entry"));
        root.seq = Some(0);
        let root = Arc::new(root);

        let mut channel = Event::channel(&root.payload, "timeline");
        channel.root_event = Some(Arc::clone(&root));
        assert!(is_eligible(&channel));

        let mut derived = Event::channel(&Arc::new(Node::typed("Document Update")), "updates");
        derived.root_event = Some(Arc::clone(&root));
        assert!(!is_eligible(&derived));

        let mut unsequenced = (*root).clone();
        unsequenced.seq = None;
        let mut channel = Event::channel(&root.payload, "timeline");
        channel.root_event = Some(Arc::new(unsequenced));
        assert!(!is_eligible(&channel));
    }
}
