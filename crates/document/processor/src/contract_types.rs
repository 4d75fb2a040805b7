//! Well-known type ids and reserved contract keys

// ── Channels ────────────────────────────────────────────────────────
pub const TIMELINE_CHANNEL: &str = "Timeline Channel";
pub const LIFECYCLE_EVENT_CHANNEL: &str = "Lifecycle Event Channel";
pub const DOCUMENT_UPDATE_CHANNEL: &str = "Document Update Channel";
pub const TRIGGERED_EVENT_CHANNEL: &str = "Triggered Event Channel";
pub const EMBEDDED_NODE_CHANNEL: &str = "Embedded Node Channel";
pub const OPERATION: &str = "Operation";
pub const PROCESS_EMBEDDED: &str = "Process Embedded";

// ── Handlers ────────────────────────────────────────────────────────
pub const SEQUENTIAL_WORKFLOW: &str = "Sequential Workflow";
pub const SEQUENTIAL_WORKFLOW_OPERATION: &str = "Sequential Workflow Operation";
pub const CHANNEL_EVENT_CHECKPOINT: &str = "Channel Event Checkpoint";

// ── Markers ─────────────────────────────────────────────────────────
pub const PROCESSING_INITIALIZED_MARKER: &str = "Processing Initialized Marker";
pub const PROCESSING_TERMINATED_MARKER: &str = "Processing Terminated Marker";

// ── Payloads ────────────────────────────────────────────────────────
pub const TIMELINE_ENTRY: &str = "Timeline Entry";
pub const DOCUMENT_PROCESSING_INITIATED: &str = "Document Processing Initiated";
pub const DOCUMENT_UPDATE: &str = "Document Update";

// ── Workflow steps ──────────────────────────────────────────────────
pub const UPDATE_DOCUMENT: &str = "Update Document";
pub const SCRIPT_CODE: &str = "Script Code";
pub const TRIGGER_EVENT: &str = "Trigger Event";

// ── Reserved contract keys ──────────────────────────────────────────
pub const KEY_CHECKPOINT: &str = "checkpoint";
pub const KEY_INITIALIZED: &str = "initialized";
pub const KEY_TERMINATED: &str = "terminated";
pub const KEY_EMBEDDED: &str = "embedded";

/// Reserved key and the type its contract must have
pub const RESERVED_KEYS: &[(&str, &str)] = &[
    (KEY_CHECKPOINT, CHANNEL_EVENT_CHECKPOINT),
    (KEY_INITIALIZED, PROCESSING_INITIALIZED_MARKER),
    (KEY_TERMINATED, PROCESSING_TERMINATED_MARKER),
    (KEY_EMBEDDED, PROCESS_EMBEDDED),
];

/// Type required under a reserved key, `None` for ordinary keys
pub fn reserved_type(key: &str) -> Option<&'static str> {
    RESERVED_KEYS
        .iter()
        .find(|(reserved, _)| *reserved == key)
        .map(|(_, type_id)| *type_id)
}
