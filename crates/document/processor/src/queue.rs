//! Deterministic task queue
//!
//! Tasks pop in ascending [`TaskKey`] order. The key fields compare in
//! declaration order: deeper nodes first, then earlier events, then
//! processor priority, explicit contract order, contract name, and
//! finally insertion.

use crate::event::Event;
use document_model::Node;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Total order over pending tasks
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    /// Negated node depth
    pub neg_depth: i64,
    pub seq: u64,
    pub priority: i64,
    /// Explicit `order` of the contract, 0 when absent
    pub order: i64,
    pub contract_name: String,
    /// Monotonic per batch; breaks every remaining tie
    pub task_id: u64,
}

impl TaskKey {
    pub fn new(
        depth: usize,
        seq: u64,
        priority: i64,
        order: i64,
        contract_name: impl Into<String>,
        task_id: u64,
    ) -> Self {
        Self {
            neg_depth: -(depth as i64),
            seq,
            priority,
            order,
            contract_name: contract_name.into(),
            task_id,
        }
    }

    pub fn depth(&self) -> usize {
        self.neg_depth.unsigned_abs() as usize
    }
}

/// A handler invocation waiting in the queue
#[derive(Clone, Debug)]
pub struct Task {
    pub key: TaskKey,
    pub node_path: String,
    pub contract_name: String,
    /// Contract as it was when the task was enqueued
    pub contract: Node,
    pub event: Event,
}

/// Heap wrapper: `BinaryHeap` is a max-heap, so compare keys reversed
#[derive(Debug)]
struct Pending(Task);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.key.cmp(&self.0.key)
    }
}

/// Priority queue of pending tasks
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Pending>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.heap.push(Pending(task));
    }

    /// Remove the task with the smallest key
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|p| p.0)
    }

    pub fn peek_key(&self) -> Option<&TaskKey> {
        self.heap.peek().map(|p| &p.0.key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
