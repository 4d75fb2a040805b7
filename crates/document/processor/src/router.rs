//! Event routing
//!
//! Routing decides which nodes see an event, asks each contract there
//! whether it matches, runs matching adapters inline and enqueues matching
//! handlers. Target nodes:
//!
//! - an event with a dispatch path visits exactly that node
//! - a channel event visits the node that produced it
//! - any other event with an origin visits every node from the root down
//!   to the origin, so parents observe what embedded children emit
//! - everything else (external and lifecycle events) visits the root
//!
//! Every match appends a `<nodePath>#<contractName>` hop to the event's
//! trace; meeting a hop twice in one chain is a loop.

use crate::context::{ProcessingContext, TaskInfo};
use crate::engine::Batch;
use crate::error::{ProcessingError, ProcessorResult};
use crate::event::Event;
use crate::queue::{Task, TaskKey};
use crate::registry::ContractRole;
use document_model::{path, Node};
use std::sync::Arc;
use tracing::debug;

const ORDER: &str = "order";

/// Nodes an event visits, in visiting order
pub fn route_targets(event: &Event) -> Vec<String> {
    if let Some(dispatch) = &event.dispatch_path {
        return vec![path::normalize(dispatch)];
    }
    match &event.origin_node_path {
        Some(origin) if event.is_channel() => vec![path::normalize(origin)],
        Some(origin) => path::ancestors_inclusive(origin),
        None => vec![path::ROOT.to_string()],
    }
}

/// Hop recorded when `contract_name` at `node_path` matches an event
pub fn hop(node_path: &str, contract_name: &str) -> String {
    format!("{}#{}", node_path, contract_name)
}

/// Explicit `order` of a contract; contracts without one sort as 0
pub fn contract_order(contract: &Node) -> i64 {
    contract
        .property(ORDER)
        .and_then(Node::as_i64)
        .unwrap_or(0)
}

impl Batch {
    pub(crate) fn route(&mut self, mut event: Event, inline_depth: usize) -> ProcessorResult<()> {
        let max_depth = self.services.config.max_inline_adapter_depth;
        if inline_depth > max_depth {
            return Err(ProcessingError::LoopDetected {
                hop: format!("inline adapter depth {}", inline_depth),
                trace: event.trace.join(", "),
            });
        }
        if event.seq.is_none() {
            event.seq = Some(self.next_seq());
        }
        for node_path in route_targets(&event) {
            self.route_at(&node_path, &event, inline_depth)?;
        }
        Ok(())
    }

    fn route_at(&mut self, node_path: &str, event: &Event, inline_depth: usize) -> ProcessorResult<()> {
        // Adapters cannot patch, so the snapshot is stable for this visit.
        let snapshot = Arc::clone(&self.current);
        let Some(node) = snapshot.get(node_path) else {
            debug!(node_path, %event, "Route target no longer exists");
            return Ok(());
        };

        for (name, contract) in &node.contracts {
            let Some(type_id) = contract.type_id() else {
                continue;
            };
            let Some(registration) = self.services.registry.registration(type_id).cloned() else {
                continue;
            };
            let role = registration.processor.role();
            match role {
                ContractRole::Marker | ContractRole::Validator => continue,
                ContractRole::Adapter if event.is_channel() => continue,
                ContractRole::Adapter | ContractRole::Handler => {}
            }

            let view = ProcessingContext::new(
                self,
                TaskInfo::handler(node_path.to_string(), name.clone(), event.clone()),
            );
            if !registration.processor.supports(event, contract, name, &view)? {
                continue;
            }

            let hop = hop(node_path, name);
            if event.trace.contains(&hop) {
                return Err(ProcessingError::LoopDetected {
                    hop,
                    trace: event.trace.join(", "),
                });
            }
            let mut traced = event.clone();
            traced.trace.push(hop);

            if role == ContractRole::Adapter {
                debug!(node_path, contract = %name, %event, "Adapter matched");
                let info = TaskInfo::adapter(
                    node_path.to_string(),
                    name.clone(),
                    traced.clone(),
                    inline_depth,
                );
                let mut ctx = ProcessingContext::new(self, info);
                registration.processor.handle(&traced, contract, name, &mut ctx)?;
                ctx.flush()?;
                continue;
            }

            let key = TaskKey::new(
                path::depth(node_path),
                traced.seq.unwrap_or_default(),
                registration.priority,
                contract_order(contract),
                name.clone(),
                self.next_task_id(),
            );
            debug!(node_path, contract = %name, seq = key.seq, "Task enqueued");
            self.queue.push(Task {
                key,
                node_path: node_path.to_string(),
                contract_name: name.clone(),
                contract: contract.clone(),
                event: traced,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        let external = Event::external(Node::new());
        assert_eq!(route_targets(&external), vec!["/"]);

        let dispatched = Event::external(Node::new()).with_dispatch_path("/a/b");
        assert_eq!(route_targets(&dispatched), vec!["/a/b"]);

        let mut internal = Event::internal(Node::new());
        internal.origin_node_path = Some("/a/b".to_string());
        assert_eq!(route_targets(&internal), vec!["/", "/a", "/a/b"]);

        let mut channel = Event::channel(&Arc::new(Node::new()), "ch");
        channel.origin_node_path = Some("/a/b".to_string());
        assert_eq!(route_targets(&channel), vec!["/a/b"]);
    }

    #[test]
    fn test_contract_order() {
        assert_eq!(contract_order(&Node::new()), 0);
        let ordered = Node::new().with_property(ORDER, Node::scalar(2));
        assert_eq!(contract_order(&ordered), 2);
    }

    #[test]
    fn test_hop_format() {
        assert_eq!(hop("/a", "wf"), "/a#wf");
    }
}
