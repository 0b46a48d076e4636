//! Execution order of a sealed operation graph.
//!
//! Depth-first in submission order: a context's dependencies are placed
//! before it, a subordinate is placed through its parent, and a creation is
//! followed by its subordinates. Every producer therefore runs before its
//! earliest consumer and the rest keeps submission order.

use crate::bulk::context::ContextId;
use crate::bulk::graph::BulkGraph;
use crate::error::BulkResult;

/// Ordered list of contexts to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionQueue {
    order: Vec<ContextId>,
}

impl ExecutionQueue {
    /// Seal `graph` and compute its execution order.
    pub fn schedule(graph: &mut BulkGraph) -> BulkResult<Self> {
        graph.seal();
        let graph: &BulkGraph = graph;

        let mut scheduler = Scheduler {
            graph,
            placed: vec![false; graph.len()],
            visiting: vec![false; graph.len()],
            order: Vec::with_capacity(graph.len()),
        };
        for ctx in graph.iter() {
            scheduler.visit(ctx.id())?;
        }

        let queue = Self {
            order: scheduler.order,
        };
        tracing::debug!(contexts = queue.len(), "Bulk execution scheduled");
        Ok(queue)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.order.iter().copied()
    }

    /// Position of `id` in the queue.
    #[must_use]
    pub fn position(&self, id: ContextId) -> Option<usize> {
        self.order.iter().position(|c| *c == id)
    }

    /// Check the ordering invariant against `graph`: every context appears
    /// exactly once, after each of its dependencies and after its parent.
    #[must_use]
    pub fn verify_order(&self, graph: &BulkGraph) -> bool {
        let mut positions = vec![None; graph.len()];
        for (position, id) in self.order.iter().enumerate() {
            match positions.get_mut(id.index()) {
                Some(slot) if slot.is_none() => *slot = Some(position),
                _ => return false,
            }
        }

        graph.iter().all(|ctx| {
            let Some(position) = positions[ctx.id().index()] else {
                return false;
            };
            let before = |other: &ContextId| {
                positions[other.index()].is_some_and(|p| p < position)
            };
            ctx.dependencies().iter().all(before) && ctx.parent().iter().all(before)
        })
    }
}

impl IntoIterator for ExecutionQueue {
    type Item = ContextId;
    type IntoIter = std::vec::IntoIter<ContextId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}

struct Scheduler<'a> {
    graph: &'a BulkGraph,
    placed: Vec<bool>,
    visiting: Vec<bool>,
    order: Vec<ContextId>,
}

impl Scheduler<'_> {
    fn visit(&mut self, id: ContextId) -> BulkResult<()> {
        if self.placed[id.index()] {
            return Ok(());
        }
        let graph = self.graph;
        let ctx = graph.get(id)?;

        if let Some(parent) = ctx.parent() {
            if !self.placed[parent.index()] {
                // The parent places its subordinates.
                return self.visit(parent);
            }
        }

        if self.visiting[id.index()] {
            return Ok(());
        }
        self.visiting[id.index()] = true;

        for dependency in ctx.dependencies() {
            self.visit(*dependency)?;
        }
        if !self.placed[id.index()] {
            self.placed[id.index()] = true;
            self.order.push(id);
        }

        for subordinate in ctx.subordinates() {
            self.visit(*subordinate)?;
        }
        Ok(())
    }
}
