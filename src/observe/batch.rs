use std::collections::BTreeMap;

use crate::foundation::core::{NodeId, SpaceRect};
use crate::observe::ChangeType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PendingChange {
    pub(crate) rect: SpaceRect,
    pub(crate) kind: ChangeType,
    /// Deliver even if the rectangle is back within epsilon of the last report.
    pub(crate) forced: bool,
}

/// Latest-wins pending map flushed once per display refresh.
#[derive(Debug, Default)]
pub(crate) struct FrameBatcher {
    pending: BTreeMap<NodeId, PendingChange>,
    last_flush_ms: Option<f64>,
    coalesced: u64,
}

impl FrameBatcher {
    /// Queue `rect` for `node`, replacing any older pending rectangle.
    ///
    /// A `Dpr` kind is sticky within a frame, and so is `forced`.
    pub(crate) fn queue(&mut self, node: NodeId, rect: SpaceRect, kind: ChangeType, forced: bool) {
        match self.pending.get_mut(&node) {
            Some(p) => {
                p.rect = rect;
                if kind == ChangeType::Dpr {
                    p.kind = ChangeType::Dpr;
                }
                p.forced |= forced;
                self.coalesced += 1;
            }
            None => {
                self.pending.insert(node, PendingChange { rect, kind, forced });
            }
        }
    }

    pub(crate) fn requeue(&mut self, node: NodeId, change: PendingChange) {
        self.pending.entry(node).or_insert(change);
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.pending.contains_key(&node)
    }

    pub(crate) fn remove(&mut self, node: NodeId) {
        self.pending.remove(&node);
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a flush may run at `now_ms` under a minimum interval of `throttle_ms`.
    pub(crate) fn gate_open(&self, now_ms: f64, throttle_ms: f64) -> bool {
        match self.last_flush_ms {
            None => true,
            Some(last) => now_ms - last >= throttle_ms,
        }
    }

    /// Nodes with a pending change, in node order.
    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        self.pending.keys().copied().collect()
    }

    pub(crate) fn take(&mut self, node: NodeId) -> Option<PendingChange> {
        self.pending.remove(&node)
    }

    pub(crate) fn mark_flushed(&mut self, now_ms: f64) {
        self.last_flush_ms = Some(now_ms);
    }

    /// Raw changes merged into an already pending entry.
    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
#[path = "../../tests/unit/observe/batch.rs"]
mod tests;
