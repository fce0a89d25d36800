//! In-memory reference host: a tiny layout engine plus a manual watch backend.
//!
//! `Scene` lays out root boxes at fixed viewport rectangles and child nodes from their
//! [`Placement`] relative to the parent's rendered box. It is what the replay CLI and the test
//! suite run the observer and controller against.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::foundation::core::{NodeId, Rect, Size, Space, SpaceRect};
use crate::foundation::error::{RectSwapError, RectSwapResult};
use crate::host::{BackendFactory, DisplayEnv, LayoutHost, WatchBackend, WatchError};
use crate::placement::Placement;

#[derive(Clone, Debug)]
enum NodeKind {
    Root(Rect),
    Child(Placement),
}

#[derive(Clone, Debug)]
struct SceneNode {
    parent: Option<NodeId>,
    kind: NodeKind,
    attached: bool,
}

#[derive(Clone, Debug)]
pub struct Scene {
    nodes: BTreeMap<NodeId, SceneNode>,
    next_id: u64,
    dpr: f64,
    viewport: Size,
    clock_ms: f64,
    dpr_query: bool,
    pixel_snapping: bool,
    writes: u64,
}

impl Scene {
    pub fn new(viewport: Size) -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 1,
            dpr: 1.0,
            viewport,
            clock_ms: 0.0,
            dpr_query: true,
            pixel_snapping: false,
            writes: 0,
        }
    }

    /// Snap every rendered child rectangle to the device pixel grid, like a real engine does.
    pub fn with_pixel_snapping(mut self, enabled: bool) -> Self {
        self.pixel_snapping = enabled;
        self
    }

    /// Report no pixel-ratio media query, forcing observers to poll.
    pub fn without_dpr_query(mut self) -> Self {
        self.dpr_query = false;
        self
    }

    pub fn add_root(&mut self, rect: Rect) -> NodeId {
        self.insert(None, NodeKind::Root(rect))
    }

    pub fn add_child(&mut self, parent: NodeId, placement: Placement) -> RectSwapResult<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return Err(RectSwapError::host(format!("unknown parent {parent}")));
        }
        Ok(self.insert(Some(parent), NodeKind::Child(placement)))
    }

    fn insert(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                parent,
                kind,
                attached: true,
            },
        );
        id
    }

    pub fn set_root_rect(&mut self, node: NodeId, rect: Rect) -> RectSwapResult<()> {
        match self.nodes.get_mut(&node).map(|n| &mut n.kind) {
            Some(NodeKind::Root(r)) => {
                *r = rect;
                Ok(())
            }
            Some(NodeKind::Child(_)) => Err(RectSwapError::host(format!("{node} is not a root"))),
            None => Err(RectSwapError::host(format!("unknown node {node}"))),
        }
    }

    /// Remove `node` (and implicitly its subtree) from layout.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.attached = false;
        }
    }

    pub fn set_device_pixel_ratio(&mut self, dpr: f64) {
        self.dpr = dpr;
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport = size;
    }

    pub fn advance_ms(&mut self, ms: f64) {
        self.clock_ms += ms;
    }

    /// Number of `set_placement` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Rendered rectangle as a tagged viewport rectangle.
    pub fn space_rect(&self, node: NodeId) -> Option<SpaceRect> {
        self.rect(node)
            .map(|r| SpaceRect::from_kurbo(r, Space::ViewportAbsolute))
    }

    fn layout(&self, node: NodeId, depth: usize) -> Option<Rect> {
        // Parent chains cannot cycle through `add_child`.
        if depth > self.nodes.len() {
            return None;
        }
        let n = self.nodes.get(&node)?;
        if !n.attached {
            return None;
        }
        match &n.kind {
            NodeKind::Root(r) => Some(*r),
            NodeKind::Child(placement) => {
                let parent = self.layout(n.parent?, depth + 1)?;
                let r = placement.resolve(parent);
                if self.pixel_snapping {
                    Some(
                        SpaceRect::from_kurbo(r, Space::ViewportAbsolute)
                            .snap_to_device_pixels(self.dpr)
                            .to_kurbo(),
                    )
                } else {
                    Some(r)
                }
            }
        }
    }
}

impl LayoutHost for Scene {
    fn rect(&self, node: NodeId) -> Option<Rect> {
        self.layout(node, 0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }

    fn placement(&self, node: NodeId) -> Option<Placement> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Child(p) => Some(*p),
            NodeKind::Root(_) => None,
        }
    }

    fn set_placement(&mut self, node: NodeId, placement: Placement) -> RectSwapResult<()> {
        match self.nodes.get_mut(&node).map(|n| &mut n.kind) {
            Some(NodeKind::Child(p)) => {
                *p = placement;
                self.writes += 1;
                Ok(())
            }
            Some(NodeKind::Root(_)) => Err(RectSwapError::host(format!(
                "{node} is a root and is placed by the viewport"
            ))),
            None => Err(RectSwapError::host(format!("unknown node {node}"))),
        }
    }
}

impl DisplayEnv for Scene {
    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn now_ms(&self) -> f64 {
        self.clock_ms
    }

    fn supports_dpr_query(&self) -> bool {
        self.dpr_query
    }
}

#[derive(Debug, Default)]
struct WatchState {
    watched: BTreeSet<NodeId>,
    refused: BTreeSet<NodeId>,
    failures_left: u32,
    constructions: u32,
    disconnects: u32,
}

/// Watch backend that records what it is asked to watch.
///
/// Clones share state, so a test can keep one handle while the observer owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualWatch {
    state: Rc<RefCell<WatchState>>,
}

impl ManualWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose first `times` constructions fail.
    pub fn failing(times: u32) -> Self {
        let w = Self::default();
        w.state.borrow_mut().failures_left = times;
        w
    }

    /// Refuse to watch `node` from now on.
    pub fn refuse(&self, node: NodeId) {
        self.state.borrow_mut().refused.insert(node);
    }

    pub fn factory(&self) -> BackendFactory {
        let handle = self.clone();
        Box::new(move || {
            let mut st = handle.state.borrow_mut();
            st.constructions += 1;
            if st.failures_left > 0 {
                st.failures_left -= 1;
                return Err(WatchError("native watch primitive unavailable".to_string()));
            }
            drop(st);
            Ok(Box::new(handle.clone()) as Box<dyn WatchBackend>)
        })
    }

    pub fn watched(&self) -> Vec<NodeId> {
        self.state.borrow().watched.iter().copied().collect()
    }

    pub fn constructions(&self) -> u32 {
        self.state.borrow().constructions
    }

    pub fn disconnects(&self) -> u32 {
        self.state.borrow().disconnects
    }
}

impl WatchBackend for ManualWatch {
    fn watch(&mut self, node: NodeId) -> Result<(), WatchError> {
        let mut st = self.state.borrow_mut();
        if st.refused.contains(&node) {
            return Err(WatchError(format!("{node} cannot be watched")));
        }
        st.watched.insert(node);
        Ok(())
    }

    fn unwatch(&mut self, node: NodeId) {
        self.state.borrow_mut().watched.remove(&node);
    }

    fn disconnect(&mut self) {
        let mut st = self.state.borrow_mut();
        st.watched.clear();
        st.disconnects += 1;
    }

    fn active_watches(&self) -> usize {
        self.state.borrow().watched.len()
    }
}

#[cfg(test)]
#[path = "../tests/unit/scene/scene.rs"]
mod tests;
