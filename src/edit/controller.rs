use std::collections::BTreeMap;

use crate::collab::{AnchorRequest, AnchorResolver, Binding, ScaleResolver};
use crate::edit::commit::{fold, to_committed_form};
use crate::edit::resize::{Grip, Modifiers, resize};
use crate::edit::session::{DragState, EditMode, EditSession, PointerEvent};
use crate::foundation::config::EditConfig;
use crate::foundation::core::{NodeId, Point, Rect, Space, SpaceRect, Vec2};
use crate::foundation::error::{RectSwapError, RectSwapResult};
use crate::host::LayoutHost;
use crate::placement::{AbsoluteForm, Placement, ResponsiveForm};

/// Outcome of one pointer update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragStep {
    /// No active gesture for this pointer.
    Idle,
    /// The resulting rectangle would leave the parent box; the previous one is kept.
    Rejected,
    /// New parent-relative visual rectangle.
    Applied(Rect),
}

/// What a successful commit wrote.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CommitRecord {
    pub node: NodeId,
    pub form: ResponsiveForm,
    /// Rendered viewport rectangle after the write.
    pub rect: SpaceRect,
    /// Nudge offset folded into the committed position.
    pub folded: Vec2,
    pub anchor: Option<Point>,
    pub scale: Option<f64>,
}

/// Swaps nodes between responsive and absolute placement for editing.
///
/// Sessions are keyed by node; independent nodes can be edited at the same time. The controller
/// never owns placement: it reads rendered rectangles from the [`LayoutHost`] and writes
/// [`Placement`]s back through it.
pub struct CoordinateSpaceController {
    config: EditConfig,
    sessions: BTreeMap<NodeId, EditSession>,
    commits: BTreeMap<NodeId, CommitRecord>,
    bindings: BTreeMap<NodeId, Binding>,
    anchors: Option<Box<dyn AnchorResolver>>,
    scales: Option<Box<dyn ScaleResolver>>,
}

impl CoordinateSpaceController {
    pub fn new(config: EditConfig) -> RectSwapResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: BTreeMap::new(),
            commits: BTreeMap::new(),
            bindings: BTreeMap::new(),
            anchors: None,
            scales: None,
        })
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn set_anchor_resolver(&mut self, resolver: impl AnchorResolver + 'static) {
        self.anchors = Some(Box::new(resolver));
    }

    pub fn set_scale_resolver(&mut self, resolver: impl ScaleResolver + 'static) {
        self.scales = Some(Box::new(resolver));
    }

    /// Attach anchor and scale settings evaluated after each commit of `node`.
    pub fn bind(&mut self, node: NodeId, binding: Binding) -> RectSwapResult<()> {
        binding.validate()?;
        self.bindings.insert(node, binding);
        Ok(())
    }

    pub fn unbind(&mut self, node: NodeId) -> Option<Binding> {
        self.bindings.remove(&node)
    }

    pub fn session(&self, node: NodeId) -> Option<&EditSession> {
        self.sessions.get(&node)
    }

    pub fn is_editing(&self, node: NodeId) -> bool {
        self.sessions.contains_key(&node)
    }

    pub fn mode(&self, node: NodeId) -> EditMode {
        if self.is_editing(node) {
            EditMode::Editing
        } else {
            EditMode::Idle
        }
    }

    pub fn editing_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn last_commit(&self, node: NodeId) -> Option<&CommitRecord> {
        self.commits.get(&node)
    }

    /// Swap `node` into absolute placement without moving it.
    ///
    /// The node is written as an absolute rectangle equal to its rendered box relative to the
    /// parent, with no centering transform and a zero nudge.
    #[tracing::instrument(skip(self, host))]
    pub fn enter_edit<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<&EditSession> {
        if self.sessions.contains_key(&node) {
            return Err(RectSwapError::AlreadyEditing(node));
        }
        let backup = host
            .placement(node)
            .ok_or_else(|| RectSwapError::invalid_target(node, "node has no placement"))?;
        let parent = host
            .parent_rect(node)
            .filter(|p| is_measurable(*p))
            .ok_or_else(|| RectSwapError::invalid_target(node, "parent cannot be measured"))?;
        let rendered = host
            .rect(node)
            .ok_or_else(|| RectSwapError::invalid_target(node, "node is not laid out"))?;

        let base = rendered - parent.origin().to_vec2();
        host.set_placement(node, Placement::Absolute(AbsoluteForm::new(base)))?;

        let after = host.rect(node).map(|r| SpaceRect::from_kurbo(r, Space::ViewportAbsolute));
        let before = SpaceRect::from_kurbo(rendered, Space::ViewportAbsolute);
        if let Some(after) = after
            && after.differs_from(before, self.config.epsilon)
        {
            tracing::warn!(%node, shift = after.max_abs_diff(before), "edit entry moved the node");
        }

        let origin = backup.origin().unwrap_or(self.config.default_origin);
        let mut session = EditSession::new(node, backup, origin, base);
        session.rendered = after;
        tracing::debug!(%node, ?origin, "edit entered");
        Ok(self.sessions.entry(node).or_insert(session))
    }

    /// Begin a gesture. A gesture already in progress is replaced.
    pub fn start_drag(
        &mut self,
        node: NodeId,
        pointer: PointerEvent,
        grip: Grip,
    ) -> RectSwapResult<()> {
        let session = self
            .sessions
            .get_mut(&node)
            .ok_or(RectSwapError::NotEditing(node))?;
        let drag = DragState::begin(grip, pointer, session.visual_rect());
        tracing::debug!(%node, kind = ?drag.kind, pointer = pointer.pointer_id, "drag started");
        session.drag = Some(drag);
        Ok(())
    }

    /// Feed a pointer sample into the active gesture.
    ///
    /// The rectangle is recomputed from the total displacement since the gesture started.
    /// Samples from other pointers, or without an active gesture, are ignored.
    pub fn update_drag<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
        pointer: PointerEvent,
    ) -> RectSwapResult<DragStep> {
        let Some(drag) = self.sessions.get_mut(&node).and_then(|s| s.drag.as_mut()) else {
            return Ok(DragStep::Idle);
        };
        if drag.pointer_id != pointer.pointer_id {
            return Ok(DragStep::Idle);
        }
        drag.last_pointer = pointer.position;
        drag.modifiers = pointer.modifiers;
        self.apply(host, node)
    }

    /// Modifier keys changed without pointer motion; re-evaluates the active gesture.
    pub fn update_modifiers<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
        modifiers: Modifiers,
    ) -> RectSwapResult<DragStep> {
        let Some(drag) = self.sessions.get_mut(&node).and_then(|s| s.drag.as_mut()) else {
            return Ok(DragStep::Idle);
        };
        if drag.modifiers == modifiers {
            return Ok(DragStep::Idle);
        }
        drag.modifiers = modifiers;
        self.apply(host, node)
    }

    /// Shift `node` by a small incremental offset kept apart from its base rectangle.
    ///
    /// Offsets accumulate in the session's nudge until commit, where the drift rule decides
    /// how much of them is kept. A nudge that would leave the parent box is rejected.
    pub fn nudge_by<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
        offset: Vec2,
    ) -> RectSwapResult<DragStep> {
        let Some(session) = self.sessions.get(&node) else {
            return Err(RectSwapError::NotEditing(node));
        };
        let (base, nudge) = (session.base, session.nudge + offset);
        self.place(host, node, base, nudge)
    }

    fn apply<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<DragStep> {
        let Some(session) = self.sessions.get(&node) else {
            return Ok(DragStep::Idle);
        };
        let Some(drag) = session.drag else {
            return Ok(DragStep::Idle);
        };

        // `base` is solved from the visual rectangle so the current nudge stays as it is.
        let visual = match drag.grip {
            Grip::Move => drag.start_rect + drag.delta(),
            Grip::Handle(_) => resize(
                drag.grip,
                drag.modifiers,
                drag.start_rect,
                drag.delta(),
                self.config.min_size,
            ),
        };
        let nudge = session.nudge;
        self.place(host, node, visual - nudge, nudge)
    }

    fn place<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
        base: Rect,
        nudge: Vec2,
    ) -> RectSwapResult<DragStep> {
        let Some(parent) = host.parent_rect(node).filter(|p| is_measurable(*p)) else {
            tracing::debug!(%node, "update without a measurable parent");
            return Ok(DragStep::Rejected);
        };
        let bounds = Rect::from_origin_size(Point::ZERO, parent.size());
        let Some(session) = self.sessions.get_mut(&node) else {
            return Ok(DragStep::Idle);
        };
        let visual = base + nudge;
        if !contains(bounds, visual) {
            return Ok(DragStep::Rejected);
        }
        session.base = base;
        session.nudge = nudge;
        session.pending = Some(session.form());

        if !self.config.coalesce_writes {
            self.write_pending(host, node)?;
        }
        Ok(DragStep::Applied(visual))
    }

    fn write_pending<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<bool> {
        let Some(session) = self.sessions.get_mut(&node) else {
            return Ok(false);
        };
        let Some(form) = session.pending.take() else {
            return Ok(false);
        };
        if let Err(err) = host.set_placement(node, Placement::Absolute(form)) {
            session.pending = Some(form);
            return Err(err);
        }
        session.rendered = host
            .rect(node)
            .map(|r| SpaceRect::from_kurbo(r, Space::ViewportAbsolute));
        Ok(true)
    }

    /// Perform queued style writes: at most one per node, each followed by a re-read of the
    /// rendered rectangle. Returns the number of writes.
    pub fn flush_frame<H: LayoutHost + ?Sized>(&mut self, host: &mut H) -> RectSwapResult<usize> {
        let nodes: Vec<NodeId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.pending.is_some())
            .map(|(n, _)| *n)
            .collect();
        let mut written = 0;
        for node in nodes {
            if self.write_pending(host, node)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Finish the active gesture, flushing its queued write. The session stays open.
    pub fn end_drag<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<()> {
        if !self.sessions.contains_key(&node) {
            return Err(RectSwapError::NotEditing(node));
        }
        self.write_pending(host, node)?;
        if let Some(session) = self.sessions.get_mut(&node)
            && session.drag.take().is_some()
        {
            tracing::debug!(%node, "drag ended");
        }
        Ok(())
    }

    /// Fold the edit back into responsive placement and close the session.
    ///
    /// Returns `Ok(false)` without touching anything when `node` is not being edited or its
    /// parent has no measurable box; the session then stays open. If the host rejects the
    /// write the error is returned and the session also stays open.
    #[tracing::instrument(skip(self, host))]
    pub fn commit<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<bool> {
        let Some(session) = self.sessions.get(&node) else {
            return Ok(false);
        };
        let Some(parent) = host.parent_rect(node).filter(|p| is_measurable(*p)) else {
            tracing::warn!(%node, "commit skipped: parent has no measurable box");
            return Ok(false);
        };

        let folded = fold(session.base, session.nudge, &self.config);
        let form = match session.backup {
            Placement::Responsive(original) if same_rect(folded.rect, session.entry_base) => {
                original
            }
            _ => match to_committed_form(folded.rect, parent.size(), session.origin, &self.config)
            {
                Some(form) => form,
                None => return Ok(false),
            },
        };
        host.set_placement(node, Placement::Responsive(form))?;
        self.sessions.remove(&node);

        let rect = host
            .rect(node)
            .unwrap_or_else(|| form.to_rect(parent.size()) + parent.origin().to_vec2());
        let rect = SpaceRect::from_kurbo(rect, Space::ViewportAbsolute);
        let (anchor, scale) = self.resolve_collaborators(node, rect);
        let record = CommitRecord {
            node,
            form,
            rect,
            folded: folded.applied,
            anchor,
            scale,
        };
        tracing::debug!(
            %node,
            left = form.left_pct,
            top = form.top_pct,
            width = form.width_pct,
            height = form.height_pct,
            "edit committed"
        );
        self.commits.insert(node, record);
        Ok(true)
    }

    fn resolve_collaborators(&self, node: NodeId, rect: SpaceRect) -> (Option<Point>, Option<f64>) {
        let Some(binding) = self.bindings.get(&node) else {
            return (None, None);
        };
        let anchor = match (&self.anchors, binding.anchor) {
            (Some(resolver), Some((kind, target))) => Some(resolver.resolve(&AnchorRequest {
                kind,
                target,
                logical_size: rect.size(),
            })),
            _ => None,
        };
        let scale = match (&self.scales, binding.scale) {
            (Some(resolver), Some(mode)) => Some(resolver.scale_factor(&rect, mode)),
            _ => None,
        };
        (anchor, scale)
    }

    /// Restore the pre-edit placement verbatim and close the session.
    pub fn cancel_edit<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        node: NodeId,
    ) -> RectSwapResult<bool> {
        let Some(session) = self.sessions.get(&node) else {
            return Ok(false);
        };
        host.set_placement(node, session.backup)?;
        self.sessions.remove(&node);
        tracing::debug!(%node, "edit cancelled");
        Ok(true)
    }
}

fn is_measurable(r: Rect) -> bool {
    let (w, h) = (r.width(), r.height());
    w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0
}

const BOUNDS_EPS: f64 = 1e-9;

fn contains(bounds: Rect, r: Rect) -> bool {
    r.x0 >= bounds.x0 - BOUNDS_EPS
        && r.y0 >= bounds.y0 - BOUNDS_EPS
        && r.x1 <= bounds.x1 + BOUNDS_EPS
        && r.y1 <= bounds.y1 + BOUNDS_EPS
}

fn same_rect(a: Rect, b: Rect) -> bool {
    (a.x0 - b.x0).abs() <= BOUNDS_EPS
        && (a.y0 - b.y0).abs() <= BOUNDS_EPS
        && (a.x1 - b.x1).abs() <= BOUNDS_EPS
        && (a.y1 - b.y1).abs() <= BOUNDS_EPS
}

#[cfg(test)]
#[path = "../../tests/unit/edit/controller.rs"]
mod tests;
