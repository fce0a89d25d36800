use crate::edit::resize::{DragKind, Grip, Modifiers};
use crate::foundation::core::{NodeId, Point, Rect, SpaceRect, Vec2};
use crate::placement::{AbsoluteForm, Origin, Placement};

/// Whether a node currently has an open edit session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    Idle,
    Editing,
}

/// A pointer sample fed to the controller.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub position: Point,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(pointer_id: u64, x: f64, y: f64) -> Self {
        Self {
            pointer_id,
            position: Point::new(x, y),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// One active pointer gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragState {
    pub kind: DragKind,
    pub grip: Grip,
    pub pointer_id: u64,
    pub start_pointer: Point,
    pub last_pointer: Point,
    /// Parent-relative visual rectangle at gesture start.
    pub start_rect: Rect,
    pub modifiers: Modifiers,
}

impl DragState {
    pub(crate) fn begin(grip: Grip, pointer: PointerEvent, start_rect: Rect) -> Self {
        Self {
            kind: grip.kind(),
            grip,
            pointer_id: pointer.pointer_id,
            start_pointer: pointer.position,
            last_pointer: pointer.position,
            start_rect,
            modifiers: pointer.modifiers,
        }
    }

    /// Total pointer displacement since the gesture started.
    pub fn delta(&self) -> Vec2 {
        self.last_pointer - self.start_pointer
    }
}

/// Per-node edit state between `enter_edit` and `commit`/`cancel_edit`.
///
/// The node is drawn at `base + nudge`: `base` is the style-level absolute rectangle that
/// gestures rewrite, `nudge` the small incremental offset fed by `nudge_by`. The nudge is folded
/// in once, at commit.
#[derive(Clone, Debug, PartialEq)]
pub struct EditSession {
    pub(crate) node: NodeId,
    pub(crate) backup: Placement,
    pub(crate) origin: Origin,
    pub(crate) entry_base: Rect,
    pub(crate) base: Rect,
    pub(crate) nudge: Vec2,
    pub(crate) drag: Option<DragState>,
    pub(crate) rendered: Option<SpaceRect>,
    pub(crate) pending: Option<AbsoluteForm>,
}

impl EditSession {
    pub(crate) fn new(node: NodeId, backup: Placement, origin: Origin, base: Rect) -> Self {
        Self {
            node,
            backup,
            origin,
            entry_base: base,
            base,
            nudge: Vec2::ZERO,
            drag: None,
            rendered: None,
            pending: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Placement the node had before editing; restored verbatim by `cancel_edit`.
    pub fn backup(&self) -> &Placement {
        &self.backup
    }

    /// Origin convention the committed responsive form will use.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn base_rect(&self) -> Rect {
        self.base
    }

    pub fn nudge(&self) -> Vec2 {
        self.nudge
    }

    /// Parent-relative rectangle the node is drawn at.
    pub fn visual_rect(&self) -> Rect {
        self.base + self.nudge
    }

    pub fn form(&self) -> AbsoluteForm {
        AbsoluteForm {
            rect: self.base,
            nudge: self.nudge,
        }
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Viewport rectangle read back from the host after the last style write.
    pub fn rendered_rect(&self) -> Option<SpaceRect> {
        self.rendered
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }
}
