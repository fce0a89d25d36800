use crate::foundation::core::{Point, Rect, Size, Vec2};

/// One of the eight resize handles around a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handle {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::Nw,
        Handle::N,
        Handle::Ne,
        Handle::E,
        Handle::Se,
        Handle::S,
        Handle::Sw,
        Handle::W,
    ];

    /// Direction of the handle from the node's center, `-1`, `0` or `1` per axis.
    pub fn direction(self) -> (f64, f64) {
        match self {
            Handle::Nw => (-1.0, -1.0),
            Handle::N => (0.0, -1.0),
            Handle::Ne => (1.0, -1.0),
            Handle::E => (1.0, 0.0),
            Handle::Se => (1.0, 1.0),
            Handle::S => (0.0, 1.0),
            Handle::Sw => (-1.0, 1.0),
            Handle::W => (-1.0, 0.0),
        }
    }

    pub fn is_corner(self) -> bool {
        let (hx, hy) = self.direction();
        hx != 0.0 && hy != 0.0
    }
}

/// What the pointer grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grip {
    Move,
    Handle(Handle),
}

impl Grip {
    pub fn kind(self) -> DragKind {
        match self {
            Grip::Move => DragKind::Move,
            Grip::Handle(h) if h.is_corner() => DragKind::CornerResize,
            Grip::Handle(_) => DragKind::EdgeResize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DragKind {
    Move,
    CornerResize,
    EdgeResize,
}

/// Modifier keys held during a gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    /// Shift keeps the start aspect ratio.
    pub fn aspect_lock(self) -> bool {
        self.shift
    }

    /// Ctrl or Alt scales about the center instead of the opposite edge or corner.
    pub fn center_anchor(self) -> bool {
        self.ctrl || self.alt
    }
}

/// Rectangle produced by dragging `grip` by `delta` from `start`.
///
/// Pure: the result depends only on the arguments. `delta` is the total pointer displacement
/// since the gesture started, not the last increment. Every resized axis is floored at
/// `min_size` (proportionally when the aspect ratio is locked) so the rectangle never flips
/// through its fixed point.
pub fn resize(grip: Grip, modifiers: Modifiers, start: Rect, delta: Vec2, min_size: Size) -> Rect {
    let Grip::Handle(handle) = grip else {
        return start + delta;
    };
    let start = start.abs();
    let (hx, hy) = handle.direction();
    let center_anchor = modifiers.center_anchor();
    // Center-anchored handles move both opposite sides, doubling the growth.
    let growth = if center_anchor { 2.0 } else { 1.0 };

    let (w0, h0) = (start.width(), start.height());
    let mut w = w0 + hx * delta.x * growth;
    let mut h = h0 + hy * delta.y * growth;

    let locked = modifiers.aspect_lock() && w0 > 0.0 && h0 > 0.0;
    if locked {
        let sx = w / w0;
        let sy = h / h0;
        let s = if hx == 0.0 {
            sy
        } else if hy == 0.0 {
            sx
        } else if (sx - 1.0).abs() >= (sy - 1.0).abs() {
            sx
        } else {
            sy
        };
        let floor = (min_size.width / w0).max(min_size.height / h0);
        let s = s.max(floor);
        w = w0 * s;
        h = h0 * s;
    } else {
        if hx != 0.0 {
            w = w.max(min_size.width);
        }
        if hy != 0.0 {
            h = h.max(min_size.height);
        }
    }

    let c = start.center();
    let place = |dir: f64, lo: f64, hi: f64, mid: f64, len: f64| -> f64 {
        if center_anchor || (dir == 0.0 && locked) {
            mid - len * 0.5
        } else if dir < 0.0 {
            hi - len
        } else {
            lo
        }
    };
    let x0 = place(hx, start.x0, start.x1, c.x, w);
    let y0 = place(hy, start.y0, start.y1, c.y, h);
    Rect::from_origin_size(Point::new(x0, y0), Size::new(w, h))
}

#[cfg(test)]
#[path = "../../tests/unit/edit/resize.rs"]
mod tests;
