use std::fmt;

pub use kurbo::{Point, Rect, Size, Vec2};

/// Opaque handle for a node owned by the layout host.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Coordinate space a [`SpaceRect`] is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Space {
    /// Device-independent pixels relative to the viewport origin.
    ViewportAbsolute,
    /// Percentages (0..100) of the parent's box.
    ParentPercent,
}

/// An `{x, y, width, height}` rectangle tagged with its coordinate space.
///
/// Width and height are never negative: constructors normalize a negative extent by moving the
/// origin, the same way `kurbo::Rect::abs` does.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpaceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub space: Space,
}

impl SpaceRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64, space: Space) -> Self {
        let (x, width) = if width < 0.0 {
            (x + width, -width)
        } else {
            (x, width)
        };
        let (y, height) = if height < 0.0 {
            (y + height, -height)
        } else {
            (y, height)
        };
        Self {
            x,
            y,
            width,
            height,
            space,
        }
    }

    pub fn viewport(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, width, height, Space::ViewportAbsolute)
    }

    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, width, height, Space::ParentPercent)
    }

    pub fn from_kurbo(rect: Rect, space: Space) -> Self {
        let r = rect.abs();
        Self::new(r.x0, r.y0, r.width(), r.height(), space)
    }

    pub fn to_kurbo(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn origin(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn is_degenerate(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Largest absolute difference over x/y/width/height.
    pub fn max_abs_diff(self, other: SpaceRect) -> f64 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.width - other.width).abs())
            .max((self.height - other.height).abs())
    }

    /// True when any of x/y/width/height differs from `other` by more than `epsilon`.
    pub fn differs_from(self, other: SpaceRect, epsilon: f64) -> bool {
        self.max_abs_diff(other) > epsilon
    }

    /// Component-wise difference `self - prev`, as `(dx, dy, dw, dh)`.
    pub fn delta_from(self, prev: SpaceRect) -> RectDelta {
        RectDelta {
            x: self.x - prev.x,
            y: self.y - prev.y,
            width: self.width - prev.width,
            height: self.height - prev.height,
        }
    }

    /// Round every component to the device pixel grid for `dpr`.
    pub fn snap_to_device_pixels(self, dpr: f64) -> Self {
        if !(dpr.is_finite() && dpr > 0.0) {
            return self;
        }
        let snap = |v: f64| (v * dpr).round() / dpr;
        Self {
            x: snap(self.x),
            y: snap(self.y),
            width: snap(self.width),
            height: snap(self.height),
            space: self.space,
        }
    }
}

/// Component-wise difference between two rectangles.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectDelta {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
