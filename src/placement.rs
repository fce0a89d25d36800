//! The two style-level representations of a node's placement and the total conversions between
//! them.
//!
//! - [`ResponsiveForm`]: percentages of the parent's box, plus an [`Origin`] convention. With
//!   [`Origin::Center`] the `left/top` percentages locate the node's center, which is what a
//!   `translate(-50%, -50%)` centering transform expresses in CSS.
//! - [`AbsoluteForm`]: parent-relative pixel rectangle with no centering, plus an explicit nudge
//!   offset applied on top of the style-level position while editing.
//!
//! Both forms are relative to the parent's box; [`Placement::resolve`] maps them to the
//! viewport-absolute rectangle the layout host renders.

use std::fmt;

use crate::foundation::core::{Point, Rect, Size, Space, SpaceRect, Vec2};

/// Which point of the node the responsive `left/top` percentages locate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    #[default]
    TopLeft,
    /// `left/top` locate the center (centering transform applied).
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponsiveForm {
    pub left_pct: f64,
    pub top_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
    pub origin: Origin,
}

impl ResponsiveForm {
    pub fn new(left_pct: f64, top_pct: f64, width_pct: f64, height_pct: f64) -> Self {
        Self {
            left_pct,
            top_pct,
            width_pct,
            height_pct,
            origin: Origin::TopLeft,
        }
    }

    pub fn centered(left_pct: f64, top_pct: f64, width_pct: f64, height_pct: f64) -> Self {
        Self {
            origin: Origin::Center,
            ..Self::new(left_pct, top_pct, width_pct, height_pct)
        }
    }

    /// Express a parent-relative pixel rectangle as percentages of `parent`.
    ///
    /// Returns `None` for a degenerate parent (zero, negative or non-finite extent): the
    /// resulting percentages would be meaningless.
    pub fn from_rect(rect: Rect, parent: Size, origin: Origin) -> Option<Self> {
        if !is_measurable(parent) {
            return None;
        }
        let anchor = match origin {
            Origin::TopLeft => rect.origin(),
            Origin::Center => rect.center(),
        };
        Some(Self {
            left_pct: anchor.x / parent.width * 100.0,
            top_pct: anchor.y / parent.height * 100.0,
            width_pct: rect.width() / parent.width * 100.0,
            height_pct: rect.height() / parent.height * 100.0,
            origin,
        })
    }

    /// Parent-relative pixel rectangle (top-left based) for a parent of size `parent`.
    pub fn to_rect(&self, parent: Size) -> Rect {
        let w = self.width_pct / 100.0 * parent.width;
        let h = self.height_pct / 100.0 * parent.height;
        let ax = self.left_pct / 100.0 * parent.width;
        let ay = self.top_pct / 100.0 * parent.height;
        let origin = match self.origin {
            Origin::TopLeft => Point::new(ax, ay),
            Origin::Center => Point::new(ax - w * 0.5, ay - h * 0.5),
        };
        Rect::from_origin_size(origin, Size::new(w.max(0.0), h.max(0.0)))
    }

    /// The top-left based percentage rectangle, independent of the origin convention.
    pub fn percent_rect(&self) -> SpaceRect {
        let (x, y) = match self.origin {
            Origin::TopLeft => (self.left_pct, self.top_pct),
            Origin::Center => (
                self.left_pct - self.width_pct * 0.5,
                self.top_pct - self.height_pct * 0.5,
            ),
        };
        SpaceRect::new(x, y, self.width_pct, self.height_pct, Space::ParentPercent)
    }

    /// Round every percentage to `decimals` places.
    pub fn rounded(self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        let r = |v: f64| (v * scale).round() / scale;
        Self {
            left_pct: r(self.left_pct),
            top_pct: r(self.top_pct),
            width_pct: r(self.width_pct),
            height_pct: r(self.height_pct),
            origin: self.origin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AbsoluteForm {
    /// Style-level rectangle, parent-relative pixels.
    pub rect: Rect,
    /// Incremental offset rendered on top of `rect` (a translate transform).
    pub nudge: Vec2,
}

impl AbsoluteForm {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            nudge: Vec2::ZERO,
        }
    }

    /// Where the node is drawn relative to its parent: `rect` shifted by `nudge`.
    pub fn visual_rect(&self) -> Rect {
        self.rect + self.nudge
    }
}

/// Style-level placement of a node: the tagged union of the two forms.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum Placement {
    Responsive(ResponsiveForm),
    Absolute(AbsoluteForm),
}

impl Placement {
    /// Parent-relative pixel rectangle actually drawn, nudge included.
    pub fn visual_rect(&self, parent: Size) -> Rect {
        match self {
            Placement::Responsive(r) => r.to_rect(parent),
            Placement::Absolute(a) => a.visual_rect(),
        }
    }

    /// Viewport-absolute rectangle for a parent whose viewport box is `parent`.
    pub fn resolve(&self, parent: Rect) -> Rect {
        self.visual_rect(parent.size()) + parent.origin().to_vec2()
    }

    /// Absolute form drawing the same rectangle, with the nudge folded into the position.
    pub fn to_absolute(&self, parent: Size) -> AbsoluteForm {
        AbsoluteForm::new(self.visual_rect(parent))
    }

    /// Responsive form drawing the same rectangle. `None` for a degenerate parent.
    pub fn to_responsive(&self, parent: Size, origin: Origin) -> Option<ResponsiveForm> {
        match self {
            Placement::Responsive(r) if r.origin == origin => Some(*r),
            _ => ResponsiveForm::from_rect(self.visual_rect(parent), parent, origin),
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            Placement::Responsive(r) => Some(r.origin),
            Placement::Absolute(_) => None,
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, Placement::Absolute(_))
    }

    /// CSS-like declarations for the host's style surface.
    pub fn declarations(&self) -> StyleDecls {
        match self {
            Placement::Responsive(r) => StyleDecls {
                left: Length::Percent(r.left_pct),
                top: Length::Percent(r.top_pct),
                width: Length::Percent(r.width_pct),
                height: Length::Percent(r.height_pct),
                transform: match r.origin {
                    Origin::TopLeft => Translate::None,
                    Origin::Center => Translate::CenterSelf,
                },
            },
            Placement::Absolute(a) => StyleDecls {
                left: Length::Px(a.rect.x0),
                top: Length::Px(a.rect.y0),
                width: Length::Px(a.rect.width()),
                height: Length::Px(a.rect.height()),
                transform: if a.nudge == Vec2::ZERO {
                    Translate::None
                } else {
                    Translate::Px(a.nudge)
                },
            },
        }
    }
}

fn is_measurable(s: Size) -> bool {
    s.width.is_finite() && s.height.is_finite() && s.width > 0.0 && s.height > 0.0
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Length {
    Px(f64),
    Percent(f64),
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(v) => write!(f, "{v}px"),
            Length::Percent(v) => write!(f, "{v}%"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Translate {
    None,
    /// `translate(-50%, -50%)`.
    CenterSelf,
    Px(Vec2),
}

impl fmt::Display for Translate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Translate::None => f.write_str("none"),
            Translate::CenterSelf => f.write_str("translate(-50%, -50%)"),
            Translate::Px(v) => write!(f, "translate({}px, {}px)", v.x, v.y),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleDecls {
    pub left: Length,
    pub top: Length,
    pub width: Length,
    pub height: Length,
    pub transform: Translate,
}

impl fmt::Display for StyleDecls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "left: {}; top: {}; width: {}; height: {}; transform: {}",
            self.left, self.top, self.width, self.height, self.transform
        )
    }
}

#[cfg(test)]
#[path = "../tests/unit/placement/placement.rs"]
mod tests;
