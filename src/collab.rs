//! Interfaces consumed after a commit: anchor resolution and scale-mode computation.
//!
//! Both are pure functions of the committed rectangle. The controller calls them for nodes that
//! carry a [`Binding`] and records the results in its commit record; it never validates what an
//! anchor means. [`BoxAnchors`] and [`ReferenceScale`] are small reference implementations.

use crate::foundation::core::{Point, Size, SpaceRect};
use crate::foundation::error::{RectSwapError, RectSwapResult};

/// Nine-point alignment inside a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Align {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Align {
    /// Fractional position inside a box, `(0, 0)` top-left to `(1, 1)` bottom-right.
    pub fn fraction(self) -> (f64, f64) {
        match self {
            Align::TopLeft => (0.0, 0.0),
            Align::Top => (0.5, 0.0),
            Align::TopRight => (1.0, 0.0),
            Align::Left => (0.0, 0.5),
            Align::Center => (0.5, 0.5),
            Align::Right => (1.0, 0.5),
            Align::BottomLeft => (0.0, 1.0),
            Align::Bottom => (0.5, 1.0),
            Align::BottomRight => (1.0, 1.0),
        }
    }
}

/// What the anchor is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorKind {
    /// The element's box.
    #[default]
    Element,
    /// Start of the element's text run.
    TextStart,
    /// End of the element's text run.
    TextEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorTarget {
    Align(Align),
    Explicit(Point),
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnchorRequest {
    pub kind: AnchorKind,
    pub target: AnchorTarget,
    pub logical_size: Size,
}

/// Turns a symbolic anchor into a point in the element's own logical coordinates.
pub trait AnchorResolver {
    fn resolve(&self, request: &AnchorRequest) -> Point;
}

impl<F> AnchorResolver for F
where
    F: Fn(&AnchorRequest) -> Point,
{
    fn resolve(&self, request: &AnchorRequest) -> Point {
        self(request)
    }
}

/// Resolves alignments against the logical box; text anchors use the box edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxAnchors;

impl AnchorResolver for BoxAnchors {
    fn resolve(&self, request: &AnchorRequest) -> Point {
        let size = request.logical_size;
        match (request.kind, request.target) {
            (_, AnchorTarget::Explicit(p)) => p,
            (AnchorKind::TextStart, AnchorTarget::Align(a)) => {
                Point::new(0.0, a.fraction().1 * size.height)
            }
            (AnchorKind::TextEnd, AnchorTarget::Align(a)) => {
                Point::new(size.width, a.fraction().1 * size.height)
            }
            (AnchorKind::Element, AnchorTarget::Align(a)) => {
                let (fx, fy) = a.fraction();
                Point::new(fx * size.width, fy * size.height)
            }
        }
    }
}

/// How an element's content scales with its box.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ScaleMode {
    ElementLinked,
    FixedSize,
    /// Requires the host's base reference size (e.g. a font size).
    Typography { base_size: f64 },
    Container,
}

impl ScaleMode {
    pub fn validate(&self) -> RectSwapResult<()> {
        match self {
            ScaleMode::Typography { base_size } if !(base_size.is_finite() && *base_size > 0.0) => {
                Err(RectSwapError::config(format!(
                    "typography scale needs a positive base size, got {base_size}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Computes a single scale factor for a committed rectangle.
pub trait ScaleResolver {
    fn scale_factor(&self, rect: &SpaceRect, mode: ScaleMode) -> f64;
}

impl<F> ScaleResolver for F
where
    F: Fn(&SpaceRect, ScaleMode) -> f64,
{
    fn scale_factor(&self, rect: &SpaceRect, mode: ScaleMode) -> f64 {
        self(rect, mode)
    }
}

/// Scales relative to the size the content was authored at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceScale {
    pub reference: Size,
}

impl ScaleResolver for ReferenceScale {
    fn scale_factor(&self, rect: &SpaceRect, mode: ScaleMode) -> f64 {
        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 1.0 };
        match mode {
            ScaleMode::FixedSize => 1.0,
            ScaleMode::ElementLinked => ratio(rect.width, self.reference.width),
            ScaleMode::Typography { base_size } => ratio(rect.height, base_size),
            ScaleMode::Container => ratio(rect.width, self.reference.width)
                .min(ratio(rect.height, self.reference.height)),
        }
    }
}

/// Per-node collaborator settings used after each commit.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    pub anchor: Option<(AnchorKind, AnchorTarget)>,
    pub scale: Option<ScaleMode>,
}

impl Binding {
    pub fn validate(&self) -> RectSwapResult<()> {
        match &self.scale {
            Some(mode) => mode.validate(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/collab/collab.rs"]
mod tests;
