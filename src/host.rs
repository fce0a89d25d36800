//! Seams to the host environment.
//!
//! The core never owns a node's placement. It reads rendered rectangles from a [`LayoutHost`],
//! writes [`Placement`]s back through it, asks a [`DisplayEnv`] for pixel ratio, viewport and
//! time, and watches geometry through a platform [`WatchBackend`].

use crate::foundation::core::{NodeId, Rect, Size};
use crate::foundation::error::RectSwapResult;
use crate::placement::Placement;

/// The layout engine that owns and renders nodes.
pub trait LayoutHost {
    /// Rendered viewport-absolute rectangle of `node`, or `None` if it is not laid out.
    fn rect(&self, node: NodeId) -> Option<Rect>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn placement(&self, node: NodeId) -> Option<Placement>;

    fn set_placement(&mut self, node: NodeId, placement: Placement) -> RectSwapResult<()>;

    fn is_attached(&self, node: NodeId) -> bool {
        self.rect(node).is_some()
    }

    /// Rendered rectangle of the parent of `node`.
    fn parent_rect(&self, node: NodeId) -> Option<Rect> {
        self.parent(node).and_then(|p| self.rect(p))
    }
}

/// Display properties and the frame clock.
pub trait DisplayEnv {
    fn device_pixel_ratio(&self) -> f64;

    /// Inner size of the viewport (window), in device-independent units.
    fn viewport_size(&self) -> Size;

    /// Monotonic time in milliseconds.
    fn now_ms(&self) -> f64;

    /// Whether pixel-ratio changes are pushed as events. When `false` the observer polls.
    fn supports_dpr_query(&self) -> bool {
        true
    }
}

/// Error raised by a native watch primitive.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct WatchError(pub String);

/// The platform's native geometry-change primitive (a resize observer).
///
/// Raw change events are delivered to the core by the host calling
/// [`RectObserver::on_geometry_changed`](crate::RectObserver::on_geometry_changed).
pub trait WatchBackend {
    fn watch(&mut self, node: NodeId) -> Result<(), WatchError>;

    fn unwatch(&mut self, node: NodeId);

    fn disconnect(&mut self);

    /// Number of nodes currently watched natively.
    fn active_watches(&self) -> usize;
}

/// Constructs a [`WatchBackend`]; invoked again on every initialization retry.
pub type BackendFactory = Box<dyn FnMut() -> Result<Box<dyn WatchBackend>, WatchError>>;
