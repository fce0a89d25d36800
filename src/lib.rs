//! rectswap lets an operator reposition and resize an element that is normally placed with
//! parent-relative percentages, by swapping it into absolute pixels for the duration of an edit
//! and folding the result back without a visual jump or accumulated drift.
//!
//! # Components
//!
//! - [`RectObserver`]: epsilon-filtered, frame-coalesced rectangle change notifications, plus
//!   device pixel ratio and viewport breakpoint tracking.
//! - [`CoordinateSpaceController`]: per-node edit sessions, the drag state machine and the
//!   tolerance-based commit.
//!
//! The core owns no layout. It talks to the host engine through [`LayoutHost`],
//! [`DisplayEnv`] and [`WatchBackend`]; [`Scene`] and [`ManualWatch`] are in-memory
//! implementations used by the replay CLI and the tests.
//!
//! Everything is single-threaded and cooperative: the host pushes raw events in and drives one
//! [`RectObserver::tick`] and one [`CoordinateSpaceController::flush_frame`] per display refresh.
//!
//! See [`crate::guide`] for a walkthrough.
#![forbid(unsafe_code)]

mod collab;
mod edit;
mod foundation;
mod host;
mod observe;
mod placement;
mod scene;

/// Architecture walkthrough.
pub mod guide;

pub use collab::{
    Align, AnchorKind, AnchorRequest, AnchorResolver, AnchorTarget, Binding, BoxAnchors,
    ReferenceScale, ScaleMode, ScaleResolver,
};
pub use edit::commit::fold_offset;
pub use edit::controller::{CommitRecord, CoordinateSpaceController, DragStep};
pub use edit::resize::{DragKind, Grip, Handle, Modifiers, resize};
pub use edit::session::{DragState, EditMode, EditSession, PointerEvent};
pub use foundation::config::{Breakpoint, Config, EditConfig, ObserverConfig};
pub use foundation::core::{NodeId, Point, Rect, RectDelta, Size, Space, SpaceRect, Vec2};
pub use foundation::error::{RectSwapError, RectSwapResult};
pub use host::{BackendFactory, DisplayEnv, LayoutHost, WatchBackend, WatchError};
pub use observe::observer::{ObserverDiagnostics, ObserverStatus, RectObserver};
pub use observe::viewport::ViewportState;
pub use observe::{
    ChangeType, ObservationHandle, ObserveOptions, RectCallback, RectChange, RectListener,
    Subscriber, SubscriberId,
};
pub use placement::{
    AbsoluteForm, Length, Origin, Placement, ResponsiveForm, StyleDecls, Translate,
};
pub use scene::{ManualWatch, Scene};
