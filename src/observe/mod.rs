//! Geometry observation: epsilon-filtered, frame-coalesced rectangle change notifications.
//!
//! The host forwards raw events from its native primitives (`on_geometry_changed`,
//! `on_viewport_resized`, `on_dpr_changed`) and drives one [`RectObserver::tick`] per display
//! refresh. Each tick flushes at most one notification per observed node.

pub(crate) mod batch;
pub(crate) mod observer;
pub(crate) mod viewport;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::foundation::core::{NodeId, RectDelta, SpaceRect};

/// Why a notification was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    /// Sent synchronously when a subscriber is registered.
    Initial,
    Resize,
    /// Device pixel ratio changed; sent to every node regardless of its geometry.
    Dpr,
}

/// One notification delivered to subscribers.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RectChange {
    pub node: NodeId,
    pub rect: SpaceRect,
    /// Difference to the previously reported rectangle (zero for `Initial`).
    pub delta: RectDelta,
    pub timestamp_ms: f64,
    pub device_pixel_ratio: f64,
    pub change_type: ChangeType,
    /// Notifications sent for this node since observation began; `0` for the first `Initial`.
    pub change_count: u64,
    pub breakpoint: String,
}

/// Per-node observation options; `None` falls back to the observer configuration.
///
/// Options are fixed when the node's record is created; later subscribers share them.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObserveOptions {
    pub epsilon: Option<f64>,
    pub throttle_ms: Option<f64>,
}

/// Identifies one subscriber within a node's record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

/// Returned by [`RectObserver::observe`](crate::RectObserver::observe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObservationHandle {
    pub node: NodeId,
    pub subscriber: SubscriberId,
}

/// Long-lived subscriber owned elsewhere (a panel, a widget).
pub trait RectListener {
    fn on_rect_change(&mut self, change: &RectChange) -> anyhow::Result<()>;
}

pub type RectCallback = Box<dyn FnMut(&RectChange) -> anyhow::Result<()>>;

/// A notification target.
///
/// `Listener` holds only a weak reference: when its owner is dropped the subscription lapses and
/// is pruned at the next flush, without an explicit `unobserve`.
pub enum Subscriber {
    Callback(RectCallback),
    Listener(Weak<RefCell<dyn RectListener>>),
}

impl Subscriber {
    pub fn callback(f: impl FnMut(&RectChange) -> anyhow::Result<()> + 'static) -> Self {
        Subscriber::Callback(Box::new(f))
    }

    pub fn listener<L: RectListener + 'static>(listener: &Rc<RefCell<L>>) -> Self {
        let strong: Rc<RefCell<dyn RectListener>> = listener.clone();
        Subscriber::Listener(Rc::downgrade(&strong))
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Subscriber::Callback(_) => true,
            Subscriber::Listener(w) => w.strong_count() > 0,
        }
    }

    pub(crate) fn deliver(&mut self, change: &RectChange) -> Delivery {
        match self {
            Subscriber::Callback(f) => match f(change) {
                Ok(()) => Delivery::Delivered,
                Err(e) => Delivery::Failed(e),
            },
            Subscriber::Listener(w) => {
                let Some(rc) = w.upgrade() else {
                    return Delivery::Dead;
                };
                let Ok(mut listener) = rc.try_borrow_mut() else {
                    return Delivery::Failed(anyhow::anyhow!("listener is already borrowed"));
                };
                match listener.on_rect_change(change) {
                    Ok(()) => Delivery::Delivered,
                    Err(e) => Delivery::Failed(e),
                }
            }
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscriber::Callback(_) => f.write_str("Subscriber::Callback(..)"),
            Subscriber::Listener(w) => f
                .debug_struct("Subscriber::Listener")
                .field("alive", &(w.strong_count() > 0))
                .finish(),
        }
    }
}

pub(crate) enum Delivery {
    Delivered,
    Failed(anyhow::Error),
    Dead,
}
