//! Edit sessions: the responsive/absolute space swap, drag gestures and the drift-correcting
//! commit.
//!
//! A node enters edit as an absolute rectangle drawn exactly where it was. Gestures rewrite
//! the base rectangle, resizes through the pure [`resize`](crate::resize) function. Small
//! incremental offsets accumulate separately in the session's nudge.
//! [`commit`](crate::CoordinateSpaceController::commit) folds the nudge with the tolerance rule
//! and writes percentages back.

pub(crate) mod commit;
pub(crate) mod controller;
pub(crate) mod resize;
pub(crate) mod session;
