//! # rectswap guide
//!
//! A standalone walkthrough of the crate's model. For commands, start with the repository
//! `README.md`.
//!
//! ---
//!
//! ## Two placements for one node
//!
//! A node's style-level position is a [`Placement`](crate::Placement):
//!
//! - [`ResponsiveForm`](crate::ResponsiveForm): `left/top/width/height` as percentages of the
//!   parent's box. With [`Origin::Center`](crate::Origin::Center) the `left/top` pair locates the
//!   node's center, the way a `translate(-50%, -50%)` centering transform does.
//! - [`AbsoluteForm`](crate::AbsoluteForm): a parent-relative pixel rectangle plus a `nudge`
//!   offset drawn on top of it.
//!
//! Conversions are total and side-effect free. The only partial one is the conversion into
//! percentages, which needs a parent with a non-zero box.
//!
//! ## Editing
//!
//! ```text
//!           enter_edit                        commit / cancel_edit
//!   Idle ──────────────▶ Editing ─────────────────────────────────▶ Idle
//!                          │  ▲
//!              start_drag  │  │ end_drag
//!                          ▼  │
//!                        dragging (update_drag / update_modifiers)
//! ```
//!
//! 1. [`enter_edit`](crate::CoordinateSpaceController::enter_edit) reads the rendered rectangle
//!    and writes it back as an absolute form. Nothing moves.
//! 2. Pointer samples go to [`update_drag`](crate::CoordinateSpaceController::update_drag). The
//!    new rectangle is computed from the total displacement since the gesture began, floored at
//!    the minimum size, then checked against the parent's box. A rectangle that would leave the
//!    box is rejected and the previous one kept.
//! 3. Move and resize gestures rewrite the base rectangle, resizes through the pure
//!    [`resize`](crate::resize) function. Small incremental offsets from
//!    [`nudge_by`](crate::CoordinateSpaceController::nudge_by) accumulate in the nudge instead.
//! 4. Style writes are queued and performed by
//!    [`flush_frame`](crate::CoordinateSpaceController::flush_frame), one per node per refresh.
//! 5. [`commit`](crate::CoordinateSpaceController::commit) folds the nudge per axis. A node
//!    that was only dragged stays where it was released. Nudge offsets up to `tolerance_px` are
//!    dropped, larger ones are folded in scaled by
//!    `gentle_correction_ratio` (see [`fold_offset`](crate::fold_offset)). The result is divided
//!    by the parent's size, rounded, and written in the node's original origin convention.
//!
//! Example: a parent of 1000x500, a node at `{100, 50, 200, 100}`. Dragging the bottom-right
//! handle by `(+50, +25)` gives `{100, 50, 250, 125}`, committed as `10%, 10%, 25%, 25%`.
//!
//! ## Observing
//!
//! [`RectObserver`](crate::RectObserver) keeps one record per node, shared by all subscribers of
//! that node. Raw events only queue work; [`tick`](crate::RectObserver::tick) flushes it:
//!
//! - the latest rectangle per node wins within a frame;
//! - a change is reported only if some edge or extent moved by more than `epsilon`, or the
//!   viewport crossed a breakpoint;
//! - pixel-ratio changes are broadcast to every node as [`ChangeType::Dpr`](crate::ChangeType::Dpr);
//! - subscriber errors are logged and never interrupt the flush.
//!
//! Subscribers are closures or weak [`RectListener`](crate::RectListener)s. A listener whose
//! owner has been dropped is pruned at the next flush.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and spans and never installs a subscriber. Binaries and tests
//! choose one, e.g. `tracing_subscriber::fmt()`.
