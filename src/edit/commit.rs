use crate::foundation::config::EditConfig;
use crate::foundation::core::{Rect, Size, Vec2};
use crate::placement::{Origin, ResponsiveForm};

/// Portion of a nudge `offset` that is folded into the committed position.
///
/// Per axis: offsets within `tolerance_px` are discarded, larger ones are folded in scaled by
/// `gentle_correction_ratio`.
pub fn fold_offset(offset: Vec2, tolerance_px: f64, ratio: f64) -> Vec2 {
    let axis = |v: f64| {
        if v.abs() <= tolerance_px {
            0.0
        } else {
            v * ratio
        }
    };
    Vec2::new(axis(offset.x), axis(offset.y))
}

/// Result of applying the drift rule to a session's `base` and `nudge`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Folded {
    /// Parent-relative rectangle to commit.
    pub(crate) rect: Rect,
    /// Offset actually folded in.
    pub(crate) applied: Vec2,
}

pub(crate) fn fold(base: Rect, nudge: Vec2, config: &EditConfig) -> Folded {
    let applied = fold_offset(nudge, config.tolerance_px, config.gentle_correction_ratio);
    Folded {
        rect: base + applied,
        applied,
    }
}

/// Responsive form for a committed rectangle, rounded to the configured precision.
pub(crate) fn to_committed_form(
    rect: Rect,
    parent: Size,
    origin: Origin,
    config: &EditConfig,
) -> Option<ResponsiveForm> {
    ResponsiveForm::from_rect(rect, parent, origin).map(|f| f.rounded(config.percent_precision))
}

#[cfg(test)]
#[path = "../../tests/unit/edit/commit.rs"]
mod tests;
