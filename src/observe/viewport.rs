use crate::foundation::config::Breakpoint;
use crate::foundation::core::Size;

/// Process-wide display state tracked by an observer.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ViewportState {
    pub device_pixel_ratio: f64,
    pub viewport: Size,
    pub breakpoint: String,
}

#[derive(Debug)]
pub(crate) struct ViewportTracker {
    state: ViewportState,
    breakpoints: Vec<Breakpoint>,
    poll_interval_ms: f64,
    last_poll_ms: Option<f64>,
}

impl ViewportTracker {
    pub(crate) fn new(
        breakpoints: Vec<Breakpoint>,
        poll_interval_ms: f64,
        dpr: f64,
        viewport: Size,
    ) -> Self {
        let breakpoint = classify(&breakpoints, viewport.width).to_string();
        Self {
            state: ViewportState {
                device_pixel_ratio: sanitize_dpr(dpr).unwrap_or(1.0),
                viewport,
                breakpoint,
            },
            breakpoints,
            poll_interval_ms,
            last_poll_ms: None,
        }
    }

    pub(crate) fn state(&self) -> &ViewportState {
        &self.state
    }

    pub(crate) fn dpr(&self) -> f64 {
        self.state.device_pixel_ratio
    }

    pub(crate) fn breakpoint(&self) -> &str {
        &self.state.breakpoint
    }

    /// Record a new viewport size. Returns `true` when the matched breakpoint changed.
    pub(crate) fn resize(&mut self, viewport: Size) -> bool {
        self.state.viewport = viewport;
        let next = classify(&self.breakpoints, viewport.width);
        if next == self.state.breakpoint {
            return false;
        }
        tracing::debug!(from = %self.state.breakpoint, to = next, "breakpoint changed");
        self.state.breakpoint = next.to_string();
        true
    }

    /// Record a pixel ratio. Returns `true` when it differs from the current one.
    pub(crate) fn set_dpr(&mut self, dpr: f64) -> bool {
        let Some(dpr) = sanitize_dpr(dpr) else {
            tracing::warn!(dpr, "ignoring invalid device pixel ratio");
            return false;
        };
        if (dpr - self.state.device_pixel_ratio).abs() <= 1e-6 {
            return false;
        }
        self.state.device_pixel_ratio = dpr;
        true
    }

    /// Whether the polling fallback should sample the pixel ratio at `now_ms`.
    pub(crate) fn poll_due(&mut self, now_ms: f64) -> bool {
        let due = match self.last_poll_ms {
            None => true,
            Some(last) => now_ms - last >= self.poll_interval_ms,
        };
        if due {
            self.last_poll_ms = Some(now_ms);
        }
        due
    }
}

/// Name of the largest threshold `<= width`; the first breakpoint when `width` is below all.
pub(crate) fn classify(breakpoints: &[Breakpoint], width: f64) -> &str {
    breakpoints
        .iter()
        .rev()
        .find(|b| b.min_width <= width)
        .or(breakpoints.first())
        .map(|b| b.name.as_str())
        .unwrap_or("")
}

fn sanitize_dpr(dpr: f64) -> Option<f64> {
    (dpr.is_finite() && dpr > 0.0).then_some(dpr)
}

#[cfg(test)]
#[path = "../../tests/unit/observe/viewport.rs"]
mod tests;
