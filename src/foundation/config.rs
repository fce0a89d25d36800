use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::Size;
use crate::foundation::error::{RectSwapError, RectSwapResult};
use crate::placement::Origin;

/// Top-level configuration, loadable from JSON.
///
/// Every field has a default, so `{}` is a valid configuration document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub observer: ObserverConfig,
    pub edit: EditConfig,
}

impl Config {
    pub fn from_json_str(s: &str) -> RectSwapResult<Self> {
        let cfg: Config = serde_json::from_str(s)
            .map_err(|e| RectSwapError::config(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> RectSwapResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> RectSwapResult<()> {
        self.observer.validate()?;
        self.edit.validate()
    }
}

/// A named viewport width threshold.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Breakpoint {
    pub name: String,
    pub min_width: f64,
}

impl Breakpoint {
    pub fn new(name: impl Into<String>, min_width: f64) -> Self {
        Self {
            name: name.into(),
            min_width,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Changes at or below this magnitude (on every axis) are not reported.
    pub epsilon: f64,
    /// Minimum interval between two flushes, and between two notifications of one node.
    pub throttle_ms: f64,
    pub max_elements: usize,
    pub snap_to_device_pixels: bool,
    /// DPR polling interval, used when the environment has no pixel-ratio media query.
    pub dpr_poll_interval_ms: f64,
    pub init_retry_limit: u32,
    /// First retry delay; doubles on every further attempt.
    pub init_backoff_ms: f64,
    /// Ascending width thresholds. The matched breakpoint is the largest `min_width <= width`.
    pub breakpoints: Vec<Breakpoint>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            throttle_ms: 8.0,
            max_elements: 100,
            snap_to_device_pixels: false,
            dpr_poll_interval_ms: 500.0,
            init_retry_limit: 3,
            init_backoff_ms: 50.0,
            breakpoints: vec![
                Breakpoint::new("mobile", 0.0),
                Breakpoint::new("tablet", 768.0),
                Breakpoint::new("desktop", 1024.0),
                Breakpoint::new("large", 1200.0),
            ],
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> RectSwapResult<()> {
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(RectSwapError::config("observer.epsilon must be >= 0"));
        }
        if !(self.throttle_ms.is_finite() && self.throttle_ms >= 0.0) {
            return Err(RectSwapError::config("observer.throttle_ms must be >= 0"));
        }
        if self.max_elements == 0 {
            return Err(RectSwapError::config("observer.max_elements must be > 0"));
        }
        if !(self.dpr_poll_interval_ms.is_finite() && self.dpr_poll_interval_ms > 0.0) {
            return Err(RectSwapError::config(
                "observer.dpr_poll_interval_ms must be > 0",
            ));
        }
        if !(self.init_backoff_ms.is_finite() && self.init_backoff_ms >= 0.0) {
            return Err(RectSwapError::config("observer.init_backoff_ms must be >= 0"));
        }
        if self.breakpoints.is_empty() {
            return Err(RectSwapError::config(
                "observer.breakpoints must not be empty",
            ));
        }
        for pair in self.breakpoints.windows(2) {
            if pair[1].min_width <= pair[0].min_width {
                return Err(RectSwapError::config(format!(
                    "observer.breakpoints must be strictly ascending ('{}' <= '{}')",
                    pair[1].name, pair[0].name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Floor applied to every drag mutation.
    pub min_size: Size,
    /// Per-axis nudge offsets at or below this are discarded on commit.
    pub tolerance_px: f64,
    /// Fraction of an above-tolerance nudge folded into the committed position.
    pub gentle_correction_ratio: f64,
    /// Decimal places kept in committed percentages.
    pub percent_precision: u32,
    /// Queue style writes and perform them from `flush_frame`, one per node per frame.
    pub coalesce_writes: bool,
    /// Visual-idempotence check on `enter_edit`.
    pub epsilon: f64,
    /// Origin convention for nodes that were already absolute before editing.
    pub default_origin: Origin,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            min_size: Size::new(20.0, 20.0),
            tolerance_px: 5.0,
            gentle_correction_ratio: 0.5,
            percent_precision: 4,
            coalesce_writes: true,
            epsilon: 0.5,
            default_origin: Origin::TopLeft,
        }
    }
}

impl EditConfig {
    pub fn validate(&self) -> RectSwapResult<()> {
        let Size { width, height } = self.min_size;
        if !(width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0) {
            return Err(RectSwapError::config("edit.min_size must be >= 0"));
        }
        if !(self.tolerance_px.is_finite() && self.tolerance_px >= 0.0) {
            return Err(RectSwapError::config("edit.tolerance_px must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.gentle_correction_ratio) {
            return Err(RectSwapError::config(
                "edit.gentle_correction_ratio must be in [0, 1]",
            ));
        }
        if self.percent_precision > 10 {
            return Err(RectSwapError::config("edit.percent_precision must be <= 10"));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(RectSwapError::config("edit.epsilon must be >= 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
