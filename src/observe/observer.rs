use std::collections::BTreeMap;
use std::time::Instant;

use crate::foundation::config::ObserverConfig;
use crate::foundation::core::{NodeId, RectDelta, Size, Space, SpaceRect};
use crate::foundation::error::{RectSwapError, RectSwapResult};
use crate::host::{BackendFactory, DisplayEnv, LayoutHost, WatchBackend};
use crate::observe::batch::FrameBatcher;
use crate::observe::viewport::{ViewportState, ViewportTracker};
use crate::observe::{
    ChangeType, Delivery, ObservationHandle, ObserveOptions, RectChange, Subscriber, SubscriberId,
};

enum BackendState {
    Ready(Box<dyn WatchBackend>),
    Retrying {
        factory: BackendFactory,
        failed_attempts: u32,
        next_at_ms: f64,
    },
    Failed,
    Closed,
}

/// Lifecycle of the native watch backend, as reported by [`RectObserver::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObserverStatus {
    Ready,
    Retrying { failed_attempts: u32 },
    Failed,
    Closed,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ObserverDiagnostics {
    pub status: ObserverStatus,
    pub observed_nodes: usize,
    pub subscribers: usize,
    pub pending: usize,
    pub active_watches: usize,
    pub paused: bool,
    pub flushes: u64,
    pub notifications: u64,
    pub coalesced_events: u64,
    pub subscriber_errors: u64,
    pub avg_flush_us: f64,
    pub max_flush_us: f64,
}

#[derive(Debug, Default)]
struct FlushStats {
    flushes: u64,
    notifications: u64,
    subscriber_errors: u64,
    total_flush_us: f64,
    max_flush_us: f64,
}

#[derive(Debug)]
struct ObservationRecord {
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    last_rect: SpaceRect,
    change_count: u64,
    epsilon: f64,
    throttle_ms: f64,
    last_notified_ms: Option<f64>,
}

/// Watches node rectangles, pixel ratio and viewport breakpoints.
///
/// Single-threaded: the host pushes raw events in and calls [`tick`](Self::tick) once per
/// display refresh. Notifications are delivered from `tick`, except the synchronous `Initial`
/// notification sent by [`observe`](Self::observe).
pub struct RectObserver {
    config: ObserverConfig,
    backend: BackendState,
    records: BTreeMap<NodeId, ObservationRecord>,
    batcher: FrameBatcher,
    viewport: ViewportTracker,
    paused: bool,
    next_subscriber: u64,
    stats: FlushStats,
}

impl RectObserver {
    /// Construct the observer and its native watch backend.
    ///
    /// A failing `factory` is retried from [`tick`](Self::tick) with exponential backoff, up to
    /// `init_retry_limit` times; after that the observer stays [`ObserverStatus::Failed`] and
    /// `observe` fails fast with `NotInitialized`.
    pub fn new<E: DisplayEnv + ?Sized>(
        config: ObserverConfig,
        mut factory: BackendFactory,
        env: &E,
    ) -> RectSwapResult<Self> {
        config.validate()?;
        let viewport = ViewportTracker::new(
            config.breakpoints.clone(),
            config.dpr_poll_interval_ms,
            env.device_pixel_ratio(),
            env.viewport_size(),
        );
        let backend = match factory() {
            Ok(b) => BackendState::Ready(b),
            Err(err) if config.init_retry_limit == 0 => {
                tracing::error!(error = %err, "native watch unavailable, no retries configured");
                BackendState::Failed
            }
            Err(err) => {
                tracing::warn!(error = %err, "native watch unavailable, scheduling retry");
                BackendState::Retrying {
                    factory,
                    failed_attempts: 1,
                    next_at_ms: env.now_ms() + config.init_backoff_ms,
                }
            }
        };
        Ok(Self {
            config,
            backend,
            records: BTreeMap::new(),
            batcher: FrameBatcher::default(),
            viewport,
            paused: false,
            next_subscriber: 1,
            stats: FlushStats::default(),
        })
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn status(&self) -> ObserverStatus {
        match &self.backend {
            BackendState::Ready(_) => ObserverStatus::Ready,
            BackendState::Retrying {
                failed_attempts, ..
            } => ObserverStatus::Retrying {
                failed_attempts: *failed_attempts,
            },
            BackendState::Failed => ObserverStatus::Failed,
            BackendState::Closed => ObserverStatus::Closed,
        }
    }

    /// Register `subscriber` for `node`.
    ///
    /// The subscriber is invoked synchronously with [`ChangeType::Initial`] before this returns:
    /// with a freshly measured rectangle for a newly observed node, or with the last reported
    /// rectangle when the node already has subscribers.
    #[tracing::instrument(skip(self, host, subscriber, options))]
    pub fn observe<H: LayoutHost + DisplayEnv + ?Sized>(
        &mut self,
        host: &H,
        node: NodeId,
        mut subscriber: Subscriber,
        options: ObserveOptions,
    ) -> RectSwapResult<ObservationHandle> {
        let BackendState::Ready(backend) = &mut self.backend else {
            return Err(RectSwapError::not_initialized(format!(
                "native watch is {:?}",
                self.status()
            )));
        };
        if !subscriber.is_alive() {
            return Err(RectSwapError::invalid_callback(
                "listener was dropped before registration",
            ));
        }

        let id = SubscriberId(self.next_subscriber);
        let now_ms = host.now_ms();

        if let Some(record) = self.records.get_mut(&node) {
            self.next_subscriber += 1;
            let change = RectChange {
                node,
                rect: record.last_rect,
                delta: RectDelta::default(),
                timestamp_ms: now_ms,
                device_pixel_ratio: self.viewport.dpr(),
                change_type: ChangeType::Initial,
                change_count: record.change_count,
                breakpoint: self.viewport.breakpoint().to_string(),
            };
            if let Some(err) = deliver_one(&mut subscriber, &change) {
                self.stats.subscriber_errors += 1;
                tracing::warn!(%node, subscriber = id.0, error = %format!("{err:#}"), "initial notification failed");
            }
            record.subscribers.insert(id, subscriber);
            return Ok(ObservationHandle {
                node,
                subscriber: id,
            });
        }

        if self.records.len() >= self.config.max_elements {
            return Err(RectSwapError::CapacityExceeded(self.config.max_elements));
        }
        if !host.is_attached(node) {
            return Err(RectSwapError::invalid_target(node, "node is not laid out"));
        }
        let Some(rect) = measure(host, node, &self.config, self.viewport.dpr()) else {
            return Err(RectSwapError::invalid_target(node, "node has no rectangle"));
        };
        backend
            .watch(node)
            .map_err(|e| RectSwapError::invalid_target(node, e.to_string()))?;
        self.next_subscriber += 1;

        let change = RectChange {
            node,
            rect,
            delta: RectDelta::default(),
            timestamp_ms: now_ms,
            device_pixel_ratio: self.viewport.dpr(),
            change_type: ChangeType::Initial,
            change_count: 0,
            breakpoint: self.viewport.breakpoint().to_string(),
        };
        if let Some(err) = deliver_one(&mut subscriber, &change) {
            self.stats.subscriber_errors += 1;
            tracing::warn!(%node, subscriber = id.0, error = %format!("{err:#}"), "initial notification failed");
        }

        let mut subscribers = BTreeMap::new();
        subscribers.insert(id, subscriber);
        self.records.insert(
            node,
            ObservationRecord {
                subscribers,
                last_rect: rect,
                change_count: 0,
                epsilon: options.epsilon.unwrap_or(self.config.epsilon),
                throttle_ms: options.throttle_ms.unwrap_or(self.config.throttle_ms),
                last_notified_ms: Some(now_ms),
            },
        );
        tracing::debug!(%node, "observing");
        Ok(ObservationHandle {
            node,
            subscriber: id,
        })
    }

    /// Remove one subscriber, or all of them when `subscriber` is `None`.
    ///
    /// The native watch and any pending work for the node are released once no subscriber is
    /// left. Returns `false` when there was nothing to remove.
    pub fn unobserve(&mut self, node: NodeId, subscriber: Option<SubscriberId>) -> bool {
        let Some(record) = self.records.get_mut(&node) else {
            return false;
        };
        if let Some(id) = subscriber {
            if record.subscribers.remove(&id).is_none() {
                return false;
            }
            if !record.subscribers.is_empty() {
                return true;
            }
        }
        self.release(node);
        true
    }

    fn release(&mut self, node: NodeId) {
        self.records.remove(&node);
        self.batcher.remove(node);
        if let BackendState::Ready(backend) = &mut self.backend {
            backend.unwatch(node);
        }
        tracing::debug!(%node, "released");
    }

    /// Synchronous, side-effect-free rectangle query.
    pub fn get_rect<H: LayoutHost + ?Sized>(&self, host: &H, node: NodeId) -> Option<SpaceRect> {
        measure(host, node, &self.config, self.viewport.dpr())
    }

    pub fn get_state(&self) -> &ViewportState {
        self.viewport.state()
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.records.contains_key(&node)
    }

    /// Whether work is pending and the host should schedule a display refresh.
    pub fn needs_frame(&self) -> bool {
        !self.batcher.is_empty() || matches!(self.backend, BackendState::Retrying { .. })
    }

    /// Stop queuing raw changes until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Raw change event from the native primitive for `node`.
    pub fn on_geometry_changed<H: LayoutHost + ?Sized>(&mut self, host: &H, node: NodeId) {
        if self.paused || !matches!(self.backend, BackendState::Ready(_)) {
            return;
        }
        self.check_node(host, node, false);
    }

    /// Window resize. Updates the breakpoint and re-checks every observed node; nodes are
    /// re-notified unconditionally when the breakpoint changed.
    pub fn on_viewport_resized<H: LayoutHost + ?Sized>(&mut self, host: &H, viewport: Size) {
        let breakpoint_changed = self.viewport.resize(viewport);
        if self.paused || !matches!(self.backend, BackendState::Ready(_)) {
            return;
        }
        let nodes: Vec<NodeId> = self.records.keys().copied().collect();
        for node in nodes {
            self.check_node(host, node, breakpoint_changed);
        }
    }

    /// Pixel-ratio change event (media query). Broadcast to every observed node as `Dpr`.
    pub fn on_dpr_changed<H: LayoutHost + ?Sized>(&mut self, host: &H, dpr: f64) {
        if !self.viewport.set_dpr(dpr) {
            return;
        }
        tracing::debug!(dpr, "device pixel ratio changed");
        if self.paused || !matches!(self.backend, BackendState::Ready(_)) {
            return;
        }
        let dpr = self.viewport.dpr();
        for (&node, record) in &self.records {
            let rect = measure(host, node, &self.config, dpr)
                .filter(|r| !r.is_degenerate())
                .unwrap_or(record.last_rect);
            self.batcher.queue(node, rect, ChangeType::Dpr, true);
        }
    }

    /// Re-measure `node` and notify its subscribers at the next flush even if the rectangle did
    /// not move, e.g. after a web font or image finished loading. Returns `false` for nodes
    /// that are not observed.
    pub fn invalidate<H: LayoutHost + ?Sized>(&mut self, host: &H, node: NodeId) -> bool {
        if !self.records.contains_key(&node) {
            return false;
        }
        if !self.paused && matches!(self.backend, BackendState::Ready(_)) {
            self.check_node(host, node, true);
        }
        true
    }

    /// [`invalidate`](Self::invalidate) every observed node.
    pub fn invalidate_all<H: LayoutHost + ?Sized>(&mut self, host: &H) {
        let nodes: Vec<NodeId> = self.records.keys().copied().collect();
        for node in nodes {
            self.invalidate(host, node);
        }
    }

    fn check_node<H: LayoutHost + ?Sized>(&mut self, host: &H, node: NodeId, force: bool) {
        let Some(record) = self.records.get(&node) else {
            return;
        };
        let Some(rect) = measure(host, node, &self.config, self.viewport.dpr()) else {
            tracing::debug!(%node, "change for unmeasurable node ignored");
            return;
        };
        if rect.is_degenerate() {
            tracing::warn!(%node, "zero-size rectangle skipped, keeping last good rectangle");
            return;
        }
        if force || self.batcher.contains(node) || rect.differs_from(record.last_rect, record.epsilon)
        {
            self.batcher.queue(node, rect, ChangeType::Resize, force);
        }
    }

    /// Display-refresh tick.
    ///
    /// Retries backend construction when due, polls the pixel ratio when the environment has no
    /// change events, then flushes pending changes: at most one flush per call, no closer than
    /// `throttle_ms` to the previous one, one notification per node. Returns the number of
    /// subscriber deliveries.
    #[tracing::instrument(skip(self, host), level = "trace")]
    pub fn tick<H: LayoutHost + DisplayEnv + ?Sized>(&mut self, host: &H, now_ms: f64) -> usize {
        self.retry_backend(now_ms);
        if !matches!(self.backend, BackendState::Ready(_)) {
            return 0;
        }

        if !host.supports_dpr_query() && self.viewport.poll_due(now_ms) {
            self.on_dpr_changed(host, host.device_pixel_ratio());
        }

        if self.batcher.is_empty() || !self.batcher.gate_open(now_ms, self.config.throttle_ms) {
            return 0;
        }
        self.flush(now_ms)
    }

    // Pending changes are taken one node at a time, so a subscriber that panics only loses the
    // change being delivered; later nodes stay queued for the next tick.
    fn flush(&mut self, now_ms: f64) -> usize {
        let started = Instant::now();
        let dpr = self.viewport.dpr();
        let breakpoint = self.viewport.breakpoint().to_string();
        let mut delivered = 0usize;
        let mut emptied = Vec::new();
        self.stats.flushes += 1;

        for node in self.batcher.nodes() {
            let Some(pending) = self.batcher.take(node) else {
                continue;
            };
            let Some(record) = self.records.get_mut(&node) else {
                continue;
            };
            if let Some(last) = record.last_notified_ms
                && now_ms - last < record.throttle_ms
            {
                self.batcher.requeue(node, pending);
                continue;
            }
            if !pending.forced && !pending.rect.differs_from(record.last_rect, record.epsilon) {
                continue;
            }

            record.change_count += 1;
            let change = RectChange {
                node,
                rect: pending.rect,
                delta: pending.rect.delta_from(record.last_rect),
                timestamp_ms: now_ms,
                device_pixel_ratio: dpr,
                change_type: pending.kind,
                change_count: record.change_count,
                breakpoint: breakpoint.clone(),
            };
            record.last_rect = pending.rect;
            record.last_notified_ms = Some(now_ms);

            let mut dead = Vec::new();
            for (&id, subscriber) in &mut record.subscribers {
                match subscriber.deliver(&change) {
                    Delivery::Delivered => {
                        delivered += 1;
                        self.stats.notifications += 1;
                    }
                    Delivery::Failed(err) => {
                        self.stats.subscriber_errors += 1;
                        tracing::warn!(%node, subscriber = id.0, error = %format!("{err:#}"), "subscriber failed");
                    }
                    Delivery::Dead => dead.push(id),
                }
            }
            for id in dead {
                record.subscribers.remove(&id);
            }
            if record.subscribers.is_empty() {
                emptied.push(node);
            }
        }

        for node in emptied {
            self.release(node);
        }

        self.batcher.mark_flushed(now_ms);
        let elapsed_us = started.elapsed().as_secs_f64() * 1e6;
        self.stats.total_flush_us += elapsed_us;
        self.stats.max_flush_us = self.stats.max_flush_us.max(elapsed_us);
        delivered
    }

    fn retry_backend(&mut self, now_ms: f64) {
        let BackendState::Retrying {
            factory,
            failed_attempts,
            next_at_ms,
        } = &mut self.backend
        else {
            return;
        };
        if now_ms < *next_at_ms {
            return;
        }
        match factory() {
            Ok(b) => {
                tracing::debug!(attempts = *failed_attempts + 1, "native watch constructed");
                self.backend = BackendState::Ready(b);
            }
            Err(err) => {
                *failed_attempts += 1;
                if *failed_attempts > self.config.init_retry_limit {
                    tracing::error!(error = %err, attempts = *failed_attempts, "native watch unavailable, giving up");
                    self.backend = BackendState::Failed;
                } else {
                    let backoff =
                        self.config.init_backoff_ms * 2f64.powi(*failed_attempts as i32 - 1);
                    *next_at_ms = now_ms + backoff;
                    tracing::warn!(error = %err, attempts = *failed_attempts, backoff_ms = backoff, "native watch unavailable, retrying");
                }
            }
        }
    }

    /// Disconnect the native watch, drop every record and pending change. Idempotent; the
    /// observer is [`ObserverStatus::Closed`] afterwards.
    pub fn cleanup(&mut self) {
        if let BackendState::Ready(backend) = &mut self.backend {
            backend.disconnect();
        }
        if !matches!(self.backend, BackendState::Closed) {
            tracing::debug!(records = self.records.len(), "observer cleaned up");
        }
        self.backend = BackendState::Closed;
        self.records.clear();
        self.batcher.clear();
    }

    pub fn diagnostics(&self) -> ObserverDiagnostics {
        let active_watches = match &self.backend {
            BackendState::Ready(b) => b.active_watches(),
            _ => 0,
        };
        ObserverDiagnostics {
            status: self.status(),
            observed_nodes: self.records.len(),
            subscribers: self.records.values().map(|r| r.subscribers.len()).sum(),
            pending: self.batcher.len(),
            active_watches,
            paused: self.paused,
            flushes: self.stats.flushes,
            notifications: self.stats.notifications,
            coalesced_events: self.batcher.coalesced(),
            subscriber_errors: self.stats.subscriber_errors,
            avg_flush_us: if self.stats.flushes == 0 {
                0.0
            } else {
                self.stats.total_flush_us / self.stats.flushes as f64
            },
            max_flush_us: self.stats.max_flush_us,
        }
    }
}

impl Drop for RectObserver {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn measure<H: LayoutHost + ?Sized>(
    host: &H,
    node: NodeId,
    config: &ObserverConfig,
    dpr: f64,
) -> Option<SpaceRect> {
    let rect = SpaceRect::from_kurbo(host.rect(node)?, Space::ViewportAbsolute);
    Some(if config.snap_to_device_pixels {
        rect.snap_to_device_pixels(dpr)
    } else {
        rect
    })
}

fn deliver_one(subscriber: &mut Subscriber, change: &RectChange) -> Option<anyhow::Error> {
    match subscriber.deliver(change) {
        Delivery::Failed(err) => Some(err),
        Delivery::Delivered | Delivery::Dead => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/observe/observer.rs"]
mod tests;
