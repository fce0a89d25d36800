use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::foundation::core::Rect;
use crate::observe::RectListener;
use crate::placement::{AbsoluteForm, Placement};
use crate::scene::{ManualWatch, Scene};

fn setup() -> (Scene, NodeId, NodeId) {
    let mut scene = Scene::new(Size::new(1280.0, 720.0));
    let root = scene.add_root(Rect::new(0.0, 0.0, 1000.0, 500.0));
    let child = scene
        .add_child(root, abs(100.0, 50.0, 200.0, 100.0))
        .unwrap();
    (scene, root, child)
}

fn abs(x: f64, y: f64, w: f64, h: f64) -> Placement {
    Placement::Absolute(AbsoluteForm::new(Rect::new(x, y, x + w, y + h)))
}

fn recorder() -> (Rc<RefCell<Vec<RectChange>>>, Subscriber) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let sub = Subscriber::callback(move |c| {
        sink.borrow_mut().push(c.clone());
        Ok(())
    });
    (log, sub)
}

fn observer(scene: &Scene, watch: &ManualWatch) -> RectObserver {
    RectObserver::new(ObserverConfig::default(), watch.factory(), scene).unwrap()
}

#[test]
fn observe_delivers_initial_synchronously() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();

    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].change_type, ChangeType::Initial);
    assert_eq!(log[0].change_count, 0);
    assert_eq!(log[0].rect, SpaceRect::viewport(100.0, 50.0, 200.0, 100.0));
    assert_eq!(log[0].breakpoint, "large");
    assert_eq!(watch.watched(), vec![child]);
}

#[test]
fn fifty_raw_changes_in_one_frame_yield_one_notification() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    for i in 1..=50 {
        scene
            .set_placement(child, abs(100.0 + f64::from(i), 50.0, 200.0, 100.0))
            .unwrap();
        obs.on_geometry_changed(&scene, child);
    }
    assert!(obs.needs_frame());
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].change_type, ChangeType::Resize);
    assert_eq!(log[1].rect.x, 150.0);
    assert_eq!(log[1].delta.x, 50.0);
    assert_eq!(log[1].change_count, 1);
    assert_eq!(obs.diagnostics().coalesced_events, 49);
}

#[test]
fn changes_within_epsilon_are_not_reported() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    scene
        .set_placement(child, abs(100.5, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 0);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn per_node_throttle_defers_until_interval_elapsed() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    let options = ObserveOptions {
        epsilon: None,
        throttle_ms: Some(100.0),
    };
    obs.observe(&scene, child, sub, options).unwrap();

    scene
        .set_placement(child, abs(120.0, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 0);
    assert!(obs.needs_frame());

    scene.advance_ms(100.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn dpr_change_is_broadcast_without_geometry_change() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    scene.set_device_pixel_ratio(2.0);
    obs.on_dpr_changed(&scene, 2.0);
    scene.advance_ms(16.0);
    obs.tick(&scene, scene.now_ms());

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].change_type, ChangeType::Dpr);
    assert_eq!(log[1].device_pixel_ratio, 2.0);
    assert_eq!(obs.get_state().device_pixel_ratio, 2.0);
}

#[test]
fn dpr_is_polled_when_environment_has_no_query() {
    let (scene, _, child) = setup();
    let mut scene = scene.without_dpr_query();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    scene.set_device_pixel_ratio(1.5);
    scene.advance_ms(16.0);
    // The poll queues the change; the flush runs in the same tick.
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    assert_eq!(log.borrow()[1].change_type, ChangeType::Dpr);
}

#[test]
fn breakpoint_change_forces_notification() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    obs.on_viewport_resized(&scene, Size::new(800.0, 600.0));
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    let log = log.borrow();
    assert_eq!(log[1].breakpoint, "tablet");
    assert_eq!(log[1].delta, RectDelta::default());
}

#[test]
fn later_subscriber_gets_initial_with_last_rect() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (_, first) = recorder();
    let (log, second) = recorder();
    let a = obs
        .observe(&scene, child, first, ObserveOptions::default())
        .unwrap();
    let b = obs
        .observe(&scene, child, second, ObserveOptions::default())
        .unwrap();

    assert_ne!(a.subscriber, b.subscriber);
    assert_eq!(log.borrow()[0].change_type, ChangeType::Initial);
    assert_eq!(obs.diagnostics().subscribers, 2);

    assert!(obs.unobserve(child, Some(a.subscriber)));
    assert!(obs.is_observed(child));
    assert!(obs.unobserve(child, Some(b.subscriber)));
    assert!(!obs.is_observed(child));
    assert!(watch.watched().is_empty());
    assert!(!obs.unobserve(child, None));
}

#[test]
fn failing_subscriber_does_not_block_others() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let failing = Subscriber::callback(|c| {
        if c.change_type == ChangeType::Resize {
            anyhow::bail!("panel gone");
        }
        Ok(())
    });
    obs.observe(&scene, child, failing, ObserveOptions::default())
        .unwrap();
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    scene
        .set_placement(child, abs(150.0, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(obs.diagnostics().subscriber_errors, 1);
}

struct Panel {
    seen: usize,
}

impl RectListener for Panel {
    fn on_rect_change(&mut self, _change: &RectChange) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
}

#[test]
fn dropped_listener_is_pruned_and_watch_released() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let panel = Rc::new(RefCell::new(Panel { seen: 0 }));
    obs.observe(
        &scene,
        child,
        Subscriber::listener(&panel),
        ObserveOptions::default(),
    )
    .unwrap();
    assert_eq!(panel.borrow().seen, 1);

    drop(panel);
    scene
        .set_placement(child, abs(150.0, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 0);
    assert!(!obs.is_observed(child));
    assert!(watch.watched().is_empty());
}

#[test]
fn dead_listener_is_an_invalid_callback() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let panel = Rc::new(RefCell::new(Panel { seen: 0 }));
    let sub = Subscriber::listener(&panel);
    drop(panel);
    let err = obs
        .observe(&scene, child, sub, ObserveOptions::default())
        .unwrap_err();
    assert!(matches!(err, RectSwapError::InvalidCallback(_)));
}

#[test]
fn detached_or_refused_targets_are_invalid() {
    let (mut scene, root, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);

    watch.refuse(root);
    let (_, sub) = recorder();
    let err = obs
        .observe(&scene, root, sub, ObserveOptions::default())
        .unwrap_err();
    assert!(matches!(err, RectSwapError::InvalidTarget { .. }));

    scene.detach(child);
    let (_, sub) = recorder();
    let err = obs
        .observe(&scene, child, sub, ObserveOptions::default())
        .unwrap_err();
    assert!(matches!(err, RectSwapError::InvalidTarget { .. }));
    assert!(obs.get_rect(&scene, child).is_none());
}

#[test]
fn capacity_is_bounded() {
    let (mut scene, root, child) = setup();
    let watch = ManualWatch::new();
    let config = ObserverConfig {
        max_elements: 1,
        ..ObserverConfig::default()
    };
    let mut obs = RectObserver::new(config, watch.factory(), &scene).unwrap();
    let other = scene
        .add_child(root, abs(0.0, 0.0, 50.0, 50.0))
        .unwrap();
    let (_, a) = recorder();
    let (_, b) = recorder();
    obs.observe(&scene, child, a, ObserveOptions::default())
        .unwrap();
    let err = obs
        .observe(&scene, other, b, ObserveOptions::default())
        .unwrap_err();
    assert!(matches!(err, RectSwapError::CapacityExceeded(1)));
}

#[test]
fn zero_size_rect_keeps_last_good_rect() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    scene
        .set_placement(child, abs(100.0, 50.0, 0.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    assert!(!obs.needs_frame());
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 0);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn paused_observer_ignores_raw_changes() {
    let (mut scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    obs.pause();
    scene
        .set_placement(child, abs(150.0, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, child);
    assert!(!obs.needs_frame());

    obs.resume();
    obs.on_geometry_changed(&scene, child);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn init_retries_with_backoff_then_succeeds() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::failing(2);
    let mut obs = observer(&scene, &watch);
    assert_eq!(
        obs.status(),
        ObserverStatus::Retrying { failed_attempts: 1 }
    );
    let (_, sub) = recorder();
    let err = obs
        .observe(&scene, child, sub, ObserveOptions::default())
        .unwrap_err();
    assert!(matches!(err, RectSwapError::NotInitialized(_)));

    obs.tick(&scene, 49.0);
    assert_eq!(watch.constructions(), 1);
    obs.tick(&scene, 50.0);
    assert_eq!(
        obs.status(),
        ObserverStatus::Retrying { failed_attempts: 2 }
    );
    obs.tick(&scene, 149.0);
    assert_eq!(watch.constructions(), 2);
    obs.tick(&scene, 150.0);
    assert_eq!(obs.status(), ObserverStatus::Ready);
    assert_eq!(watch.constructions(), 3);
}

#[test]
fn init_gives_up_after_retry_limit() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::failing(u32::MAX);
    let mut obs = observer(&scene, &watch);
    for t in [50.0, 150.0, 350.0, 10_000.0] {
        obs.tick(&scene, t);
    }
    assert_eq!(obs.status(), ObserverStatus::Failed);
    assert_eq!(watch.constructions(), 4);
    assert!(!obs.needs_frame());

    let (_, sub) = recorder();
    let err = obs
        .observe(&scene, child, sub, ObserveOptions::default())
        .unwrap_err();
    assert!(err.to_string().starts_with("observer not initialized:"));
}

#[test]
fn cleanup_is_idempotent_and_releases_everything() {
    let (scene, _, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (_, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    obs.cleanup();
    obs.cleanup();
    assert_eq!(watch.disconnects(), 1);
    assert!(watch.watched().is_empty());
    assert_eq!(obs.status(), ObserverStatus::Closed);
    assert_eq!(obs.diagnostics().observed_nodes, 0);

    let (_, sub) = recorder();
    assert!(
        obs.observe(&scene, child, sub, ObserveOptions::default())
            .is_err()
    );
    drop(obs);
    assert_eq!(watch.disconnects(), 1);
}

#[test]
fn snapping_rounds_to_device_pixels() {
    let mut scene = Scene::new(Size::new(1280.0, 720.0));
    let root = scene.add_root(Rect::new(0.0, 0.0, 1000.0, 500.0));
    let child = scene
        .add_child(root, abs(10.3, 10.6, 100.2, 50.0))
        .unwrap();
    scene.set_device_pixel_ratio(2.0);
    let watch = ManualWatch::new();
    let config = ObserverConfig {
        snap_to_device_pixels: true,
        ..ObserverConfig::default()
    };
    let obs = RectObserver::new(config, watch.factory(), &scene).unwrap();
    let r = obs.get_rect(&scene, child).unwrap();
    assert_eq!((r.x, r.y), (10.5, 10.5));
}

#[test]
fn panicking_subscriber_leaves_other_nodes_queued() {
    let (mut scene, root, first) = setup();
    let second = scene
        .add_child(root, abs(400.0, 50.0, 200.0, 100.0))
        .unwrap();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let panicking = Subscriber::callback(|c| {
        if c.change_type == ChangeType::Resize {
            panic!("listener bug");
        }
        Ok(())
    });
    obs.observe(&scene, first, panicking, ObserveOptions::default())
        .unwrap();
    let (log, sub) = recorder();
    obs.observe(&scene, second, sub, ObserveOptions::default())
        .unwrap();

    scene
        .set_placement(first, abs(120.0, 50.0, 200.0, 100.0))
        .unwrap();
    scene
        .set_placement(second, abs(420.0, 50.0, 200.0, 100.0))
        .unwrap();
    obs.on_geometry_changed(&scene, first);
    obs.on_geometry_changed(&scene, second);
    scene.advance_ms(16.0);
    let now = scene.now_ms();
    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| obs.tick(&scene, now)));
    assert!(unwound.is_err());
    assert_eq!(log.borrow().len(), 1);
    assert!(obs.needs_frame());

    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].rect.x, 420.0);
    assert_eq!(obs.diagnostics().flushes, 2);
}

#[test]
fn invalidate_renotifies_without_movement() {
    let (mut scene, root, child) = setup();
    let watch = ManualWatch::new();
    let mut obs = observer(&scene, &watch);
    let (log, sub) = recorder();
    obs.observe(&scene, child, sub, ObserveOptions::default())
        .unwrap();

    assert!(!obs.invalidate(&scene, root));
    assert!(obs.invalidate(&scene, child));
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);

    obs.invalidate_all(&scene);
    scene.advance_ms(16.0);
    assert_eq!(obs.tick(&scene, scene.now_ms()), 1);

    let log = log.borrow();
    assert_eq!(log.len(), 3);
    assert_eq!(log[1].rect, log[0].rect);
    assert_eq!(log[1].delta, RectDelta::default());
    assert_eq!(log[2].change_count, 2);
}
