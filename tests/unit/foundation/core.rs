use super::*;

#[test]
fn negative_extents_are_normalized() {
    let r = SpaceRect::viewport(100.0, 50.0, -40.0, -10.0);
    assert_eq!(r.x, 60.0);
    assert_eq!(r.y, 40.0);
    assert_eq!(r.width, 40.0);
    assert_eq!(r.height, 10.0);
}

#[test]
fn kurbo_conversion_keeps_space_and_extent() {
    let r = SpaceRect::viewport(10.0, 20.0, 30.0, 40.0);
    let k = r.to_kurbo();
    assert_eq!(k, Rect::new(10.0, 20.0, 40.0, 60.0));
    assert_eq!(SpaceRect::from_kurbo(k, Space::ViewportAbsolute), r);
}

#[test]
fn epsilon_comparison_is_strict() {
    let a = SpaceRect::viewport(0.0, 0.0, 10.0, 10.0);
    let b = SpaceRect::viewport(0.5, 0.0, 10.0, 10.0);
    assert!(!b.differs_from(a, 0.5));
    let c = SpaceRect::viewport(0.0, 0.0, 10.0, 10.6);
    assert!(c.differs_from(a, 0.5));
}

#[test]
fn device_pixel_snapping_uses_the_dpr_grid() {
    let r = SpaceRect::viewport(10.3, 10.26, 20.2, 5.0).snap_to_device_pixels(2.0);
    assert_eq!(r.x, 10.5);
    assert_eq!(r.y, 10.5);
    assert_eq!(r.width, 20.0);
    assert_eq!(r.height, 5.0);

    let untouched = SpaceRect::viewport(1.3, 0.0, 1.0, 1.0).snap_to_device_pixels(0.0);
    assert_eq!(untouched.x, 1.3);
}

#[test]
fn node_id_display() {
    assert_eq!(NodeId(7).to_string(), "node#7");
}
