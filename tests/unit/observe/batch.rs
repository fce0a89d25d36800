use super::*;

fn rect(x: f64) -> SpaceRect {
    SpaceRect::viewport(x, 0.0, 10.0, 10.0)
}

#[test]
fn latest_rect_wins_and_merges_are_counted() {
    let mut b = FrameBatcher::default();
    for i in 0..50 {
        b.queue(NodeId(1), rect(f64::from(i)), ChangeType::Resize, false);
    }
    assert_eq!(b.len(), 1);
    assert_eq!(b.coalesced(), 49);
    assert_eq!(b.nodes(), vec![NodeId(1)]);
    assert_eq!(b.take(NodeId(1)).unwrap().rect.x, 49.0);
    assert!(b.take(NodeId(1)).is_none());
    assert!(b.is_empty());
}

#[test]
fn dpr_kind_and_forced_flag_are_sticky() {
    let mut b = FrameBatcher::default();
    b.queue(NodeId(1), rect(0.0), ChangeType::Dpr, true);
    b.queue(NodeId(1), rect(1.0), ChangeType::Resize, false);
    let p = b.take(NodeId(1)).unwrap();
    assert_eq!(p.kind, ChangeType::Dpr);
    assert!(p.forced);
    assert_eq!(p.rect.x, 1.0);
}

#[test]
fn gate_enforces_minimum_interval() {
    let mut b = FrameBatcher::default();
    assert!(b.gate_open(0.0, 8.0));
    b.mark_flushed(100.0);
    assert!(!b.gate_open(104.0, 8.0));
    assert!(b.gate_open(108.0, 8.0));
}

#[test]
fn requeue_does_not_clobber_newer_changes() {
    let mut b = FrameBatcher::default();
    let old = PendingChange {
        rect: rect(1.0),
        kind: ChangeType::Resize,
        forced: false,
    };
    b.queue(NodeId(2), rect(5.0), ChangeType::Resize, false);
    b.requeue(NodeId(2), old);
    assert_eq!(b.take(NodeId(2)).unwrap().rect.x, 5.0);
}
