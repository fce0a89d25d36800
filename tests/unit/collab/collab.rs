use super::*;

fn request(kind: AnchorKind, target: AnchorTarget) -> AnchorRequest {
    AnchorRequest {
        kind,
        target,
        logical_size: Size::new(200.0, 100.0),
    }
}

#[test]
fn box_anchors_resolve_alignments() {
    let r = BoxAnchors;
    assert_eq!(
        r.resolve(&request(AnchorKind::Element, AnchorTarget::Align(Align::TopRight))),
        Point::new(200.0, 0.0)
    );
    assert_eq!(
        r.resolve(&request(AnchorKind::TextEnd, AnchorTarget::Align(Align::Center))),
        Point::new(200.0, 50.0)
    );
    let p = Point::new(3.0, 4.0);
    assert_eq!(
        r.resolve(&request(AnchorKind::TextStart, AnchorTarget::Explicit(p))),
        p
    );
}

#[test]
fn closures_are_resolvers() {
    let centered = |req: &AnchorRequest| {
        Point::new(req.logical_size.width / 2.0, req.logical_size.height / 2.0)
    };
    assert_eq!(
        centered.resolve(&request(AnchorKind::Element, AnchorTarget::Align(Align::Top))),
        Point::new(100.0, 50.0)
    );
}

#[test]
fn reference_scale_modes() {
    let s = ReferenceScale {
        reference: Size::new(100.0, 100.0),
    };
    let rect = SpaceRect::viewport(0.0, 0.0, 250.0, 150.0);
    assert_eq!(s.scale_factor(&rect, ScaleMode::FixedSize), 1.0);
    assert_eq!(s.scale_factor(&rect, ScaleMode::ElementLinked), 2.5);
    assert_eq!(s.scale_factor(&rect, ScaleMode::Container), 1.5);
    assert_eq!(
        s.scale_factor(&rect, ScaleMode::Typography { base_size: 50.0 }),
        3.0
    );
}

#[test]
fn typography_requires_positive_base() {
    assert!(ScaleMode::Typography { base_size: 16.0 }.validate().is_ok());
    let err = ScaleMode::Typography { base_size: 0.0 }
        .validate()
        .unwrap_err();
    assert!(err.to_string().starts_with("config error:"));
    let binding = Binding {
        anchor: None,
        scale: Some(ScaleMode::Typography { base_size: -1.0 }),
    };
    assert!(binding.validate().is_err());
}
