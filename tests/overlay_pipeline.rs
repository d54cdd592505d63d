use trailviz::{
    BadgeRenderer, BadgeStyle, Canvas, Ease, FrameRgba, LayerOpacities, OverlayScene, TrackSet,
    TrailJob, TrailRenderer, Tween, Visibility, render_overlay_frame, track_hues,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn canvas() -> Canvas {
    Canvas::new(96, 96).unwrap()
}

fn solid(rgba: [u8; 4]) -> FrameRgba {
    FrameRgba::solid(canvas(), rgba)
}

fn badge_sprites(colors: &[trailviz::Rgba]) -> Vec<FrameRgba> {
    let mut renderer = BadgeRenderer::new();
    colors
        .iter()
        .map(|&color| {
            renderer
                .render_badge(
                    &BadgeStyle {
                        fill: color,
                        diameter: 12.0,
                        padding: 4.0,
                        ..BadgeStyle::default()
                    },
                    "",
                    &[],
                )
                .unwrap()
        })
        .collect()
}

fn two_point_scene() -> OverlayScene {
    let source = TrackSet::from_rows(&[
        vec![[20.0, 30.0], [20.0, 70.0]],
        vec![[20.0, 30.0], [20.0, 70.0]],
    ])
    .unwrap();
    let target = TrackSet::from_rows(&[
        vec![[70.0, 30.0], [20.0, 70.0]],
        vec![[70.0, 30.0], [20.0, 70.0]],
    ])
    .unwrap();
    let colors = track_hues(2);
    let badges = badge_sprites(&colors);

    OverlayScene {
        canvas: canvas(),
        source_visible: Visibility::all(2, 2),
        target_visible: Visibility::all(2, 2),
        source_tracks: source,
        target_tracks: target,
        badges,
        colors,
        badge_radius: 8.0,
        trail_length: 1,
    }
}

#[test]
fn badge_lands_on_blended_position() {
    init_tracing();
    let scene = two_point_scene();
    let bg = solid([0, 0, 0, 255]);

    let opacities = LayerOpacities {
        source_trails: 0.0,
        target_trails: 0.0,
        blended_trails: 0.0,
        badges: 1.0,
        arrows: 0.0,
    };

    // Halfway blend: badge of the moving track sits at x = 45.
    let out = render_overlay_frame(&scene, &bg, &bg, 0, 0.5, &opacities).unwrap();
    let px = out.pixel(45, 30);
    assert!(px[0] > 0 || px[1] > 0 || px[2] > 0, "badge missing: {px:?}");

    // Neither endpoint position carries the badge anymore.
    assert_eq!(out.pixel(20, 45), [0, 0, 0, 255]);
}

#[test]
fn stationary_pair_gets_no_arrow() {
    let scene = two_point_scene();
    let bg = solid([0, 0, 0, 255]);

    let opacities = LayerOpacities {
        source_trails: 0.0,
        target_trails: 0.0,
        blended_trails: 0.0,
        badges: 0.0,
        arrows: 1.0,
    };
    let out = render_overlay_frame(&scene, &bg, &bg, 0, 1.0, &opacities).unwrap();

    // Moving track (y = 30): arrow shaft appears between source and target.
    let shaft = out.pixel(40, 30);
    assert!(shaft[0] > 0 || shaft[1] > 0 || shaft[2] > 0);

    // Stationary track (y = 70): no arrow anywhere near it.
    for x in [10u32, 20, 30] {
        assert_eq!(out.pixel(x, 70), [0, 0, 0, 255]);
    }
}

#[test]
fn tweened_blend_slides_the_badge_between_endpoints() {
    let scene = two_point_scene();
    let bg = solid([0, 0, 0, 255]);
    let opacities = LayerOpacities {
        source_trails: 0.0,
        target_trails: 0.0,
        blended_trails: 0.0,
        badges: 1.0,
        arrows: 0.0,
    };

    // An eased blend ramp over the two frames, the way annotation videos
    // slide from the source motion to the edited one.
    let blend = Tween {
        from: 0.0,
        to: 1.0,
        ease: Ease::InOutQuad,
    };

    let start = render_overlay_frame(&scene, &bg, &bg, 0, blend.sample(0.0), &opacities).unwrap();
    let end = render_overlay_frame(&scene, &bg, &bg, 1, blend.sample(1.0), &opacities).unwrap();

    // Badge starts on the source position and ends on the target position.
    let px = start.pixel(20, 30);
    assert!(px[0] > 0 || px[1] > 0 || px[2] > 0);
    assert_eq!(start.pixel(70, 30), [0, 0, 0, 255]);
    let px = end.pixel(70, 30);
    assert!(px[0] > 0 || px[1] > 0 || px[2] > 0);
}

#[test]
fn overlay_requires_matching_backgrounds() {
    let scene = two_point_scene();
    let small = FrameRgba::solid(Canvas::new(8, 8).unwrap(), [0, 0, 0, 255]);
    let bg = solid([0, 0, 0, 255]);
    assert!(
        render_overlay_frame(&scene, &small, &bg, 0, 0.5, &LayerOpacities::default()).is_err()
    );
}

#[test]
fn job_json_drives_the_renderer_end_to_end() {
    let json = r#"{
        "canvas": {"width": 64, "height": 64},
        "fps": {"num": 24, "den": 1},
        "tracks": [[[12.0, 40.0]], [[24.0, 40.0]], [[36.0, 40.0]]],
        "visible": [[true], [true], [true]],
        "style": {"color": "#00ff00", "trail_length": 2, "dot_radius": 3.0}
    }"#;

    let job: TrailJob = serde_json::from_str(json).unwrap();
    job.validate().unwrap();

    let tracks = job.track_set().unwrap();
    let visible = job.visibility().unwrap();
    let style = job.style.resolve().unwrap();

    let frames = TrailRenderer::new(job.canvas, style)
        .render(&tracks, visible.as_ref(), None)
        .unwrap();

    assert_eq!(frames.len(), 3);
    // Head dot of the last frame is green.
    let px = frames[2].pixel(36, 40);
    assert!(px[1] > 200 && px[0] == 0);
}
