use crate::arrow::{ArrowStyle, draw_arrow};
use crate::color::Rgba;
use crate::composite::{blend_linear_light, stamp_centered};
use crate::effects::{DropShadow, with_drop_shadow};
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::surface::DrawSurface;
use crate::tracks::{TrackSet, Visibility};
use crate::trail::{TrailRenderer, TrailStyle};

/// Evenly spread pastel hues for N tracks (half saturation, full value).
pub fn track_hues(n: usize) -> Vec<Rgba> {
    (0..n)
        .map(|i| Rgba::from_hsv(i as f64 / n.max(1) as f64, 0.5, 1.0))
        .collect()
}

/// Per-layer opacities of the composite; 0 drops a layer entirely.
#[derive(Clone, Copy, Debug)]
pub struct LayerOpacities {
    pub source_trails: f32,
    pub target_trails: f32,
    pub blended_trails: f32,
    pub badges: f32,
    pub arrows: f32,
}

impl Default for LayerOpacities {
    fn default() -> Self {
        Self {
            source_trails: 1.0,
            target_trails: 1.0,
            blended_trails: 1.0,
            badges: 1.0,
            arrows: 1.0,
        }
    }
}

/// Everything needed to annotate one edited-video comparison: the source and
/// target motions, per-track badge sprites, and shared style knobs.
pub struct OverlayScene {
    pub canvas: Canvas,
    pub source_tracks: TrackSet,
    pub source_visible: Visibility,
    pub target_tracks: TrackSet,
    pub target_visible: Visibility,
    /// One sprite per track, stamped centered on the track position.
    pub badges: Vec<FrameRgba>,
    /// One color per track, shared by trails and arrows.
    pub colors: Vec<Rgba>,
    /// Arrows stop this far short of the target badge; pairs closer than
    /// twice this radius get no arrow at all.
    pub badge_radius: f64,
    pub trail_length: usize,
}

impl OverlayScene {
    pub fn validate(&self) -> TrailvizResult<()> {
        let (frames, points) = (self.source_tracks.frames(), self.source_tracks.points());
        if self.target_tracks.frames() != frames || self.target_tracks.points() != points {
            return Err(TrailvizError::validation(
                "source and target track sets must have the same shape",
            ));
        }
        self.source_visible.expect_shape(frames, points)?;
        self.target_visible.expect_shape(frames, points)?;
        if self.badges.len() != points {
            return Err(TrailvizError::validation(format!(
                "expected one badge sprite per track ({points}), got {}",
                self.badges.len()
            )));
        }
        if self.colors.len() != points {
            return Err(TrailvizError::validation(format!(
                "expected one color per track ({points}), got {}",
                self.colors.len()
            )));
        }
        Ok(())
    }
}

/// Composite one annotated frame.
///
/// Layer order is fixed: the source/target video mix, then target, blended
/// and source trails, then badges, then arrows. Trail and arrow layers get a
/// black drop shadow before blending; all blending happens in linear light.
/// `track_blend` slides the annotation from the source motion (0.0) to the
/// target motion (1.0), and the background mix follows it.
#[tracing::instrument(skip(scene, source_frame, target_frame))]
pub fn render_overlay_frame(
    scene: &OverlayScene,
    source_frame: &FrameRgba,
    target_frame: &FrameRgba,
    frame: usize,
    track_blend: f64,
    opacities: &LayerOpacities,
) -> TrailvizResult<FrameRgba> {
    scene.validate()?;
    source_frame.expect_size(scene.canvas)?;
    target_frame.expect_size(scene.canvas)?;
    if frame >= scene.source_tracks.frames() {
        return Err(TrailvizError::validation(format!(
            "frame {frame} out of range ({} frames)",
            scene.source_tracks.frames()
        )));
    }

    let track_blend = track_blend.clamp(0.0, 1.0);
    let blended_tracks =
        TrackSet::lerp(&scene.source_tracks, &scene.target_tracks, track_blend)?;
    let both_visible = Visibility::intersect(&scene.source_visible, &scene.target_visible)?;

    // Background: source video showing through in proportion to how far the
    // annotation still sits at the source motion.
    let mut out = blend_linear_light(target_frame, source_frame, 1.0 - track_blend as f32)?;

    let trail_shadow = DropShadow::soft(10, Rgba::BLACK);
    let trail_layers = [
        (&scene.target_tracks, &scene.target_visible, opacities.target_trails),
        (&blended_tracks, &scene.source_visible, opacities.blended_trails),
        (&scene.source_tracks, &scene.source_visible, opacities.source_trails),
    ];
    for (tracks, visible, opacity) in trail_layers {
        if opacity <= 0.0 {
            continue;
        }
        let layer = trails_layer(scene, tracks, visible, frame)?;
        let layer = with_drop_shadow(&layer, &trail_shadow)?;
        out = blend_linear_light(&out, &layer, opacity)?;
    }

    if opacities.badges > 0.0 {
        let layer = badges_layer(scene, &blended_tracks, &both_visible, frame)?;
        out = blend_linear_light(&out, &layer, opacities.badges)?;
    }

    if opacities.arrows > 0.0 {
        let layer = arrows_layer(scene, &blended_tracks, frame)?;
        let layer = with_drop_shadow(&layer, &DropShadow::soft(20, Rgba::BLACK))?;
        out = blend_linear_light(&out, &layer, opacities.arrows)?;
    }

    Ok(out)
}

/// Per-track tapered trails, each track in its own color.
fn trails_layer(
    scene: &OverlayScene,
    tracks: &TrackSet,
    visible: &Visibility,
    frame: usize,
) -> TrailvizResult<FrameRgba> {
    let mut layer = FrameRgba::transparent(scene.canvas);
    for (i, &color) in scene.colors.iter().enumerate() {
        let single = single_track(tracks, i)?;
        let single_vis = single_visibility(visible, tracks.frames(), i)?;
        let renderer = TrailRenderer::new(
            scene.canvas,
            TrailStyle {
                color,
                trail_length: scene.trail_length,
                dot_radius: 0.0,
                trail_width: 4.0,
                ..TrailStyle::default()
            },
        );
        let track_layer = renderer.render_layer(&single, &single_vis, frame)?;
        crate::composite::over_premul_in_place(&mut layer.data, &track_layer.data)?;
    }
    Ok(layer)
}

fn badges_layer(
    scene: &OverlayScene,
    tracks: &TrackSet,
    visible: &Visibility,
    frame: usize,
) -> TrailvizResult<FrameRgba> {
    let mut layer = FrameRgba::transparent(scene.canvas);
    for i in 0..tracks.points() {
        if !visible.get(frame, i) {
            continue;
        }
        let pos = tracks.get(frame, i);
        stamp_centered(&mut layer, &scene.badges[i], pos.x, pos.y)?;
    }
    Ok(layer)
}

/// Arrows from the source position to the (blended) target position,
/// shortened so they stop at the badge rim.
fn arrows_layer(
    scene: &OverlayScene,
    blended_tracks: &TrackSet,
    frame: usize,
) -> TrailvizResult<FrameRgba> {
    let mut surface = DrawSurface::new(scene.canvas)?;
    for (i, &color) in scene.colors.iter().enumerate() {
        if !scene.source_visible.get(frame, i) || !scene.target_visible.get(frame, i) {
            continue;
        }
        let src = scene.source_tracks.get(frame, i);
        let dst = blended_tracks.get(frame, i);

        let delta = dst - src;
        let mag = delta.hypot();
        if mag <= 2.0 * scene.badge_radius {
            continue;
        }
        let dir = delta / mag;
        let dst = dst - dir * scene.badge_radius;

        let stroke = Rgba::rgba(color.r * 0.8, color.g * 0.8, color.b * 0.8, color.a);
        draw_arrow(
            &mut surface,
            src,
            dst,
            &ArrowStyle {
                fill: color,
                stroke,
                stroke_width: 1.0,
                ..ArrowStyle::default()
            },
        )?;
    }
    Ok(surface.into_frame())
}

fn single_track(tracks: &TrackSet, point: usize) -> TrailvizResult<TrackSet> {
    let xy = (0..tracks.frames()).map(|t| tracks.get(t, point)).collect();
    TrackSet::from_flat(tracks.frames(), 1, xy)
}

fn single_visibility(
    visible: &Visibility,
    frames: usize,
    point: usize,
) -> TrailvizResult<Visibility> {
    let rows: Vec<Vec<bool>> = (0..frames).map(|t| vec![visible.get(t, point)]).collect();
    Visibility::from_rows(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_scene() -> OverlayScene {
        let canvas = Canvas::new(64, 64).unwrap();
        let source = TrackSet::from_rows(&[vec![[10.0, 32.0]], vec![[10.0, 32.0]]]).unwrap();
        let target = TrackSet::from_rows(&[vec![[50.0, 32.0]], vec![[50.0, 32.0]]]).unwrap();
        let badge = FrameRgba::solid(Canvas::new(5, 5).unwrap(), [255, 0, 255, 255]);
        let mut badge = badge;
        badge.premultiplied = true;
        OverlayScene {
            canvas,
            source_visible: Visibility::all(2, 1),
            target_visible: Visibility::all(2, 1),
            source_tracks: source,
            target_tracks: target,
            badges: vec![badge],
            colors: track_hues(1),
            badge_radius: 6.0,
            trail_length: 1,
        }
    }

    fn bg(canvas: Canvas, rgba: [u8; 4]) -> FrameRgba {
        FrameRgba::solid(canvas, rgba)
    }

    #[test]
    fn validate_catches_badge_count_mismatch() {
        let mut scene = simple_scene();
        scene.badges.clear();
        assert!(scene.validate().is_err());
    }

    #[test]
    fn arrow_appears_between_separated_points() {
        let scene = simple_scene();
        let canvas = scene.canvas;
        let out = render_overlay_frame(
            &scene,
            &bg(canvas, [0, 0, 0, 255]),
            &bg(canvas, [0, 0, 0, 255]),
            0,
            1.0,
            &LayerOpacities::default(),
        )
        .unwrap();
        // Shaft midpoint between (10,32) and (50,32) is drawn over black.
        let px = out.pixel(30, 32);
        assert!(px[0] > 0 || px[1] > 0 || px[2] > 0);
    }

    #[test]
    fn close_points_get_no_arrow() {
        let mut scene = simple_scene();
        scene.target_tracks =
            TrackSet::from_rows(&[vec![[14.0, 32.0]], vec![[14.0, 32.0]]]).unwrap();
        let canvas = scene.canvas;
        let opacities = LayerOpacities {
            source_trails: 0.0,
            target_trails: 0.0,
            blended_trails: 0.0,
            badges: 0.0,
            arrows: 1.0,
        };
        let out = render_overlay_frame(
            &scene,
            &bg(canvas, [0, 0, 0, 255]),
            &bg(canvas, [0, 0, 0, 255]),
            0,
            1.0,
            &opacities,
        )
        .unwrap();
        // No layer contributed: frame stays black.
        assert!(out.data.chunks_exact(4).all(|px| px[0] == 0 && px[1] == 0));
    }

    #[test]
    fn track_blend_zero_keeps_source_background() {
        let scene = simple_scene();
        let canvas = scene.canvas;
        let source_bg = bg(canvas, [200, 10, 10, 255]);
        let target_bg = bg(canvas, [10, 200, 10, 255]);
        let opacities = LayerOpacities {
            source_trails: 0.0,
            target_trails: 0.0,
            blended_trails: 0.0,
            badges: 0.0,
            arrows: 0.0,
        };
        let out =
            render_overlay_frame(&scene, &source_bg, &target_bg, 0, 0.0, &opacities).unwrap();
        let got = out.pixel(5, 5);
        let want = source_bg.pixel(5, 5);
        for c in 0..3 {
            assert!((i16::from(got[c]) - i16::from(want[c])).abs() <= 1);
        }
    }

    #[test]
    fn out_of_range_frame_is_rejected() {
        let scene = simple_scene();
        let canvas = scene.canvas;
        let frame = bg(canvas, [0, 0, 0, 255]);
        assert!(
            render_overlay_frame(&scene, &frame, &frame, 9, 0.5, &LayerOpacities::default())
                .is_err()
        );
    }

    #[test]
    fn hues_are_distinct_and_sized() {
        let hues = track_hues(4);
        assert_eq!(hues.len(), 4);
        assert_ne!(hues[0], hues[2]);
    }
}
