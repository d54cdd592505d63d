use crate::color::Rgba;
use crate::composite::over_background;
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::lerp;
use crate::surface::DrawSurface;
use crate::tracks::{TrackSet, Visibility, trailing_visible_run};

/// Sub-segments interpolated between consecutive track points, so the taper
/// reads as smooth rather than blocky.
const TRAIL_SUBSTEPS: usize = 4;

/// Sub-segments dimmer than this are culled outright.
const MIN_SEGMENT_ALPHA: f64 = 0.02;

/// Style parameters for [`TrailRenderer`]; immutable per render call.
#[derive(Clone, Debug)]
pub struct TrailStyle {
    /// Trail and dot color. Trail alpha comes from the taper, not from here.
    pub color: Rgba,
    /// Historical frames shown in the trail; 0 means dots only.
    pub trail_length: usize,
    pub dot_radius: f64,
    pub trail_width: f64,
    pub rim_color: Rgba,
    pub rim_opacity: f64,
    pub rim_thickness: f64,
}

impl Default for TrailStyle {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            trail_length: 0,
            dot_radius: 4.0,
            trail_width: 4.0,
            rim_color: Rgba::WHITE,
            rim_opacity: 0.5,
            rim_thickness: 1.0,
        }
    }
}

/// Draws tracked points and their tapering motion trails, one RGBA layer per
/// frame, optionally composited over a background sequence.
///
/// Trails fade and thin from head to tail (`alpha = progress^1.5`,
/// `width = trail_width * progress`); the current position gets a solid dot
/// with a translucent rim. Points are drawn in index order.
pub struct TrailRenderer {
    canvas: Canvas,
    style: TrailStyle,
}

impl TrailRenderer {
    pub fn new(canvas: Canvas, style: TrailStyle) -> Self {
        Self { canvas, style }
    }

    pub fn style(&self) -> &TrailStyle {
        &self.style
    }

    /// Render every frame. With a background, each drawn layer is alpha-over
    /// composited onto the matching background frame; without one, the raw
    /// transparent layers are returned.
    #[tracing::instrument(skip(self, tracks, visible, background))]
    pub fn render(
        &self,
        tracks: &TrackSet,
        visible: Option<&Visibility>,
        background: Option<&[FrameRgba]>,
    ) -> TrailvizResult<Vec<FrameRgba>> {
        let owned_vis;
        let vis = match visible {
            Some(v) => {
                v.expect_shape(tracks.frames(), tracks.points())?;
                v
            }
            None => {
                owned_vis = Visibility::all(tracks.frames(), tracks.points());
                &owned_vis
            }
        };

        if let Some(bg) = background {
            if bg.len() != tracks.frames() {
                return Err(TrailvizError::validation(format!(
                    "background has {} frames, tracks have {}",
                    bg.len(),
                    tracks.frames()
                )));
            }
            for frame in bg {
                frame.expect_size(self.canvas)?;
            }
        }

        let mut out = Vec::with_capacity(tracks.frames());
        for t in 0..tracks.frames() {
            let layer = self.render_layer(tracks, vis, t)?;
            match background {
                Some(bg) => out.push(over_background(&bg[t], &layer)?),
                None => out.push(layer),
            }
        }
        Ok(out)
    }

    /// Render the transparent overlay layer for a single frame.
    pub fn render_layer(
        &self,
        tracks: &TrackSet,
        visible: &Visibility,
        frame: usize,
    ) -> TrailvizResult<FrameRgba> {
        let mut surface = DrawSurface::new(self.canvas)?;
        let style = &self.style;
        let rgb = style.color.to_rgb8();

        let window_start = if style.trail_length > 0 {
            frame.saturating_sub(style.trail_length)
        } else {
            frame
        };
        let window_len = frame - window_start + 1;

        for i in 0..tracks.points() {
            if style.trail_length > 0 && window_len >= 2 {
                let run = trailing_visible_run(
                    window_start,
                    frame,
                    |s| (tracks.get(s, i), 0.0),
                    |s| visible.get(s, i),
                );

                if run.len() >= 2 {
                    let denom = (run.len() - 1) as f64;
                    for idx in 0..run.len() - 1 {
                        let p1 = run[idx].pos;
                        let p2 = run[idx + 1].pos;

                        for sub in 0..TRAIL_SUBSTEPS {
                            let t0 = sub as f64 / TRAIL_SUBSTEPS as f64;
                            let t1 = (sub + 1) as f64 / TRAIL_SUBSTEPS as f64;
                            let t_mid = (t0 + t1) / 2.0;

                            let progress = (idx as f64 + t_mid) / denom;
                            let alpha = progress.powf(1.5);
                            let width = style.trail_width * progress;
                            if alpha < MIN_SEGMENT_ALPHA {
                                continue;
                            }

                            let a = kurbo::Point::new(lerp(p1.x, p2.x, t0), lerp(p1.y, p2.y, t0));
                            let b = kurbo::Point::new(lerp(p1.x, p2.x, t1), lerp(p1.y, p2.y, t1));
                            surface.stroke_segment(a, b, width, rgb, alpha);
                        }
                    }
                }
            }

            let pos = tracks.get(frame, i);
            if style.dot_radius > 0.0 && visible.get(frame, i) && self.canvas.contains(pos.x, pos.y)
            {
                surface.fill_circle(pos, style.dot_radius, style.color.with_alpha(1.0));
                surface.stroke_circle(
                    pos,
                    style.dot_radius,
                    style.rim_thickness,
                    style.rim_color.with_alpha(style.rim_opacity),
                );
            }
        }

        Ok(surface.into_frame())
    }
}
