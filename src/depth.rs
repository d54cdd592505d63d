use kurbo::Point;
use smallvec::SmallVec;

use crate::color::Rgba;
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::TrailvizResult;
use crate::foundation::math::lerp;
use crate::surface::DrawSurface;
use crate::tracks::{DepthTrackSet, Visibility, trailing_visible_run};

const DEPTH_SUBSTEPS: usize = 8;
const MIN_SEGMENT_ALPHA: f64 = 0.02;

/// Style for the depth-aware trail renderer.
#[derive(Clone, Debug)]
pub struct DepthTrailStyle {
    pub line_width: f64,
    /// Historical frames shown in the trail; 0 means dots only.
    pub trail_length: usize,
}

impl Default for DepthTrailStyle {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            trail_length: 0,
        }
    }
}

enum Drawable {
    Segment {
        p1: Point,
        p2: Point,
        width: f64,
        alpha: f64,
        rgb: [u8; 3],
    },
    Dot {
        pos: Point,
        radius: f64,
        rgb: [u8; 3],
    },
}

/// Depth-aware variant of the trail renderer.
///
/// Same trail pipeline as [`crate::trail::TrailRenderer`], extended with a
/// third coordinate: every drawable carries its interpolated z and the frame
/// is painted far-to-near (painter's algorithm, no z-buffer). Depth also
/// scales width, alpha and dot radius, and per-track colors encode the first
/// visible position (x -> red, y -> green, z -> blue).
///
/// Output layers are transparent RGBA; compositing over a background is the
/// caller's business.
pub struct DepthTrailRenderer {
    canvas: Canvas,
    style: DepthTrailStyle,
}

impl DepthTrailRenderer {
    pub fn new(canvas: Canvas, style: DepthTrailStyle) -> Self {
        Self { canvas, style }
    }

    #[tracing::instrument(skip(self, tracks, visible))]
    pub fn render(
        &self,
        tracks: &DepthTrackSet,
        visible: Option<&Visibility>,
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

        let (z_min, z_max) = tracks.z_range();
        let colors = self.assign_colors(tracks, vis);

        let mut out = Vec::with_capacity(tracks.frames());
        for t in 0..tracks.frames() {
            out.push(self.render_layer(tracks, vis, &colors, (z_min, z_max), t)?);
        }
        Ok(out)
    }

    /// Color each track by its first visible sample; never-visible tracks
    /// keep black (they produce no drawables anyway).
    fn assign_colors(&self, tracks: &DepthTrackSet, vis: &Visibility) -> Vec<[u8; 3]> {
        let mut first_samples: SmallVec<[(usize, Point, f64); 16]> = SmallVec::new();
        for i in 0..tracks.points() {
            let Some(f) = (0..tracks.frames()).find(|&t| vis.get(t, i)) else {
                continue;
            };
            let (pos, z) = tracks.get(f, i);
            first_samples.push((i, pos, z));
        }

        let mut z_min = f64::INFINITY;
        let mut z_max = f64::NEG_INFINITY;
        for &(_, _, z) in &first_samples {
            z_min = z_min.min(z);
            z_max = z_max.max(z);
        }
        if !z_min.is_finite() {
            z_min = 0.0;
            z_max = 1.0;
        } else if z_max == z_min {
            z_max += 1.0;
        }

        let w = f64::from(self.canvas.width.max(1));
        let h = f64::from(self.canvas.height.max(1));
        let mut colors = vec![[0u8; 3]; tracks.points()];
        for (i, pos, z) in first_samples {
            colors[i] = [
                ((pos.x / w).clamp(0.0, 1.0) * 255.0) as u8,
                ((pos.y / h).clamp(0.0, 1.0) * 255.0) as u8,
                (((z - z_min) / (z_max - z_min)).clamp(0.0, 1.0) * 255.0) as u8,
            ];
        }
        colors
    }

    fn render_layer(
        &self,
        tracks: &DepthTrackSet,
        vis: &Visibility,
        colors: &[[u8; 3]],
        (z_min, z_max): (f64, f64),
        frame: usize,
    ) -> TrailvizResult<FrameRgba> {
        let style = &self.style;
        let depth_scale = |z: f64| {
            let z_norm = 1.0 - (z - z_min) / (z_max - z_min);
            0.3 + 0.7 * z_norm
        };

        let window_start = if style.trail_length > 0 {
            frame.saturating_sub(style.trail_length)
        } else {
            0
        };
        let window_len = frame - window_start + 1;
        let max_width = style.line_width * 2.0;

        // (z, drawable) pairs for the whole frame, sorted far-to-near below.
        let mut draw_list: Vec<(f64, Drawable)> = Vec::new();

        for i in 0..tracks.points() {
            let rgb = colors[i];

            if style.trail_length != 0 && window_len >= 2 {
                let run = trailing_visible_run(
                    window_start,
                    frame,
                    |s| tracks.get(s, i),
                    |s| vis.get(s, i),
                );

                if run.len() >= 2 {
                    let denom = (window_len - 1) as f64;
                    for idx in 0..run.len() - 1 {
                        let a = run[idx];
                        let b = run[idx + 1];

                        for sub in 0..DEPTH_SUBSTEPS {
                            let t0 = sub as f64 / DEPTH_SUBSTEPS as f64;
                            let t1 = (sub + 1) as f64 / DEPTH_SUBSTEPS as f64;
                            let t_avg = (t0 + t1) / 2.0;

                            let p1 = Point::new(
                                lerp(a.pos.x, b.pos.x, t0),
                                lerp(a.pos.y, b.pos.y, t0),
                            );
                            let p2 = Point::new(
                                lerp(a.pos.x, b.pos.x, t1),
                                lerp(a.pos.y, b.pos.y, t1),
                            );

                            let z_interp = lerp(a.z, b.z, t_avg);
                            let scale = depth_scale(z_interp);

                            // Taper by frame offset within the window, not by
                            // run index; sparse runs stay dim near the tail.
                            let progress = (a.offset as f64 + t_avg) / denom;
                            let alpha = progress.powf(1.5) * scale;
                            let width = (max_width * progress * scale).max(0.5);

                            if alpha < MIN_SEGMENT_ALPHA {
                                continue;
                            }

                            draw_list.push((
                                z_interp,
                                Drawable::Segment {
                                    p1,
                                    p2,
                                    width,
                                    alpha,
                                    rgb,
                                },
                            ));
                        }
                    }
                }
            }

            let (pos, z) = tracks.get(frame, i);
            if vis.get(frame, i) && self.canvas.contains(pos.x, pos.y) {
                let radius = style.line_width * 2.0 * depth_scale(z);
                draw_list.push((z, Drawable::Dot { pos, radius, rgb }));
            }
        }

        // Far first, near last: nearer geometry occludes.
        draw_list.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut surface = DrawSurface::new(self.canvas)?;
        for (_, drawable) in &draw_list {
            match *drawable {
                Drawable::Segment {
                    p1,
                    p2,
                    width,
                    alpha,
                    rgb,
                } => surface.stroke_segment(p1, p2, width, rgb, alpha),
                Drawable::Dot { pos, radius, rgb } => {
                    let [r, g, b] = rgb;
                    surface.fill_circle(
                        pos,
                        radius,
                        Rgba::rgb(
                            f64::from(r) / 255.0,
                            f64::from(g) / 255.0,
                            f64::from(b) / 255.0,
                        ),
                    );
                    surface.stroke_circle(pos, radius, 1.0, Rgba::WHITE.with_alpha(0.2));
                }
            }
        }
        Ok(surface.into_frame())
    }
}
