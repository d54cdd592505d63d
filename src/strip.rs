use kurbo::{Point, Shape};

use crate::color::Rgba;
use crate::composite::stamp_centered;
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::mul_div255_u8;
use crate::stack::{round_corners, sample_indices};
use crate::surface::DrawSurface;

/// Parameters of the film-strip montage.
#[derive(Clone, Debug)]
pub struct StripOptions {
    /// Frames sampled evenly from the input sequence.
    pub frame_count: usize,
    /// Every sampled frame is scaled to this cell height, keeping its aspect.
    pub frame_height: u32,
    /// Corner radius for the cells and for the strip itself.
    pub corner_radius: f64,
    /// Backing margin around the cells; sprocket holes are punched into it.
    pub margin: u32,
    /// Horizontal spacing between neighboring cells.
    pub gap: u32,
    pub backing: Rgba,
    /// Punch sprocket-hole rows along the top and bottom edges.
    pub perforations: bool,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            frame_count: 6,
            frame_height: 240,
            corner_radius: 20.0,
            margin: 20,
            gap: 10,
            backing: Rgba::BLACK,
            perforations: true,
        }
    }
}

/// Lay a frame sequence out as one film-strip still: sampled frames become
/// rounded cells on an opaque backing, side by side, with sprocket holes
/// along the top and bottom margins.
#[tracing::instrument(skip(frames, opts))]
pub fn film_strip(frames: &[FrameRgba], opts: &StripOptions) -> TrailvizResult<FrameRgba> {
    if frames.is_empty() {
        return Err(TrailvizError::validation(
            "film_strip needs at least one input frame",
        ));
    }
    if opts.frame_count == 0 {
        return Err(TrailvizError::validation(
            "film_strip frame_count must be > 0",
        ));
    }
    if opts.frame_height == 0 {
        return Err(TrailvizError::validation(
            "film_strip frame_height must be > 0",
        ));
    }

    let mut cells = Vec::with_capacity(opts.frame_count);
    for idx in sample_indices(frames.len(), opts.frame_count) {
        let scaled = scale_to_height(&frames[idx], opts.frame_height)?;
        cells.push(round_corners(&scaled, opts.corner_radius)?);
    }

    let n = cells.len() as u32;
    let cells_width: u32 = cells.iter().map(|c| c.width).sum();
    let width = 2 * opts.margin + cells_width + opts.gap * (n - 1);
    let height = 2 * opts.margin + opts.frame_height;
    let canvas = Canvas::new(width, height)?;

    let mut surface = DrawSurface::new(canvas)?;
    let backing = kurbo::RoundedRect::new(
        0.0,
        0.0,
        f64::from(width),
        f64::from(height),
        opts.corner_radius,
    );
    surface.fill_path(&backing.to_path(0.1), opts.backing);
    let mut out = surface.into_frame();

    let cy = f64::from(height) / 2.0;
    let mut x = opts.margin;
    for cell in &cells {
        stamp_centered(&mut out, cell, f64::from(x) + f64::from(cell.width) / 2.0, cy)?;
        x += cell.width + opts.gap;
    }

    if opts.perforations && opts.margin > 0 {
        punch_sprocket_holes(&mut out, opts.margin)?;
    }
    Ok(out)
}

/// Two dot rows whose alpha is carved out of the strip, like sprocket holes
/// in physical film. Hole size and spacing scale with the margin.
fn punch_sprocket_holes(strip: &mut FrameRgba, margin: u32) -> TrailvizResult<()> {
    let canvas = strip.canvas();
    let mut dots = DrawSurface::new(canvas)?;
    let m = f64::from(margin);
    let radius = m * 0.2;
    let step = m * 1.5;

    for y in [m / 2.0, f64::from(strip.height) - m / 2.0] {
        let mut x = m * 0.75;
        while x < f64::from(strip.width) - m * 0.5 {
            dots.fill_circle(Point::new(x, y), radius, Rgba::WHITE);
            x += step;
        }
    }

    let mask = dots.into_frame();
    for (px, d) in strip.data.chunks_exact_mut(4).zip(mask.data.chunks_exact(4)) {
        let keep = 255 - u16::from(d[3]);
        for c in 0..4 {
            px[c] = mul_div255_u8(u16::from(px[c]), keep);
        }
    }
    Ok(())
}

/// Scale a frame to the given height, preserving aspect.
fn scale_to_height(frame: &FrameRgba, height: u32) -> TrailvizResult<FrameRgba> {
    if frame.height == height {
        return Ok(frame.clone());
    }
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| TrailvizError::render("frame buffer does not match its dimensions"))?;

    let scale = f64::from(height) / f64::from(frame.height);
    let nw = ((f64::from(frame.width) * scale).round() as u32).max(1);
    let resized = image::imageops::resize(&img, nw, height, image::imageops::FilterType::Triangle);
    Ok(FrameRgba {
        width: nw,
        height,
        data: resized.into_raw(),
        premultiplied: frame.premultiplied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_frame(w: u32, h: u32, rgba: [u8; 4]) -> FrameRgba {
        let mut f = FrameRgba::solid(Canvas::new(w, h).unwrap(), rgba);
        f.premultiplied = true;
        f
    }

    fn small_opts() -> StripOptions {
        StripOptions {
            frame_count: 2,
            frame_height: 32,
            corner_radius: 8.0,
            margin: 20,
            gap: 10,
            ..StripOptions::default()
        }
    }

    #[test]
    fn strip_dimensions_follow_cell_layout() {
        let frames = vec![opaque_frame(32, 32, [0, 128, 255, 255]); 3];
        let strip = film_strip(&frames, &small_opts()).unwrap();
        // Two 32px cells, one 10px gap, 20px margins all around.
        assert_eq!(strip.width, 20 * 2 + 32 * 2 + 10);
        assert_eq!(strip.height, 20 * 2 + 32);
    }

    #[test]
    fn cells_sit_between_the_margins_over_the_backing() {
        let frames = vec![opaque_frame(32, 32, [0, 255, 0, 255]); 2];
        let strip = film_strip(&frames, &small_opts()).unwrap();

        // First cell center is the frame color.
        assert!(strip.pixel(36, 36)[1] > 200);
        // Mid-gap shows the black backing.
        assert_eq!(strip.pixel(57, 36), [0, 0, 0, 255]);
    }

    #[test]
    fn perforations_punch_through_the_margin() {
        let frames = vec![opaque_frame(32, 32, [255, 255, 255, 255]); 2];
        let strip = film_strip(&frames, &small_opts()).unwrap();

        // Hole centers sit at x = 15, 45, ... in the y = 10 row.
        assert_eq!(strip.pixel(15, 10)[3], 0);
        assert_eq!(strip.pixel(45, 10)[3], 0);
        // Margin between holes stays opaque backing.
        assert_eq!(strip.pixel(30, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn perforations_can_be_disabled() {
        let frames = vec![opaque_frame(32, 32, [255, 255, 255, 255]); 2];
        let opts = StripOptions {
            perforations: false,
            ..small_opts()
        };
        let strip = film_strip(&frames, &opts).unwrap();
        assert_eq!(strip.pixel(15, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn strip_corners_are_rounded() {
        let frames = vec![opaque_frame(32, 32, [255, 255, 255, 255]); 2];
        let strip = film_strip(&frames, &small_opts()).unwrap();
        assert_eq!(strip.pixel(0, 0)[3], 0);
        assert_eq!(strip.pixel(0, 36)[3], 255);
    }

    #[test]
    fn scaling_preserves_aspect() {
        let f = opaque_frame(64, 32, [1, 2, 3, 255]);
        let scaled = scale_to_height(&f, 16).unwrap();
        assert_eq!(scaled.width, 32);
        assert_eq!(scaled.height, 16);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(film_strip(&[], &StripOptions::default()).is_err());

        let frames = vec![opaque_frame(8, 8, [0, 0, 0, 255])];
        let opts = StripOptions {
            frame_count: 0,
            ..StripOptions::default()
        };
        assert!(film_strip(&frames, &opts).is_err());
    }
}
