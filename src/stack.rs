use kurbo::Shape;

use crate::color::Rgba;
use crate::composite::{over_premul_in_place, scale_alpha_in_place, stamp_centered};
use crate::effects::{DropShadow, with_drop_shadow};
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::mul_div255_u8;
use crate::surface::DrawSurface;

/// Parameters of the image-stack motion-blur composite.
#[derive(Clone, Debug)]
pub struct StackOptions {
    /// Frames sampled from the input sequence.
    pub frame_count: usize,
    /// Total diagonal displacement spread across the stack, in pixels.
    pub shift_x: f64,
    pub shift_y: f64,
    /// Each frame is scaled to fit inside this square before stacking.
    pub frame_size: u32,
    pub corner_radius: f64,
    /// Transparent margin around each frame (gives the shadow room).
    pub border: u32,
    pub shadow: DropShadow,
    /// Higher exponent fades older frames faster; lower shows more of them.
    pub alpha_exponent: f64,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            frame_count: 10,
            shift_x: 200.0,
            shift_y: 200.0,
            frame_size: 256,
            corner_radius: 10.0,
            border: 30,
            shadow: DropShadow {
                dx: 10,
                dy: 10,
                blur: 30,
                color: Rgba::BLACK,
                opacity: 0.25,
            },
            alpha_exponent: 0.5,
        }
    }
}

/// Collapse a frame sequence into one still: frames are resampled, rounded,
/// shadowed, progressively shifted, and composited newest-under-oldest with
/// decaying accumulator alpha, so motion reads as a fanned-out stack.
#[tracing::instrument(skip(frames, opts))]
pub fn image_stack(frames: &[FrameRgba], opts: &StackOptions) -> TrailvizResult<FrameRgba> {
    if frames.is_empty() {
        return Err(TrailvizError::validation(
            "image_stack needs at least one input frame",
        ));
    }
    if opts.frame_count == 0 {
        return Err(TrailvizError::validation(
            "image_stack frame_count must be > 0",
        ));
    }
    if opts.frame_size == 0 {
        return Err(TrailvizError::validation(
            "image_stack frame_size must be > 0",
        ));
    }

    let n = opts.frame_count;
    let cell = opts.frame_size + 2 * opts.border;
    let out_canvas = Canvas::new(
        cell + opts.shift_x.abs().ceil() as u32,
        cell + opts.shift_y.abs().ceil() as u32,
    )?;

    // Prepare one padded, rounded, shadowed sprite per sampled frame.
    let mut sprites = Vec::with_capacity(n);
    for idx in sample_indices(frames.len(), n) {
        let fitted = fit_into_square(&frames[idx], opts.frame_size)?;
        let rounded = round_corners(&fitted, opts.corner_radius)?;
        let padded = pad_transparent(&rounded, opts.border)?;
        sprites.push(with_drop_shadow(&padded, &opts.shadow)?);
    }

    // Newest frames sit deepest in the stack; every compositing step first
    // fades what has accumulated so far.
    let mut acc = FrameRgba::transparent(out_canvas);
    for (k, sprite) in sprites.iter().rev().enumerate() {
        let fade = ((k as f64) / (n as f64)).powf(opts.alpha_exponent);
        scale_alpha_in_place(&mut acc, fade);

        let i = n - 1 - k;
        let cx = f64::from(cell) / 2.0 + (i as f64) * opts.shift_x / (n as f64);
        let cy = f64::from(cell) / 2.0 + (i as f64) * opts.shift_y / (n as f64);
        let mut layer = FrameRgba::transparent(out_canvas);
        stamp_centered(&mut layer, sprite, cx, cy)?;
        over_premul_in_place(&mut acc.data, &layer.data)?;
    }

    Ok(acc)
}

/// Evenly resample `count` indices from a sequence of length `len`.
pub(crate) fn sample_indices(len: usize, count: usize) -> Vec<usize> {
    if count == 1 || len == 1 {
        return vec![0; count];
    }
    (0..count)
        .map(|i| (i * (len - 1) + (count - 1) / 2) / (count - 1))
        .collect()
}

/// Scale a frame to fit inside a `size` x `size` box, preserving aspect.
fn fit_into_square(frame: &FrameRgba, size: u32) -> TrailvizResult<FrameRgba> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| TrailvizError::render("frame buffer does not match its dimensions"))?;

    let scale = (f64::from(size) / f64::from(frame.width))
        .min(f64::from(size) / f64::from(frame.height));
    let nw = ((f64::from(frame.width) * scale).round() as u32).max(1);
    let nh = ((f64::from(frame.height) * scale).round() as u32).max(1);

    let resized = image::imageops::resize(&img, nw, nh, image::imageops::FilterType::Triangle);
    Ok(FrameRgba {
        width: nw,
        height: nh,
        data: resized.into_raw(),
        premultiplied: frame.premultiplied,
    })
}

/// Multiply the frame's alpha by an antialiased rounded-rect mask.
pub(crate) fn round_corners(frame: &FrameRgba, radius: f64) -> TrailvizResult<FrameRgba> {
    let canvas = frame.canvas();
    let mut mask_surface = DrawSurface::new(canvas)?;
    let rect = kurbo::RoundedRect::new(
        0.0,
        0.0,
        f64::from(frame.width),
        f64::from(frame.height),
        radius,
    );
    mask_surface.fill_path(&rect.to_path(0.1), Rgba::WHITE);
    let mask = mask_surface.into_frame();

    let mut out = frame.clone();
    for (px, m) in out.data.chunks_exact_mut(4).zip(mask.data.chunks_exact(4)) {
        let a = u16::from(m[3]);
        for c in 0..4 {
            px[c] = mul_div255_u8(u16::from(px[c]), a);
        }
    }
    // Alpha multiplication leaves the buffer premultiplied either way.
    out.premultiplied = true;
    Ok(out)
}

fn pad_transparent(frame: &FrameRgba, border: u32) -> TrailvizResult<FrameRgba> {
    let canvas = Canvas::new(frame.width + 2 * border, frame.height + 2 * border)?;
    let mut out = FrameRgba::transparent(canvas);
    stamp_centered(
        &mut out,
        frame,
        f64::from(canvas.width) / 2.0,
        f64::from(canvas.height) / 2.0,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_frame(w: u32, h: u32, rgba: [u8; 4]) -> FrameRgba {
        let mut f = FrameRgba::solid(Canvas::new(w, h).unwrap(), rgba);
        f.premultiplied = true;
        f
    }

    #[test]
    fn sample_indices_cover_both_ends() {
        let idx = sample_indices(100, 10);
        assert_eq!(idx.len(), 10);
        assert_eq!(idx[0], 0);
        assert_eq!(*idx.last().unwrap(), 99);
        assert!(idx.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn sample_indices_handle_single_frame_input() {
        assert_eq!(sample_indices(1, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn fit_preserves_aspect_within_box() {
        let f = opaque_frame(200, 100, [255, 255, 255, 255]);
        let fitted = fit_into_square(&f, 64).unwrap();
        assert_eq!(fitted.width, 64);
        assert_eq!(fitted.height, 32);
    }

    #[test]
    fn round_corners_clears_the_corners_keeps_the_center() {
        let f = opaque_frame(32, 32, [255, 255, 255, 255]);
        let rounded = round_corners(&f, 12.0).unwrap();
        assert_eq!(rounded.pixel(0, 0)[3], 0);
        assert_eq!(rounded.pixel(16, 16)[3], 255);
    }

    #[test]
    fn stack_produces_shifted_extent() {
        let frames = vec![opaque_frame(32, 32, [0, 128, 255, 255]); 4];
        let opts = StackOptions {
            frame_count: 4,
            shift_x: 20.0,
            shift_y: 20.0,
            frame_size: 32,
            corner_radius: 4.0,
            border: 4,
            shadow: DropShadow {
                dx: 2,
                dy: 2,
                blur: 2,
                color: Rgba::BLACK,
                opacity: 0.25,
            },
            alpha_exponent: 0.5,
        };
        let out = image_stack(&frames, &opts).unwrap();
        assert_eq!(out.width, 32 + 8 + 20);
        // The unshifted first frame ends up on top at the cell center.
        assert!(out.pixel(20, 20)[3] > 0);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(image_stack(&[], &StackOptions::default()).is_err());
    }
}
