use crate::foundation::core::FrameRgba;
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8, opacity_to_u16};

/// Premultiplied source-over: `dst = src + dst * (1 - src.a)`.
pub fn over_premul_in_place(dst: &mut [u8], src: &[u8]) -> TrailvizResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(TrailvizError::render(
            "over_premul_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = add_sat_u8(s[3], mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            d[c] = add_sat_u8(s[c], mul_div255_u8(u16::from(d[c]), inv));
        }
    }
    Ok(())
}

/// Premultiplied source-over with an extra layer opacity multiplier.
pub fn over_premul_opacity_in_place(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
) -> TrailvizResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(TrailvizError::render(
            "over_premul_opacity_in_place expects equal-length rgba8 buffers",
        ));
    }
    let op = opacity_to_u16(opacity);
    if op == 0 {
        return Ok(());
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);
        d[3] = add_sat_u8(sa, mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = add_sat_u8(sc, dc);
        }
    }
    Ok(())
}

/// Alpha-over a premultiplied layer onto a background frame:
/// `out = fg*a + bg*(1-a)` per channel. The background is treated as the
/// opaque RGB carrier it is in practice; its own alpha channel passes through
/// the same formula.
pub fn over_background(background: &FrameRgba, layer: &FrameRgba) -> TrailvizResult<FrameRgba> {
    if layer.width != background.width || layer.height != background.height {
        return Err(TrailvizError::render(format!(
            "layer {}x{} does not match background {}x{}",
            layer.width, layer.height, background.width, background.height
        )));
    }
    if !layer.premultiplied {
        return Err(TrailvizError::render(
            "over_background expects a premultiplied layer",
        ));
    }

    let mut out = background.clone();
    over_premul_in_place(&mut out.data, &layer.data)?;
    Ok(out)
}

/// Stamp a premultiplied sprite onto a premultiplied frame, centered at
/// `(cx, cy)`, clipping at the frame bounds.
pub fn stamp_centered(
    dst: &mut FrameRgba,
    sprite: &FrameRgba,
    cx: f64,
    cy: f64,
) -> TrailvizResult<()> {
    if !dst.premultiplied || !sprite.premultiplied {
        return Err(TrailvizError::render(
            "stamp_centered expects premultiplied frames",
        ));
    }

    let left = (cx - f64::from(sprite.width) / 2.0).round() as i64;
    let top = (cy - f64::from(sprite.height) / 2.0).round() as i64;

    for sy in 0..i64::from(sprite.height) {
        let dy = top + sy;
        if dy < 0 || dy >= i64::from(dst.height) {
            continue;
        }
        for sx in 0..i64::from(sprite.width) {
            let dx = left + sx;
            if dx < 0 || dx >= i64::from(dst.width) {
                continue;
            }
            let si = ((sy as usize) * (sprite.width as usize) + (sx as usize)) * 4;
            let di = ((dy as usize) * (dst.width as usize) + (dx as usize)) * 4;

            let sa = u16::from(sprite.data[si + 3]);
            if sa == 0 {
                continue;
            }
            let inv = 255u16 - sa;
            let d = &mut dst.data[di..di + 4];
            d[3] = add_sat_u8(sprite.data[si + 3], mul_div255_u8(u16::from(d[3]), inv));
            for c in 0..3 {
                d[c] = add_sat_u8(sprite.data[si + c], mul_div255_u8(u16::from(d[c]), inv));
            }
        }
    }
    Ok(())
}

/// Scale every channel of a premultiplied frame (alpha fade for stacking).
pub fn scale_alpha_in_place(frame: &mut FrameRgba, factor: f64) {
    let f = opacity_to_u16(factor as f32);
    for px in frame.data.chunks_exact_mut(4) {
        for c in 0..4 {
            px[c] = mul_div255_u8(u16::from(px[c]), f);
        }
    }
}

/// Copy a frame shifted by whole pixels, leaving vacated pixels transparent.
pub fn shift_frame(frame: &FrameRgba, dx: i64, dy: i64) -> FrameRgba {
    let mut out = FrameRgba {
        width: frame.width,
        height: frame.height,
        data: vec![0u8; frame.data.len()],
        premultiplied: frame.premultiplied,
    };
    for y in 0..i64::from(frame.height) {
        let sy = y - dy;
        if sy < 0 || sy >= i64::from(frame.height) {
            continue;
        }
        for x in 0..i64::from(frame.width) {
            let sx = x - dx;
            if sx < 0 || sx >= i64::from(frame.width) {
                continue;
            }
            let si = ((sy as usize) * (frame.width as usize) + (sx as usize)) * 4;
            let di = ((y as usize) * (frame.width as usize) + (x as usize)) * 4;
            out.data[di..di + 4].copy_from_slice(&frame.data[si..si + 4]);
        }
    }
    out
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Blend a layer over a background in linear light (sRGB EOTF in, OETF out),
/// with an extra opacity multiplier on the layer's alpha. Output is an opaque
/// straight-alpha frame, like the background it extends.
pub fn blend_linear_light(
    background: &FrameRgba,
    layer: &FrameRgba,
    opacity: f32,
) -> TrailvizResult<FrameRgba> {
    if layer.width != background.width || layer.height != background.height {
        return Err(TrailvizError::render(
            "blend_linear_light expects matching frame sizes",
        ));
    }
    let opacity = opacity.clamp(0.0, 1.0);

    let mut out = background.clone();
    for (d, s) in out.data.chunks_exact_mut(4).zip(layer.data.chunks_exact(4)) {
        let la = f32::from(s[3]) / 255.0;
        let a = la * opacity;
        if a <= 0.0 {
            continue;
        }
        for c in 0..3 {
            // Un-premultiply the layer channel before linearizing.
            let fg = if layer.premultiplied && la > 0.0 {
                (f32::from(s[c]) / 255.0 / la).min(1.0)
            } else {
                f32::from(s[c]) / 255.0
            };
            let bg = f32::from(d[c]) / 255.0;
            let mixed =
                srgb_to_linear(fg) * a + srgb_to_linear(bg) * (1.0 - a);
            d[c] = (linear_to_srgb(mixed).clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Canvas;

    fn frame(w: u32, h: u32, rgba: [u8; 4], premul: bool) -> FrameRgba {
        let mut f = FrameRgba::solid(Canvas::new(w, h).unwrap(), rgba);
        f.premultiplied = premul;
        f
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let mut dst = vec![10u8, 20, 30, 40];
        over_premul_in_place(&mut dst, &[255, 255, 255, 0]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 40]);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let mut dst = vec![0u8, 0, 0, 255];
        over_premul_in_place(&mut dst, &[255, 0, 0, 255]).unwrap();
        assert_eq!(dst, vec![255, 0, 0, 255]);
    }

    #[test]
    fn over_rejects_mismatched_lengths() {
        let mut dst = vec![0u8; 8];
        assert!(over_premul_in_place(&mut dst, &[0u8; 4]).is_err());
    }

    #[test]
    fn transparent_layer_leaves_background_unchanged() {
        let bg = frame(4, 4, [10, 20, 30, 255], false);
        let layer = FrameRgba::transparent(Canvas::new(4, 4).unwrap());
        let out = over_background(&bg, &layer).unwrap();
        assert_eq!(out.data, bg.data);
    }

    #[test]
    fn opacity_zero_overlay_is_noop() {
        let mut dst = vec![1u8, 2, 3, 4];
        over_premul_opacity_in_place(&mut dst, &[200, 200, 200, 200], 0.0).unwrap();
        assert_eq!(dst, vec![1, 2, 3, 4]);
    }

    #[test]
    fn stamp_clips_at_bounds() {
        let mut dst = frame(4, 4, [0, 0, 0, 255], true);
        let sprite = frame(2, 2, [255, 0, 0, 255], true);
        // Center near the corner: only the overlapping quadrant lands.
        stamp_centered(&mut dst, &sprite, 0.0, 0.0).unwrap();
        assert_eq!(dst.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(dst.pixel(2, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn shift_moves_content_and_clears_origin() {
        let mut f = FrameRgba::transparent(Canvas::new(4, 4).unwrap());
        let idx = 0;
        f.data[idx..idx + 4].copy_from_slice(&[9, 9, 9, 255]);
        let shifted = shift_frame(&f, 1, 2);
        assert_eq!(shifted.pixel(1, 2), [9, 9, 9, 255]);
        assert_eq!(shifted.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn scale_alpha_halves_all_channels() {
        let mut f = frame(1, 1, [200, 100, 50, 255], true);
        scale_alpha_in_place(&mut f, 0.5);
        let px = f.pixel(0, 0);
        assert!((i16::from(px[0]) - 100).abs() <= 1);
        assert!((i16::from(px[3]) - 128).abs() <= 1);
    }

    #[test]
    fn linear_blend_endpoints_match_inputs() {
        let bg = frame(1, 1, [0, 0, 0, 255], false);
        let layer = frame(1, 1, [255, 255, 255, 255], true);
        let full = blend_linear_light(&bg, &layer, 1.0).unwrap();
        assert_eq!(full.pixel(0, 0)[0], 255);
        let none = blend_linear_light(&bg, &layer, 0.0).unwrap();
        assert_eq!(none.pixel(0, 0)[0], 0);
    }
}
