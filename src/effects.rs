use crate::color::Rgba;
use crate::composite::{over_premul_in_place, shift_frame};
use crate::foundation::core::FrameRgba;
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::mul_div255_u8;

/// Separable gaussian blur over a premultiplied frame (Q16 fixed-point
/// kernel, edges clamped).
pub fn gaussian_blur(frame: &FrameRgba, radius: u32, sigma: f32) -> TrailvizResult<FrameRgba> {
    if !frame.premultiplied {
        return Err(TrailvizError::render(
            "gaussian_blur expects a premultiplied frame",
        ));
    }
    if radius == 0 {
        return Ok(frame.clone());
    }
    let kernel = kernel_q16(radius, sigma)?;

    let (w, h) = (frame.width as usize, frame.height as usize);
    let mut tmp = vec![0u8; frame.data.len()];
    let mut out = frame.clone();
    convolve_axis(&frame.data, &mut tmp, h, w, |row, x| row * w + x, &kernel);
    convolve_axis(&tmp, &mut out.data, w, h, |col, y| y * w + col, &kernel);
    Ok(out)
}

fn kernel_q16(radius: u32, sigma: f32) -> TrailvizResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(TrailvizError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let gauss: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = gauss.iter().sum();

    let mut taps: Vec<u32> = gauss
        .iter()
        .map(|w| (((w / sum) * 65536.0).round() as i64).clamp(0, 65536) as u32)
        .collect();

    // Fold the rounding error into the center tap so the taps sum to exactly
    // one in Q16 and flat regions stay untouched.
    let total: i64 = taps.iter().map(|&w| i64::from(w)).sum();
    let mid = taps.len() / 2;
    taps[mid] = (i64::from(taps[mid]) + (65536 - total)).clamp(0, 65536) as u32;
    Ok(taps)
}

/// One axis of the separable blur. `index` maps (lane, position-along-axis)
/// to a pixel index, so the same loop serves rows and columns.
fn convolve_axis(
    src: &[u8],
    dst: &mut [u8],
    lanes: usize,
    lane_len: usize,
    index: impl Fn(usize, usize) -> usize,
    kernel: &[u32],
) {
    let radius = (kernel.len() / 2) as isize;
    let last = lane_len as isize - 1;
    for lane in 0..lanes {
        for i in 0..lane_len {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let s = (i as isize + ki as isize - radius).clamp(0, last) as usize;
                let base = index(lane, s) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[base + c]);
                }
            }
            let base = index(lane, i) * 4;
            for c in 0..4 {
                dst[base + c] = ((acc[c] + 32768) >> 16).min(255) as u8;
            }
        }
    }
}

/// Drop-shadow parameters for a whole layer.
#[derive(Clone, Copy, Debug)]
pub struct DropShadow {
    pub dx: i64,
    pub dy: i64,
    pub blur: u32,
    pub color: Rgba,
    pub opacity: f64,
}

impl DropShadow {
    pub fn soft(blur: u32, color: Rgba) -> Self {
        Self {
            dx: 0,
            dy: 0,
            blur,
            color,
            opacity: 1.0,
        }
    }
}

/// Put a blurred, tinted copy of the layer's silhouette underneath it.
pub fn with_drop_shadow(layer: &FrameRgba, shadow: &DropShadow) -> TrailvizResult<FrameRgba> {
    if !layer.premultiplied {
        return Err(TrailvizError::render(
            "with_drop_shadow expects a premultiplied layer",
        ));
    }

    let tint = shadow.color.with_alpha(shadow.color.a * shadow.opacity.clamp(0.0, 1.0));
    let tint = tint.to_premul().to_array();

    // Silhouette: the layer's alpha modulating the shadow tint.
    let mut silhouette = FrameRgba {
        width: layer.width,
        height: layer.height,
        data: vec![0u8; layer.data.len()],
        premultiplied: true,
    };
    for (d, s) in silhouette
        .data
        .chunks_exact_mut(4)
        .zip(layer.data.chunks_exact(4))
    {
        let a = u16::from(s[3]);
        if a == 0 {
            continue;
        }
        for c in 0..4 {
            d[c] = mul_div255_u8(u16::from(tint[c]), a);
        }
    }

    let shifted = if shadow.dx != 0 || shadow.dy != 0 {
        shift_frame(&silhouette, shadow.dx, shadow.dy)
    } else {
        silhouette
    };
    let mut shadow_frame = if shadow.blur > 0 {
        gaussian_blur(&shifted, shadow.blur, shadow.blur as f32 * 0.5)?
    } else {
        shifted
    };

    over_premul_in_place(&mut shadow_frame.data, &layer.data)?;
    Ok(shadow_frame)
}
