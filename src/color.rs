use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{TrailvizError, TrailvizResult};
use serde::{Deserialize, Serialize};

/// Normalized straight-alpha RGBA color, channels in 0..1.
///
/// All user-facing color inputs (names, hex strings, arrays) resolve to this
/// one type before any rendering happens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// HSV in (h: 0..1 wrapping, s: 0..1, v: 0..1). Used to spread per-track
    /// hues evenly around the wheel.
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let h = (h.rem_euclid(1.0)) * 6.0;
        let s = s.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);

        let i = h.floor();
        let f = h - i;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match i as u32 % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Self::rgb(r, g, b)
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Byte RGB triple, alpha discarded. Trail strokes use this with a
    /// taper-computed alpha instead of the color's own.
    pub fn to_rgb8(self) -> [u8; 3] {
        [to_u8(self.r), to_u8(self.g), to_u8(self.b)]
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [to_u8(self.r), to_u8(self.g), to_u8(self.b), to_u8(self.a)]
    }

    pub fn to_premul(self) -> Rgba8Premul {
        let [r, g, b, a] = self.to_rgba8();
        Rgba8Premul::from_straight_rgba(r, g, b, a)
    }
}

fn to_u8(x: f64) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Flexible color input: a name, hex string, `[r,g,b]`/`[r,g,b,a]` array, or
/// an `{r,g,b,a}` object. Resolved once via [`ColorSpec::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Named(String),
    Arr(Vec<f64>),
    RgbaObj {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default = "one")]
        a: f64,
    },
}

fn one() -> f64 {
    1.0
}

impl ColorSpec {
    pub fn resolve(&self) -> TrailvizResult<Rgba> {
        match self {
            Self::Named(s) => resolve_str(s),
            Self::Arr(v) => {
                if v.len() == 3 {
                    Ok(Rgba::rgb(v[0], v[1], v[2]))
                } else if v.len() == 4 {
                    Ok(Rgba::rgba(v[0], v[1], v[2], v[3]))
                } else {
                    Err(TrailvizError::validation(
                        "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                    ))
                }
            }
            Self::RgbaObj { r, g, b, a } => Ok(Rgba::rgba(*r, *g, *b, *a)),
        }
    }
}

fn resolve_str(s: &str) -> TrailvizResult<Rgba> {
    let s = s.trim();
    if s.starts_with('#') {
        return parse_hex(s);
    }

    let named = match s.to_ascii_lowercase().as_str() {
        "white" => Rgba::WHITE,
        "black" => Rgba::BLACK,
        "red" => Rgba::rgb(1.0, 0.0, 0.0),
        "green" => Rgba::rgb(0.0, 1.0, 0.0),
        "blue" => Rgba::rgb(0.0, 0.0, 1.0),
        "yellow" => Rgba::rgb(1.0, 1.0, 0.0),
        "cyan" => Rgba::rgb(0.0, 1.0, 1.0),
        "magenta" => Rgba::rgb(1.0, 0.0, 1.0),
        "orange" => Rgba::rgb(1.0, 0.65, 0.0),
        "gray" | "grey" => Rgba::rgb(0.5, 0.5, 0.5),
        "transparent" => Rgba::TRANSPARENT,
        other => {
            return Err(TrailvizError::validation(format!(
                "unknown color name \"{other}\""
            )));
        }
    };
    Ok(named)
}

fn parse_hex(s: &str) -> TrailvizResult<Rgba> {
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> TrailvizResult<u8> {
        u8::from_str_radix(pair, 16)
            .map_err(|_| TrailvizError::validation(format!("invalid hex byte \"{pair}\"")))
    }

    let (r, g, b, a) = match s.len() {
        6 => {
            let r = hex_byte(&s[0..2])?;
            let g = hex_byte(&s[2..4])?;
            let b = hex_byte(&s[4..6])?;
            (r, g, b, 255)
        }
        8 => {
            let r = hex_byte(&s[0..2])?;
            let g = hex_byte(&s[2..4])?;
            let b = hex_byte(&s[4..6])?;
            let a = hex_byte(&s[6..8])?;
            (r, g, b, a)
        }
        _ => {
            return Err(TrailvizError::validation(
                "hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)",
            ));
        }
    };

    Ok(Rgba::rgba(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
        f64::from(a) / 255.0,
    ))
}
