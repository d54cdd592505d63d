use crate::foundation::error::{TrailvizError, TrailvizResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Output raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> TrailvizResult<Self> {
        if width == 0 || height == 0 {
            return Err(TrailvizError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True when (x, y) lies inside the raster (half-open on the right/bottom).
    pub fn contains(self, x: f64, y: f64) -> bool {
        x >= 0.0 && x < f64::from(self.width) && y >= 0.0 && y < f64::from(self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> TrailvizResult<Self> {
        if num == 0 {
            return Err(TrailvizError::validation("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(TrailvizError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8Premul {
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// One byte-per-channel RGBA raster frame.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRgba {
    /// A fully transparent premultiplied frame of the given size.
    pub fn transparent(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0u8; canvas.pixel_count() * 4],
            premultiplied: true,
        }
    }

    /// An opaque frame filled with a straight-alpha RGBA color.
    pub fn solid(canvas: Canvas, rgba: [u8; 4]) -> Self {
        let mut data = vec![0u8; canvas.pixel_count() * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
            premultiplied: false,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn expect_size(&self, canvas: Canvas) -> TrailvizResult<()> {
        if self.width != canvas.width || self.height != canvas.height {
            return Err(TrailvizError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                self.width, self.height, canvas.width, canvas.height
            )));
        }
        if self.data.len() != canvas.pixel_count() * 4 {
            return Err(TrailvizError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        Ok(())
    }

    /// The RGBA pixel at (x, y). Panics when out of bounds; callers bounds-check.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}
