//! Pixel sources sampled by receptive fields
//!
//! Two paths exist. The direct path indexes an in-memory luminance buffer
//! ([`LumaFrame`]). The framebuffer path probes a render target one pixel at a
//! time through a [`FramebufferReader`] and is adapted to the same interface by
//! [`FramebufferProbe`]. Fields only ever see [`PixelSource`].

use crate::error::{WavyError, WavyResult};

/// Brightness lookup in `[0, 255]`
pub trait PixelSource: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Caller guarantees `x < width()` and `y < height()`
    fn sample(&self, x: u32, y: u32) -> u8;
}

impl<T: PixelSource + ?Sized> PixelSource for &T {
    fn width(&self) -> u32 {
        (**self).width()
    }
    fn height(&self) -> u32 {
        (**self).height()
    }
    fn sample(&self, x: u32, y: u32) -> u8 {
        (**self).sample(x, y)
    }
}

/// 8-bit single channel image, row-major
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaFrame {
    /// Black frame
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap an existing row-major buffer
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> WavyResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(WavyError::config(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.data[self.index(x, y)])
        } else {
            None
        }
    }

    /// Write one pixel; writes outside the frame are dropped
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.data[i] = value;
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Axis-aligned rectangle centred on `(cx, cy)`, clipped to the frame
    pub fn fill_rect(&mut self, cx: i64, cy: i64, w: u32, h: u32, value: u8) {
        let x0 = cx - w as i64 / 2;
        let y0 = cy - h as i64 / 2;
        for y in y0.max(0)..(y0 + h as i64).min(self.height as i64) {
            for x in x0.max(0)..(x0 + w as i64).min(self.width as i64) {
                let i = self.index(x as u32, y as u32);
                self.data[i] = value;
            }
        }
    }

    /// Filled disc, clipped to the frame
    pub fn fill_disc(&mut self, cx: i64, cy: i64, radius: u32, value: u8) {
        let r = radius as i64;
        for y in (cy - r).max(0)..=(cy + r).min(self.height as i64 - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(self.width as i64 - 1) {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= r * r {
                    let i = self.index(x as u32, y as u32);
                    self.data[i] = value;
                }
            }
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl PixelSource for LumaFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn sample(&self, x: u32, y: u32) -> u8 {
        self.data[self.index(x, y)]
    }
}

/// A 1x1 read of a render target, returning luminance in nominal `[0, 1]`
pub trait FramebufferReader: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn read_luminance(&self, x: u32, y: u32) -> f32;
}

/// Adapts a [`FramebufferReader`] to [`PixelSource`].
///
/// Reads are clamped to `[0, 1]` and then rounded onto `0..=255`, so the
/// threshold always sees the same 8-bit scale as the direct path.
pub struct FramebufferProbe<R> {
    reader: R,
}

impl<R: FramebufferReader> FramebufferProbe<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Map a float luminance onto the 8-bit scale
pub fn quantize_luminance(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl<R: FramebufferReader> PixelSource for FramebufferProbe<R> {
    fn width(&self) -> u32 {
        self.reader.width()
    }

    fn height(&self) -> u32 {
        self.reader.height()
    }

    fn sample(&self, x: u32, y: u32) -> u8 {
        quantize_luminance(self.reader.read_luminance(x, y))
    }
}
