use std::rc::Rc;

use anyhow::{Result, ensure};

/// Bitmaps are shared between a room's frame list and the engine caches.
pub type SharedBitmap = Rc<Bitmap>;

/// Packed pixel buffer, 1 to 4 bytes per pixel, little-endian pixel values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    bytes_per_pixel: u8,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u8) -> Self {
        let bytes_per_pixel = bytes_per_pixel.clamp(1, 4);
        let len = width as usize * height as usize * bytes_per_pixel as usize;
        Self {
            width,
            height,
            bytes_per_pixel,
            pixels: vec![0; len],
        }
    }

    pub fn from_pixels(
        width: u32,
        height: u32,
        bytes_per_pixel: u8,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        ensure!(
            (1..=4).contains(&bytes_per_pixel),
            "unsupported bytes-per-pixel value {bytes_per_pixel}"
        );
        let expected = width as usize * height as usize * bytes_per_pixel as usize;
        ensure!(
            pixels.len() == expected,
            "bitmap {width}x{height}x{bytes_per_pixel} expects {expected} bytes, got {}",
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_shared(self) -> SharedBitmap {
        Rc::new(self)
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bytes_per_pixel as usize;
        Some((y as usize * self.width as usize + x as usize) * bpp)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        let start = self.offset(x, y)?;
        let mut value = 0u32;
        for (shift, byte) in self.pixels[start..start + self.bytes_per_pixel as usize]
            .iter()
            .enumerate()
        {
            value |= (*byte as u32) << (shift * 8);
        }
        Some(value)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, value: u32) -> bool {
        let Some(start) = self.offset(x, y) else {
            return false;
        };
        let bpp = self.bytes_per_pixel as usize;
        self.pixels[start..start + bpp].copy_from_slice(&value.to_le_bytes()[..bpp]);
        true
    }

    pub fn fill(&mut self, value: u32) {
        let bpp = self.bytes_per_pixel as usize;
        let bytes = value.to_le_bytes();
        for chunk in self.pixels.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&bytes[..bpp]);
        }
    }

    /// Nearest-neighbour resample. Pixel values are copied, never blended,
    /// so area masks keep their discrete ids.
    pub fn resized_nearest(&self, width: u32, height: u32) -> Bitmap {
        let mut out = Bitmap::new(width, height, self.bytes_per_pixel);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }
        let bpp = self.bytes_per_pixel as usize;
        for dy in 0..height {
            let sy = (dy as u64 * self.height as u64 / height as u64) as usize;
            for dx in 0..width {
                let sx = (dx as u64 * self.width as u64 / width as u64) as usize;
                let src = (sy * self.width as usize + sx) * bpp;
                let dst = (dy as usize * width as usize + dx as usize) * bpp;
                out.pixels[dst..dst + bpp].copy_from_slice(&self.pixels[src..src + bpp]);
            }
        }
        out
    }
}
