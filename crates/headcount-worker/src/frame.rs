//! Decoded video frames.

use std::time::Duration;

use image::RgbImage;

/// One decoded frame, RGB24, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the source, starting at 0.
    pub seq: u64,
    /// Presentation time relative to the start of the source.
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u64, timestamp: Duration, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            seq,
            timestamp,
            width,
            height,
            pixels,
        }
    }

    /// All-black frame; used by fakes and tests.
    pub fn blank(seq: u64, width: u32, height: u32) -> Self {
        Self::new(
            seq,
            Duration::ZERO,
            width,
            height,
            vec![0; (width * height * 3) as usize],
        )
    }

    /// Bytes per frame for the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Borrow the pixel buffer as an image, `None` when the size is off.
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Take ownership of the pixel buffer as an image.
    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
    }
}
