//! Raw greyscale frames.

use crate::{Error, Result};

/// One captured image as 8-bit luma, row-major, no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  width:  usize,
  height: usize,
  luma:   Vec<u8>,
}

impl Frame {
  /// Wrap a greyscale buffer. `luma` must hold exactly `width * height`
  /// bytes.
  pub fn new(width: usize, height: usize, luma: Vec<u8>) -> Result<Self> {
    let expected = width * height;
    if luma.len() != expected {
      return Err(Error::FrameSize { expected, actual: luma.len() });
    }
    Ok(Self { width, height, luma })
  }

  /// Convert an RGBA buffer using the Rec. 601 luma weights. Alpha is
  /// ignored.
  pub fn from_rgba(width: usize, height: usize, rgba: &[u8]) -> Result<Self> {
    let expected = width * height * 4;
    if rgba.len() != expected {
      return Err(Error::FrameSize { expected, actual: rgba.len() });
    }
    let luma = rgba
      .chunks_exact(4)
      .map(|px| {
        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
      })
      .collect();
    Ok(Self { width, height, luma })
  }

  pub fn width(&self) -> usize { self.width }

  pub fn height(&self) -> usize { self.height }

  pub fn luma(&self) -> &[u8] { &self.luma }

  /// Luma at `(x, y)`. Panics if out of bounds.
  pub fn pixel(&self, x: usize, y: usize) -> u8 { self.luma[y * self.width + x] }
}
