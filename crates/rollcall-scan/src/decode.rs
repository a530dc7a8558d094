//! Frame-to-payload decoding.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace};

use crate::frame::Frame;

/// Extracts a payload from a single frame. Pure and synchronous; `None` is
/// the normal result for a frame without a readable code.
pub trait Decoder: Send + Sync + 'static {
  fn decode(&self, frame: &Frame) -> Option<String>;
}

/// QR decoding at the frame's native resolution via `rqrr`.
///
/// Every internal failure, including a panic inside the decoder, is
/// reported as "no payload". The payload is trimmed and an empty payload is
/// treated as no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl Decoder for QrDecoder {
  fn decode(&self, frame: &Frame) -> Option<String> {
    let detected = panic::catch_unwind(AssertUnwindSafe(|| {
      let mut image = rqrr::PreparedImage::prepare_from_greyscale(
        frame.width(),
        frame.height(),
        |x, y| frame.pixel(x, y),
      );
      image.detect_grids().into_iter().find_map(|grid| match grid.decode() {
        Ok((_, content)) => Some(content),
        Err(e) => {
          trace!(error = %e, "grid found but not decodable");
          None
        }
      })
    }));

    let payload = match detected {
      Ok(payload) => payload?,
      Err(_) => {
        debug!("qr decoder panicked; frame skipped");
        return None;
      }
    };
    let payload = payload.trim();
    (!payload.is_empty()).then(|| payload.to_owned())
  }
}
