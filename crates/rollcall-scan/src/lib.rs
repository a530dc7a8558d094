//! Camera capture, QR decoding, and the scan session controller.
//!
//! The pieces compose bottom-up: a [`capture::FrameSampler`] owns one
//! [`capture::Camera`] and yields [`frame::Frame`]s, a [`decode::Decoder`]
//! turns a frame into an optional payload, and a [`session::ScanSession`]
//! drives both, handing payloads to a [`gate::ScanGate`] which applies the
//! cooldown and calls the attendance engine.

#![allow(async_fn_in_trait)]

pub mod capture;
pub mod decode;
pub mod error;
pub mod frame;
pub mod gate;
pub mod session;

#[cfg(test)]
mod fake;

pub use error::{Error, Result};
