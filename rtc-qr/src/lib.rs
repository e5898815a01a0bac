#![warn(rust_2018_idioms)]

//! Out-of-band code channel for pairing payloads.
//!
//! A payload is rendered as a QR code on one device and captured by the
//! camera of another. [`encode`] and [`decode`] are pure functions; nothing
//! is retained between calls.

mod decoder;
mod encoder;
mod error_correction;
mod scan_result;

pub use decoder::decode;
pub use encoder::{EncodedCode, encode};
pub use error_correction::ErrorCorrection;
pub use scan_result::ScanResult;

/// A single greyscale frame from a capture source such as a camera.
pub type CaptureFrame = image::GrayImage;
