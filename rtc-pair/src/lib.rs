#![warn(rust_2018_idioms)]

//! Serverless peer pairing over an out-of-band code channel.
//!
//! Two endpoints with no shared signaling server negotiate a direct
//! connection by showing each other QR codes: the initiator renders its
//! offer, the responder scans it and renders an answer, and the initiator
//! scans that answer back. [`session::RTCPairingSession`] is the sans-IO
//! state machine driving one such attempt.

pub mod capture;
pub mod configuration;
pub mod description;
pub mod notifier;
pub mod session;
pub mod sim;
pub mod transport;

pub use qr;
pub use sansio;
pub use shared;
