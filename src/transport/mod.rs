//! Framed TCP transport.
//!
//! Clients send encoded images as length-prefixed frames and receive one
//! length-prefixed UTF-8 reply per image.

pub mod framing;
mod server;

pub use framing::{encode_frame, read_frame, write_frame, FrameDecoder, HEADER_LEN};
pub use server::{GuidanceServer, ServerHandle, ServerPhase};
