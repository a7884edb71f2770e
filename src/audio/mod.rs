//! # Audio Stitching Pipeline
//!
//! The core fragment pipeline: decode inbound payloads, keep a bounded window
//! of the most recent fragments, and render the window into one seamless WAV
//! container with fade-smoothed boundaries.
//!
//! ## Key Components:
//! - **Decoder**: base64 media payload → raw PCM fragment
//! - **Fade Shaper**: Hann fade-in/fade-out at fragment edges
//! - **Sliding Window**: bounded FIFO of the last `W` fragments
//! - **Container Muxer**: fragments → one WAV byte stream
//! - **Render Sink**: atomic commit of the rendered container
//! - **Session**: per-connection recording flag and fragment counter
//!
//! ## Audio Format:
//! 16-bit little-endian PCM, interleaved stereo, container frame rate derived
//! from the nominal capture rate. See `config::AudioSettings`.

pub mod decoder;
pub mod fade;
pub mod muxer;
pub mod session;
pub mod sink;
pub mod window;
