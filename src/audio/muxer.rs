//! # Container Muxing
//!
//! Concatenates an ordered run of fade-shaped fragments into a single WAV
//! container. The muxer renders entirely in memory and hands the finished
//! byte stream to a sink; it never touches the filesystem itself.
//!
//! ## Container Layout:
//! One header per render (16-bit PCM, channel count and frame rate from the
//! validated configuration, no compression), followed by every fragment's
//! samples oldest-first.

use crate::audio::decoder::Fragment;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fmt;
use std::io::Cursor;

/// Declared output format for rendered containers.
///
/// An explicit, validated configuration value rather than constants buried in
/// the writer; see [`crate::config::AudioSettings`] for where the fields come
/// from and how they are validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFormat {
    /// Interleaved channel count.
    pub channels: u16,

    /// Container frame rate in Hz (half the nominal capture rate).
    pub frame_rate: u32,

    /// Sample width; the pipeline only ever produces 16-bit PCM.
    pub bits_per_sample: u16,
}

impl ContainerFormat {
    fn to_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.frame_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }
}

/// Reasons a render pass can fail before any bytes reach the sink.
///
/// ## Recovery:
/// The render is skipped and the window retained, so the next push gets
/// another attempt.
#[derive(Debug)]
pub enum MuxError {
    /// No fragments were offered for rendering.
    EmptyWindow,

    /// A fragment's sample count does not divide into whole frames for the
    /// declared channel count.
    FrameAlignment {
        seq: u64,
        samples: usize,
        channels: u16,
    },

    /// The container writer rejected the stream.
    Codec(String),
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::EmptyWindow => write!(f, "no fragments to render"),
            MuxError::FrameAlignment {
                seq,
                samples,
                channels,
            } => write!(
                f,
                "fragment {} has {} samples, not a whole number of {}-channel frames",
                seq, samples, channels
            ),
            MuxError::Codec(msg) => write!(f, "container write failed: {}", msg),
        }
    }
}

impl std::error::Error for MuxError {}

impl From<hound::Error> for MuxError {
    fn from(err: hound::Error) -> Self {
        MuxError::Codec(err.to_string())
    }
}

/// Render an ordered fragment sequence into a complete WAV byte stream.
///
/// ## Parameters:
/// - **fragments**: fade-shaped fragments, oldest first
/// - **format**: the declared container format
///
/// ## Returns:
/// - **Ok(bytes)**: a finalized container, header included
/// - **Err(MuxError)**: empty input, misaligned fragment, or writer failure
pub fn render(fragments: &[Fragment], format: &ContainerFormat) -> Result<Vec<u8>, MuxError> {
    if fragments.is_empty() {
        return Err(MuxError::EmptyWindow);
    }

    for fragment in fragments {
        if fragment.len() % format.channels as usize != 0 {
            return Err(MuxError::FrameAlignment {
                seq: fragment.seq,
                samples: fragment.len(),
                channels: format.channels,
            });
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, format.to_spec())?;
        for fragment in fragments {
            for &sample in &fragment.samples {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
