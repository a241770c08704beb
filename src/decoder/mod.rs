//! Decode sources: where the reader worker gets its frames from.
//!
//! A [`SourceOpener`] turns a path into a [`DecodeSource`]. The source
//! reports its format once through [`DecodeSource::info`] and then hands out
//! interleaved frames, already converted to the output's encoding, through
//! [`DecodeSource::read_frames`]. Dropping a source closes it.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dasp_sample::{Sample, ToSample};

use crate::common::assert_error_traits;
use crate::{FrameCount, SampleFormat};

#[cfg(feature = "wav")]
mod wav;

#[cfg(feature = "wav")]
pub use wav::{inspect, WavOpener, WavSource};

/// Format of an opened source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channel_count: u16,
    /// How samples are stored in the file.
    pub sample_format: SampleFormat,
    /// Length of the stream if the container knows it.
    pub frame_count: Option<FrameCount>,
}

/// Errors produced while opening or decoding a source.
#[derive(Debug, thiserror::Error, Clone)]
pub enum DecodeError {
    /// The file could not be opened or its header could not be parsed.
    #[error("could not open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },
    /// The file is readable but stores samples in a layout that is not
    /// supported.
    #[error("unsupported file layout: {0}")]
    UnsupportedFile(String),
    /// Frames can not be produced in the requested encoding.
    #[error("can not decode into {0}")]
    UnsupportedEncoding(SampleFormat),
    /// The output buffer can not hold the requested frames.
    #[error("buffer holds {available} bytes, {needed} are needed")]
    BufferTooSmall { needed: usize, available: usize },
    /// Reading or decoding data failed mid-stream.
    #[error("decoding failed")]
    Read(#[source] Arc<dyn Error + Send + Sync>),
}
assert_error_traits! {DecodeError}

/// An open stream of decoded frames.
pub trait DecodeSource: Send {
    /// Format of the stream.
    fn info(&self) -> SourceInfo;

    /// Decodes up to `frames` frames into `out` as interleaved samples of
    /// type `encoding` in native byte order.
    ///
    /// Returns the number of whole frames written. Zero means the end of the
    /// stream was reached. Fewer than `frames` without reaching the end is
    /// allowed; what happens then is up to the caller.
    fn read_frames(
        &mut self,
        encoding: SampleFormat,
        out: &mut [u8],
        frames: usize,
    ) -> Result<usize, DecodeError>;
}

/// Opens decode sources by path.
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSource>, DecodeError>;
}

/// Checks that `out` can hold `frames` frames of `channels` samples of
/// `encoding` and that the encoding can be produced at all.
pub fn check_output(
    encoding: SampleFormat,
    channels: u16,
    out: &[u8],
    frames: usize,
) -> Result<(), DecodeError> {
    if !encoding.is_streamable() {
        return Err(DecodeError::UnsupportedEncoding(encoding));
    }
    let needed = frames * channels as usize * encoding.bytes_per_sample();
    if out.len() < needed {
        return Err(DecodeError::BufferTooSmall {
            needed,
            available: out.len(),
        });
    }
    Ok(())
}

/// Converts `sample` to `encoding` and stores it at the start of `out`.
///
/// Returns the number of bytes written, zero for encodings that are not
/// streamable.
pub fn put_sample<S>(encoding: SampleFormat, sample: S, out: &mut [u8]) -> usize
where
    S: Sample + ToSample<f32> + ToSample<i32> + ToSample<i16>,
{
    match encoding {
        SampleFormat::F32 => put_bytes(out, sample.to_sample::<f32>().to_ne_bytes()),
        SampleFormat::I32 => put_bytes(out, sample.to_sample::<i32>().to_ne_bytes()),
        SampleFormat::I16 => put_bytes(out, sample.to_sample::<i16>().to_ne_bytes()),
        SampleFormat::I24 | SampleFormat::I8 | SampleFormat::U8 => 0,
    }
}

fn put_bytes<const N: usize>(out: &mut [u8], bytes: [u8; N]) -> usize {
    out[..N].copy_from_slice(&bytes);
    N
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn float_is_stored_native_endian() {
        let mut out = [0u8; 4];
        assert_eq!(put_sample(SampleFormat::F32, 0.5f32, &mut out), 4);
        assert_eq!(f32::from_ne_bytes(out), 0.5);
    }

    #[test]
    fn integers_are_rescaled() {
        let mut out = [0u8; 2];
        put_sample(SampleFormat::I16, i32::MIN, &mut out);
        assert_eq!(i16::from_ne_bytes(out), i16::MIN);

        let mut out = [0u8; 4];
        put_sample(SampleFormat::I32, i16::MAX, &mut out);
        assert_eq!(i32::from_ne_bytes(out), i32::MAX - 0xFFFF);
    }

    #[rstest]
    #[case(SampleFormat::I24)]
    #[case(SampleFormat::I8)]
    #[case(SampleFormat::U8)]
    fn unsupported_encodings_are_refused(#[case] encoding: SampleFormat) {
        let out = [0u8; 4096];
        assert!(matches!(
            check_output(encoding, 2, &out, 256),
            Err(DecodeError::UnsupportedEncoding(e)) if e == encoding
        ));
        assert_eq!(put_sample(encoding, 0.0f32, &mut [0u8; 4]), 0);
    }

    #[test]
    fn short_buffer_is_refused() {
        let out = [0u8; 100];
        assert!(matches!(
            check_output(SampleFormat::I16, 2, &out, 256),
            Err(DecodeError::BufferTooSmall {
                needed: 1024,
                available: 100
            })
        ));
    }
}
