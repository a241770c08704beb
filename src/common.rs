use std::fmt;
use std::num::NonZero;

/// Stream sample rate (frames per second).
pub type SampleRate = NonZero<u32>;

/// Number of channels in a stream.
pub type ChannelCount = NonZero<u16>;

/// Number of frames; one frame holds one sample per channel.
pub type FrameCount = u64;

/// Encoding of a single sample as delivered to the audio backend.
///
/// Samples are interleaved and stored in native byte order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 32-bit IEEE float
    F32,
    /// 32-bit signed integer
    I32,
    /// 24-bit signed integer, packed in 3 bytes
    I24,
    /// 16-bit signed integer
    I16,
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32 | SampleFormat::I32 => 4,
            SampleFormat::I24 => 3,
            SampleFormat::I16 => 2,
            SampleFormat::I8 | SampleFormat::U8 => 1,
        }
    }

    /// Whether the reader worker can decode into this encoding.
    ///
    /// Outputs may be opened with any format, but a stream in a format that
    /// is not streamable ends without producing audio.
    pub const fn is_streamable(self) -> bool {
        matches!(self, SampleFormat::F32 | SampleFormat::I32 | SampleFormat::I16)
    }

    /// The byte pattern of silence for this encoding.
    pub(crate) const fn silence_byte(self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            _ => 0,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::F32 => "float32",
            SampleFormat::I32 => "int32",
            SampleFormat::I24 => "int24",
            SampleFormat::I16 => "int16",
            SampleFormat::I8 => "int8",
            SampleFormat::U8 => "uint8",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "playback")]
impl From<SampleFormat> for cpal::SampleFormat {
    fn from(value: SampleFormat) -> Self {
        match value {
            SampleFormat::F32 => cpal::SampleFormat::F32,
            SampleFormat::I32 => cpal::SampleFormat::I32,
            SampleFormat::I24 => cpal::SampleFormat::I24,
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::I8 => cpal::SampleFormat::I8,
            SampleFormat::U8 => cpal::SampleFormat::U8,
        }
    }
}

/// Builds a `NonZero` from a literal, failing to compile on zero.
macro_rules! nz {
    ($n:expr) => {
        const { ::std::num::NonZero::new($n).unwrap() }
    };
}
pub(crate) use nz;

/// Checks at compile time that an error type can travel between threads and
/// be boxed into `dyn Error`.
macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = {
            const fn assert_error<T: ::std::error::Error + Send + Sync + 'static>() {}
            assert_error::<$to_test>();
        };
    };
}
pub(crate) use assert_error_traits;
