//! Audio backends: the things that own a real-time thread and call the
//! render callback from it.
//!
//! A backend opens one [`BackendStream`] per output. The stream calls the
//! [`RenderCallback`] once per period with a byte buffer that must be filled
//! completely. Once the callback returns [`CallbackResult::Complete`] the
//! stream fills its buffers with silence and stops calling until it is
//! started again.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crate::common::assert_error_traits;
use crate::config::OutputConfig;
use crate::constants::PERIOD_FRAMES;
use crate::{ChannelCount, SampleFormat, SampleRate};

#[cfg(feature = "playback")]
mod device;
#[cfg(feature = "wav_output")]
mod wav_file;

#[cfg(feature = "playback")]
pub use device::{CpalBackend, CpalStream};
#[cfg(feature = "wav_output")]
pub use wav_file::{WavFileBackend, WavFileStream};

/// Format of the stream a backend is asked to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_format: SampleFormat,
    pub sample_rate: SampleRate,
    pub channel_count: ChannelCount,
    /// Frames per callback.
    pub period_frames: usize,
}

impl StreamParams {
    /// Size of one frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channel_count.get() as usize
    }

    /// Time covered by one callback.
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.period_frames as f64 / self.sample_rate.get() as f64)
    }
}

impl From<&OutputConfig> for StreamParams {
    fn from(config: &OutputConfig) -> Self {
        Self {
            sample_format: config.sample_format,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            period_frames: PERIOD_FRAMES,
        }
    }
}

/// Timing of one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackInfo {
    /// Frames the output buffer holds.
    pub frames: usize,
    /// Time until the first frame of this buffer is heard, if known.
    pub output_latency: Option<Duration>,
}

/// What a render callback wants the stream to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    Continue,
    /// The stream is over, output silence from now on.
    Complete,
}

/// Fills one period of interleaved output bytes. Runs on the backend's
/// real-time thread.
pub type RenderCallback =
    Box<dyn FnMut(&mut [u8], &CallbackInfo) -> CallbackResult + Send + 'static>;

/// Errors raised by a backend.
#[derive(Debug, thiserror::Error, Clone)]
pub enum BackendError {
    /// No output device is available on the system.
    #[error("There is no output device")]
    NoDevice,
    /// The backend can not carry a stream with these parameters.
    #[error("stream parameters not supported: {0}")]
    Unsupported(String),
    /// Building the stream failed.
    #[error("could not open the output stream")]
    Open(#[source] Arc<dyn Error + Send + Sync>),
    /// Starting the stream failed.
    #[error("could not start the output stream")]
    Start(#[source] Arc<dyn Error + Send + Sync>),
    /// Stopping the stream failed.
    #[error("could not stop the output stream")]
    Stop(#[source] Arc<dyn Error + Send + Sync>),
}
assert_error_traits! {BackendError}

/// Opens output streams.
pub trait AudioBackend {
    type Stream: BackendStream;

    /// Opens a stopped stream that will drive `callback` once started.
    fn open_stream(
        &self,
        params: StreamParams,
        callback: RenderCallback,
    ) -> Result<Self::Stream, BackendError>;
}

/// An open output stream. Dropping it closes it.
pub trait BackendStream {
    /// Starts or restarts calling the render callback.
    fn start(&mut self) -> Result<(), BackendError>;

    /// Stops calling the render callback. No callback is running once this
    /// returns. Stopping a stopped stream is a no-op.
    fn stop(&mut self) -> Result<(), BackendError>;
}
