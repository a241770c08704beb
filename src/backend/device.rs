use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{
    AudioBackend, BackendError, BackendStream, CallbackInfo, CallbackResult, RenderCallback,
    StreamParams,
};

/// Plays through a cpal output device.
pub struct CpalBackend {
    device: cpal::Device,
}

impl fmt::Debug for CpalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalBackend")
            .field("device", &device_name(&self.device))
            .finish()
    }
}

fn device_name(device: &cpal::Device) -> String {
    device
        .description()
        .map_or("unknown".to_string(), |d| d.name().to_string())
}

fn default_error_callback(err: cpal::StreamError) {
    tracing::error!("audio stream error: {err}");
}

impl CpalBackend {
    /// Uses the system's default output device.
    pub fn default_device() -> Result<Self, BackendError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(BackendError::NoDevice)?;
        Ok(Self { device })
    }

    /// Uses a specific device.
    pub fn from_device(device: cpal::Device) -> Self {
        Self { device }
    }
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn open_stream(
        &self,
        params: StreamParams,
        mut callback: RenderCallback,
    ) -> Result<CpalStream, BackendError> {
        let config = cpal::StreamConfig {
            channels: params.channel_count.get(),
            sample_rate: params.sample_rate.get(),
            buffer_size: cpal::BufferSize::Fixed(params.period_frames as u32),
        };
        let completed = Arc::new(AtomicBool::new(false));
        let stream_completed = completed.clone();
        let silence = params.sample_format.silence_byte();
        let frame_bytes = params.frame_bytes();

        let stream = self
            .device
            .build_output_stream_raw(
                &config,
                params.sample_format.into(),
                move |data: &mut cpal::Data, info: &cpal::OutputCallbackInfo| {
                    let out = data.bytes_mut();
                    if stream_completed.load(Ordering::Acquire) {
                        out.fill(silence);
                        return;
                    }
                    let timestamp = info.timestamp();
                    let info = CallbackInfo {
                        frames: out.len() / frame_bytes,
                        output_latency: timestamp.playback.duration_since(&timestamp.callback),
                    };
                    if callback(out, &info) == CallbackResult::Complete {
                        stream_completed.store(true, Ordering::Release);
                    }
                },
                default_error_callback,
                None,
            )
            .map_err(|e| BackendError::Open(Arc::new(e)))?;

        // some hosts start streams as soon as they are built
        if let Err(e) = stream.pause() {
            tracing::debug!("could not pause new stream: {e}");
        }
        tracing::debug!(device = %device_name(&self.device), ?params, "opened output stream");

        Ok(CpalStream { stream, completed })
    }
}

/// A stream opened by [`CpalBackend`].
pub struct CpalStream {
    stream: cpal::Stream,
    completed: Arc<AtomicBool>,
}

impl BackendStream for CpalStream {
    fn start(&mut self) -> Result<(), BackendError> {
        self.completed.store(false, Ordering::Release);
        self.stream
            .play()
            .map_err(|e| BackendError::Start(Arc::new(e)))
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.stream
            .pause()
            .map_err(|e| BackendError::Stop(Arc::new(e)))
    }
}
