use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use hound::{WavSpec, WavWriter};

use super::{
    AudioBackend, BackendError, BackendStream, CallbackInfo, CallbackResult, RenderCallback,
    StreamParams,
};
use crate::SampleFormat;

type FileWriter = WavWriter<BufWriter<File>>;

/// Renders into a WAV file instead of a device.
///
/// Each opened stream creates (or overwrites) the file and drives the render
/// callback from its own thread, one period per period duration, so the
/// reader worker sees the same pacing as with a sound card. The file is
/// finalized when the stream is dropped.
#[derive(Debug, Clone)]
pub struct WavFileBackend {
    path: PathBuf,
}

impl WavFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

impl AudioBackend for WavFileBackend {
    type Stream = WavFileStream;

    fn open_stream(
        &self,
        params: StreamParams,
        callback: RenderCallback,
    ) -> Result<WavFileStream, BackendError> {
        let (bits_per_sample, sample_format) = match params.sample_format {
            SampleFormat::F32 => (32, hound::SampleFormat::Float),
            SampleFormat::I32 => (32, hound::SampleFormat::Int),
            SampleFormat::I16 => (16, hound::SampleFormat::Int),
            other => {
                return Err(BackendError::Unsupported(format!(
                    "{other} can not be written to a wav file"
                )))
            }
        };
        let spec = WavSpec {
            channels: params.channel_count.get(),
            sample_rate: params.sample_rate.get(),
            bits_per_sample,
            sample_format,
        };
        let writer = WavWriter::create(&self.path, spec)
            .map_err(|e| BackendError::Open(Arc::new(e)))?;
        tracing::debug!(path = %self.path.display(), ?params, "opened wav output");

        Ok(WavFileStream {
            pump: Arc::new(Mutex::new(Pump {
                callback,
                writer: Some(writer),
                buffer: vec![0; params.frame_bytes() * params.period_frames],
                params,
            })),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }
}

struct Pump {
    callback: RenderCallback,
    writer: Option<FileWriter>,
    buffer: Vec<u8>,
    params: StreamParams,
}

impl Pump {
    /// Renders and writes one period. Returns false once the stream is over.
    fn period(&mut self) -> bool {
        let info = CallbackInfo {
            frames: self.params.period_frames,
            output_latency: None,
        };
        let result = (self.callback)(&mut self.buffer, &info);
        let Some(writer) = self.writer.as_mut() else {
            return false;
        };
        if let Err(e) = write_samples(writer, self.params.sample_format, &self.buffer) {
            tracing::error!("could not write to wav output: {e}");
            return false;
        }
        result == CallbackResult::Continue
    }
}

fn write_samples(
    writer: &mut FileWriter,
    format: SampleFormat,
    bytes: &[u8],
) -> Result<(), hound::Error> {
    match format {
        SampleFormat::F32 => {
            for chunk in bytes.chunks_exact(4) {
                let mut sample = [0; 4];
                sample.copy_from_slice(chunk);
                writer.write_sample(f32::from_ne_bytes(sample))?;
            }
        }
        SampleFormat::I32 => {
            for chunk in bytes.chunks_exact(4) {
                let mut sample = [0; 4];
                sample.copy_from_slice(chunk);
                writer.write_sample(i32::from_ne_bytes(sample))?;
            }
        }
        SampleFormat::I16 => {
            for chunk in bytes.chunks_exact(2) {
                writer.write_sample(i16::from_ne_bytes([chunk[0], chunk[1]]))?;
            }
        }
        // refused in `open_stream`
        SampleFormat::I24 | SampleFormat::I8 | SampleFormat::U8 => {}
    }
    Ok(())
}

/// A stream opened by [`WavFileBackend`].
pub struct WavFileStream {
    pump: Arc<Mutex<Pump>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BackendStream for WavFileStream {
    fn start(&mut self) -> Result<(), BackendError> {
        self.stop()?;
        self.running.store(true, Ordering::Release);
        let pump = self.pump.clone();
        let running = self.running.clone();
        let period = pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .params
            .period_duration();

        let thread = thread::Builder::new()
            .name("slotplay-wav-output".to_owned())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    let more = pump.lock().unwrap_or_else(PoisonError::into_inner).period();
                    if !more {
                        break;
                    }
                    thread::sleep(period);
                }
            })
            .map_err(|e| BackendError::Start(Arc::new(e)))?;
        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("wav output thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for WavFileStream {
    fn drop(&mut self) {
        let _ = self.stop();
        let writer = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .take();
        if let Some(writer) = writer {
            if let Err(e) = writer.finalize() {
                tracing::error!("could not finalize wav output: {e}");
            }
        }
    }
}
