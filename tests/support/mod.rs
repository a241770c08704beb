#![allow(dead_code)]
//! Shared helpers for the integration tests: a backend whose callback is
//! driven by hand and an in-memory decode source.
//!
//! In its own folder so it is not run as an integration test itself.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use slotplay::backend::{
    AudioBackend, BackendError, BackendStream, CallbackInfo, CallbackResult, RenderCallback,
    StreamParams,
};
use slotplay::decoder::put_sample;
use slotplay::{DecodeError, DecodeSource, SampleFormat, SourceInfo, SourceOpener};

#[derive(Default)]
struct ManualState {
    callback: Option<RenderCallback>,
    params: Option<StreamParams>,
    running: bool,
    completed: bool,
    closed: bool,
    starts: usize,
    fail_next_start: bool,
    fail_stop_after_failed_start: bool,
    fail_next_stop: bool,
}

/// A backend without a real-time thread: the test calls [`pump`] to run
/// one callback. Clones share the opened stream.
///
/// [`pump`]: ManualBackend::pump
#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<ManualState>>,
}

/// The outcome of one callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Pumped {
    pub result: CallbackResult,
    pub bytes: Vec<u8>,
}

impl Pumped {
    pub fn f32_samples(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    pub fn i16_samples(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the callback once, the way a device would. Returns `None` when
    /// the stream is stopped or has completed, in which case the device
    /// would only play silence.
    pub fn pump(&self) -> Option<Pumped> {
        let mut state = self.state.lock().unwrap();
        if !state.running || state.completed {
            return None;
        }
        let params = state.params.expect("stream was opened");
        let mut bytes = vec![0xAA; params.frame_bytes() * params.period_frames];
        let info = CallbackInfo {
            frames: params.period_frames,
            output_latency: Some(Duration::from_millis(5)),
        };
        let callback = state.callback.as_mut().expect("stream was opened");
        let result = callback(&mut bytes, &info);
        if result == CallbackResult::Complete {
            state.completed = true;
        }
        Some(Pumped { result, bytes })
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn params(&self) -> Option<StreamParams> {
        self.state.lock().unwrap().params
    }

    /// Makes the next `start` fail.
    pub fn fail_next_start(&self) {
        self.state.lock().unwrap().fail_next_start = true;
    }

    /// Makes the next `start` fail and the `stop` right after it fail too.
    pub fn fail_next_start_and_stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_next_start = true;
        state.fail_stop_after_failed_start = true;
    }
}

impl AudioBackend for ManualBackend {
    type Stream = ManualStream;

    fn open_stream(
        &self,
        params: StreamParams,
        callback: RenderCallback,
    ) -> Result<ManualStream, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.params = Some(params);
        state.callback = Some(callback);
        Ok(ManualStream {
            state: self.state.clone(),
        })
    }
}

pub struct ManualStream {
    state: Arc<Mutex<ManualState>>,
}

impl BackendStream for ManualStream {
    fn start(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_start) {
            state.fail_next_stop = std::mem::take(&mut state.fail_stop_after_failed_start);
            return Err(BackendError::Start(Arc::new(io::Error::other(
                "device unplugged",
            ))));
        }
        state.running = true;
        state.completed = false;
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.running = false;
        if std::mem::take(&mut state.fail_next_stop) {
            return Err(BackendError::Stop(Arc::new(io::Error::other(
                "device busy",
            ))));
        }
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.running = false;
        state.closed = true;
        state.callback = None;
    }
}

/// Description of an in-memory file.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
    /// Every sample of the file has this value.
    pub level: f32,
    /// Serve at most this many frames per read.
    pub max_read: usize,
    /// While set, reads block.
    pub gate: Option<Arc<AtomicBool>>,
    /// Reads fail once this many frames were served.
    pub fail_after: Option<usize>,
}

impl MemoryFile {
    pub fn new(frames: usize, level: f32) -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            frames,
            level,
            max_read: usize::MAX,
            gate: None,
            fail_after: None,
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_read(mut self, frames: usize) -> Self {
        self.max_read = frames;
        self
    }

    pub fn with_gate(mut self, gate: Arc<AtomicBool>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_failure_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }
}

/// Observes what happened to the sources opened for one file.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    reads: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Probe {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sources that were dropped again.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn wait_for_reads(&self, n: usize) {
        wait_until(|| self.reads() >= n);
    }
}

/// Opens [`MemoryFile`]s registered under a path.
#[derive(Clone, Default)]
pub struct MemoryOpener {
    files: Arc<Mutex<HashMap<PathBuf, (MemoryFile, Probe)>>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, path: impl AsRef<Path>, file: MemoryFile) -> Probe {
        let probe = Probe::default();
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_owned(), (file, probe.clone()));
        probe
    }
}

impl SourceOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSource>, DecodeError> {
        let files = self.files.lock().unwrap();
        let Some((file, probe)) = files.get(path) else {
            return Err(DecodeError::Open {
                path: path.to_owned(),
                source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
            });
        };
        probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            file: file.clone(),
            probe: probe.clone(),
            served: 0,
        }))
    }
}

struct MemorySource {
    file: MemoryFile,
    probe: Probe,
    served: usize,
}

impl DecodeSource for MemorySource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            sample_rate: self.file.sample_rate,
            channel_count: self.file.channels,
            sample_format: SampleFormat::F32,
            frame_count: Some(self.file.frames as u64),
        }
    }

    fn read_frames(
        &mut self,
        encoding: SampleFormat,
        out: &mut [u8],
        frames: usize,
    ) -> Result<usize, DecodeError> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.file.gate {
            while gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
        }
        if self.file.fail_after.is_some_and(|limit| self.served >= limit) {
            return Err(DecodeError::Read(Arc::new(io::Error::new(
                io::ErrorKind::InvalidData,
                "corrupt frame",
            ))));
        }
        slotplay::decoder::check_output(encoding, self.file.channels, out, frames)?;
        let n = frames
            .min(self.file.max_read)
            .min(self.file.frames - self.served);
        let mut offset = 0;
        for _ in 0..n * self.file.channels as usize {
            offset += put_sample(encoding, self.file.level, &mut out[offset..]);
        }
        self.served += n;
        Ok(n)
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `condition` for up to five seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        thread::sleep(Duration::from_millis(1));
    }
}
