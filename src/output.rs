//! The public lifecycle of an output: open, play, stop, delete.
//!
//! An [`Output`] opens its backend stream once and keeps it for its whole
//! life. `play` assembles an [`ActiveStream`] piece by piece; every piece is
//! owned by it, so if any step fails, dropping the partly built value tears
//! down exactly what was acquired and the output is idle again.

use std::error::Error as StdError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::backend::{AudioBackend, BackendError, BackendStream, StreamParams};
use crate::clock::{ClockHandle, PlaybackClock, TimeError};
use crate::common::assert_error_traits;
use crate::config::{ConfigError, OutputConfig};
use crate::consumer::StreamConsumer;
use crate::decoder::{DecodeError, DecodeSource, SourceOpener};
use crate::reader::{JoinError, ReaderWorker};
use crate::signal::WakeSignal;
use crate::slots::SlotBuffer;
use crate::strategy::{self, SharedStrategy, SineTone, Strategy};

/// Errors returned by [`Output`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    /// The output or the file has parameters that can not be played.
    #[error("invalid configuration")]
    BadConfig(#[from] ConfigError),
    /// A thread, stream or other system resource could not be acquired.
    #[error("could not acquire {resource}")]
    ResourceExhausted {
        resource: &'static str,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },
    /// A stream is attached to the output. Call [`Output::stop`] first.
    #[error("a stream is already attached to this output")]
    AlreadyPlaying,
    /// The file could not be opened or decoded.
    #[error("could not decode the source")]
    DecodeFault(#[from] DecodeError),
    /// The output lost its render state after a panic on the real-time
    /// thread and can only be deleted.
    #[error("the output is no longer usable")]
    NotInitialized,
    /// The reader worker did not exit in time and was left running detached.
    #[error("the reader worker did not exit within {waited:?}")]
    WorkerStalled { waited: Duration },
}
assert_error_traits! {Error}

impl Error {
    fn resource(resource: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Error::ResourceExhausted {
            resource,
            source: Arc::new(source),
        }
    }

    fn backend(source: BackendError) -> Self {
        Self::resource("the audio stream", source)
    }
}

/// Where an output is in its lifecycle.
///
/// Teardown happens entirely inside [`Output::stop`], which holds the output
/// exclusively, so there is no observable stopping state in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No stream attached.
    Idle,
    /// A reader worker is attached. The output stays in this state after
    /// the stream reached its end, until [`Output::stop`] is called.
    Playing,
}

/// Everything one `play` call acquires.
///
/// Dropping it releases all of it, in order: idle strategy back in, worker
/// joined, slots flushed, clock disarmed, source closed. The backend stream
/// must be stopped before.
struct ActiveStream {
    strategy: SharedStrategy,
    clock: Arc<PlaybackClock>,
    worker: Option<ReaderWorker>,
    join_timeout: Duration,
    released: bool,
}

impl ActiveStream {
    fn start(
        source: Box<dyn DecodeSource>,
        config: &OutputConfig,
        clock: &Arc<PlaybackClock>,
        shared: &SharedStrategy,
    ) -> Result<Self, Error> {
        clock.arm();
        let mut active = ActiveStream {
            strategy: shared.clone(),
            clock: clock.clone(),
            worker: None,
            join_timeout: config.join_timeout,
            released: false,
        };

        let (writer, reader) = SlotBuffer::new(config.slot_count);
        // one permit so the worker fills the ring before the first callback
        let signal = Arc::new(WakeSignal::new(1));
        let worker = ReaderWorker::spawn(source, writer, signal.clone(), config)
            .map_err(|e| Error::resource("the reader thread", e))?;
        if !worker.wait_primed(config.join_timeout) {
            tracing::warn!("reader worker is slow, starting playback on a partly filled ring");
        }
        active.worker = Some(worker);

        let consumer = StreamConsumer::new(reader, signal, clock.clone(), config);
        strategy::swap(shared, Strategy::Stream(consumer));
        Ok(active)
    }

    fn release(&mut self) -> Result<(), Error> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut consumer = match strategy::swap(&self.strategy, Strategy::Idle) {
            Strategy::Stream(consumer) => Some(consumer),
            _ => None,
        };
        let mut result = Ok(());
        let source = match self.worker.take().map(|w| w.join(self.join_timeout)) {
            Some(Ok(source)) => Some(source),
            Some(Err(JoinError::Stalled(waited))) => {
                result = Err(Error::WorkerStalled { waited });
                None
            }
            Some(Err(JoinError::Panicked)) | None => None,
        };
        if let Some(consumer) = consumer.as_mut() {
            let flushed = consumer.flush();
            tracing::debug!(flushed, "released slot buffer");
        }
        drop(consumer);
        self.clock.disarm();
        drop(source);
        result
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!("stream teardown failed: {e}");
        }
    }
}

/// An audio output playing one file at a time.
///
/// # Example
#[cfg_attr(feature = "playback", doc = "```no_run")]
#[cfg_attr(not(feature = "playback"), doc = "```ignore")]
/// use slotplay::{backend::CpalBackend, Output, OutputConfig};
///
/// let backend = CpalBackend::default_device()?;
/// let mut output = Output::new(&backend, OutputConfig::default())?;
/// output.play("music.wav")?;
/// while output.is_playing() {
///     std::thread::sleep(std::time::Duration::from_millis(100));
/// }
/// output.stop()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Output<B: AudioBackend> {
    config: OutputConfig,
    opener: Box<dyn SourceOpener>,
    stream: B::Stream,
    strategy: SharedStrategy,
    clock: Arc<PlaybackClock>,
    active: Option<ActiveStream>,
}

impl<B: AudioBackend> Output<B> {
    /// Opens an output that plays WAV files.
    #[cfg(feature = "wav")]
    pub fn new(backend: &B, config: OutputConfig) -> Result<Self, Error> {
        Self::with_opener(backend, config, crate::decoder::WavOpener)
    }

    /// Opens an output that reads files through `opener`.
    pub fn with_opener(
        backend: &B,
        config: OutputConfig,
        opener: impl SourceOpener + 'static,
    ) -> Result<Self, Error> {
        config.validate()?;
        let strategy = Arc::new(Mutex::new(Strategy::Idle));
        let callback =
            strategy::render_callback(strategy.clone(), config.sample_format.silence_byte());
        let stream = backend
            .open_stream(StreamParams::from(&config), callback)
            .map_err(Error::backend)?;
        tracing::debug!(?config, "output opened");

        Ok(Self {
            config,
            opener: Box::new(opener),
            stream,
            strategy,
            clock: Arc::new(PlaybackClock::new()),
            active: None,
        })
    }

    /// Starts playing the file at `path`.
    ///
    /// The file must have exactly the output's sample rate and channel
    /// count. On error the output is left idle.
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if self.active.is_some() {
            return Err(Error::AlreadyPlaying);
        }
        if self.strategy.is_poisoned() {
            return Err(Error::NotInitialized);
        }
        let source = self.opener.open(path)?;
        let info = source.info();
        self.config
            .check_source(info.sample_rate, info.channel_count)?;
        self.stream.stop().map_err(Error::backend)?;

        let active = ActiveStream::start(source, &self.config, &self.clock, &self.strategy)?;
        if let Err(e) = self.stream.start() {
            if let Err(stop) = self.stream.stop() {
                tracing::debug!("could not stop stream after failed start: {stop}");
            }
            drop(active);
            return Err(Error::backend(e));
        }
        self.active = Some(active);
        tracing::debug!(path = %path.display(), "playing");
        Ok(())
    }

    /// Stops the stream and releases everything `play` acquired.
    ///
    /// Calling this on an idle output does nothing.
    pub fn stop(&mut self) -> Result<(), Error> {
        let stopped = self.stream.stop().map_err(Error::backend);
        let Some(mut active) = self.active.take() else {
            return stopped;
        };
        let released = active.release();
        tracing::debug!("stopped");
        released.and(stopped)
    }

    /// Stops the output and closes its backend stream.
    ///
    /// Dropping the output does the same but can only log failures.
    pub fn delete(mut self) -> Result<(), Error> {
        self.stop()
    }

    /// Plays a sine wave of `frequency` Hz for `duration`, blocking the
    /// caller, then restores silence.
    pub fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<(), Error> {
        if self.active.is_some() {
            return Err(Error::AlreadyPlaying);
        }
        if !self.config.sample_format.is_streamable() {
            return Err(ConfigError::UnsupportedFormat(self.config.sample_format).into());
        }
        self.stream.stop().map_err(Error::backend)?;

        let tone = SineTone::new(
            frequency,
            self.config.sample_format,
            self.config.sample_rate,
            self.config.channel_count,
        );
        let previous = strategy::swap(&self.strategy, Strategy::Tone(tone));
        let played = self.stream.start().map(|()| thread::sleep(duration));
        let stopped = self.stream.stop();
        strategy::swap(&self.strategy, previous);
        played.and(stopped).map_err(Error::backend)
    }

    /// Whether stream data is currently reaching the backend.
    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// Time played since the first slot of the current stream.
    pub fn time_in_playback(&self) -> Result<Duration, TimeError> {
        self.clock.time_in_playback()
    }

    /// A view of the playback clock that can be used from other threads and
    /// outlive the output.
    pub fn clock_handle(&self) -> ClockHandle {
        ClockHandle::new(Arc::downgrade(&self.clock))
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        if self.active.is_some() {
            LifecycleState::Playing
        } else {
            LifecycleState::Idle
        }
    }
}

impl<B: AudioBackend> Drop for Output<B> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("failed to stop output: {e}");
        }
    }
}
