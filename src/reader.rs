//! Background worker that keeps the slot ring filled.
//!
//! The worker sleeps on the [`WakeSignal`]. Every post from the real-time
//! consumer wakes it once; it then decodes one period into each free slot
//! until the ring is full and goes back to sleep. Exit is cooperative: the
//! flag is only checked right after waking, so a decode call in progress
//! always completes first.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::{OutputConfig, ShortReadPolicy};
use crate::constants::PERIOD_FRAMES;
use crate::decoder::{DecodeError, DecodeSource};
use crate::signal::WakeSignal;
use crate::slots::{SlotState, SlotWriter};
use crate::{FrameCount, SampleFormat};

/// Why the worker stopped producing slots.
#[derive(Debug, thiserror::Error)]
enum Halt {
    #[error("the source returned {read} frames, short of a full period, before its end")]
    ShortRead { read: usize },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// State owned by the worker thread alone.
struct ReaderState {
    source: Box<dyn DecodeSource>,
    writer: SlotWriter,
    encoding: SampleFormat,
    frame_bytes: usize,
    short_read: ShortReadPolicy,
    /// Frames decoded so far; the position stamped on the next slot.
    playback_frames: FrameCount,
}

impl ReaderState {
    /// Fills every free slot, one at a time.
    fn fill(&mut self) -> Result<(), Halt> {
        if !self.encoding.is_streamable() {
            return Err(DecodeError::UnsupportedEncoding(self.encoding).into());
        }
        let period_bytes = self.frame_bytes * PERIOD_FRAMES;
        let silence = self.encoding.silence_byte();

        while self.writer.write_available() > 0 {
            let mut region = self.writer.write_region(1);
            if region.is_empty() {
                break;
            }
            let slot = &mut region.slots_mut()[0];
            let payload = &mut slot.payload_mut()[..period_bytes];
            let read = self
                .source
                .read_frames(self.encoding, payload, PERIOD_FRAMES)?;

            let state = if read == 0 {
                payload.fill(silence);
                SlotState::Stopped
            } else {
                if read < PERIOD_FRAMES {
                    match self.short_read {
                        ShortReadPolicy::Halt => return Err(Halt::ShortRead { read }),
                        ShortReadPolicy::ZeroPad => {
                            payload[read * self.frame_bytes..].fill(silence)
                        }
                    }
                }
                SlotState::Playing
            };
            slot.state = state;
            slot.position = self.playback_frames;
            self.playback_frames += read as FrameCount;
            region.commit(1);
        }
        Ok(())
    }
}

/// Ways joining the worker can go wrong.
#[derive(Debug)]
pub(crate) enum JoinError {
    /// The worker did not exit within the timeout and was detached.
    Stalled(Duration),
    /// The worker panicked; its source is lost.
    Panicked,
}

/// Handle to a running reader worker.
pub(crate) struct ReaderWorker {
    handle: JoinHandle<Box<dyn DecodeSource>>,
    done: Receiver<()>,
    primed: Receiver<()>,
    signal: Arc<WakeSignal>,
}

impl ReaderWorker {
    /// Starts a worker that fills `writer` from `source`.
    ///
    /// The worker starts waiting on `signal` right away, so a signal created
    /// with one permit makes it fill the ring before the first callback.
    pub(crate) fn spawn(
        source: Box<dyn DecodeSource>,
        writer: SlotWriter,
        signal: Arc<WakeSignal>,
        config: &OutputConfig,
    ) -> io::Result<Self> {
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let (primed_tx, primed) = crossbeam_channel::bounded::<()>(1);
        let mut state = ReaderState {
            source,
            writer,
            encoding: config.sample_format,
            frame_bytes: config.frame_bytes(),
            short_read: config.short_read,
            playback_frames: 0,
        };
        let worker_signal = signal.clone();

        let handle = thread::Builder::new()
            .name("slotplay-reader".to_owned())
            .spawn(move || {
                // dropped on every exit path, which is what `join` waits for
                let _done = done_tx;
                let mut primed_tx = Some(primed_tx);
                worker_signal.attach_current_thread();
                let mut halted = false;
                loop {
                    worker_signal.wait();
                    if worker_signal.exit_requested() {
                        break;
                    }
                    if halted {
                        continue;
                    }
                    if let Err(e) = state.fill() {
                        tracing::warn!(
                            frames = state.playback_frames,
                            "reader worker halted: {e}"
                        );
                        halted = true;
                    }
                    if let Some(primed_tx) = primed_tx.take() {
                        let _ = primed_tx.try_send(());
                    }
                }
                tracing::debug!(frames = state.playback_frames, "reader worker exiting");
                state.source
            })?;

        Ok(Self {
            handle,
            done,
            primed,
            signal,
        })
    }

    /// Waits at most `timeout` for the worker's first pass over the ring,
    /// whether it filled slots or halted. Returns false on timeout.
    pub(crate) fn wait_primed(&self, timeout: Duration) -> bool {
        !matches!(
            self.primed.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Asks the worker to exit and waits at most `timeout` for it.
    ///
    /// On success the decode source is handed back to the caller.
    pub(crate) fn join(self, timeout: Duration) -> Result<Box<dyn DecodeSource>, JoinError> {
        self.signal.request_exit();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(?timeout, "reader worker did not exit, detaching it");
                return Err(JoinError::Stalled(timeout));
            }
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {}
        }
        self.handle.join().map_err(|_| {
            tracing::error!("reader worker panicked");
            JoinError::Panicked
        })
    }
}
