//! The render callback of a streaming output.
//!
//! [`StreamConsumer::render`] runs on the backend's real-time thread. It
//! never allocates and never waits on the reader worker: the wake signal is
//! only posted, the slot ring is lock free and the clock is only locked
//! blockingly for the first slot and at the end of the stream.

use std::sync::Arc;

use crate::backend::{CallbackInfo, CallbackResult};
use crate::clock::PlaybackClock;
use crate::config::OutputConfig;
use crate::constants::PERIOD_FRAMES;
use crate::signal::WakeSignal;
use crate::slots::{SlotReader, SlotState};

/// Drains one slot per callback into the backend's buffer.
pub(crate) struct StreamConsumer {
    reader: SlotReader,
    signal: Arc<WakeSignal>,
    clock: Arc<PlaybackClock>,
    clock_started: bool,
    period_bytes: usize,
    sample_rate: f64,
    silence: u8,
}

impl StreamConsumer {
    pub(crate) fn new(
        reader: SlotReader,
        signal: Arc<WakeSignal>,
        clock: Arc<PlaybackClock>,
        config: &OutputConfig,
    ) -> Self {
        Self {
            reader,
            signal,
            clock,
            clock_started: false,
            period_bytes: config.period_bytes(),
            sample_rate: config.sample_rate.get() as f64,
            silence: config.sample_format.silence_byte(),
        }
    }

    /// Fills `out` with the next slot.
    pub(crate) fn render(&mut self, out: &mut [u8], info: &CallbackInfo) -> CallbackResult {
        self.signal.post();

        if info.frames != PERIOD_FRAMES || self.reader.read_available() == 0 {
            return self.finish(out);
        }
        let region = self.reader.read_region(1);
        let Some(slot) = region.slots().first() else {
            out.fill(self.silence);
            self.clock.mark_stopped();
            return CallbackResult::Complete;
        };

        let copied = self.period_bytes.min(out.len());
        out[..copied].copy_from_slice(&slot.payload()[..copied]);
        out[copied..].fill(self.silence);

        let position = slot.position as f64 / self.sample_rate;
        let state = slot.state;
        if !self.clock_started {
            self.clock.start_at(position);
            self.clock_started = true;
        } else {
            self.clock.try_advance(position);
        }
        region.commit(1);

        match state {
            SlotState::Playing => CallbackResult::Continue,
            SlotState::Stopped => {
                self.clock.mark_stopped();
                CallbackResult::Complete
            }
        }
    }

    fn finish(&self, out: &mut [u8]) -> CallbackResult {
        out.fill(self.silence);
        self.clock.mark_stopped();
        CallbackResult::Complete
    }

    /// Discards whatever the reader worker left in the ring. Returns the
    /// number of slots dropped.
    pub(crate) fn flush(&mut self) -> usize {
        self.reader.flush()
    }
}
