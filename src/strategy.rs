//! What the backend's render callback currently does.
//!
//! An output opens its backend stream once, with a callback that dispatches
//! to the [`Strategy`] in a shared cell. The lifecycle code swaps the
//! strategy only while the stream is stopped; the real-time side uses
//! `try_lock` and outputs silence if it ever loses that race.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use crate::backend::{CallbackInfo, CallbackResult, RenderCallback};
use crate::consumer::StreamConsumer;
use crate::decoder::put_sample;
use crate::{ChannelCount, SampleFormat, SampleRate};

/// Peak level of the test tone.
const TONE_AMPLITUDE: f64 = 0.5;

pub(crate) enum Strategy {
    /// Nothing to play.
    Idle,
    Stream(StreamConsumer),
    Tone(SineTone),
}

impl Strategy {
    fn render(&mut self, out: &mut [u8], info: &CallbackInfo, silence: u8) -> CallbackResult {
        match self {
            Strategy::Idle => {
                out.fill(silence);
                CallbackResult::Complete
            }
            Strategy::Stream(consumer) => consumer.render(out, info),
            Strategy::Tone(tone) => tone.render(out),
        }
    }
}

pub(crate) type SharedStrategy = Arc<Mutex<Strategy>>;

/// Builds the callback handed to the backend.
pub(crate) fn render_callback(shared: SharedStrategy, silence: u8) -> RenderCallback {
    Box::new(move |out, info| match shared.try_lock() {
        Ok(mut strategy) => strategy.render(out, info, silence),
        Err(TryLockError::WouldBlock) => {
            out.fill(silence);
            CallbackResult::Continue
        }
        Err(TryLockError::Poisoned(_)) => {
            out.fill(silence);
            CallbackResult::Complete
        }
    })
}

/// Installs `next` and returns the strategy it replaced.
pub(crate) fn swap(shared: &SharedStrategy, next: Strategy) -> Strategy {
    let mut current = shared.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *current, next)
}

/// Sine wave written identically to every channel.
pub(crate) struct SineTone {
    phase: f64,
    step: f64,
    encoding: SampleFormat,
    channels: usize,
}

impl SineTone {
    pub(crate) fn new(
        frequency: f64,
        encoding: SampleFormat,
        sample_rate: SampleRate,
        channel_count: ChannelCount,
    ) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / sample_rate.get() as f64,
            encoding,
            channels: channel_count.get() as usize,
        }
    }

    fn render(&mut self, out: &mut [u8]) -> CallbackResult {
        let sample_bytes = self.encoding.bytes_per_sample();
        for frame in out.chunks_exact_mut(sample_bytes * self.channels) {
            let value = (TONE_AMPLITUDE * self.phase.sin()) as f32;
            for sample in frame.chunks_exact_mut(sample_bytes) {
                put_sample(self.encoding, value, sample);
            }
            self.phase = (self.phase + self.step) % TAU;
        }
        CallbackResult::Continue
    }
}
