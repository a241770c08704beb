use std::time::Duration;

use crate::common::{assert_error_traits, nz};
use crate::constants::{
    DEFAULT_JOIN_TIMEOUT, DEFAULT_SAMPLE_RATE, DEFAULT_SLOT_COUNT, MAX_CHANNELS, PERIOD_FRAMES,
};
use crate::{ChannelCount, SampleFormat, SampleRate};

/// What the reader worker does when the source returns fewer frames than a
/// full period but has not yet reached its end.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ShortReadPolicy {
    /// Treat the short read as a decode fault and stop producing slots. The
    /// consumer drains what was buffered and then reports completion.
    #[default]
    Halt,
    /// Pad the rest of the slot with silence and keep going.
    ZeroPad,
}

/// Invalid output or stream parameters.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// More channels than a slot can carry.
    #[error("{0} channels requested, at most {max} are supported", max = MAX_CHANNELS)]
    TooManyChannels(u16),
    /// The slot ring must hold a power of two number of slots, and at least two.
    #[error("slot count {0} is not a power of two of at least 2")]
    SlotCount(usize),
    /// The file's sample rate differs from the output's.
    #[error("source sample rate ({source_rate}) does not match the output sample rate ({output_rate})")]
    SampleRateMismatch {
        output_rate: SampleRate,
        source_rate: u32,
    },
    /// The file's channel count differs from the output's.
    #[error("source channel count ({source_channels}) does not match the output channel count ({output_channels})")]
    ChannelMismatch {
        output_channels: ChannelCount,
        source_channels: u16,
    },
    /// The operation needs an encoding the reader can produce.
    #[error("sample format {0} can not be streamed")]
    UnsupportedFormat(SampleFormat),
}
assert_error_traits! {ConfigError}

/// Describes an output's configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutputConfig {
    /// Encoding handed to the backend
    pub sample_format: SampleFormat,
    /// The sample rate the output plays back at
    pub sample_rate: SampleRate,
    /// The number of output channels
    pub channel_count: ChannelCount,
    /// Number of slots buffered between the reader and the consumer
    pub slot_count: usize,
    /// See [`ShortReadPolicy`]
    pub short_read: ShortReadPolicy,
    /// Upper bound on waiting for the reader worker during `stop`
    pub join_timeout: Duration,
}

impl OutputConfig {
    /// A configuration with default buffering for the given stream format.
    pub fn new(
        sample_format: SampleFormat,
        sample_rate: SampleRate,
        channel_count: ChannelCount,
    ) -> Self {
        Self {
            sample_format,
            sample_rate,
            channel_count,
            ..Self::default()
        }
    }

    /// Sets the number of slots in the ring buffer.
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Sets the short read policy.
    pub fn with_short_read(mut self, policy: ShortReadPolicy) -> Self {
        self.short_read = policy;
        self
    }

    /// Sets how long `stop` waits for the reader worker.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Checks the parameters every output must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count.get() as usize > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels(self.channel_count.get()));
        }
        if self.slot_count < 2 || !self.slot_count.is_power_of_two() {
            return Err(ConfigError::SlotCount(self.slot_count));
        }
        Ok(())
    }

    /// Checks that a source with these parameters can play on this output
    /// without any conversion.
    pub fn check_source(&self, sample_rate: u32, channel_count: u16) -> Result<(), ConfigError> {
        if sample_rate != self.sample_rate.get() {
            return Err(ConfigError::SampleRateMismatch {
                output_rate: self.sample_rate,
                source_rate: sample_rate,
            });
        }
        if channel_count != self.channel_count.get() {
            return Err(ConfigError::ChannelMismatch {
                output_channels: self.channel_count,
                source_channels: channel_count,
            });
        }
        Ok(())
    }

    /// Size of one frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channel_count.get() as usize
    }

    /// Size in bytes of the output buffer the backend hands to each callback.
    pub fn period_bytes(&self) -> usize {
        self.frame_bytes() * PERIOD_FRAMES
    }

    /// Time covered by one callback.
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(PERIOD_FRAMES as f64 / self.sample_rate.get() as f64)
    }

    /// Time covered by a completely filled slot ring.
    pub fn buffered_duration(&self) -> Duration {
        self.period_duration() * self.slot_count as u32
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::F32,
            sample_rate: nz!(DEFAULT_SAMPLE_RATE),
            channel_count: nz!(2),
            slot_count: DEFAULT_SLOT_COUNT,
            short_read: ShortReadPolicy::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}
