//! Slotplay common constants

use std::time::Duration;

/// Frames the backend requests per real-time callback, and frames per slot.
pub const PERIOD_FRAMES: usize = 256;

/// The largest channel count an output supports.
pub const MAX_CHANNELS: usize = 2;

/// Largest sample size of any streamable encoding, in bytes.
pub const MAX_SAMPLE_BYTES: usize = 4;

/// Payload capacity of one slot.
pub const SLOT_BYTES: usize = PERIOD_FRAMES * MAX_CHANNELS * MAX_SAMPLE_BYTES;

/// Slots in the ring between the reader worker and the real-time consumer.
/// Must be a power of two.
pub const DEFAULT_SLOT_COUNT: usize = 32;

/// The sample rate (Hz) outputs use by default.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// How long `stop` waits for the reader worker before giving up on it.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
