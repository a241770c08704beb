//! Glitch-free streaming of decoded audio into a real-time playback callback.
//!
//! An [`Output`] owns one backend stream. [`Output::play`] opens a file and
//! starts a reader worker thread that decodes it, one period at a time, into
//! a fixed ring of slots. The backend's real-time callback drains one slot
//! per call without blocking, allocating or waiting on the worker, and keeps
//! a small playback clock up to date that callers can poll.
//!
//! ```text
//!  file ──> reader worker ──> slot ring ──> real-time callback ──> device
//!              ^                                   │
//!              └──────────── wake signal ──────────┘
//! ```
//!
//! # Basic usage
//!
#![cfg_attr(feature = "playback", doc = "```no_run")]
#![cfg_attr(not(feature = "playback"), doc = "```ignore")]
//! use slotplay::backend::CpalBackend;
//! use slotplay::{Output, OutputConfig, SampleFormat};
//! use std::num::NonZero;
//! use std::time::Duration;
//!
//! let backend = CpalBackend::default_device()?;
//! let config = OutputConfig::new(
//!     SampleFormat::F32,
//!     NonZero::new(48_000).unwrap(),
//!     NonZero::new(2).unwrap(),
//! );
//! let mut output = Output::new(&backend, config)?;
//!
//! output.play("speech.wav")?;
//! while output.is_playing() {
//!     println!("{:?}", output.time_in_playback()?);
//!     std::thread::sleep(Duration::from_millis(250));
//! }
//! output.stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The file must match the output's sample rate and channel count exactly,
//! nothing is resampled or remixed. Use [`inspect`] to check a file first.
//!
//! # Backends
//!
//! - [`backend::CpalBackend`] plays through a sound card (feature `playback`).
//! - [`backend::WavFileBackend`] renders into a WAV file (feature
//!   `wav_output`).
//!
//! Anything implementing [`backend::AudioBackend`] can drive an output.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod clock;
mod common;
mod config;
mod consumer;
mod output;
mod reader;
mod signal;
mod strategy;

pub mod backend;
pub mod constants;
pub mod decoder;
pub mod slots;

pub use crate::clock::{ClockHandle, PlaybackClock, TimeError};
pub use crate::common::{ChannelCount, FrameCount, SampleFormat, SampleRate};
pub use crate::config::{ConfigError, OutputConfig, ShortReadPolicy};
pub use crate::decoder::{DecodeError, DecodeSource, SourceInfo, SourceOpener};
#[cfg(feature = "wav")]
pub use crate::decoder::{inspect, WavOpener, WavSource};
pub use crate::output::{Error, LifecycleState, Output};
