use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use dasp_sample::{Sample, ToSample};
use hound::{SampleFormat as WavFormat, WavReader};

use super::{check_output, put_sample, DecodeError, DecodeSource, SourceInfo, SourceOpener};
use crate::SampleFormat;

/// Opens WAV files through `hound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavOpener;

impl SourceOpener for WavOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSource>, DecodeError> {
        Ok(Box::new(WavSource::open(path)?))
    }
}

/// Reports the format of the WAV file at `path` without decoding it.
pub fn inspect(path: impl AsRef<Path>) -> Result<SourceInfo, DecodeError> {
    WavSource::open(path.as_ref()).map(|source| source.info())
}

/// Decoder for the WAV format.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    info: SourceInfo,
}

impl WavSource {
    /// Opens and validates the file at `path`.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let reader = WavReader::open(path).map_err(|e| DecodeError::Open {
            path: path.to_owned(),
            source: Arc::new(e),
        })?;
        let spec = reader.spec();
        let sample_format = match (spec.sample_format, spec.bits_per_sample) {
            (WavFormat::Float, 32) => SampleFormat::F32,
            (WavFormat::Int, 8) => SampleFormat::U8,
            (WavFormat::Int, 16) => SampleFormat::I16,
            (WavFormat::Int, 24) => SampleFormat::I24,
            (WavFormat::Int, 32) => SampleFormat::I32,
            (format, bits) => {
                return Err(DecodeError::UnsupportedFile(format!(
                    "{bits}-bit {format:?} samples"
                )))
            }
        };
        let info = SourceInfo {
            sample_rate: spec.sample_rate,
            channel_count: spec.channels,
            sample_format,
            frame_count: Some(reader.duration() as u64),
        };
        Ok(Self { reader, info })
    }

    fn decode<T, S>(
        &mut self,
        encoding: SampleFormat,
        out: &mut [u8],
        samples: usize,
        convert: impl Fn(T) -> S,
    ) -> Result<usize, DecodeError>
    where
        T: hound::Sample,
        S: Sample + ToSample<f32> + ToSample<i32> + ToSample<i16>,
    {
        let mut offset = 0;
        let mut decoded = 0;
        for sample in self.reader.samples::<T>().take(samples) {
            let sample = sample.map_err(|e| DecodeError::Read(Arc::new(e)))?;
            offset += put_sample(encoding, convert(sample), &mut out[offset..]);
            decoded += 1;
        }
        Ok(decoded)
    }
}

impl DecodeSource for WavSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read_frames(
        &mut self,
        encoding: SampleFormat,
        out: &mut [u8],
        frames: usize,
    ) -> Result<usize, DecodeError> {
        let channels = self.info.channel_count;
        check_output(encoding, channels, out, frames)?;
        let samples = frames * channels as usize;

        let decoded = match self.info.sample_format {
            SampleFormat::F32 => self.decode(encoding, out, samples, |s: f32| s)?,
            SampleFormat::U8 | SampleFormat::I8 => {
                self.decode(encoding, out, samples, |s: i32| s as i8)?
            }
            SampleFormat::I16 => self.decode(encoding, out, samples, |s: i32| s as i16)?,
            SampleFormat::I24 => self.decode(encoding, out, samples, |s: i32| s << 8)?,
            SampleFormat::I32 => self.decode(encoding, out, samples, |s: i32| s)?,
        };
        // a trailing partial frame is dropped
        Ok(decoded / channels as usize)
    }
}
