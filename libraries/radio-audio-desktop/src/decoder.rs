//! Packet decoder producing interleaved stereo f32
//!
//! Wraps a symphonia format reader and codec. Every packet is converted to
//! interleaved f32, folded to stereo (mono is duplicated, extra channels are
//! dropped) and, once an output rate is set, resampled with rubato.
//!
//! Sources may be seekable files or forward-only network bodies; the decoder
//! only ever reads forward.

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::io;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Input frames per resampler chunk
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Decoder for one audio track
pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    codec: Box<dyn CodecDecoder>,
    track_id: u32,
    source_rate: Option<u32>,
    output_rate: Option<u32>,
    resampler: Option<StreamResampler>,
    finished: bool,
}

impl TrackDecoder {
    /// Probe a local file
    pub fn open_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        Self::open(Box::new(file), extension)
    }

    /// Probe any media source
    ///
    /// # Arguments
    /// * `source` - Byte source; may be forward-only
    /// * `extension` - Format hint such as `"mp3"`
    pub fn open(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let stream = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".to_string()))?;

        let track_id = track.id;
        let source_rate = track.codec_params.sample_rate;
        let codec = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        tracing::debug!(
            track_id,
            source_rate = source_rate.unwrap_or(0),
            codec = ?track.codec_params.codec,
            "Opened audio track"
        );

        Ok(Self {
            format,
            codec,
            track_id,
            source_rate,
            output_rate: None,
            resampler: None,
            finished: false,
        })
    }

    /// Sample rate declared by the container, if any
    pub fn source_rate(&self) -> Option<u32> {
        self.source_rate
    }

    /// Resample everything decoded from now on to `rate`
    pub fn set_output_rate(&mut self, rate: u32) {
        self.output_rate = Some(rate);
    }

    /// Decode until a non-empty block of samples is ready
    ///
    /// # Returns
    /// * `Ok(Some(samples))` - Interleaved stereo at the output rate
    /// * `Ok(None)` - End of media
    pub fn next_samples(&mut self) -> Result<Option<Vec<f32>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return self.finish();
                }
                Err(SymphoniaError::ResetRequired) => return self.finish(),
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    tracing::debug!("Skipping undecodable packet: {}", reason);
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return self.finish();
                }
                Err(e) => return Err(e.into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let rate = decoded.spec().rate;
            let stereo = to_stereo(decoded);
            let samples = self.resample(rate, stereo)?;
            if !samples.is_empty() {
                return Ok(Some(samples));
            }
        }
    }

    /// Decode the rest of the media into memory
    pub fn decode_all(&mut self) -> Result<Vec<f32>> {
        let mut all = Vec::new();
        while let Some(samples) = self.next_samples()? {
            all.extend_from_slice(&samples);
        }
        Ok(all)
    }

    fn resample(&mut self, rate: u32, stereo: Vec<f32>) -> Result<Vec<f32>> {
        let Some(output_rate) = self.output_rate else {
            return Ok(stereo);
        };
        if rate == 0 || rate == output_rate {
            return Ok(stereo);
        }

        if !matches!(&self.resampler, Some(resampler) if resampler.source_rate == rate) {
            tracing::debug!("Resampling {} Hz -> {} Hz", rate, output_rate);
            self.resampler = Some(StreamResampler::new(rate, output_rate)?);
        }

        match &mut self.resampler {
            Some(resampler) => resampler.push(&stereo),
            None => Ok(stereo),
        }
    }

    fn finish(&mut self) -> Result<Option<Vec<f32>>> {
        self.finished = true;
        let tail = match &mut self.resampler {
            Some(resampler) => resampler.flush()?,
            None => Vec::new(),
        };
        Ok((!tail.is_empty()).then_some(tail))
    }
}

/// Convert a decoded block of any sample format to interleaved stereo f32
fn to_stereo(decoded: AudioBufferRef<'_>) -> Vec<f32> {
    let spec = *decoded.spec();
    let channels = spec.channels.count();
    let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    interleaved.copy_interleaved_ref(decoded);
    fold_to_stereo(interleaved.samples(), channels)
}

/// Fold interleaved frames of `channels` channels into stereo frames
pub(crate) fn fold_to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        _ => samples
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Chunked stereo resampler that keeps leftover frames between calls
struct StreamResampler {
    inner: SincFixedIn<f32>,
    source_rate: u32,
    ratio: f64,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    fn new(source_rate: u32, output_rate: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = f64::from(output_rate) / f64::from(source_rate);
        let inner = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK_FRAMES, 2)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;

        Ok(Self {
            inner,
            source_rate,
            ratio,
            pending: vec![Vec::new(), Vec::new()],
        })
    }

    fn push(&mut self, stereo: &[f32]) -> Result<Vec<f32>> {
        for frame in stereo.chunks_exact(2) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let chunk = [&self.pending[0][..needed], &self.pending[1][..needed]];
            let resampled = self
                .inner
                .process(&chunk[..], None)
                .map_err(|e| AudioError::ResampleError(e.to_string()))?;
            interleave(&resampled, &mut output);

            for channel in &mut self.pending {
                channel.drain(..needed);
            }
        }

        Ok(output)
    }

    /// Resample whatever is left, trimming the zero padding of the last chunk
    fn flush(&mut self) -> Result<Vec<f32>> {
        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Ok(Vec::new());
        }

        let resampled = self
            .inner
            .process_partial(Some(&self.pending[..]), None)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;
        for channel in &mut self.pending {
            channel.clear();
        }

        let mut output = Vec::new();
        interleave(&resampled, &mut output);
        let expected_frames = (remaining as f64 * self.ratio).ceil() as usize;
        output.truncate(expected_frames * 2);
        Ok(output)
    }
}

fn interleave(planar: &[Vec<f32>], output: &mut Vec<f32>) {
    if let [left, right, ..] = planar {
        output.reserve(left.len() * 2);
        for (&l, &r) in left.iter().zip(right) {
            output.push(l);
            output.push(r);
        }
    }
}
