use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Every descriptor is computed at this rate.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Mono samples in [-1, 1] at a known rate. Immutable once built.
#[derive(Clone, Debug)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Converts to the analysis rate, resampling only when needed.
    pub fn into_analysis_rate(self) -> Result<Waveform, DecodeError> {
        if self.sample_rate == ANALYSIS_SAMPLE_RATE {
            return Ok(self);
        }
        if self.sample_rate == 0 {
            return Err(DecodeError::UnknownSampleRate);
        }
        if self.samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        let samples = resample(&self.samples, self.sample_rate, ANALYSIS_SAMPLE_RATE)?;
        Ok(Waveform::new(samples, ANALYSIS_SAMPLE_RATE))
    }
}

/// Decodes a file on disk to a mono waveform at [`ANALYSIS_SAMPLE_RATE`].
pub fn decode_file(path: &Path) -> Result<Waveform, DecodeError> {
    let file = std::fs::File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_source(Box::new(file), hint)?.into_analysis_rate()
}

/// Decodes an in-memory container. `extension` is only a probing hint.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<Waveform, DecodeError> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    decode_source(Box::new(Cursor::new(bytes)), hint)?.into_analysis_rate()
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<Waveform, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(DecodeError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Codec)?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(DecodeError::Codec(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(reason)) => {
                log::warn!("Skipping undecodable packet: {}", reason);
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        downmix_into(sample_buf.samples(), channels, &mut all_samples);
    }

    if all_samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s ({} packets skipped)",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32,
        skipped_packets
    );

    Ok(Waveform::new(all_samples, sample_rate))
}

/// Appends the channel average of each interleaved frame.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let resample_err = |source: Box<dyn std::error::Error + Send + Sync>| DecodeError::Resample {
        from: from_rate,
        source,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        samples.len(),
        1, // mono
    )
    .map_err(|e| resample_err(Box::new(e)))?;

    let delay = resampler.output_delay();
    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| resample_err(Box::new(e)))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush until the filter delay is covered; short inputs need several passes.
    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    while output.len() < delay + expected {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| resample_err(Box::new(e)))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    let resampled: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();

    log::debug!(
        "Resampled {} samples at {}Hz to {} samples at {}Hz",
        samples.len(),
        from_rate,
        resampled.len(),
        to_rate
    );

    Ok(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::temporal::peak_amplitude;

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, -0.5, -1.0, -1.0], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.0, -1.0]);
    }

    #[test]
    fn downmix_mono_is_passthrough() {
        let mut out = vec![0.25];
        downmix_into(&[0.1, 0.2], 1, &mut out);
        assert_eq!(out, vec![0.25, 0.1, 0.2]);
    }

    #[test]
    fn analysis_rate_waveform_is_untouched() {
        let wave = Waveform::new(vec![0.1, -0.2, 0.3], ANALYSIS_SAMPLE_RATE);
        let converted = wave.clone().into_analysis_rate().unwrap();
        assert_eq!(converted.samples(), wave.samples());
    }

    #[test]
    fn resampling_halves_length() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();
        let wave = Waveform::new(samples, 44100).into_analysis_rate().unwrap();
        assert_eq!(wave.sample_rate(), ANALYSIS_SAMPLE_RATE);
        assert!((wave.len() as i64 - 22050).abs() <= 1, "got {}", wave.len());
        let peak = peak_amplitude(wave.samples());
        assert!(peak > 0.4 && peak < 0.6);
    }

    #[test]
    fn short_clips_keep_their_resampled_length() {
        for n in [10usize, 200] {
            let samples: Vec<f32> = (0..n).map(|i| 0.5 * (i as f32 * 0.1).sin()).collect();
            let wave = Waveform::new(samples, 44100).into_analysis_rate().unwrap();
            assert_eq!(wave.len(), (n as f64 * 0.5).ceil() as usize, "n = {}", n);
        }
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let err = Waveform::new(vec![0.5; 100], 0).into_analysis_rate().unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSampleRate));
    }

    #[test]
    fn empty_waveform_cannot_be_resampled() {
        let err = Waveform::new(Vec::new(), 44100).into_analysis_rate().unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn garbage_bytes_fail_to_probe() {
        let err = decode_bytes(vec![0x42; 512], Some("wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Probe(_) | DecodeError::Codec(_)));
    }

    #[test]
    fn duration_follows_rate() {
        let wave = Waveform::new(vec![0.0, -0.75, 0.5, 0.0], 4);
        assert_eq!(wave.duration_secs(), 1.0);
        assert_eq!(Waveform::new(vec![0.1], 0).duration_secs(), 0.0);
    }
}
