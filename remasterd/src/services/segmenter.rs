//! Sound-region segmentation
//!
//! Scans decoded audio for silence using windowed RMS analysis and returns
//! the complement: the spans that actually contain sound. Silences shorter
//! than the configured minimum do not split a region.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Audio decode error: {0}")]
    Decode(#[from] hound::Error),
}

/// A contiguous span of audible material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoundRegion {
    pub start_seconds: f32,
    pub end_seconds: f32,
}

impl SoundRegion {
    pub fn duration(&self) -> f32 {
        self.end_seconds - self.start_seconds
    }
}

/// Finds the sound regions of a track.
pub struct Segmenter {
    /// Silence threshold in dB relative to full scale (must be negative)
    threshold_db: f32,
    /// Minimum silence duration that splits two regions, in seconds
    min_silence_secs: f32,
    /// RMS analysis window size in samples
    window_size_samples: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            threshold_db: -40.0,
            min_silence_secs: 0.2,
            window_size_samples: 1024,
        }
    }

    /// Set the silence threshold in dB (must be negative).
    pub fn with_threshold_db(mut self, threshold_db: f32) -> Result<Self, SegmentError> {
        if threshold_db >= 0.0 {
            return Err(SegmentError::InvalidParameters(format!(
                "Threshold must be negative dB, got {}",
                threshold_db
            )));
        }
        self.threshold_db = threshold_db;
        Ok(self)
    }

    /// Set the minimum silence duration in seconds (must not be negative).
    pub fn with_min_silence_secs(mut self, min_silence_secs: f32) -> Result<Self, SegmentError> {
        if min_silence_secs < 0.0 {
            return Err(SegmentError::InvalidParameters(format!(
                "Minimum silence duration must not be negative, got {}",
                min_silence_secs
            )));
        }
        self.min_silence_secs = min_silence_secs;
        Ok(self)
    }

    /// Scan mono samples and return the sound regions in order.
    pub fn scan(
        &self,
        samples: &[f32],
        sample_rate: usize,
    ) -> Result<Vec<SoundRegion>, SegmentError> {
        if sample_rate == 0 {
            return Err(SegmentError::InvalidParameters(
                "Sample rate must be positive".to_string(),
            ));
        }
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let threshold_linear = db_to_linear(self.threshold_db);
        let min_silence_samples = (self.min_silence_secs * sample_rate as f32) as usize;

        // First pass: silences long enough to split regions.
        let mut silences: Vec<(usize, usize)> = Vec::new();
        let mut in_silence = false;
        let mut silence_start = 0usize;

        for (window_idx, window) in samples.chunks(self.window_size_samples).enumerate() {
            let position = window_idx * self.window_size_samples;
            let rms = calculate_rms(window);

            if rms < threshold_linear {
                if !in_silence {
                    in_silence = true;
                    silence_start = position;
                }
            } else if in_silence {
                if position - silence_start >= min_silence_samples {
                    silences.push((silence_start, position));
                }
                in_silence = false;
            }
        }

        // Silence running to the end of the file.
        if in_silence && samples.len() - silence_start >= min_silence_samples {
            silences.push((silence_start, samples.len()));
        }

        // Second pass: everything between the silences is sound.
        let mut regions = Vec::new();
        let mut cursor = 0usize;
        for (start, end) in silences {
            if start > cursor {
                regions.push(make_region(cursor, start, sample_rate));
            }
            cursor = end;
        }
        if cursor < samples.len() {
            regions.push(make_region(cursor, samples.len(), sample_rate));
        }

        tracing::debug!(
            regions = regions.len(),
            threshold_db = self.threshold_db,
            "Segmented audio"
        );

        Ok(regions)
    }
}

/// Decode a WAV file into mono f32 samples (first channel only).
pub fn load_wav_mono(path: &Path) -> Result<(Vec<f32>, usize), SegmentError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((samples, spec.sample_rate as usize))
}

fn make_region(start: usize, end: usize, sample_rate: usize) -> SoundRegion {
    SoundRegion {
        start_seconds: start as f32 / sample_rate as f32,
        end_seconds: end as f32 / sample_rate as f32,
    }
}

/// Convert dB to linear amplitude
fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Calculate RMS amplitude of samples
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: usize = 44100;

    fn tone(duration_secs: f32, amplitude: f32) -> Vec<f32> {
        let count = (duration_secs * RATE as f32) as usize;
        (0..count)
            .map(|i| (i as f32 * 0.1).sin() * amplitude)
            .collect()
    }

    fn quiet(duration_secs: f32) -> Vec<f32> {
        vec![0.0001; (duration_secs * RATE as f32) as usize]
    }

    #[test]
    fn test_splits_on_long_silence() {
        let mut samples = tone(1.0, 0.5);
        samples.extend(quiet(1.0));
        samples.extend(tone(1.0, 0.5));

        let regions = Segmenter::new().scan(&samples, RATE).unwrap();

        assert_eq!(regions.len(), 2);
        assert!(regions[0].start_seconds < 0.05);
        assert!((regions[0].end_seconds - 1.0).abs() < 0.1);
        assert!((regions[1].start_seconds - 2.0).abs() < 0.1);
        assert!((regions[1].end_seconds - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_short_silence_stays_inside_region() {
        let mut samples = tone(1.0, 0.5);
        samples.extend(quiet(0.05));
        samples.extend(tone(1.0, 0.5));

        let regions = Segmenter::new().scan(&samples, RATE).unwrap();

        assert_eq!(regions.len(), 1);
        assert!(regions[0].duration() > 2.0);
    }

    #[test]
    fn test_trims_leading_and_trailing_silence() {
        let mut samples = quiet(0.5);
        samples.extend(tone(1.0, 0.5));
        samples.extend(quiet(0.5));

        let regions = Segmenter::new().scan(&samples, RATE).unwrap();

        assert_eq!(regions.len(), 1);
        assert!((regions[0].start_seconds - 0.5).abs() < 0.1);
        assert!((regions[0].end_seconds - 1.5).abs() < 0.1);
    }

    #[test]
    fn test_all_silence_yields_no_regions() {
        let samples = quiet(2.0);
        let regions = Segmenter::new().scan(&samples, RATE).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let regions = Segmenter::new().scan(&[], RATE).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_threshold_controls_sensitivity() {
        let mut samples = tone(1.0, 0.5);
        // A hum well above -60 dB but below -20 dB.
        samples.extend(vec![0.02; RATE]);
        samples.extend(tone(1.0, 0.5));

        let strict = Segmenter::new()
            .with_threshold_db(-60.0)
            .unwrap()
            .scan(&samples, RATE)
            .unwrap();
        assert_eq!(strict.len(), 1);

        let loose = Segmenter::new()
            .with_threshold_db(-20.0)
            .unwrap()
            .scan(&samples, RATE)
            .unwrap();
        assert_eq!(loose.len(), 2);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Segmenter::new().with_threshold_db(0.0).is_err());
        assert!(Segmenter::new().with_threshold_db(6.0).is_err());
        assert!(Segmenter::new().with_min_silence_secs(-1.0).is_err());
        assert!(Segmenter::new().scan(&[0.1], 0).is_err());
    }

    #[test]
    fn test_load_wav_mono_int_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..1000 {
            writer.write_sample(16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = load_wav_mono(&path).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(samples.len(), 1000);
        assert!((samples[0] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_load_wav_mono_takes_first_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..500 {
            writer.write_sample(16384i16).unwrap(); // left
            writer.write_sample(0i16).unwrap(); // right
        }
        writer.finalize().unwrap();

        let (samples, _) = load_wav_mono(&path).unwrap();
        assert_eq!(samples.len(), 500);
        assert!(samples.iter().all(|s| (*s - 0.5).abs() < 0.001));
    }

    #[test]
    fn test_load_non_wav_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-audio.wav");
        std::fs::write(&path, b"ID3 this is an mp3, honest").unwrap();

        assert!(matches!(
            load_wav_mono(&path),
            Err(SegmentError::Decode(_))
        ));
    }
}
