use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Analysis window. 256 samples gives the 128 frequency bins the wind
/// mapping was tuned against.
pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

// Wind mapping: mean byte magnitude, minus the noise floor, over the
// sensitivity, clamped to the unit interval. Gameplay balance depends on
// these three numbers.
const NOISE_FLOOR: f32 = 10.0;
const SENSITIVITY: f32 = 50.0;

// Byte-magnitude conversion, matching the analyser the game was tuned on:
// per-bin exponential smoothing, then dB in [-100, -30] mapped onto 0..=255.
const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

const SAMPLE_BACKLOG: usize = FFT_SIZE * 4;

/// Turns raw microphone samples into a single wind-force scalar.
///
/// The FFT plan, scratch buffer and smoothed spectrum are allocated once and
/// reused on every call.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        // Blackman window.
        let window = (0..FFT_SIZE)
            .map(|i| {
                let t = i as f32 / (FFT_SIZE - 1) as f32;
                let a = 2.0 * std::f32::consts::PI * t;
                0.42 - 0.5 * a.cos() + 0.08 * (2.0 * a).cos()
            })
            .collect();
        Analyser {
            fft,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            window,
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Mean byte magnitude across all bins mapped to a wind force in [0,1].
    pub fn wind_level(&mut self, samples: &[f32]) -> f32 {
        let take = samples.len().min(FFT_SIZE);
        let pad = FFT_SIZE - take;
        for slot in &mut self.scratch[..pad] {
            *slot = Complex::new(0.0, 0.0);
        }
        for (i, &s) in samples[samples.len() - take..].iter().enumerate() {
            self.scratch[pad + i] = Complex::new(s * self.window[pad + i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let mut sum = 0.0f32;
        for k in 0..BIN_COUNT {
            let mag = self.scratch[k].norm() / FFT_SIZE as f32;
            self.smoothed[k] = SMOOTHING * self.smoothed[k] + (1.0 - SMOOTHING) * mag;
            let db = 20.0 * (self.smoothed[k] + f32::MIN_POSITIVE).log10();
            let byte = (255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 255.0);
            sum += byte.floor();
        }
        let mean = sum / BIN_COUNT as f32;

        ((mean - NOISE_FLOOR) / SENSITIVITY).clamp(0.0, 1.0)
    }
}

/// Microphone-backed wind sensor. Constructed inert; [`MicSensor::initialize`]
/// opens the capture stream, and from then on [`MicSensor::level`] reads the
/// current wind force. An inactive sensor always reads 0.
pub struct MicSensor {
    stream: Option<cpal::Stream>,
    samples: Arc<Mutex<VecDeque<f32>>>,
    analyser: Analyser,
    frame: Vec<f32>,
}

impl MicSensor {
    pub fn new() -> Self {
        MicSensor {
            stream: None,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(SAMPLE_BACKLOG))),
            analyser: Analyser::new(),
            frame: Vec::with_capacity(FFT_SIZE),
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the default capture device. Failure leaves the sensor inert and
    /// is reported to the caller; a later call may try again.
    pub fn initialize(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no microphone available"))?;
        let config = device
            .default_input_config()
            .context("querying microphone format")?;
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, &self.samples)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, channels, &self.samples)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, channels, &self.samples)
            }
            fmt => Err(anyhow!("unsupported microphone sample format {fmt:?}")),
        }?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Current wind force in [0,1]; 0 whenever the sensor is inactive.
    pub fn level(&mut self) -> f32 {
        if self.stream.is_none() {
            return 0.0;
        }
        self.frame.clear();
        {
            let buf = self.samples.lock().unwrap();
            let start = buf.len().saturating_sub(FFT_SIZE);
            self.frame.extend(buf.iter().skip(start));
        }
        self.analyser.wind_level(&self.frame)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    samples: &Arc<Mutex<VecDeque<f32>>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let shared = Arc::clone(samples);
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut buf = shared.lock().unwrap();
                for frame in data.chunks(channels.max(1)) {
                    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                    buf.push_back(sum / frame.len() as f32);
                }
                while buf.len() > SAMPLE_BACKLOG {
                    buf.pop_front();
                }
            },
            |_err| {},
            None,
        )
        .context("opening microphone stream")?;
    stream.play().context("starting microphone stream")?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize, amplitude: f32) -> Vec<f32> {
        // Deterministic full-band test signal.
        let mut state = 0x2545_f491u64;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let unit = ((state >> 33) % 10_000) as f32 / 10_000.0;
                (unit * 2.0 - 1.0) * amplitude
            })
            .collect()
    }

    #[test]
    fn inactive_sensor_reads_zero() {
        let mut sensor = MicSensor::new();
        assert!(!sensor.is_active());
        assert_eq!(sensor.level(), 0.0);
    }

    #[test]
    fn silence_reads_zero() {
        let mut analyser = Analyser::new();
        for _ in 0..10 {
            assert_eq!(analyser.wind_level(&vec![0.0; FFT_SIZE]), 0.0);
        }
    }

    #[test]
    fn loud_broadband_input_saturates_at_one() {
        let mut analyser = Analyser::new();
        let samples = noise(FFT_SIZE, 1.0);
        let mut level = 0.0;
        // Let the per-bin smoothing settle.
        for _ in 0..50 {
            level = analyser.wind_level(&samples);
        }
        assert_eq!(level, 1.0);
    }

    #[test]
    fn level_is_always_in_the_unit_interval() {
        let mut analyser = Analyser::new();
        for amplitude in [0.0, 1e-6, 1e-3, 0.1, 0.5, 1.0, 10.0] {
            for _ in 0..5 {
                let level = analyser.wind_level(&noise(FFT_SIZE, amplitude));
                assert!((0.0..=1.0).contains(&level), "level {level} out of range");
            }
        }
    }

    #[test]
    fn short_input_is_padded_not_rejected() {
        let mut analyser = Analyser::new();
        let level = analyser.wind_level(&noise(32, 0.5));
        assert!((0.0..=1.0).contains(&level));
    }
}
