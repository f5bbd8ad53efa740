use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

use super::context::TapId;
use super::source::{SignalSource, SourceId};
use crate::error::{Result, VizError};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Byte value of a silent time-domain sample.
pub const SILENT_SAMPLE: u8 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    TimeDomain,
    FrequencyDomain,
}

/// Read-only view of the analyzer's latest window.
///
/// Borrowed from the analyzer, so it cannot outlive the frame that read it.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisBuffer<'a> {
    kind: BufferKind,
    data: &'a [u8],
}

impl<'a> AnalysisBuffer<'a> {
    pub fn new(kind: BufferKind, data: &'a [u8]) -> Self {
        Self { kind, data }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the window carries no signal at all.
    pub fn is_silent(&self) -> bool {
        let rest = match self.kind {
            BufferKind::TimeDomain => SILENT_SAMPLE,
            BufferKind::FrequencyDomain => 0,
        };
        self.data.iter().all(|&b| b == rest)
    }
}

/// Both buffers read for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameBuffers<'a> {
    pub waveform: AnalysisBuffer<'a>,
    pub spectrum: AnalysisBuffer<'a>,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_fft_size(self.fft_size)?;
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(VizError::InvalidConfig(format!(
                "smoothing_time_constant must be within [0, 1], got {}",
                self.smoothing_time_constant
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(VizError::InvalidConfig(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }
}

pub fn validate_fft_size(size: usize) -> Result<()> {
    if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
        return Err(VizError::InvalidConfig(format!(
            "fft_size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {size}"
        )));
    }
    Ok(())
}

/// Produces byte-scaled waveform and spectrum windows from one source.
///
/// Bound to the tap it was built for; reading through a tap whose source is
/// no longer current yields silence.
pub struct SpectralAnalyzer {
    tap: TapId,
    source: SourceId,
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    time_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
}

impl SpectralAnalyzer {
    pub fn new(tap: TapId, source: SourceId, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let n = config.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let scratch_len = fft.get_inplace_scratch_len();
        Ok(Self {
            tap,
            source,
            config,
            fft,
            window: blackman_window(n),
            samples: vec![0.0; n],
            spectrum: vec![Complex::new(0.0, 0.0); n],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; n / 2],
            time_bytes: vec![SILENT_SAMPLE; n],
            freq_bytes: vec![0; n / 2],
        })
    }

    pub fn tap(&self) -> TapId {
        self.tap
    }

    pub fn bound_source(&self) -> SourceId {
        self.source
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Changes the frame size in place. Spectral history is discarded.
    pub fn set_fft_size(&mut self, fft_size: usize) -> Result<()> {
        if fft_size == self.config.fft_size {
            return Ok(());
        }
        validate_fft_size(fft_size)?;
        let config = AnalyzerConfig { fft_size, ..self.config };
        *self = Self::new(self.tap, self.source, config)?;
        log::debug!("Analyzer frame size set to {}", fft_size);
        Ok(())
    }

    fn is_bound_to(&self, source: &SignalSource) -> bool {
        if source.id() == self.source {
            return true;
        }
        log::warn!(
            "Analyzer tap {:?} is bound to {:?} but was read with {:?}; returning silence",
            self.tap,
            self.source,
            source.id()
        );
        false
    }

    pub fn read_time_domain(&mut self, source: &SignalSource) -> AnalysisBuffer<'_> {
        self.refresh_time_domain(source);
        AnalysisBuffer::new(BufferKind::TimeDomain, &self.time_bytes)
    }

    pub fn read_frequency_domain(&mut self, source: &SignalSource) -> AnalysisBuffer<'_> {
        self.refresh_frequency_domain(source);
        AnalysisBuffer::new(BufferKind::FrequencyDomain, &self.freq_bytes)
    }

    /// Reads the spectrum, and the waveform when `with_waveform` is set, for one frame.
    pub fn read_frame(&mut self, source: &SignalSource, with_waveform: bool) -> FrameBuffers<'_> {
        self.refresh_frequency_domain(source);
        if with_waveform {
            self.refresh_time_domain(source);
        }
        let waveform: &[u8] = if with_waveform { &self.time_bytes } else { &[] };
        FrameBuffers {
            waveform: AnalysisBuffer::new(BufferKind::TimeDomain, waveform),
            spectrum: AnalysisBuffer::new(BufferKind::FrequencyDomain, &self.freq_bytes),
        }
    }

    fn refresh_time_domain(&mut self, source: &SignalSource) {
        if !self.is_bound_to(source) {
            self.time_bytes.fill(SILENT_SAMPLE);
            return;
        }
        source.copy_window(&mut self.samples);
        for (byte, &s) in self.time_bytes.iter_mut().zip(self.samples.iter()) {
            *byte = sample_to_byte(s);
        }
    }

    fn refresh_frequency_domain(&mut self, source: &SignalSource) {
        if !self.is_bound_to(source) {
            self.freq_bytes.fill(0);
            self.smoothed.fill(0.0);
            return;
        }
        source.copy_window(&mut self.samples);

        for ((bin, &s), &w) in self.spectrum.iter_mut().zip(self.samples.iter()).zip(self.window.iter()) {
            *bin = Complex::new(s * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let n = self.config.fft_size as f32;
        let tau = self.config.smoothing_time_constant;
        let min_db = self.config.min_decibels;
        let range = self.config.max_decibels - min_db;

        for (k, byte) in self.freq_bytes.iter_mut().enumerate() {
            let magnitude = self.spectrum[k].norm() / n;
            let mut value = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            self.smoothed[k] = value;

            let db = if value > 0.0 { 20.0 * value.log10() } else { f32::NEG_INFINITY };
            *byte = (255.0 / range * (db - min_db)).clamp(0.0, 255.0) as u8;
        }
    }
}

fn sample_to_byte(sample: f32) -> u8 {
    if !sample.is_finite() {
        return SILENT_SAMPLE;
    }
    (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5f32;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos() + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}
