//! Turns raw analyzer bytes into the smoothed values renderers animate with.

use glam::Vec2;
use serde::Deserialize;

use crate::error::{Result, VizError};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Multiplier applied to raw averages before normalising to [0, 1].
    pub amplification: f32,
    /// Smoothing factor for energy and bass pulse. Fast.
    pub energy_smoothing: f32,
    /// Smoothing factor for hue. Slow.
    pub hue_smoothing: f32,
    /// Weight low bins more when averaging (1 - 0.5 * index / len).
    pub bass_weighted: bool,
    pub idle_base: f32,
    pub idle_depth: f32,
    pub idle_rate_hz: f32,
    /// Smoothing factor pulling the camera toward the pointer.
    pub parallax_smoothing: f32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            amplification: 3.0,
            energy_smoothing: 0.2,
            hue_smoothing: 0.05,
            bass_weighted: true,
            idle_base: 0.2,
            idle_depth: 0.1,
            idle_rate_hz: 0.25,
            parallax_smoothing: 0.05,
        }
    }
}

impl MapperConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, alpha) in [
            ("energy_smoothing", self.energy_smoothing),
            ("hue_smoothing", self.hue_smoothing),
            ("parallax_smoothing", self.parallax_smoothing),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(VizError::InvalidConfig(format!(
                    "{name} must be within (0, 1], got {alpha}"
                )));
            }
        }
        if !(self.amplification.is_finite() && self.amplification > 0.0) {
            return Err(VizError::InvalidConfig(format!(
                "amplification must be positive, got {}",
                self.amplification
            )));
        }
        Ok(())
    }
}

/// Per-session visual state. Reset whenever the source changes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisualParameters {
    /// Smoothed, amplified average energy in [0, 1].
    pub average_energy: f32,
    /// Raw mean of the lowest quarter of bins, 0-255 scale.
    pub bass_energy: f32,
    /// Smoothed, amplified bass energy in [0, 1]. Pulses the 3D scene's scale.
    pub bass_pulse: f32,
    /// Slow-moving value in [0, 1] for colour.
    pub hue: f32,
    /// What strategies animate with: energy, or the idle oscillation.
    pub intensity: f32,
    pub idle: bool,
    /// Camera parallax offset in normalised pointer units.
    pub camera_offset: Vec2,
}

/// Exponential smoothing: `current * (1 - alpha) + raw * alpha`.
pub fn smooth(current: f32, raw: f32, alpha: f32) -> f32 {
    current * (1.0 - alpha) + raw * alpha
}

/// Mean of all bins, optionally weighted toward the low end.
pub fn average_energy(bins: &[u8], bass_weighted: bool) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let len = bins.len() as f32;
    let sum: f32 = bins
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let weight = if bass_weighted { 1.0 - 0.5 * (i as f32 / len) } else { 1.0 };
            b as f32 * weight
        })
        .sum();
    sum / len
}

/// Mean of the lowest quarter of bins.
pub fn bass_energy(bins: &[u8]) -> f32 {
    let quarter = (bins.len() / 4).max(1).min(bins.len());
    if quarter == 0 {
        return 0.0;
    }
    bins[..quarter].iter().map(|&b| b as f32).sum::<f32>() / quarter as f32
}

pub fn idle_oscillation(time: f32, base: f32, depth: f32, rate_hz: f32) -> f32 {
    base + depth * (2.0 * std::f32::consts::PI * rate_hz * time).sin()
}

pub struct ParameterMapper {
    config: MapperConfig,
    params: VisualParameters,
    pointer_target: Vec2,
}

impl ParameterMapper {
    pub fn new(config: MapperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            params: VisualParameters::default(),
            pointer_target: Vec2::ZERO,
        })
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn params(&self) -> &VisualParameters {
        &self.params
    }

    /// Clears per-session state. The camera keeps its pointer target and
    /// offset, since the pointer has not moved.
    pub fn reset(&mut self) {
        let camera_offset = self.params.camera_offset;
        self.params = VisualParameters {
            camera_offset,
            ..VisualParameters::default()
        };
    }

    /// Sets where the camera should drift to, in [-1, 1] on both axes.
    pub fn set_pointer(&mut self, target: Vec2) {
        self.pointer_target = target.clamp(Vec2::splat(-1.0), Vec2::ONE);
    }

    fn normalise(&self, raw: f32) -> f32 {
        (raw * self.config.amplification / 255.0).clamp(0.0, 1.0)
    }

    /// Folds one frame's spectrum into the running parameters.
    pub fn update(&mut self, spectrum: &[u8], time: f32) -> &VisualParameters {
        let cfg = self.config;
        let silent = spectrum.iter().all(|&b| b == 0);

        let energy = self.normalise(average_energy(spectrum, cfg.bass_weighted));
        let bass = bass_energy(spectrum);
        let bass_norm = self.normalise(bass);

        let p = &mut self.params;
        p.average_energy = smooth(p.average_energy, energy, cfg.energy_smoothing);
        p.bass_energy = bass;
        p.bass_pulse = smooth(p.bass_pulse, bass_norm, cfg.energy_smoothing);

        self.settle(silent, time);
        &self.params
    }

    /// Advances the parameters with no spectrum at all, e.g. before a source loads.
    pub fn update_idle(&mut self, time: f32) -> &VisualParameters {
        let cfg = self.config;
        let p = &mut self.params;
        p.average_energy = smooth(p.average_energy, 0.0, cfg.energy_smoothing);
        p.bass_energy = 0.0;
        p.bass_pulse = smooth(p.bass_pulse, 0.0, cfg.energy_smoothing);
        self.settle(true, time);
        &self.params
    }

    fn settle(&mut self, silent: bool, time: f32) {
        let cfg = self.config;
        let p = &mut self.params;
        p.idle = silent;
        p.intensity = if silent {
            idle_oscillation(time, cfg.idle_base, cfg.idle_depth, cfg.idle_rate_hz).clamp(0.0, 1.0)
        } else {
            p.average_energy
        };
        p.hue = smooth(p.hue, p.intensity, cfg.hue_smoothing);
        p.camera_offset += (self.pointer_target - p.camera_offset) * cfg.parallax_smoothing;
    }
}
