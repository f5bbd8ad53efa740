//! Headless wgpu device for the bloom pass.

use anyhow::{Context, Result};

use super::raster::MAX_SIDE;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Largest square texture we will ask the device for.
pub fn texture_side_limit(limits: &wgpu::Limits) -> u32 {
    limits.max_texture_dimension_2d.min(MAX_SIDE)
}

/// Downlevel limits, raised only as far as the adapter allows texture size to grow.
pub fn bloom_limits(adapter_limits: &wgpu::Limits) -> wgpu::Limits {
    let side = texture_side_limit(adapter_limits);
    wgpu::Limits {
        max_texture_dimension_1d: side,
        max_texture_dimension_2d: side,
        ..wgpu::Limits::downlevel_defaults()
    }
}

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    max_side: u32,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::DX12,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("No GPU adapter available for bloom")?;

        let limits = bloom_limits(&adapter.limits());
        let info = adapter.get_info();
        log::info!(
            "Bloom on GPU: {} ({:?}), textures up to {}px",
            info.name,
            info.backend,
            limits.max_texture_dimension_2d
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("cosmoscope_bloom"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    ..Default::default()
                },
                None,
            )
            .await
            .context("Failed to open GPU device for bloom")?;

        // Errors outside a scope are logged; the pass that hit them already fell back.
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| log::error!("Uncaptured GPU error: {}", err)));

        Ok(Self {
            device,
            queue,
            max_side: limits.max_texture_dimension_2d,
        })
    }

    /// Whether a `width` x `height` frame fits the device's textures.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.max_side && height <= self.max_side
    }

    /// Runs `work` inside validation and out-of-memory error scopes.
    pub fn checked<T>(&self, work: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = work();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(memory) {
            anyhow::bail!("GPU error: {}", err);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_follow_adapter_texture_size() {
        let adapter = wgpu::Limits {
            max_texture_dimension_2d: 8192,
            ..wgpu::Limits::default()
        };
        let limits = bloom_limits(&adapter);
        assert_eq!(limits.max_texture_dimension_2d, 8192);
        assert_eq!(limits.max_texture_dimension_1d, 8192);
        assert_eq!(
            limits.max_bind_groups,
            wgpu::Limits::downlevel_defaults().max_bind_groups
        );
    }

    #[test]
    fn test_side_limit_never_exceeds_raster() {
        let huge = wgpu::Limits {
            max_texture_dimension_2d: 65_536,
            ..wgpu::Limits::default()
        };
        assert_eq!(texture_side_limit(&huge), MAX_SIDE);
    }
}
