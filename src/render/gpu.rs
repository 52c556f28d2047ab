use anyhow::{Context, Result};

/// Device and queue for offscreen frame rendering. No surface is created,
/// so this works on headless machines.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire a device able to hold a `width` x `height` render target,
    /// falling back to a software adapter when no hardware one is found.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        pollster::block_on(Self::init(width, height))
    }

    async fn init(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = match find_adapter(&instance, false).await {
            Some(adapter) => adapter,
            None => {
                log::warn!("No hardware GPU adapter, trying software rendering");
                find_adapter(&instance, true)
                    .await
                    .context("No GPU adapter available for offscreen rendering")?
            }
        };
        log::info!("Rendering frames on {}", adapter_summary(&adapter.get_info()));

        let limits = frame_limits(width, height);
        let supported = adapter.limits().max_texture_dimension_2d;
        if limits.max_texture_dimension_2d > supported {
            anyhow::bail!(
                "{}x{} frames exceed the adapter's {}px texture limit",
                width,
                height,
                supported
            );
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("pulseviz frame device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        Ok(Self { device, queue })
    }
}

async fn find_adapter(instance: &wgpu::Instance, software: bool) -> Option<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: software,
        })
        .await
}

/// Downlevel limits, raised just enough for the frame's render target.
fn frame_limits(width: u32, height: u32) -> wgpu::Limits {
    let base = wgpu::Limits::downlevel_defaults();
    wgpu::Limits {
        max_texture_dimension_2d: base.max_texture_dimension_2d.max(width).max(height),
        ..base
    }
}

fn adapter_summary(info: &wgpu::AdapterInfo) -> String {
    format!("{} via {:?} ({:?})", info.name, info.backend, info.device_type)
}
