pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod tessellate;
pub mod text;

use anyhow::Result;

use crate::animation::FrameInfo;
use crate::encode::ffmpeg::{EncoderSettings, FfmpegEncoder};
use crate::scene::{Camera, Scene};
use frame::{FrameRenderer, TEXTURE_FORMAT};
use gpu::GpuContext;
use pipeline::{ScenePipelines, SceneUniforms};
use tessellate::Tessellator;
use text::{format_elapsed, TextOverlay};

/// Host side of the render step: receives the scene once per tick.
pub trait FrameSink {
    fn render(&mut self, frame: &FrameInfo, scene: &mut Scene) -> Result<()>;

    /// Flush whatever the sink buffered. Called once after the last frame.
    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Discards frames. Used for dry runs.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: u64,
}

impl NullSink {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for NullSink {
    fn render(&mut self, _frame: &FrameInfo, scene: &mut Scene) -> Result<()> {
        scene.mark_clean();
        self.frames += 1;
        Ok(())
    }
}

pub struct OverlayOptions {
    pub overlay: TextOverlay,
    pub show_label: bool,
    pub show_time: bool,
}

/// Rasterises each frame offscreen and pipes it to ffmpeg.
pub struct VideoSink {
    gpu: GpuContext,
    pipelines: ScenePipelines,
    renderer: FrameRenderer,
    tessellator: Tessellator,
    camera: Camera,
    encoder: FfmpegEncoder,
    overlay: Option<OverlayOptions>,
}

impl VideoSink {
    pub fn new(camera: Camera, encoder: &EncoderSettings, overlay: Option<OverlayOptions>) -> Result<Self> {
        log::info!("Initializing GPU...");
        let gpu = GpuContext::new(encoder.width, encoder.height)?;
        let pipelines = ScenePipelines::new(&gpu.device, TEXTURE_FORMAT);
        let renderer = FrameRenderer::new(&gpu, &pipelines, encoder.width, encoder.height);

        log::info!("Starting FFmpeg encoder...");
        let encoder = FfmpegEncoder::new(encoder)?;

        Ok(Self {
            gpu,
            pipelines,
            renderer,
            tessellator: Tessellator::default(),
            camera,
            encoder,
            overlay,
        })
    }

    fn draw_overlay(&self, pixels: &mut [u8], frame: &FrameInfo) {
        let Some(options) = &self.overlay else {
            return;
        };
        let (width, height) = (self.renderer.width, self.renderer.height);
        let color = [255u8, 255, 255, 220];
        let margin = (width.min(height) as f32 * 0.05) as u32;
        let overlay = &options.overlay;

        if options.show_label {
            if let Some(kind) = frame.visualizer {
                overlay.composite(pixels, width, height, kind.label(), (margin, margin), color);
            }
        }

        if options.show_time {
            let time = format_elapsed(frame.time);
            let x = width.saturating_sub(margin + overlay.measure_width(&time));
            let y = height.saturating_sub(margin + overlay.line_height());
            overlay.composite(pixels, width, height, &time, (x, y), color);
        }
    }
}

impl FrameSink for VideoSink {
    fn render(&mut self, frame: &FrameInfo, scene: &mut Scene) -> Result<()> {
        let draw_list = self.tessellator.tessellate(scene, &self.camera);
        let uniforms = SceneUniforms::new(self.camera.view_proj());
        let mut pixels =
            self.renderer
                .render_and_readback(&self.gpu, &self.pipelines, &uniforms, &draw_list)?;
        scene.mark_clean();

        self.draw_overlay(&mut pixels, frame);
        self.encoder.write_frame(&pixels)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        log::debug!(
            "Vertex buffers: {} rebuilt, {} reused",
            self.tessellator.rebuilt(),
            self.tessellator.reused()
        );
        log::info!("Finishing encoding...");
        self.encoder.finish()
    }
}
