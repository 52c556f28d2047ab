/// Byte-encoded frame value for zero amplitude in a time-domain frame.
pub const TIME_DOMAIN_ZERO: u8 = 128;

/// Per-frame audio data polled by the visualizers.
///
/// Frequency frames hold one magnitude byte per bin; time-domain frames hold
/// centred unsigned samples where 128 means silence. Both have
/// `frame_size()` entries, fixed for the lifetime of the source.
pub trait AudioFrameSource {
    fn frame_size(&self) -> usize;

    fn frequency_frame(&mut self, out: &mut [u8]);

    fn time_domain_frame(&mut self, out: &mut [u8]);

    /// Move the playhead. Sources without a timeline ignore this.
    fn seek(&mut self, _seconds: f32) {}
}

/// A source with nothing playing.
#[derive(Clone, Copy, Debug)]
pub struct SilentSource {
    frame_size: usize,
}

impl SilentSource {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size }
    }
}

impl AudioFrameSource for SilentSource {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn frequency_frame(&mut self, out: &mut [u8]) {
        out.fill(0);
    }

    fn time_domain_frame(&mut self, out: &mut [u8]) {
        out.fill(TIME_DOMAIN_ZERO);
    }
}

/// Map a time-domain byte to an amplitude in [-1, 1).
pub fn amplitude(sample: u8) -> f32 {
    (sample as f32 - TIME_DOMAIN_ZERO as f32) / 128.0
}
