// src/frame/skip.rs

//! Render-skip policy used while fast-forwarding.

use crate::config::{FastForwardRender, SharedConfig};

/// Number of candidate frames per rendered frame in automatic mode.
///
/// Aims at roughly eight rendered frames per second: `fps / 8` rounded up to
/// a power of two through the exponent of `fps - 1`, never below 4.
pub fn skip_frequency(fps: f32) -> u32 {
    let mut freq = 1u32;
    if fps > 1.0 {
        let exponent = i64::from((fps - 1.0).to_bits() >> 23);
        let shift = (exponent - 126 - 3).clamp(0, 31);
        freq = 1u32 << shift;
    }
    freq.max(4)
}

#[derive(Debug, Default)]
pub struct RenderSkip {
    counter: u32,
}

impl RenderSkip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether the next frame is drawn. Only the automatic mode
    /// advances the counter.
    pub fn should_skip(&mut self, fps: f32, config: &SharedConfig) -> bool {
        if !config.fastforward || !config.running || config.av_dumping {
            return false;
        }

        match config.fastforward_render {
            FastForwardRender::None => return true,
            FastForwardRender::All => return false,
            FastForwardRender::Auto => {}
        }

        self.counter += 1;
        if self.counter >= skip_frequency(fps) {
            self.counter = 0;
            return false;
        }
        true
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
