//! Audio export of rendered chip output
//!
//! Rendering and writing are separate steps: a program is rendered once into a
//! [`RenderedAudio`](crate::render::RenderedAudio) buffer, and that buffer is then
//! written out. A failed write leaves the buffer intact, so it can be retried without
//! clocking the chip again.
//!
//! # Examples
//!
//! ## Export to WAV
//!
//! ```no_run
//! use ym2151::export::{export_program_to_wav, ExportConfig};
//! use ym2151::RegisterProgram;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let program = RegisterProgram::tone(0x4A);
//! export_program_to_wav(&program, "tone.wav", &ExportConfig::stereo().duration(3.0))?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "export-wav")]
mod wav;
#[cfg(feature = "export-wav")]
pub use wav::*;

use crate::render::{RenderConfig, DEFAULT_SAMPLE_RATE};

/// Export configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Sample rate for export (default: 48000 Hz)
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Length of the render in seconds
    pub duration_secs: f64,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_secs: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 2,
            duration_secs: 3.0,
            fade_out_secs: 0.0,
        }
    }
}

impl ExportConfig {
    /// Create config for stereo export
    pub fn stereo() -> Self {
        Self::default()
    }

    /// Create config for mono (L+R averaged) export
    pub fn mono() -> Self {
        Self {
            channels: 1,
            ..Default::default()
        }
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the render length
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration_secs = seconds;
        self
    }

    /// Add fade out at the end
    pub fn fade_out(mut self, seconds: f64) -> Self {
        self.fade_out_secs = seconds;
        self
    }

    /// Renderer settings for this export
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            duration_secs: self.duration_secs,
        }
    }
}

/// Apply a linear fade out to the end of interleaved samples
#[cfg_attr(not(feature = "export-wav"), allow(dead_code))]
fn apply_fade_out(samples: &mut [i16], channels: u16, fade_secs: f64, sample_rate: u32) {
    let channels = channels.max(1) as usize;
    let fade_frames = (fade_secs * sample_rate as f64) as usize;
    if fade_frames == 0 || samples.is_empty() {
        return;
    }

    let frames = samples.len() / channels;
    let start_fade = frames.saturating_sub(fade_frames);
    for (i, frame) in samples.chunks_exact_mut(channels).enumerate().skip(start_fade) {
        let progress = (i - start_fade + 1) as f64 / fade_frames as f64;
        let factor = (1.0 - progress).max(0.0);
        for sample in frame {
            *sample = (*sample as f64 * factor).round() as i16;
        }
    }
}
