//! Live playback: pull-driven chip rendering
//!
//! The audio callback pulls samples from a [`ChipSource`], which owns the chip and renders
//! on demand in fixed-size blocks. Control threads never touch the chip directly; their
//! register writes travel through a bounded lock-free [`RegisterQueue`] that the source
//! drains at block boundaries, so the audio side neither blocks nor allocates.

pub mod queue;
pub mod source;

#[cfg(feature = "streaming")]
pub mod audio_device;

#[cfg(feature = "streaming")]
pub use audio_device::AudioDevice;
pub use queue::{register_queue, PendingWrite, RegisterQueue, RegisterReceiver};
pub use source::{ChipSource, SourceStats};

use crate::render::DEFAULT_SAMPLE_RATE;
use crate::{Result, Ym2151Error};

/// Maximum register writes drained from the queue per rendered block
pub const MAX_WRITES_PER_BLOCK: usize = 256;

/// Configuration for streaming playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Output frames rendered per block
    /// Larger blocks = more latency for live register writes, less per-block overhead
    /// Typical: 256-2048 frames (5ms-43ms at 48kHz)
    pub frames_per_buffer: usize,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono downmix, 2 = stereo)
    pub channels: u16,

    /// Capacity of the control-to-audio register queue
    pub register_queue_capacity: usize,
}

impl StreamConfig {
    /// Create a streaming configuration optimized for low latency
    /// Block = 256 frames ≈ 5ms @ 48kHz
    pub fn low_latency(sample_rate: u32) -> Self {
        StreamConfig {
            frames_per_buffer: 256,
            sample_rate,
            channels: 2,
            register_queue_capacity: 1024,
        }
    }

    /// Create a streaming configuration optimized for stability
    /// Block = 2048 frames ≈ 43ms @ 48kHz
    pub fn stable(sample_rate: u32) -> Self {
        StreamConfig {
            frames_per_buffer: 2048,
            sample_rate,
            channels: 2,
            register_queue_capacity: 4096,
        }
    }

    /// Downmix to one channel
    pub fn mono(mut self) -> Self {
        self.channels = 1;
        self
    }

    /// Get block latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        ((self.frames_per_buffer as f32) / (self.sample_rate as f32)) * 1000.0
    }

    /// Check that every size and rate is usable.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Ym2151Error::ConfigError(
                "sample rate must be greater than 0".into(),
            ));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(Ym2151Error::ConfigError(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.frames_per_buffer == 0 {
            return Err(Ym2151Error::ConfigError(
                "frames_per_buffer must be greater than 0".into(),
            ));
        }
        if self.register_queue_capacity == 0 {
            return Err(Ym2151Error::ConfigError(
                "register_queue_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable(DEFAULT_SAMPLE_RATE)
    }
}
