//! Pull-based sample source that renders the chip on demand

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::queue::RegisterReceiver;
use super::{StreamConfig, MAX_WRITES_PER_BLOCK};
use crate::backend::ChipBackend;
use crate::program::{RegisterProgram, Sequencer};
use crate::resampler::ClockBridge;
use crate::ym2151::{ChipConfig, Ym2151};
use crate::Result;

/// Counters published by a running source.
#[derive(Debug, Default)]
pub struct SourceStats {
    frames_rendered: AtomicU64,
    writes_applied: AtomicU64,
}

impl SourceStats {
    /// Output frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Register writes applied from the program and the live queue
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied.load(Ordering::Relaxed)
    }
}

/// Interleaved f32 sample stream from an owned chip.
///
/// Samples are rendered a block at a time into a buffer allocated once at construction.
/// Live register writes and scheduled program writes are applied between frames; the
/// stop signal is honoured only between frames, never in the middle of one.
pub struct ChipSource<C: ChipBackend = Ym2151> {
    chip: C,
    bridge: ClockBridge,
    sequencer: Sequencer,
    receiver: Option<RegisterReceiver>,
    sample_rate: u32,
    channels: u16,
    buffer: Vec<f32>,
    buffer_len: usize,
    buffer_pos: usize,
    frame: u64,
    frame_limit: Option<u64>,
    finished: Arc<AtomicBool>,
    stats: Arc<SourceStats>,
}

impl ChipSource<Ym2151> {
    /// Source playing a register program on a fresh chip.
    pub fn for_program(program: &RegisterProgram, config: &StreamConfig) -> Result<Self> {
        let chip_config = program
            .clock_hz
            .map(ChipConfig::with_clock)
            .unwrap_or_default();
        chip_config.validate()?;
        Ok(Self::new(Ym2151::with_config(chip_config), config)?
            .with_sequencer(program.schedule(config.sample_rate)))
    }
}

impl<C: ChipBackend> ChipSource<C> {
    /// Source around an existing chip.
    pub fn new(chip: C, config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let bridge = ClockBridge::for_chip(&chip, config.sample_rate)?;
        let buffer_size = config.frames_per_buffer * config.channels as usize;
        log::debug!(
            "Chip source: {} Hz -> {} Hz, {} ch, {} frames per block",
            chip.clock_hz(),
            config.sample_rate,
            config.channels,
            config.frames_per_buffer
        );
        Ok(Self {
            chip,
            bridge,
            sequencer: Sequencer::default(),
            receiver: None,
            sample_rate: config.sample_rate,
            channels: config.channels,
            buffer: vec![0.0; buffer_size],
            buffer_len: 0,
            buffer_pos: 0,
            frame: 0,
            frame_limit: None,
            finished: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SourceStats::default()),
        })
    }

    /// Apply scheduled writes as playback reaches their frames.
    pub fn with_sequencer(mut self, sequencer: Sequencer) -> Self {
        self.sequencer = sequencer;
        self
    }

    /// Accept live writes from a control thread.
    pub fn with_receiver(mut self, receiver: RegisterReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// End the stream after `frames` output frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Flag that stops the stream at the next frame boundary when set.
    pub fn finish_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frame limit, if any
    pub fn frame_limit(&self) -> Option<u64> {
        self.frame_limit
    }

    /// Output frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    /// The chip being played
    pub fn chip(&self) -> &C {
        &self.chip
    }

    /// Render the next block. Returns false when the stream has ended.
    fn render_block(&mut self) -> bool {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }

        let channels = self.channels as usize;
        let mut frames = (self.buffer.len() / channels) as u64;
        if let Some(limit) = self.frame_limit {
            frames = frames.min(limit.saturating_sub(self.frame));
            if frames == 0 {
                self.finished.store(true, Ordering::Release);
                return false;
            }
        }

        let mut applied = match &self.receiver {
            Some(receiver) => receiver.drain_into(&mut self.chip, MAX_WRITES_PER_BLOCK),
            None => 0,
        };

        for out in self.buffer.chunks_exact_mut(channels).take(frames as usize) {
            applied += self.sequencer.apply_due(self.frame, &mut self.chip);
            let sample = self.bridge.produce_sample(&mut self.chip);
            if channels == 1 {
                out[0] = to_f32(sample.mono());
            } else {
                out[0] = to_f32(sample.left);
                out[1] = to_f32(sample.right);
            }
            self.frame += 1;
        }

        self.buffer_len = frames as usize * channels;
        self.buffer_pos = 0;
        self.stats.frames_rendered.store(self.frame, Ordering::Relaxed);
        self.stats
            .writes_applied
            .fetch_add(applied as u64, Ordering::Relaxed);
        true
    }
}

#[inline]
fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

impl<C: ChipBackend> Iterator for ChipSource<C> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let at_frame_start = self.buffer_pos % self.channels as usize == 0;
        if at_frame_start && self.finished.load(Ordering::Acquire) {
            return None;
        }

        if self.buffer_pos >= self.buffer_len && !self.render_block() {
            return None;
        }

        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}
