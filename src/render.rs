//! Offline rendering into an owned sample buffer
//!
//! The renderer drives a chip through a [`ClockBridge`] synchronously, applying a
//! register program at exact output frames. The result is a [`RenderedAudio`] buffer
//! that can be written to a WAV file (possibly more than once) or analysed directly.

use crate::backend::ChipBackend;
use crate::program::{RegisterProgram, Sequencer};
use crate::resampler::ClockBridge;
use crate::ym2151::{ChipConfig, StereoSample, Ym2151};
use crate::{Result, Ym2151Error};

/// Default output sample rate for rendering and playback.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Output format and length of an offline render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// 1 (mono downmix) or 2 (stereo)
    pub channels: u16,
    /// Length in seconds
    pub duration_secs: f64,
}

impl RenderConfig {
    /// Stereo render
    pub fn stereo(sample_rate: u32, duration_secs: f64) -> Self {
        Self {
            sample_rate,
            channels: 2,
            duration_secs,
        }
    }

    /// Mono (L+R averaged) render
    pub fn mono(sample_rate: u32, duration_secs: f64) -> Self {
        Self {
            sample_rate,
            channels: 1,
            duration_secs,
        }
    }

    /// Number of output frames covering the duration
    pub fn frames(&self) -> u64 {
        (self.duration_secs * self.sample_rate as f64).round() as u64
    }

    /// Check rate, channel count and duration.
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
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(Ym2151Error::ConfigError(format!(
                "invalid duration {} s",
                self.duration_secs
            )));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::stereo(DEFAULT_SAMPLE_RATE, 3.0)
    }
}

/// Interleaved 16-bit PCM produced by a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl RenderedAudio {
    /// Wrap interleaved samples
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: u16) -> impl Iterator<Item = i16> + '_ {
        self.samples
            .iter()
            .skip(index as usize)
            .step_by(self.channels.max(1) as usize)
            .copied()
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Normalized f32 samples in [-1.0, 1.0]
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }

    /// Take the sample buffer
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Synchronous chip renderer.
pub struct Renderer<C: ChipBackend = Ym2151> {
    chip: C,
    bridge: ClockBridge,
    sequencer: Sequencer,
    sample_rate: u32,
    channels: u16,
    frame: u64,
}

impl Renderer<Ym2151> {
    /// Renderer for a register program on a freshly reset chip.
    ///
    /// The program's clock override wins over the default chip clock.
    pub fn for_program(program: &RegisterProgram, config: &RenderConfig) -> Result<Self> {
        let chip_config = program
            .clock_hz
            .map(ChipConfig::with_clock)
            .unwrap_or_default();
        chip_config.validate()?;
        let sequencer = program.schedule(config.sample_rate);
        Self::new(Ym2151::with_config(chip_config), sequencer, config)
    }
}

impl<C: ChipBackend> Renderer<C> {
    /// Renderer around an existing chip.
    pub fn new(chip: C, sequencer: Sequencer, config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let bridge = ClockBridge::for_chip(&chip, config.sample_rate)?;
        Ok(Self {
            chip,
            bridge,
            sequencer,
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame: 0,
        })
    }

    /// Render the next `frames` output frames, appending to `out`.
    pub fn render_into(&mut self, frames: u64, out: &mut Vec<i16>) {
        out.reserve(frames as usize * self.channels as usize);
        for _ in 0..frames {
            self.sequencer.apply_due(self.frame, &mut self.chip);
            let sample = self.bridge.produce_sample(&mut self.chip);
            push_frame(out, sample, self.channels);
            self.frame += 1;
        }
    }

    /// Render the next `frames` output frames into a new buffer.
    pub fn render(&mut self, frames: u64) -> RenderedAudio {
        let mut samples = Vec::new();
        self.render_into(frames, &mut samples);
        RenderedAudio::new(samples, self.sample_rate, self.channels)
    }

    /// Output frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    /// The chip being driven
    pub fn chip(&self) -> &C {
        &self.chip
    }

    /// Mutable access for live register writes between renders
    pub fn chip_mut(&mut self) -> &mut C {
        &mut self.chip
    }

    /// Clock bridge statistics
    pub fn bridge(&self) -> &ClockBridge {
        &self.bridge
    }
}

fn push_frame(out: &mut Vec<i16>, sample: StereoSample, channels: u16) {
    if channels == 1 {
        out.push(sample.mono());
    } else {
        out.push(sample.left);
        out.push(sample.right);
    }
}

/// Render a program for `config.duration_secs`.
pub fn render_program(program: &RegisterProgram, config: &RenderConfig) -> Result<RenderedAudio> {
    let mut renderer = Renderer::for_program(program, config)?;
    let frames = config.frames();
    log::info!(
        "Rendering {} frames at {} Hz from a {} Hz clock ({} ch){}",
        frames,
        renderer.bridge().output_hz(),
        renderer.bridge().internal_hz(),
        config.channels,
        program
            .name
            .as_deref()
            .map(|n| format!(" from '{n}'"))
            .unwrap_or_default()
    );
    let audio = renderer.render(frames);
    log::info!(
        "Rendered {:.2} s, {} clock steps, peak {}",
        audio.duration_secs(),
        renderer.bridge().total_steps(),
        audio.peak()
    );
    Ok(audio)
}
