//! Clock bridge between the chip's master clock and the host sample rate
//!
//! For each output sample the bridge adds the internal rate to an integer carry and issues
//! as many clock steps as whole output periods fit into it. No fractional error is ever
//! dropped, so after `T` output samples exactly `floor(T * internal / output)` steps have
//! been issued, and the long-term pitch matches the chip clock.

use crate::backend::ChipBackend;
use crate::ym2151::StereoSample;
use crate::{Result, Ym2151Error};

/// Drift-free master clock to output sample rate converter.
#[derive(Debug, Clone)]
pub struct ClockBridge {
    internal_hz: u64,
    output_hz: u64,
    carry: u64,
    last: StereoSample,
    total_steps: u64,
    total_samples: u64,
}

impl ClockBridge {
    /// Create a bridge from `internal_hz` (chip master clock) to `output_hz`.
    ///
    /// # Errors
    ///
    /// Returns [`Ym2151Error::ConfigError`] if either rate is zero.
    pub fn new(internal_hz: u32, output_hz: u32) -> Result<Self> {
        if internal_hz == 0 || output_hz == 0 {
            return Err(Ym2151Error::ConfigError(format!(
                "clock bridge rates must be non-zero (internal {internal_hz} Hz, output {output_hz} Hz)"
            )));
        }
        Ok(Self {
            internal_hz: internal_hz as u64,
            output_hz: output_hz as u64,
            carry: 0,
            last: StereoSample::SILENCE,
            total_steps: 0,
            total_samples: 0,
        })
    }

    /// Bridge from a chip's own master clock.
    pub fn for_chip<C: ChipBackend>(chip: &C, output_hz: u32) -> Result<Self> {
        Self::new(chip.clock_hz(), output_hz)
    }

    /// Clock the chip for one output sample and return the box-averaged output.
    ///
    /// When the internal clock is slower than the output rate some samples get no clock
    /// step at all; those repeat the previous output.
    pub fn produce_sample<C: ChipBackend>(&mut self, chip: &mut C) -> StereoSample {
        self.carry += self.internal_hz;
        let steps = self.carry / self.output_hz;
        self.carry -= steps * self.output_hz;
        self.total_samples += 1;

        if steps == 0 {
            return self.last;
        }

        let (mut left, mut right) = (0i64, 0i64);
        for _ in 0..steps {
            let out = chip.clock_step();
            left += out.left as i64;
            right += out.right as i64;
        }
        self.total_steps += steps;

        self.last = StereoSample {
            left: (left / steps as i64) as i16,
            right: (right / steps as i64) as i16,
        };
        self.last
    }

    /// Fill an interleaved stereo buffer (`buffer.len()` must be even).
    pub fn fill_stereo<C: ChipBackend>(&mut self, chip: &mut C, buffer: &mut [i16]) {
        for frame in buffer.chunks_exact_mut(2) {
            let sample = self.produce_sample(chip);
            frame[0] = sample.left;
            frame[1] = sample.right;
        }
    }

    /// Clock steps issued so far
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Output samples produced so far
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Internal clock rate in Hz
    pub fn internal_hz(&self) -> u32 {
        self.internal_hz as u32
    }

    /// Output sample rate in Hz
    pub fn output_hz(&self) -> u32 {
        self.output_hz as u32
    }
}
