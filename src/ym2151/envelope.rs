//! Envelope generator (ADSR)
//!
//! Attenuation is a 10-bit value where 0 is full volume and [`MAX_ATTENUATION`] is silence.
//! The generator is advanced by the chip once every three native samples; within that
//! cadence each rate selects a shift and an increment pattern from the hardware table.

use super::operator::OperatorParams;
use super::tables::attenuation_increment;

/// Silent attenuation level.
pub const MAX_ATTENUATION: u16 = 0x3ff;

/// Envelope phase of an operator.
///
/// There is no separate sustain phase: once the sustain level is reached the operator
/// stays in [`EnvelopeStage::Decay2`], which decays at the D2R rate (0 holds the level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeStage {
    /// Exponential approach towards zero attenuation
    Attack,
    /// Linear decay towards the sustain level
    Decay1,
    /// Linear decay from the sustain level (sustain phase)
    Decay2,
    /// Linear decay after key-off
    Release,
    /// Silent and idle until the next key-on
    Off,
}

impl EnvelopeStage {
    fn rate_index(self) -> usize {
        match self {
            EnvelopeStage::Attack => 0,
            EnvelopeStage::Decay1 => 1,
            EnvelopeStage::Decay2 => 2,
            EnvelopeStage::Release | EnvelopeStage::Off => 3,
        }
    }
}

/// Point-in-time view of an operator envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeSnapshot {
    /// Current stage
    pub stage: EnvelopeStage,
    /// Current attenuation (0 = loudest, 0x3FF = silent)
    pub attenuation: u16,
}

/// Per-operator envelope state.
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    stage: EnvelopeStage,
    attenuation: u16,
    /// Effective 6-bit rates for attack, decay1, decay2, release
    rates: [u8; 4],
    sustain_level: u16,
}

impl EnvelopeGenerator {
    /// Power-on state: `Off`, silent.
    pub fn new() -> Self {
        Self {
            stage: EnvelopeStage::Off,
            attenuation: MAX_ATTENUATION,
            rates: [0; 4],
            sustain_level: 0,
        }
    }

    /// Recompute the effective rates after an operator parameter or key code change.
    pub fn configure(&mut self, params: &OperatorParams, keycode: u32) {
        self.rates = [
            effective_rate(params.attack_rate as u32 * 2, params.key_scale, keycode),
            effective_rate(params.decay1_rate as u32 * 2, params.key_scale, keycode),
            effective_rate(params.decay2_rate as u32 * 2, params.key_scale, keycode),
            effective_rate(params.release_rate as u32 * 4 + 2, params.key_scale, keycode),
        ];
        // D1L 15 maps to the top of the range instead of 15 * 32
        let level = params.decay1_level as u16;
        self.sustain_level = (level | ((level + 1) & 0x10)) << 5;
    }

    /// Enter the attack stage. Rates 62 and 63 reach full volume immediately.
    pub fn key_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
        if self.rates[0] >= 62 {
            self.attenuation = 0;
        }
    }

    /// Enter the release stage from whatever stage is active.
    pub fn key_off(&mut self) {
        if self.stage != EnvelopeStage::Off {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Advance by one envelope tick; `counter` is the global envelope counter.
    pub fn clock(&mut self, counter: u32) {
        if self.stage == EnvelopeStage::Attack && self.attenuation == 0 {
            self.stage = EnvelopeStage::Decay1;
        }
        if self.stage == EnvelopeStage::Decay1 && self.attenuation >= self.sustain_level {
            self.stage = EnvelopeStage::Decay2;
        }
        if self.stage == EnvelopeStage::Off {
            return;
        }

        let rate = self.rates[self.stage.rate_index()] as u32;
        let shift = rate >> 2;
        let counter = counter << shift;
        if counter & 0x7ff != 0 {
            return;
        }
        let index = (counter >> shift.max(11)) & 7;
        let increment = attenuation_increment(rate, index);

        if self.stage == EnvelopeStage::Attack {
            if rate < 62 {
                let attenuation = self.attenuation as i32;
                let next = attenuation + ((!attenuation * increment as i32) >> 4);
                self.attenuation = next.clamp(0, MAX_ATTENUATION as i32) as u16;
            }
            return;
        }

        self.attenuation = (self.attenuation + increment as u16).min(MAX_ATTENUATION);
        if self.attenuation == MAX_ATTENUATION
            && matches!(self.stage, EnvelopeStage::Decay2 | EnvelopeStage::Release)
        {
            self.stage = EnvelopeStage::Off;
        }
    }

    /// Current stage
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Current attenuation
    pub fn attenuation(&self) -> u16 {
        self.attenuation
    }

    /// Copy of the observable state
    pub fn snapshot(&self) -> EnvelopeSnapshot {
        EnvelopeSnapshot {
            stage: self.stage,
            attenuation: self.attenuation,
        }
    }
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn effective_rate(raw: u32, key_scale: u8, keycode: u32) -> u8 {
    if raw == 0 {
        return 0;
    }
    (raw + (keycode >> (key_scale ^ 3))).min(63) as u8
}
