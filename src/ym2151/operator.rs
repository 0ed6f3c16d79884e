//! FM operator (slot)
//!
//! One operator is a sine oscillator driven by a 20-bit phase accumulator, shaped by its
//! envelope and total level. Four of them make up a channel.

use super::envelope::{EnvelopeGenerator, EnvelopeSnapshot, EnvelopeStage, MAX_ATTENUATION};
use super::tables::{
    abs_sin_attenuation, attenuation_to_volume, detune1_adjustment, key_code_to_phase_step,
    DETUNE2_DELTA,
};

const PHASE_MASK: u32 = 0xf_ffff;

/// Operator position within a channel, named as in the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    /// Modulator 1 (slot group 0, the feedback operator)
    M1,
    /// Modulator 2 (slot group 1)
    M2,
    /// Carrier 1 (slot group 2)
    C1,
    /// Carrier 2 (slot group 3)
    C2,
}

impl OperatorId {
    /// Operators in algorithm order (op1..op4 of the routing graph).
    pub const ALGORITHM_ORDER: [OperatorId; 4] =
        [OperatorId::M1, OperatorId::C1, OperatorId::M2, OperatorId::C2];

    /// Map the upper two bits of a 5-bit slot number to an operator.
    pub fn from_slot_group(group: u8) -> Self {
        match group & 3 {
            0 => OperatorId::M1,
            1 => OperatorId::M2,
            2 => OperatorId::C1,
            _ => OperatorId::C2,
        }
    }

    /// Index into a channel's operator array (algorithm order).
    pub fn index(self) -> usize {
        match self {
            OperatorId::M1 => 0,
            OperatorId::C1 => 1,
            OperatorId::M2 => 2,
            OperatorId::C2 => 3,
        }
    }

    /// Bit of this operator in the key-on register (0x08).
    pub fn key_on_mask(self) -> u8 {
        match self {
            OperatorId::M1 => 0x08,
            OperatorId::C1 => 0x10,
            OperatorId::M2 => 0x20,
            OperatorId::C2 => 0x40,
        }
    }
}

/// Decoded per-operator registers, already masked to their widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorParams {
    /// DT1 fine detune (0-7, bit 2 = negative)
    pub detune1: u8,
    /// MUL frequency multiplier (0 = x0.5)
    pub multiple: u8,
    /// TL total level (0-127, 0.75 dB steps)
    pub total_level: u8,
    /// KS key scaling (0-3)
    pub key_scale: u8,
    /// AR attack rate (0-31)
    pub attack_rate: u8,
    /// AMS-EN: apply LFO amplitude modulation
    pub am_enable: bool,
    /// D1R first decay rate (0-31)
    pub decay1_rate: u8,
    /// DT2 coarse detune (0-3)
    pub detune2: u8,
    /// D2R second decay rate (0-31)
    pub decay2_rate: u8,
    /// D1L first decay (sustain) level (0-15)
    pub decay1_level: u8,
    /// RR release rate (0-15)
    pub release_rate: u8,
}

/// Channel pitch as seen by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pitch {
    /// Octave, note and 6-bit fraction (13 bits)
    pub block_freq: u32,
    /// 5-bit keycode for key scaling and DT1
    pub keycode: u32,
}

/// Runtime state of a single operator.
#[derive(Debug, Clone)]
pub struct Operator {
    params: OperatorParams,
    pitch: Pitch,
    phase: u32,
    /// Phase step without LFO pitch modulation
    phase_step: u32,
    envelope: EnvelopeGenerator,
    key_held: bool,
    csm_held: bool,
}

impl Operator {
    /// Operator in its power-on state
    pub fn new() -> Self {
        let mut op = Self {
            params: OperatorParams::default(),
            pitch: Pitch::default(),
            phase: 0,
            phase_step: 0,
            envelope: EnvelopeGenerator::new(),
            key_held: false,
            csm_held: false,
        };
        op.refresh();
        op
    }

    /// Current parameters
    pub fn params(&self) -> &OperatorParams {
        &self.params
    }

    /// Replace the parameters, updating the cached phase step and envelope rates.
    pub fn set_params(&mut self, params: OperatorParams) {
        self.params = params;
        self.refresh();
    }

    /// Apply a new channel pitch.
    pub fn set_pitch(&mut self, pitch: Pitch) {
        self.pitch = pitch;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.phase_step = self.compute_phase_step(0);
        self.envelope.configure(&self.params, self.pitch.keycode);
    }

    /// Register key state. Only a rising edge (from fully released) restarts the note.
    pub fn set_key(&mut self, on: bool) {
        let was_on = self.is_keyed();
        self.key_held = on;
        self.apply_key_edge(was_on);
    }

    /// CSM key state driven by timer A.
    pub fn set_csm_key(&mut self, on: bool) {
        let was_on = self.is_keyed();
        self.csm_held = on;
        self.apply_key_edge(was_on);
    }

    fn is_keyed(&self) -> bool {
        self.key_held || self.csm_held
    }

    fn apply_key_edge(&mut self, was_on: bool) {
        match (was_on, self.is_keyed()) {
            (false, true) => {
                self.phase = 0;
                self.envelope.key_on();
            }
            (true, false) => self.envelope.key_off(),
            _ => {}
        }
    }

    /// Phase step for this sample including DT1, DT2, MUL and a PM delta.
    fn compute_phase_step(&self, pm_delta: i32) -> u32 {
        let delta = DETUNE2_DELTA[(self.params.detune2 & 3) as usize] + pm_delta;
        let step = key_code_to_phase_step(self.pitch.block_freq, delta)
            .wrapping_add_signed(detune1_adjustment(self.params.detune1, self.pitch.keycode));
        let multiple = match self.params.multiple & 0xf {
            0 => 1,
            m => (m as u32) * 2,
        };
        (step.wrapping_mul(multiple) >> 1) & PHASE_MASK
    }

    /// Advance phase by one sample and the envelope when `env_counter` is given.
    pub fn clock(&mut self, env_counter: Option<u32>, pm_delta: i32) {
        if let Some(counter) = env_counter {
            self.envelope.clock(counter);
        }
        let step = if pm_delta == 0 {
            self.phase_step
        } else {
            self.compute_phase_step(pm_delta)
        };
        self.phase = self.phase.wrapping_add(step) & PHASE_MASK;
    }

    /// Top 10 bits of the phase accumulator
    pub fn phase(&self) -> u32 {
        (self.phase >> 10) & 0x3ff
    }

    /// Envelope attenuation with TL and AM applied, 10 bits.
    fn envelope_attenuation(&self, am_offset: u32) -> u32 {
        let mut attenuation = self.envelope.attenuation() as u32;
        if self.params.am_enable {
            attenuation += am_offset;
        }
        attenuation += (self.params.total_level as u32 & 0x7f) << 3;
        attenuation.min(MAX_ATTENUATION as u32)
    }

    /// Signed 14-bit output for a (possibly modulated) 10-bit phase.
    pub fn compute_volume(&self, phase: u32, am_offset: u32) -> i32 {
        if self.envelope.stage() == EnvelopeStage::Off {
            return 0;
        }
        let sin_attenuation = abs_sin_attenuation(phase);
        let env_attenuation = self.envelope_attenuation(am_offset) << 2;
        let volume = attenuation_to_volume(sin_attenuation + env_attenuation) as i32;
        if phase & 0x200 != 0 {
            -volume
        } else {
            volume
        }
    }

    /// Noise output: inverted envelope attenuation, signed by the noise bit.
    pub fn compute_noise_volume(&self, am_offset: u32, noise: bool) -> i32 {
        let magnitude = ((self.envelope_attenuation(am_offset) ^ 0x3ff) << 1) as i32;
        if noise {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Envelope stage and attenuation
    pub fn envelope(&self) -> EnvelopeSnapshot {
        self.envelope.snapshot()
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::new()
    }
}
