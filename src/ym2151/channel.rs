//! FM channel: four operators, algorithm routing and op1 feedback

use super::lfo::{am_offset, pm_delta};
use super::operator::{Operator, OperatorId, OperatorParams, Pitch};
use super::tables::ALGORITHM_ROUTING;

/// Decoded per-channel registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelParams {
    /// KC: octave (bits 4-6) and note (bits 0-3)
    pub key_code: u8,
    /// KF: 6-bit key fraction
    pub key_fraction: u8,
    /// CON: algorithm 0-7
    pub algorithm: u8,
    /// FL: op1 self-feedback 0-7
    pub feedback: u8,
    /// Left output enable
    pub left: bool,
    /// Right output enable
    pub right: bool,
    /// PMS: LFO pitch sensitivity 0-7
    pub pm_sensitivity: u8,
    /// AMS: LFO amplitude sensitivity 0-3
    pub am_sensitivity: u8,
}

impl ChannelParams {
    /// 13-bit block/code/fraction value used for phase step lookup.
    pub fn block_freq(&self) -> u32 {
        ((self.key_code as u32 & 0x7f) << 6) | (self.key_fraction as u32 & 0x3f)
    }

    /// 5-bit keycode for key scaling and DT1.
    pub fn keycode(&self) -> u32 {
        (self.key_code as u32 & 0x7f) >> 2
    }

    fn pitch(&self) -> Pitch {
        Pitch {
            block_freq: self.block_freq(),
            keycode: self.keycode(),
        }
    }
}

/// One of the eight FM channels.
#[derive(Debug, Clone)]
pub struct Channel {
    params: ChannelParams,
    /// Operators in algorithm order: M1, C1, M2, C2
    operators: [Operator; 4],
    feedback: [i32; 2],
    feedback_in: i32,
}

impl Channel {
    /// Channel at power-on
    pub fn new() -> Self {
        Self {
            params: ChannelParams::default(),
            operators: std::array::from_fn(|_| Operator::new()),
            feedback: [0; 2],
            feedback_in: 0,
        }
    }

    /// Current parameters
    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    /// Replace channel parameters; pitch changes reach every operator.
    pub fn set_params(&mut self, params: ChannelParams) {
        let pitch_changed = params.block_freq() != self.params.block_freq();
        self.params = params;
        if pitch_changed {
            let pitch = params.pitch();
            for op in &mut self.operators {
                op.set_pitch(pitch);
            }
        }
    }

    /// Shared access to one operator
    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id.index()]
    }

    /// Update one operator's parameters.
    pub fn set_operator_params(&mut self, id: OperatorId, params: OperatorParams) {
        self.operators[id.index()].set_params(params);
    }

    /// Apply the key-on register bits for this channel.
    pub fn set_keys(&mut self, operators: u8) {
        for id in OperatorId::ALGORITHM_ORDER {
            self.operators[id.index()].set_key(operators & id.key_on_mask() != 0);
        }
    }

    /// Drive the CSM key line of every operator.
    pub fn set_csm_keys(&mut self, on: bool) {
        for op in &mut self.operators {
            op.set_csm_key(on);
        }
    }

    /// Advance feedback history, envelopes (when `env_counter` is given) and phases.
    pub fn clock(&mut self, env_counter: Option<u32>, lfo_raw_pm: i32) {
        self.feedback[0] = self.feedback[1];
        self.feedback[1] = self.feedback_in;

        let delta = pm_delta(lfo_raw_pm, self.params.pm_sensitivity);
        for op in &mut self.operators {
            op.clock(env_counter, delta);
        }
    }

    /// Compute this sample's output. `noise` replaces op4 with the noise generator.
    pub fn output(&mut self, lfo_am: u32, noise: Option<bool>) -> i32 {
        let routing = ALGORITHM_ROUTING[(self.params.algorithm & 7) as usize];
        let am = am_offset(lfo_am, self.params.am_sensitivity);
        let [op1, op2, op3, op4] = &self.operators;

        // output slots: 1-3 single operators, 5 = 1+2, 6 = 1+3, 7 = 2+3
        let mut opout = [0i32; 8];

        let modulation = match self.params.feedback & 7 {
            0 => 0,
            fb => (self.feedback[0] + self.feedback[1]) >> (10 - fb),
        };
        opout[1] = op1.compute_volume(modulated(op1.phase(), modulation), am);
        self.feedback_in = opout[1];

        let modulation = opout[(routing & 1) as usize] >> 1;
        opout[2] = op2.compute_volume(modulated(op2.phase(), modulation), am);
        opout[5] = opout[1] + opout[2];

        let modulation = opout[((routing >> 1) & 7) as usize] >> 1;
        opout[3] = op3.compute_volume(modulated(op3.phase(), modulation), am);
        opout[6] = opout[1] + opout[3];
        opout[7] = opout[2] + opout[3];

        let mut result = match noise {
            Some(bit) => op4.compute_noise_volume(am, bit),
            None => {
                let modulation = opout[((routing >> 4) & 7) as usize] >> 1;
                op4.compute_volume(modulated(op4.phase(), modulation), am)
            }
        };

        for (bit, value) in [(7, opout[1]), (8, opout[2]), (9, opout[3])] {
            if routing & (1 << bit) != 0 {
                result += value;
            }
        }
        result.clamp(i16::MIN as i32, i16::MAX as i32)
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn modulated(phase: u32, modulation: i32) -> u32 {
    phase.wrapping_add_signed(modulation)
}
