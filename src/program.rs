//! Register programs: timed register writes
//!
//! A [`RegisterProgram`] is a list of (time, address, value) events, loadable from JSON
//! or built from one of the demo patches. Before rendering it is turned into a
//! [`Sequencer`] whose event times are whole output frames, so playback and file export
//! apply every write at exactly the same sample.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::backend::ChipBackend;
use crate::ym2151::registers::KEY_ON_ADDR;
use crate::{Result, Ym2151Error};

/// Key-on value for channel 0 with all four operators.
const KEY_ON_ALL: u8 = 0x78;

/// Upper bound on generated key toggles per demo program.
pub const MAX_TOGGLES: u32 = 100_000;

/// One timed register write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgramEvent {
    /// Time from program start in milliseconds
    #[serde(default)]
    pub time_ms: f64,
    /// Register address
    pub address: u8,
    /// Register value
    pub value: u8,
}

impl ProgramEvent {
    /// Event at `time_ms`
    pub fn new(time_ms: f64, address: u8, value: u8) -> Self {
        Self {
            time_ms,
            address,
            value,
        }
    }
}

/// A sequence of timed register writes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegisterProgram {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Chip clock override in Hz
    #[serde(default)]
    pub clock_hz: Option<u32>,
    /// Writes, in any order (stable-sorted by time when scheduled)
    pub events: Vec<ProgramEvent>,
}

impl RegisterProgram {
    /// Parse and validate a JSON program.
    pub fn from_json(json: &str) -> Result<Self> {
        let program: RegisterProgram = serde_json::from_str(json)
            .map_err(|e| Ym2151Error::ProgramError(format!("Invalid register program: {e}")))?;
        program.validate()?;
        Ok(program)
    }

    /// Load a JSON program from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading register program from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Ym2151Error::ProgramError(format!("Failed to serialize program: {e}")))
    }

    /// Reject negative or non-finite times and a zero clock override.
    pub fn validate(&self) -> Result<()> {
        if self.clock_hz == Some(0) {
            return Err(Ym2151Error::ProgramError(
                "clock_hz must be greater than 0".into(),
            ));
        }
        if let Some((index, event)) = self
            .events
            .iter()
            .enumerate()
            .find(|(_, e)| !e.time_ms.is_finite() || e.time_ms < 0.0)
        {
            return Err(Ym2151Error::ProgramError(format!(
                "event {index} has invalid time {} ms",
                event.time_ms
            )));
        }
        Ok(())
    }

    /// Time of the last event in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.events.iter().map(|e| e.time_ms).fold(0.0, f64::max)
    }

    /// Single sustained tone on channel 0: algorithm 7, only M1 audible (MUL 1, TL 0x20,
    /// instant attack, no decay), all four operators keyed on.
    pub fn tone(key_code: u8) -> Self {
        let mut events = tone_patch(key_code);
        events.push(ProgramEvent::new(0.0, KEY_ON_ADDR, KEY_ON_ALL));
        Self {
            name: Some(format!("tone KC {key_code:#04x}")),
            clock_hz: None,
            events,
        }
    }

    /// The tone patch keyed on and off alternately every `interval_ms`.
    pub fn key_toggle(key_code: u8, interval_ms: f64, duration_ms: f64) -> Self {
        let mut events = tone_patch(key_code);
        events.extend(
            toggle_times(interval_ms, duration_ms)
                .enumerate()
                .map(|(n, t)| {
                    let value = if n % 2 == 0 { KEY_ON_ALL } else { 0x00 };
                    ProgramEvent::new(t, KEY_ON_ADDR, value)
                }),
        );
        Self {
            name: Some(format!("key toggle every {interval_ms} ms")),
            clock_hz: None,
            events,
        }
    }

    /// A new random patch on every key-on, toggling every `interval_ms`.
    ///
    /// The same seed always produces the same program.
    pub fn random_patches(seed: u64, interval_ms: f64, duration_ms: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut events = vec![ProgramEvent::new(0.0, 0x20, 0xc7)];
        for (n, t) in toggle_times(interval_ms, duration_ms).enumerate() {
            if n % 2 == 0 {
                events.extend(random_patch(&mut rng, t));
                events.push(ProgramEvent::new(t, KEY_ON_ADDR, KEY_ON_ALL));
            } else {
                events.push(ProgramEvent::new(t, KEY_ON_ADDR, 0x00));
            }
        }
        Self {
            name: Some(format!("random patches (seed {seed})")),
            clock_hz: None,
            events,
        }
    }

    /// Convert event times into output frames at `sample_rate`.
    pub fn schedule(&self, sample_rate: u32) -> Sequencer {
        let mut writes: Vec<ScheduledWrite> = self
            .events
            .iter()
            .map(|e| ScheduledWrite {
                frame: (e.time_ms * sample_rate as f64 / 1000.0).round() as u64,
                address: e.address,
                value: e.value,
            })
            .collect();
        writes.sort_by_key(|w| w.frame);
        Sequencer { writes, cursor: 0 }
    }
}

/// Toggle instants covering `duration_ms`; always at least the one at 0 and never
/// more than [`MAX_TOGGLES`].
fn toggle_times(interval_ms: f64, duration_ms: f64) -> impl Iterator<Item = f64> {
    let count = if interval_ms > 0.0 {
        let wanted = (duration_ms / interval_ms).ceil().max(1.0);
        if wanted > MAX_TOGGLES as f64 {
            log::warn!(
                "{duration_ms} ms at {interval_ms} ms intervals needs {wanted} toggles, keeping {MAX_TOGGLES}"
            );
        }
        wanted.min(MAX_TOGGLES as f64) as u32
    } else {
        1
    };
    (0..count).map(move |n| n as f64 * interval_ms)
}

fn tone_patch(key_code: u8) -> Vec<ProgramEvent> {
    [
        (0x20, 0xc7),     // L+R, FL 0, CON 7
        (0x28, key_code), // KC
        (0x30, 0x00),     // KF
        (0x40, 0x01),     // M1 DT1 0, MUL 1
        (0x60, 0x20),     // M1 TL
        (0x80, 0x1f),     // M1 KS 0, AR 31
        (0xa0, 0x00),     // M1 D1R 0
        (0xc0, 0x00),     // M1 DT2 0, D2R 0
        (0xe0, 0xff),     // M1 D1L 15, RR 15
    ]
    .into_iter()
    .map(|(address, value)| ProgramEvent::new(0.0, address, value))
    .collect()
}

/// Random but audible channel 0 patch: carriers keep a moderate level and a quick attack.
fn random_patch(rng: &mut StdRng, t: f64) -> Vec<ProgramEvent> {
    let algorithm: u8 = rng.gen_range(0..8);
    let feedback: u8 = rng.gen_range(0..8);
    let octave: u8 = rng.gen_range(2..6);
    let note: u8 = [0, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14][rng.gen_range(0..12)];

    let mut events = vec![
        ProgramEvent::new(t, 0x20, 0xc0 | (feedback << 3) | algorithm),
        ProgramEvent::new(t, 0x28, (octave << 4) | note),
    ];
    for group in 0..4u8 {
        let slot = group << 3;
        let level: u8 = rng.gen_range(0x10..0x30);
        events.extend([
            ProgramEvent::new(t, 0x40 + slot, rng.gen_range(0u8..8) << 4 | rng.gen_range(1u8..8)),
            ProgramEvent::new(t, 0x60 + slot, level),
            ProgramEvent::new(t, 0x80 + slot, rng.gen_range(0x18..0x20)),
            ProgramEvent::new(t, 0xa0 + slot, rng.gen_range(0..0x10)),
            ProgramEvent::new(t, 0xc0 + slot, rng.gen_range(0..0x08)),
            ProgramEvent::new(t, 0xe0 + slot, rng.gen_range(0u8..0x10) << 4 | rng.gen_range(4u8..0x10)),
        ]);
    }
    events
}

/// A register write pinned to an output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWrite {
    /// Output frame index
    pub frame: u64,
    /// Register address
    pub address: u8,
    /// Register value
    pub value: u8,
}

/// Plays scheduled writes into a chip as output frames go by.
///
/// Holds a preallocated, sorted list; applying writes never allocates, so it can run on
/// the audio thread.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    writes: Vec<ScheduledWrite>,
    cursor: usize,
}

impl Sequencer {
    /// Apply every write due at or before `frame`. Returns how many were applied.
    pub fn apply_due<C: ChipBackend>(&mut self, frame: u64, chip: &mut C) -> usize {
        let start = self.cursor;
        while let Some(write) = self.writes.get(self.cursor) {
            if write.frame > frame {
                break;
            }
            chip.write_register(write.address, write.value);
            self.cursor += 1;
        }
        self.cursor - start
    }

    /// All writes applied
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.writes.len()
    }

    /// Frame of the last write
    pub fn last_frame(&self) -> u64 {
        self.writes.last().map_or(0, |w| w.frame)
    }

    /// Scheduled writes in order
    pub fn writes(&self) -> &[ScheduledWrite] {
        &self.writes
    }

    /// Start over from the first write.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}
