//! End-to-end chip scenarios
//!
//! These tests drive the public API the way an application would: register programs go
//! in, rendered audio comes out, and the audio is checked for pitch, envelope shape and
//! repeatability. The chip-level tests further down write registers and step the master
//! clock directly, one native sample per 64 cycles.

use std::thread;

use ym2151::ym2151::{EnvelopeStage, OperatorId, TimerStatus, CLOCKS_PER_SAMPLE};
use ym2151::{
    ChipBackend, ChipConfig, ClockBridge, RegisterProgram, RenderConfig, Renderer,
    SidebandFlags, Ym2151,
};

const CLOCK_HZ: u32 = 3_580_000;
const SAMPLE_RATE: u32 = 48_000;

/// Single B4 tone on channel 0, clocked as in the reference scenario
fn b4_program() -> RegisterProgram {
    RegisterProgram {
        clock_hz: Some(CLOCK_HZ),
        ..RegisterProgram::tone(0x4D)
    }
}

fn mono_renderer(program: &RegisterProgram, seconds: f64) -> Renderer {
    Renderer::for_program(program, &RenderConfig::mono(SAMPLE_RATE, seconds))
        .expect("valid render config")
}

fn rising_crossings(samples: &[i16]) -> usize {
    samples
        .windows(2)
        .filter(|pair| pair[0] < 0 && pair[1] >= 0)
        .count()
}

fn window_peaks(samples: &[i16], window: usize) -> Vec<u16> {
    samples
        .chunks(window)
        .map(|chunk| chunk.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0))
        .collect()
}

#[test]
fn b4_tone_has_expected_pitch() {
    let mut renderer = mono_renderer(&b4_program(), 1.0);
    let audio = renderer.render(SAMPLE_RATE as u64);

    // skip the first 100ms, measure over the remaining 0.9s
    let steady = &audio.samples()[4_800..];
    let seconds = steady.len() as f64 / SAMPLE_RATE as f64;
    let frequency = rising_crossings(steady) as f64 / seconds;

    let expected = 440.0 * 2f64.powf(2.0 / 12.0);
    assert!(
        (frequency - expected).abs() / expected < 0.02,
        "measured {frequency:.1} Hz, expected about {expected:.1} Hz"
    );
}

#[test]
fn b4_tone_attacks_promptly_and_sustains() {
    let mut renderer = mono_renderer(&b4_program(), 1.0);
    let audio = renderer.render(SAMPLE_RATE as u64);
    let peaks = window_peaks(audio.samples(), 480); // 10ms windows

    let sustained = peaks[50];
    assert!(sustained > 100, "sustained peak {sustained} too quiet");
    assert!(
        peaks[0] as f64 >= sustained as f64 * 0.9,
        "first 10ms peaked at {} against {sustained}",
        peaks[0]
    );
    for (index, &peak) in peaks.iter().enumerate().skip(1) {
        let drift = (peak as i32 - sustained as i32).abs();
        assert!(drift <= 2, "window {index} peaked at {peak}, sustained {sustained}");
    }
}

#[test]
fn b4_tone_has_no_dc_offset() {
    let mut renderer = mono_renderer(&b4_program(), 1.0);
    let audio = renderer.render(SAMPLE_RATE as u64);
    let samples = &audio.samples()[4_800..];

    // average over whole periods, from one rising crossing to the last
    let first = samples
        .windows(2)
        .position(|p| p[0] < 0 && p[1] >= 0)
        .expect("tone crosses zero");
    let last = samples
        .windows(2)
        .rposition(|p| p[0] < 0 && p[1] >= 0)
        .expect("tone crosses zero");
    let span = &samples[first + 1..=last];
    let mean = span.iter().map(|&s| s as f64).sum::<f64>() / span.len() as f64;
    let peak = audio.peak() as f64;

    assert!(
        mean.abs() < peak * 0.02,
        "mean {mean:.2} against peak {peak}"
    );
}

#[test]
fn release_decays_gradually_to_silence() {
    let mut program = b4_program();
    for event in program.events.iter_mut().filter(|e| e.address == 0xE0) {
        event.value = 0xF7; // D1L 15, RR 7
    }
    let mut renderer = mono_renderer(&program, 2.0);
    let held = renderer.render(4_800);
    let held_peak = window_peaks(held.samples(), 960).last().copied().unwrap_or(0);
    assert!(held_peak > 0);

    renderer.chip_mut().write_register(0x08, 0x00);
    let released = renderer.render(SAMPLE_RATE as u64);
    let peaks = window_peaks(released.samples(), 960); // 20ms windows

    assert!(
        peaks[0] as f64 > held_peak as f64 * 0.5,
        "output dropped abruptly at key-off ({} from {held_peak})",
        peaks[0]
    );
    for pair in peaks.windows(2) {
        assert!(pair[1] <= pair[0] + 2, "release rose: {pair:?}");
    }
    let audible = peaks.iter().filter(|&&p| p > 0).count();
    assert!(audible >= 3, "release lasted only {audible} windows");
    assert_eq!(peaks.last().copied(), Some(0));
    assert_eq!(
        renderer.chip().envelope(0, OperatorId::M1).map(|e| e.stage),
        Some(EnvelopeStage::Off)
    );
}

#[test]
fn identical_programs_render_identically() {
    let program = RegisterProgram::random_patches(7, 50.0, 400.0);
    let config = RenderConfig::stereo(44_100, 0.4);

    let first = Renderer::for_program(&program, &config)
        .unwrap()
        .render(config.frames());
    let second = Renderer::for_program(&program, &config)
        .unwrap()
        .render(config.frames());

    assert!(first.peak() > 0);
    assert_eq!(first.samples(), second.samples());
}

#[test]
fn reset_chip_stays_silent() {
    let mut chip = Ym2151::with_config(ChipConfig::with_clock(CLOCK_HZ));
    for event in &b4_program().events {
        chip.write_register(event.address, event.value);
    }
    for _ in 0..10_000 {
        chip.clock_step();
    }
    chip.reset();

    let mut bridge = ClockBridge::for_chip(&chip, SAMPLE_RATE).unwrap();
    for _ in 0..SAMPLE_RATE {
        let sample = bridge.produce_sample(&mut chip);
        assert_eq!((sample.left, sample.right), (0, 0));
    }
}

#[test]
fn register_writes_round_trip_through_reset() {
    let program = RegisterProgram::random_patches(99, 100.0, 100.0);
    let mut chip = Ym2151::new();
    let apply = |chip: &mut Ym2151| {
        for event in &program.events {
            chip.write_register(event.address, event.value);
        }
    };

    apply(&mut chip);
    let snapshot = |chip: &Ym2151| {
        (0..8)
            .map(|ch| {
                let ops: Vec<_> = OperatorId::ALGORITHM_ORDER
                    .iter()
                    .map(|&op| *chip.operator_params(ch, op).unwrap())
                    .collect();
                (*chip.channel_params(ch).unwrap(), ops)
            })
            .collect::<Vec<_>>()
    };
    let before = snapshot(&chip);

    chip.reset();
    assert_ne!(snapshot(&chip), before);
    apply(&mut chip);
    assert_eq!(snapshot(&chip), before);
}

#[test]
fn bridge_steps_match_clock_ratio() {
    let mut chip = Ym2151::with_config(ChipConfig::with_clock(CLOCK_HZ));
    let mut bridge = ClockBridge::for_chip(&chip, SAMPLE_RATE).unwrap();
    for _ in 0..SAMPLE_RATE {
        bridge.produce_sample(&mut chip);
    }
    assert_eq!(bridge.total_steps(), CLOCK_HZ as u64);
    assert_eq!(
        chip.frame_count(),
        (CLOCK_HZ as u64).div_ceil(CLOCKS_PER_SAMPLE as u64)
    );
}

#[test]
fn shared_chip_serializes_writers_and_clock() {
    let shared = Ym2151::new().into_shared();

    let writer = {
        let shared = shared.clone();
        thread::spawn(move || {
            for event in &RegisterProgram::tone(0x4A).events {
                shared.lock().write_register(event.address, event.value);
            }
        })
    };
    let clocker = {
        let shared = shared.clone();
        thread::spawn(move || {
            for _ in 0..1_000 {
                shared.lock().clock_step();
            }
        })
    };
    writer.join().unwrap();
    clocker.join().unwrap();

    let mut chip = shared.lock();
    assert_eq!(chip.frame_count(), 1_000u64.div_ceil(CLOCKS_PER_SAMPLE as u64));
    assert_eq!(chip.register(0x28), 0x4A);
    let heard = (0..64 * 200).any(|_| chip.clock_step().left != 0);
    assert!(heard);
}

// Chip-level scenarios

/// Left output of `count` native samples.
fn native_samples(chip: &mut Ym2151, count: usize) -> Vec<i16> {
    (0..count)
        .map(|_| {
            (0..CLOCKS_PER_SAMPLE)
                .map(|_| chip.clock_step())
                .last()
                .map_or(0, |out| out.left)
        })
        .collect()
}

/// Frequency from the first to the last rising crossing, interpolated between samples.
fn measured_frequency(samples: &[i16], sample_rate: f64) -> f64 {
    let crossings: Vec<f64> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, p)| p[0] < 0 && p[1] >= 0)
        .map(|(i, p)| i as f64 + -(p[0] as f64) / (p[1] as f64 - p[0] as f64))
        .collect();
    assert!(crossings.len() > 2, "no steady tone");
    let span = crossings[crossings.len() - 1] - crossings[0];
    (crossings.len() - 1) as f64 / span * sample_rate
}

fn spread(values: &[usize]) -> usize {
    values.iter().max().unwrap() - values.iter().min().unwrap()
}

/// The B4 tone on channel 0 with extra register writes applied after key-on.
fn tone_chip(extra: &[(u8, u8)]) -> Ym2151 {
    let mut chip = Ym2151::new();
    for event in &RegisterProgram::tone(0x4D).events {
        chip.write_register(event.address, event.value);
    }
    for &(address, value) in extra {
        chip.write_register(address, value);
    }
    chip
}

/// Channel 0 at KC 0x4A with every operator a full-level MUL 1 sine, `keys` keyed on.
fn routed_output(algorithm: u8, keys: &[OperatorId]) -> Vec<i16> {
    let mut chip = Ym2151::new();
    chip.write_register(0x20, 0xC0 | algorithm);
    chip.write_register(0x28, 0x4A);
    for group in 0..4u8 {
        let slot = group * 8;
        chip.write_register(0x40 + slot, 0x01);
        chip.write_register(0x60 + slot, 0x00);
        chip.write_register(0x80 + slot, 0x1F);
        chip.write_register(0xE0 + slot, 0xFF);
    }
    let mask = keys.iter().fold(0, |mask, op| mask | op.key_on_mask());
    chip.write_register(0x08, mask);
    native_samples(&mut chip, 2_000)[64..].to_vec()
}

fn peak(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

#[test]
fn every_algorithm_sums_its_carriers() {
    use OperatorId::{C1, C2, M1, M2};
    let carriers: [&[OperatorId]; 8] = [
        &[C2],
        &[C2],
        &[C2],
        &[C2],
        &[C1, C2],
        &[C1, M2, C2],
        &[C1, M2, C2],
        &[M1, C1, M2, C2],
    ];
    let single = peak(&routed_output(7, &[C2])) as f64;
    assert!(single > 4_000.0, "lone carrier peaked at {single}");

    for (algorithm, expected) in carriers.iter().enumerate() {
        let algorithm = algorithm as u8;
        for op in OperatorId::ALGORITHM_ORDER {
            let alone = peak(&routed_output(algorithm, &[op]));
            if expected.contains(&op) {
                assert!(
                    (alone as f64 - single).abs() < single * 0.01,
                    "algorithm {algorithm}: carrier {op:?} peaked at {alone}"
                );
            } else {
                assert_eq!(alone, 0, "algorithm {algorithm}: modulator {op:?} is audible");
            }
        }

        // unkeyed modulators stay silent, so the in-phase carriers add up
        let together = peak(&routed_output(algorithm, expected)) as f64;
        let ratio = together / single;
        assert!(
            (ratio - expected.len() as f64).abs() < 0.02 * expected.len() as f64,
            "algorithm {algorithm}: {} carriers gave {ratio:.3}x",
            expected.len()
        );
    }
}

#[test]
fn algorithms_route_modulators_into_the_final_carrier() {
    use OperatorId::{C1, C2, M1, M2};
    // operators that change C2's output when keyed next to it: direct op4 inputs and
    // other carriers
    let feeds_c2: [&[OperatorId]; 8] = [
        &[M2],
        &[M2],
        &[M1, M2],
        &[C1, M2],
        &[C1, M2],
        &[M1, C1, M2],
        &[C1, M2],
        &[M1, C1, M2],
    ];
    // whether M1 still reaches the output when C1 is keyed off
    let m1_bypasses_c1 = [false, true, true, false, false, true, false, true];

    for algorithm in 0..8u8 {
        let plain = routed_output(algorithm, &[C2]);
        for op in [M1, C1, M2] {
            let changed = routed_output(algorithm, &[op, C2]) != plain;
            assert_eq!(
                changed,
                feeds_c2[algorithm as usize].contains(&op),
                "algorithm {algorithm}: keying {op:?} with C2"
            );
        }

        let without_m1 = routed_output(algorithm, &[M2, C2]);
        let with_m1 = routed_output(algorithm, &[M1, M2, C2]);
        assert_eq!(
            with_m1 != without_m1,
            m1_bypasses_c1[algorithm as usize],
            "algorithm {algorithm}: M1 path around C1"
        );
    }
}

/// Channel 0 C2 alone with the given DT1/MUL and DT2/D2R register values.
fn detuned_carrier(key_code: u8, dt1_mul: u8, dt2_d2r: u8) -> Vec<i16> {
    let mut chip = Ym2151::new();
    let slot = 24;
    chip.write_register(0x20, 0xC7);
    chip.write_register(0x28, key_code);
    chip.write_register(0x40 + slot, dt1_mul);
    chip.write_register(0x60 + slot, 0x00);
    chip.write_register(0x80 + slot, 0x1F);
    chip.write_register(0xC0 + slot, dt2_d2r);
    chip.write_register(0xE0 + slot, 0xFF);
    chip.write_register(0x08, OperatorId::C2.key_on_mask());
    native_samples(&mut chip, 28_000)
}

#[test]
fn dt2_raises_pitch_by_coarse_ratios() {
    let rate = Ym2151::new().native_sample_rate();
    let base = measured_frequency(&detuned_carrier(0x4A, 0x01, 0x00), rate);
    assert!((base - 440.0).abs() < 440.0 * 0.005, "KC 0x4A at {base:.2} Hz");

    for (dt2, ratio) in [(1u8, 2f64.powf(384.0 / 768.0)), (2, 2f64.powf(500.0 / 768.0)), (3, 2f64.powf(608.0 / 768.0))] {
        let detuned = measured_frequency(&detuned_carrier(0x4A, 0x01, dt2 << 6), rate);
        assert!(
            (detuned / base - ratio).abs() < ratio * 0.005,
            "DT2 {dt2}: {detuned:.2} Hz against {base:.2} Hz"
        );
    }
}

#[test]
fn dt1_shifts_pitch_by_a_fixed_step() {
    // keycode 31 (KC 0x7E) has the widest DT1 steps: +-22 phase units per sample
    let rate = Ym2151::new().native_sample_rate();
    let step_hz = 22.0 * rate / (1u32 << 20) as f64;

    let plain = detuned_carrier(0x7E, 0x01, 0x00);
    assert_eq!(detuned_carrier(0x7E, 0x41, 0x00), plain, "DT1 4 is -0");

    let base = measured_frequency(&plain, rate);
    let up = measured_frequency(&detuned_carrier(0x7E, 0x31, 0x00), rate);
    let down = measured_frequency(&detuned_carrier(0x7E, 0x71, 0x00), rate);
    assert!(
        (up - base - step_hz).abs() < 0.25,
        "DT1 3 moved {base:.2} Hz by {:.3} Hz, expected {step_hz:.3}",
        up - base
    );
    assert!(
        (base - down - step_hz).abs() < 0.25,
        "DT1 7 moved {base:.2} Hz by {:.3} Hz, expected -{step_hz:.3}",
        down - base
    );
}

/// Rising crossings in consecutive 2000-sample windows.
fn window_crossings(samples: &[i16]) -> Vec<usize> {
    samples.chunks_exact(2_000).map(rising_crossings).collect()
}

#[test]
fn lfo_vibrato_needs_pms() {
    // saw LFO, PMD 127
    let lfo = [(0x18, 0xA0), (0x19, 0xFF)];

    let mut still = tone_chip(&lfo);
    let flat = window_crossings(&native_samples(&mut still, 72_000));
    assert!(spread(&flat) <= 1, "pitch moved without PMS: {flat:?}");

    let mut vibrato = tone_chip(&[lfo[0], lfo[1], (0x38, 0x70)]);
    let swept = window_crossings(&native_samples(&mut vibrato, 72_000));
    let centre = flat[0];
    assert!(spread(&swept) >= 6, "PMS 7 barely moved pitch: {swept:?}");
    assert!(swept.iter().any(|&n| n + 2 < centre), "never bent down: {swept:?}");
    assert!(swept.iter().any(|&n| n > centre + 2), "never bent up: {swept:?}");
}

#[test]
fn lfo_tremolo_needs_ams_and_am_enable() {
    // saw LFO, AMD 127, AMS 3
    let lfo = [(0x18, 0xA0), (0x19, 0x7F), (0x38, 0x03)];

    let mut plain = tone_chip(&lfo);
    let steady = window_peaks(&native_samples(&mut plain, 72_000)[64..], 2_000);
    let (low, high) = (*steady.iter().min().unwrap(), *steady.iter().max().unwrap());
    assert!(low > 100, "tone without AMS-EN went quiet: {steady:?}");
    assert!(high - low <= 4, "level moved without AMS-EN: {steady:?}");

    // AMS-EN on M1, the audible operator
    let mut tremolo = tone_chip(&[lfo[0], lfo[1], lfo[2], (0xA0, 0x80)]);
    let swept = window_peaks(&native_samples(&mut tremolo, 72_000)[64..], 2_000);
    let loudest = *swept.iter().max().unwrap();
    let quietest = *swept.iter().min().unwrap();
    assert!(loudest as f64 > high as f64 * 0.8, "tremolo never peaked: {swept:?}");
    assert!(quietest < loudest / 8, "tremolo too shallow: {swept:?}");
}

/// Number of native samples until `flag` shows up in the chip status.
fn samples_until(chip: &mut Ym2151, flag: TimerStatus, limit: usize) -> Option<usize> {
    (1..=limit).find(|_| {
        let irq = (0..CLOCKS_PER_SAMPLE)
            .map(|_| chip.clock_step().flags.contains(SidebandFlags::IRQ))
            .fold(false, |seen, irq| seen | irq);
        irq && chip.status().contains(flag)
    })
}

#[test]
fn timer_a_overflow_raises_irq() {
    let mut chip = Ym2151::new();
    chip.write_register(0x10, 0xFF); // period 1020: overflow every 4 samples
    chip.write_register(0x11, 0x00);
    chip.write_register(0x14, 0x01); // run without IRQ
    for _ in 0..64 * 100 {
        assert!(!chip.clock_step().flags.contains(SidebandFlags::IRQ));
    }
    assert_eq!(chip.status(), TimerStatus::empty());

    chip.write_register(0x14, 0x00);
    chip.write_register(0x14, 0x05); // reload with IRQ A
    assert_eq!(samples_until(&mut chip, TimerStatus::TIMER_A, 100), Some(4));
    assert!(!chip.status().contains(TimerStatus::TIMER_B));

    chip.write_register(0x14, 0x15); // clear the flag, keep running
    assert_eq!(chip.status(), TimerStatus::empty());
    assert_eq!(samples_until(&mut chip, TimerStatus::TIMER_A, 100), Some(4));
}

#[test]
fn timer_b_overflow_raises_irq() {
    let mut chip = Ym2151::new();
    chip.write_register(0x12, 0xFF); // one count: overflow after 16 samples
    chip.write_register(0x14, 0x0A); // load B with IRQ B
    assert_eq!(samples_until(&mut chip, TimerStatus::TIMER_B, 100), Some(16));
    assert!(!chip.status().contains(TimerStatus::TIMER_A));

    chip.write_register(0x14, 0x2A);
    assert_eq!(chip.status(), TimerStatus::empty());
    chip.write_register(0x12, 0xFE); // takes effect at the next reload
    assert_eq!(samples_until(&mut chip, TimerStatus::TIMER_B, 100), Some(16));
    chip.write_register(0x14, 0x2A);
    assert_eq!(samples_until(&mut chip, TimerStatus::TIMER_B, 100), Some(32));
}

/// C2 of `channel` alone at KC 0x4A, with the noise register set to `noise`.
fn noise_channel_output(channel: u8, noise: u8) -> Vec<i16> {
    let mut chip = Ym2151::new();
    let slot = channel + 24;
    chip.write_register(0x0F, noise);
    chip.write_register(0x20 + channel, 0xC7);
    chip.write_register(0x28 + channel, 0x4A);
    chip.write_register(0x40 + slot, 0x01);
    chip.write_register(0x60 + slot, 0x00);
    chip.write_register(0x80 + slot, 0x1F);
    chip.write_register(0xE0 + slot, 0xFF);
    chip.write_register(0x08, OperatorId::C2.key_on_mask() | channel);
    native_samples(&mut chip, 10_100)[100..].to_vec()
}

fn sign_changes(samples: &[i16]) -> usize {
    samples.windows(2).filter(|p| (p[0] < 0) != (p[1] < 0)).count()
}

#[test]
fn noise_replaces_channel_7_carrier() {
    let noise = noise_channel_output(7, 0x9F); // enabled, fastest
    assert!(noise.iter().all(|s| s.unsigned_abs() > 2_000), "noise level dropped");
    assert!(sign_changes(&noise) > 1_000, "noise barely flips");
    for period in 1..=1_024 {
        assert!(
            noise[..4_000] != noise[period..period + 4_000],
            "noise repeats every {period} samples"
        );
    }

    // the same voice stays a sine without the enable, or on another channel
    for tone in [noise_channel_output(7, 0x1F), noise_channel_output(0, 0x9F)] {
        assert!(sign_changes(&tone) < 200);
        let frequency = measured_frequency(&tone, Ym2151::new().native_sample_rate());
        assert!((frequency - 440.0).abs() < 5.0, "sine at {frequency:.1} Hz");
    }
}
