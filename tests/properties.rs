//! Black-box integration tests covering bounded energy, determinism,
//! silence at rest, pitch tracking, plosive release clicks, fricative
//! noise, multi-voice independence, and tract-resize idempotence, using
//! only the public API.

use approx::assert_relative_eq;
use multivox::{Engine, Voice, VoiceParams};

const SAMPLE_RATE: u32 = 48000;

fn deterministic_noise(seed: u64, len: usize) -> Vec<f64> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            2.0 * ((state >> 11) as f64 / (1u64 << 53) as f64) - 1.0
        })
        .collect()
}

fn rms(samples: &[f32]) -> f64 {
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

fn autocorrelation_peak_period(samples: &[f32], min_period: usize, max_period: usize) -> usize {
    let mut best_lag = min_period;
    let mut best_score = f64::MIN;
    for lag in min_period..=max_period {
        let mut sum = 0.0;
        let n = samples.len() - lag;
        for i in 0..n {
            sum += samples[i] as f64 * samples[i + lag] as f64;
        }
        let score = sum / n as f64;
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    best_lag
}

fn cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let num: f64 = (0..n).map(|i| a[i] as f64 * b[i] as f64).sum();
    let ea: f64 = (0..n).map(|i| (a[i] as f64).powi(2)).sum();
    let eb: f64 = (0..n).map(|i| (b[i] as f64).powi(2)).sum();
    num / (ea.sqrt() * eb.sqrt() + 1e-12)
}

fn run_voice(voice: &mut Voice, aspiration: &[f64], fricative: &[f64]) -> Vec<f32> {
    let mut out = vec![0.0f32; aspiration.len()];
    voice.process(aspiration, fricative, &mut out);
    out
}

// Bounded energy under any in-range parameter trajectory and |x| <= 1 input.
#[test]
fn bounded_energy_under_parameter_sweep() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 11).unwrap();
    let noise = deterministic_noise(1, SAMPLE_RATE as usize);
    let mut out = vec![0.0f32; SAMPLE_RATE as usize];

    let mut p = 0usize;
    for block in out.chunks_mut(256) {
        let mut params = VoiceParams {
            frequency: 100.0 + 300.0 * (p as f64 / SAMPLE_RATE as f64),
            tenseness: 0.3 + 0.5 * ((p as f64 / 4000.0).sin().abs()),
            constriction_index: 20.0 + 15.0 * ((p as f64 / 3000.0).cos().abs()),
            constriction_diameter: 2.0,
            ..VoiceParams::default()
        };
        params.sanitize();
        handle.set_params(params);
        voice.process(&noise[p..p + block.len()], &noise[p..p + block.len()], block);
        p += block.len();
    }

    assert!(rms(&out) <= 1.0, "rms {} exceeds 1.0", rms(&out));
}

// No NaN/Inf after 10s of random control-parameter motion.
#[test]
fn no_nan_under_random_parameter_motion() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 12).unwrap();
    let noise = deterministic_noise(2, 4096);
    let total = SAMPLE_RATE as usize * 10;
    let mut produced = 0usize;

    while produced < total {
        let len = 256.min(total - produced);
        let mut params = VoiceParams {
            frequency: 80.0 + 400.0 * ((produced as f64 * 0.00013).sin().abs()),
            tenseness: ((produced as f64 * 0.0007).sin() * 0.5 + 0.5).clamp(0.0, 1.0),
            tongue_index: ((produced as f64 * 0.0003).cos() * 0.5 + 0.5).clamp(0.0, 1.0),
            tongue_diameter: 2.05 + 1.45 * ((produced as f64 * 0.0005).sin().abs()),
            constriction_index: 30.0 * ((produced as f64 * 0.0002).cos().abs()),
            constriction_diameter: 5.0 * ((produced as f64 * 0.0004).sin().abs()),
            velum_target: 0.4 * ((produced as f64 * 0.0006).sin().abs()),
            ..VoiceParams::default()
        };
        params.sanitize();
        handle.set_params(params);

        let asp = &noise[produced % 4000..produced % 4000 + len];
        let out = run_voice(&mut voice, asp, asp);
        for &s in &out {
            assert!(s.is_finite(), "non-finite sample at t={produced}");
        }
        produced += len;
    }
}

// Silent rest: zero intensity/fricative/transient strengths settle to silence.
#[test]
fn silent_rest_settles_to_silence() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 13).unwrap();
    let mut params = VoiceParams::default();
    params.intensity = 0.0;
    params.fricative_strength = 0.0;
    params.transient_strength = 0.0;
    handle.set_params(params);

    let zeros = vec![0.0; SAMPLE_RATE as usize];
    let out = run_voice(&mut voice, &zeros, &zeros);
    for &s in &out[256..] {
        assert!((s as f64).abs() < 1e-6, "sample {s} not silent");
    }
}

// Schwa hum: held frequency should be recoverable from the output's periodicity.
#[test]
fn schwa_hum_tracks_held_frequency() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 14).unwrap();
    let params = VoiceParams {
        frequency: 140.0,
        intensity: 1.0,
        tenseness: 0.9,
        vibrato_amount: 0.0,
        ..VoiceParams::default()
    };
    handle.set_params(params);

    let zeros = vec![0.0; SAMPLE_RATE as usize * 2];
    let out = run_voice(&mut voice, &zeros, &zeros);
    // Settle past onset transients before measuring periodicity.
    let steady = &out[SAMPLE_RATE as usize..];

    let expected_period = (SAMPLE_RATE as f64 / 140.0).round() as usize;
    let min_period = (SAMPLE_RATE as f64 / (140.0 * 1.01)).round() as usize;
    let max_period = (SAMPLE_RATE as f64 / (140.0 * 0.99)).round() as usize;
    let found = autocorrelation_peak_period(steady, min_period.max(2), max_period + 2);

    assert!(
        found >= min_period && found <= max_period,
        "expected period near {expected_period} (+-1%), found {found}"
    );
}

// Determinism given identical parameters, inputs, and seed.
#[test]
fn deterministic_given_identical_seed() {
    let params = VoiceParams {
        frequency: 180.0,
        tenseness: 0.5,
        constriction_index: 30.0,
        constriction_diameter: 1.0,
        ..VoiceParams::default()
    };
    let noise = deterministic_noise(7, 8000);

    let (mut v1, mut h1, _t1) = Voice::new(SAMPLE_RATE, 44, 99).unwrap();
    h1.set_params(params);
    let out1 = run_voice(&mut v1, &noise, &noise);

    let (mut v2, mut h2, _t2) = Voice::new(SAMPLE_RATE, 44, 99).unwrap();
    h2.set_params(params);
    let out2 = run_voice(&mut v2, &noise, &noise);

    assert_eq!(out1, out2, "identical seed/params/inputs must produce identical output");
}

// Plosive click: closure drops output, release produces a short
// broadband burst exceeding the pre-closure RMS.
#[test]
fn plosive_closure_then_release_produces_click() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 15).unwrap();
    let base = VoiceParams {
        frequency: 140.0,
        intensity: 1.0,
        tenseness: 0.6,
        ..VoiceParams::default()
    };
    handle.set_params(base);

    let noise = deterministic_noise(9, SAMPLE_RATE as usize);
    let mut out = vec![0.0f32; SAMPLE_RATE as usize];

    let closure_start = (SAMPLE_RATE as f64 * 0.25) as usize;
    let closure_end = (SAMPLE_RATE as f64 * 0.35) as usize;

    let mut p = 0usize;
    for block in out.chunks_mut(256) {
        let mut params = base;
        if p >= closure_start && p < closure_end {
            params.constriction_index = 36.0;
            params.constriction_diameter = 0.0;
        } else {
            params.constriction_index = 36.0;
            params.constriction_diameter = 3.0;
        }
        handle.set_params(params);
        voice.process(&noise[p..p + block.len()], &noise[p..p + block.len()], block);
        p += block.len();
    }

    let pre_closure_rms = rms(&out[(closure_start - 4800)..closure_start]);
    let during_closure_peak = out[closure_start + 1000..closure_end - 100]
        .iter()
        .fold(0.0f32, |m, &s| m.max(s.abs()));
    let release_window = &out[closure_end..(closure_end + 1440).min(out.len())];
    let release_peak = release_window.iter().fold(0.0f32, |m, &s| m.max(s.abs()));

    assert!(
        (during_closure_peak as f64) < pre_closure_rms.max(1e-4) * 0.5,
        "closure did not sufficiently quiet output: peak={during_closure_peak}, pre-closure rms={pre_closure_rms}"
    );
    assert!(
        release_peak as f64 > pre_closure_rms * 2.0,
        "release burst {release_peak} did not exceed pre-closure rms {pre_closure_rms} by a healthy margin"
    );
}

// Fricative: unvoiced turbulence noise at a tight constriction should
// carry a steady, bounded amount of energy.
#[test]
fn fricative_constriction_has_steady_energy() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 16).unwrap();
    let params = VoiceParams {
        intensity: 0.0,
        constriction_index: 36.0,
        constriction_diameter: 0.5,
        fricative_strength: 1.0,
        ..VoiceParams::default()
    };
    handle.set_params(params);

    let noise = deterministic_noise(21, SAMPLE_RATE as usize);
    let out = run_voice(&mut voice, &noise, &noise);
    let steady = &out[4800..];
    let level = rms(steady);
    assert!(
        (0.005..=0.5).contains(&level),
        "fricative rms {level} outside the expected noisy-but-bounded range"
    );
}

// Transient discipline, observed from the public API: repeated rapid
// closure/release cycles each add a decaying click but must never let the
// accumulated transients push the waveguide into unbounded energy growth.
#[test]
fn repeated_closures_do_not_accumulate_unbounded_energy() {
    let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, 23).unwrap();
    let base = VoiceParams {
        frequency: 140.0,
        intensity: 1.0,
        tenseness: 0.6,
        ..VoiceParams::default()
    };
    handle.set_params(base);

    let noise = deterministic_noise(41, SAMPLE_RATE as usize);
    let mut out = vec![0.0f32; SAMPLE_RATE as usize];

    // Toggle the constriction closed/open every 256-sample block for a full
    // second -- far faster than a transient's 0.2s life time, so many
    // overlap at once.
    let mut p = 0usize;
    let mut closed = false;
    for block in out.chunks_mut(256) {
        let mut params = base;
        params.constriction_index = 36.0;
        params.constriction_diameter = if closed { 0.0 } else { 3.0 };
        closed = !closed;
        handle.set_params(params);
        voice.process(&noise[p..p + block.len()], &noise[p..p + block.len()], block);
        p += block.len();
    }

    for &s in &out {
        assert!(s.is_finite(), "non-finite sample under rapid closure cycling");
    }
    assert!(rms(&out) <= 1.0, "rms {} exceeds 1.0 under rapid closure cycling", rms(&out));
}

// Multiple voices seeded differently should diverge, never lock in step.
#[test]
fn multi_voice_outputs_are_independent() {
    let mut engine = Engine::new(SAMPLE_RATE);
    let mut handles = Vec::new();
    for seed in 0..4u16 {
        let (mut handle, _telemetry) = engine.add_voice(44, seed).unwrap();
        handle.set_params(VoiceParams {
            frequency: 140.0,
            intensity: 1.0,
            tenseness: 0.6,
            ..VoiceParams::default()
        });
        handles.push(handle);
    }

    let noise = deterministic_noise(31, SAMPLE_RATE as usize);
    let mut outs: Vec<Vec<f32>> = Vec::new();
    // Drive each voice individually (rather than through Engine's mixer) so
    // per-voice outputs can be compared directly.
    // Engine itself only exposes a summed mix, so reconstruct per-voice
    // voices with the same construction here for the comparison.
    drop(engine);
    for seed in 0..4u16 {
        let (mut voice, mut handle, _telemetry) = Voice::new(SAMPLE_RATE, 44, seed).unwrap();
        handle.set_params(VoiceParams {
            frequency: 140.0,
            intensity: 1.0,
            tenseness: 0.6,
            ..VoiceParams::default()
        });
        outs.push(run_voice(&mut voice, &noise, &noise));
    }

    for i in 0..outs.len() {
        for j in (i + 1)..outs.len() {
            let cc = cross_correlation(&outs[i], &outs[j]).abs();
            assert!(cc < 0.2, "voices {i} and {j} too correlated: {cc}");
            let mean_abs_diff: f64 = outs[i]
                .iter()
                .zip(outs[j].iter())
                .map(|(&a, &b)| ((a - b) as f64).abs())
                .sum::<f64>()
                / outs[i].len() as f64;
            assert!(
                mean_abs_diff > 0.01,
                "voices {i} and {j} too similar: mean abs diff {mean_abs_diff}"
            );
        }
    }
}

// Calling `init(n)` twice with the same n leaves waveguide arrays
// identical. Since resizing is only a public-surface side effect of
// changing `tract_len`, this drives two separate resize-to-50 transitions
// (via an intervening resize to 44) and compares the telemetry shape
// produced by one identical block of easing after each -- both start from
// the same freshly re-seeded n=50 state, so they must match bit-for-bit.
#[test]
fn resize_to_same_tract_len_is_idempotent() {
    let (mut voice, mut handle, mut telemetry) = Voice::new(SAMPLE_RATE, 44, 17).unwrap();
    let zeros = vec![0.0; 256];
    let mut out = vec![0.0f32; 256];

    let mut params = VoiceParams {
        tract_len: 50,
        ..VoiceParams::default()
    };
    handle.set_params(params);
    voice.process(&zeros, &zeros, &mut out);
    let shape1 = telemetry.read().clone();

    params.tract_len = 44;
    handle.set_params(params);
    voice.process(&zeros, &zeros, &mut out);

    params.tract_len = 50;
    handle.set_params(params);
    voice.process(&zeros, &zeros, &mut out);
    let shape2 = telemetry.read().clone();

    assert_eq!(shape1.diameter.len(), shape2.diameter.len());
    for (a, b) in shape1.diameter.iter().zip(shape2.diameter.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
    assert_relative_eq!(shape1.nose_diameter_0, shape2.nose_diameter_0, epsilon = 1e-12);
}
