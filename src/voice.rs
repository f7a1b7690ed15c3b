use rand::{Rng, SeedableRng};
use triple_buffer::Output;

use crate::{
    error::{EngineError, Result},
    glottis::Glottis,
    noise::NoiseSource,
    params::{self, VoiceHandle, VoiceParams},
    telemetry::{self, Telemetry, TelemetryReader},
    tract_shaper::TractShaper,
};

/// Per-`process_block` call a host may submit at most this many samples;
/// longer requests are chunked.
pub const MAX_BLOCK_LEN: usize = 512;

const MIN_TRACT_LEN: u8 = 30;
const MAX_TRACT_LEN: u8 = 60;
const MAX_SAMPLE_RATE: u32 = u32::MAX / 4;

/// One independent synthesis channel: a `Glottis` feeding a `TractShaper`
/// (which owns the `Tract`), driven once per block by the latest
/// `VoiceParams` snapshot published through its `VoiceHandle`.
pub struct Voice {
    glottis: Glottis,
    shaper: TractShaper,
    params: Output<VoiceParams>,
    telemetry: triple_buffer::Input<Telemetry>,
    sample_rate: u32,
    current_tract_len: u8,

    // Per-block scratch, sized once to `MAX_BLOCK_LEN` and reused -- the
    // hot path never allocates.
    voiced: Vec<f64>,
    aspiration: Vec<f64>,
    noise_mod: Vec<f64>,
}

struct SeededNoise {
    rng: rand::rngs::StdRng,
}

impl NoiseSource<f64> for SeededNoise {
    fn noise(&mut self) -> f64 {
        self.rng.gen()
    }
}

impl Voice {
    /// Builds one voice plus the control-side handle for it and a telemetry
    /// reader. `seed` desynchronizes this voice's wobble/noise from every
    /// other voice, so concurrently running voices never drift in lockstep.
    pub fn new(sample_rate: u32, tract_len: u8, seed: u16) -> Result<(Voice, VoiceHandle, TelemetryReader)> {
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(EngineError::InvalidSampleRate {
                got: sample_rate,
                max: MAX_SAMPLE_RATE,
            });
        }
        if !(MIN_TRACT_LEN..=MAX_TRACT_LEN).contains(&tract_len) {
            return Err(EngineError::InvalidTractLength {
                got: tract_len,
                min: MIN_TRACT_LEN,
                max: MAX_TRACT_LEN,
            });
        }

        let mut noise = SeededNoise {
            rng: rand::rngs::StdRng::seed_from_u64(seed as u64),
        };
        let glottis = Glottis::new(sample_rate, &mut noise, seed);
        let shaper = TractShaper::new(tract_len as usize, sample_rate);

        let initial_params = VoiceParams {
            tract_len,
            ..VoiceParams::default()
        };
        let (handle, params_output) = params::channel(initial_params);
        let (telemetry_input, telemetry_reader) = telemetry::channel(tract_len as usize);

        let voice = Voice {
            glottis,
            shaper,
            params: params_output,
            telemetry: telemetry_input,
            sample_rate,
            current_tract_len: tract_len,
            voiced: vec![0.0; MAX_BLOCK_LEN],
            aspiration: vec![0.0; MAX_BLOCK_LEN],
            noise_mod: vec![0.0; MAX_BLOCK_LEN],
        };
        Ok((voice, handle, telemetry_reader))
    }

    /// Re-`init`s the waveguide at a new tract length. Only ever called from
    /// the top of `process_block`, before any sample of the current call is
    /// produced -- a mid-block `n` change is deferred to the next call.
    fn resize_tract(&mut self, tract_len: u8) {
        log::debug!(
            "resizing voice tract {} -> {tract_len} segments (may introduce a click)",
            self.current_tract_len
        );
        self.shaper.resize(tract_len as usize, self.sample_rate);
        self.current_tract_len = tract_len;
    }

    /// Processes an arbitrary-length request by chunking it into
    /// `MAX_BLOCK_LEN`-sized blocks.
    pub fn process(&mut self, aspiration_noise_in: &[f64], fricative_noise_in: &[f64], out: &mut [f32]) {
        debug_assert_eq!(aspiration_noise_in.len(), out.len());
        debug_assert_eq!(fricative_noise_in.len(), out.len());

        let mut p = 0;
        while p < out.len() {
            let len = (out.len() - p).min(MAX_BLOCK_LEN);
            self.process_block(
                &aspiration_noise_in[p..p + len],
                &fricative_noise_in[p..p + len],
                &mut out[p..p + len],
            );
            p += len;
        }
    }

    /// The allocation-free hot path: `B <= MAX_BLOCK_LEN` samples in, one
    /// block's worth of `Glottis` -> `Tract` composition, mono samples out.
    fn process_block(&mut self, aspiration_noise_in: &[f64], fricative_noise_in: &[f64], out: &mut [f32]) {
        let len = out.len();
        debug_assert!(len <= MAX_BLOCK_LEN);

        let mut params = *self.params.read();
        params.sanitize();

        if params.tract_len != self.current_tract_len {
            self.resize_tract(params.tract_len);
        }

        let voiced = &mut self.voiced[..len];
        let aspiration = &mut self.aspiration[..len];
        let noise_mod = &mut self.noise_mod[..len];
        self.glottis
            .process_block(&params, aspiration_noise_in, voiced, aspiration, noise_mod);

        let delta_time = len as f64 / self.sample_rate as f64;
        self.shaper.begin_block(&params, delta_time);

        for j in 0..len {
            let glottal_output = voiced[j] + aspiration[j];
            let lambda1 = j as f64 / len as f64;
            let lambda2 = (j as f64 + 0.5) / len as f64;

            let sub1 = self.shaper.tract.run_step(
                glottal_output,
                fricative_noise_in[j],
                noise_mod[j],
                params.constriction_index,
                params.constriction_diameter,
                params.fricative_strength,
                lambda1,
            );
            let sub2 = self.shaper.tract.run_step(
                glottal_output,
                fricative_noise_in[j],
                noise_mod[j],
                params.constriction_index,
                params.constriction_diameter,
                params.fricative_strength,
                lambda2,
            );

            // 2x oversampling: average the two sub-steps (the ×0.125 here
            // is ×0.25 per sub-step average, halved again for headroom).
            let sample = (sub1 + sub2) * 0.125;
            out[j] = if sample.is_finite() { sample as f32 } else { 0.0 };
        }

        // Mutate the back buffer in place rather than constructing a fresh
        // `Telemetry`, so a steady-state call never allocates. `diameter`
        // only needs resizing right after a tract resize, which already
        // reallocates elsewhere this same block.
        let telemetry = self.telemetry.input_buffer_mut();
        if telemetry.diameter.len() != self.shaper.tract.diameter.len() {
            telemetry.diameter.resize(self.shaper.tract.diameter.len(), 0.0);
        }
        telemetry.diameter.copy_from_slice(&self.shaper.tract.diameter);
        telemetry.nose_diameter_0 = self.shaper.tract.nose_diameter[0];
        self.telemetry.publish();
    }
}
