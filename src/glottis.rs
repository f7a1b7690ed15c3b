use std::f64::consts::PI;

use crate::{
    math::interpolate,
    noise::{self, NoiseSource},
    noise_gen::NoiseGenerator,
    params::VoiceParams,
};

/// LF-model pulse oscillator: the glottal source half of a `Voice`.
///
/// Emits one sample per call to `step`, re-deriving its Liljencrants-Fant
/// shape coefficients every time a glottal period boundary is crossed
/// (`setup_waveform`), and rolls its frequency/tenseness smoothing forward
/// once per `process_block` call.
pub struct Glottis {
    sample_rate: u32,
    noise_generator: NoiseGenerator,
    aspiration_noise_source: Box<dyn FnMut() -> f64 + Send + 'static>,

    total_time: f64,
    time_in_waveform: f64,
    waveform_length: f64,

    old_frequency: f64,
    new_frequency: f64,
    smooth_frequency: f64,

    old_tenseness: f64,
    new_tenseness: f64,

    loudness: f64,

    // LF waveform shape, recomputed at each period boundary.
    alpha: f64,
    e0: f64,
    epsilon: f64,
    shift: f64,
    delta: f64,
    te: f64,
    omega: f64,
}

impl Glottis {
    pub fn new(sample_rate: u32, rng: &mut dyn NoiseSource<f64>, seed: u16) -> Glottis {
        let mut glottis = Glottis {
            sample_rate,
            noise_generator: NoiseGenerator::new(seed),
            aspiration_noise_source: noise::new_filtered_noise_source(
                500.0,
                0.5,
                sample_rate,
                0x8000,
                rng,
            ),

            total_time: 0.0,
            time_in_waveform: 0.0,
            waveform_length: 0.0,

            old_frequency: 140.0,
            new_frequency: 140.0,
            smooth_frequency: 140.0,

            old_tenseness: 0.6,
            new_tenseness: 0.6,

            loudness: 1.0,

            alpha: 0.0,
            e0: 0.0,
            epsilon: 0.0,
            shift: 0.0,
            delta: 0.0,
            te: 0.0,
            omega: 0.0,
        };
        glottis.setup_waveform(140.0, 0.6, 1.0);
        glottis
    }

    /// Advance the block-level smoothing state (frequency chase, vibrato,
    /// tenseness jitter) once, then emit `voiced_out.len()` samples.
    pub fn process_block(
        &mut self,
        params: &VoiceParams,
        aspiration_noise_in: &[f64],
        voiced_out: &mut [f64],
        aspiration_out: &mut [f64],
        noise_mod_out: &mut [f64],
    ) {
        let len = voiced_out.len();
        debug_assert_eq!(len, aspiration_out.len());
        debug_assert_eq!(len, noise_mod_out.len());

        let delta_time = len as f64 / self.sample_rate as f64;
        let new_time = self.total_time + delta_time;
        self.adjust_block_parameters(params, new_time);

        for j in 0..len {
            let lambda = j as f64 / len as f64;
            let asp_in = aspiration_noise_in.get(j).copied().unwrap_or(0.0);
            let (voiced, aspiration, noise_mod) = self.step(params, lambda, asp_in);
            voiced_out[j] = voiced;
            aspiration_out[j] = aspiration;
            noise_mod_out[j] = noise_mod;
        }
    }

    /// For a caller driving its own noise source instead of the
    /// crate-provided one.
    pub fn step(&mut self, params: &VoiceParams, lambda: f64, aspiration_noise_in: f64) -> (f64, f64, f64) {
        self.total_time += 1.0 / self.sample_rate as f64;
        self.time_in_waveform += 1.0 / self.sample_rate as f64;

        if self.time_in_waveform > self.waveform_length {
            self.time_in_waveform -= self.waveform_length;
            let frequency = interpolate(self.old_frequency, self.new_frequency, lambda);
            let tenseness = interpolate(self.old_tenseness, self.new_tenseness, lambda);
            self.setup_waveform(frequency, tenseness, params.tenseness_mult);
        }

        let t = self.time_in_waveform / self.waveform_length;
        let voiced = self.normalized_lf_waveform(t) * params.intensity * self.loudness;

        let noise_mod = self.noise_modulator(params);

        let aspiration1 = params.intensity
            * (1.0 - params.tenseness.max(0.0).sqrt())
            * noise_mod
            * aspiration_noise_in
            * 8.0;
        let aspiration =
            aspiration1 * (0.2 + 0.02 * self.noise_generator.simplex(self.total_time * 1.99));

        (voiced, aspiration, noise_mod)
    }

    /// For callers driving `step` directly instead of `process_block`.
    pub fn aspiration_noise_sample(&mut self) -> f64 {
        (self.aspiration_noise_source)()
    }

    fn noise_modulator(&self, params: &VoiceParams) -> f64 {
        let voiced = 0.1
            + 0.2
                * (2.0 * PI * self.time_in_waveform / self.waveform_length)
                    .sin()
                    .max(0.0);
        params.tenseness * params.intensity * voiced
            + (1.0 - params.tenseness * params.intensity) * 0.3
    }

    fn adjust_block_parameters(&mut self, params: &VoiceParams, new_time: f64) {
        let target_frequency = params.frequency * 2f64.powf(params.pitchbend / 12.0);

        if self.smooth_frequency < target_frequency {
            self.smooth_frequency = target_frequency.min(self.smooth_frequency * 1.1);
        } else if self.smooth_frequency > target_frequency {
            self.smooth_frequency = target_frequency.max(self.smooth_frequency / 1.1);
        }

        let vibrato = params.vibrato_amount
            * (2.0 * PI * new_time * params.vibrato_frequency).sin()
            + 0.02 * self.noise_generator.simplex(new_time * 4.07);

        self.old_frequency = self.new_frequency;
        self.new_frequency = (self.smooth_frequency * (1.0 + vibrato)).max(10.0);

        self.old_tenseness = self.new_tenseness;
        self.new_tenseness = (params.tenseness
            + 0.1 * self.noise_generator.simplex(new_time * 0.46)
            + 0.05 * self.noise_generator.simplex(new_time * 0.36))
        .max(0.0);
    }

    /// Exact Liljencrants-Fant coefficient derivation. Every constant here
    /// is load-bearing; do not "simplify" the chain.
    fn setup_waveform(&mut self, frequency: f64, tenseness: f64, tenseness_mult: f64) {
        self.waveform_length = 1.0 / frequency;
        self.loudness = (tenseness_mult * tenseness).max(0.0).powf(0.25);

        let rd = (3.0 * (1.0 - tenseness)).clamp(0.5, 2.7);

        let ra = -0.01 + 0.048 * rd;
        let rk = 0.224 + 0.118 * rd;
        let rg = (rk / 4.0) * (0.5 + 1.2 * rk) / (0.11 * rd - ra * (0.5 + 1.2 * rk));

        let ta = ra;
        let tp = 1.0 / (2.0 * rg);
        let te = tp + tp * rk;

        let epsilon = 1.0 / ta;
        let shift = (-epsilon * (1.0 - te)).exp();
        let delta = 1.0 - shift;

        let rhs_integral = ((shift - 1.0) / epsilon + (1.0 - te) * shift) / delta;
        let lower_integral = rhs_integral - (te - tp) / 2.0;
        let upper_integral = -lower_integral;

        let omega = PI / tp;
        let s = (omega * te).sin();

        let y = -PI * s * upper_integral / (2.0 * tp);
        let z = y.ln();
        let alpha = z / (tp / 2.0 - te);
        let e0 = -1.0 / (s * (alpha * te).exp());

        self.alpha = alpha;
        self.e0 = e0;
        self.epsilon = epsilon;
        self.shift = shift;
        self.delta = delta;
        self.te = te;
        self.omega = omega;
    }

    fn normalized_lf_waveform(&self, t: f64) -> f64 {
        if t > self.te {
            (-(-self.epsilon * (t - self.te)).exp() + self.shift) / self.delta
        } else {
            self.e0 * (self.alpha * t).exp() * (self.omega * t).sin()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::xorshift::XorShift128;
    use approx::assert_relative_eq;

    #[test]
    fn rd_stays_within_clamp_range_for_extreme_tenseness() {
        let mut rng = XorShift128::new(1);
        let mut g = Glottis::new(48000, &mut rng, 1);
        // tenseness = 1 -> Rd clamps to 0.5; tenseness = 0 -> Rd clamps to 2.7.
        g.setup_waveform(140.0, 1.0, 1.0);
        assert!(g.waveform_length.is_finite());
        g.setup_waveform(140.0, 0.0, 1.0);
        assert!(g.waveform_length.is_finite());
    }

    #[test]
    fn waveform_length_tracks_frequency() {
        let mut rng = XorShift128::new(2);
        let mut g = Glottis::new(48000, &mut rng, 2);
        g.setup_waveform(200.0, 0.6, 1.0);
        assert_relative_eq!(g.waveform_length, 1.0 / 200.0, epsilon = 1e-12);
    }

    #[test]
    fn process_block_produces_finite_output() {
        let mut rng = XorShift128::new(3);
        let mut g = Glottis::new(48000, &mut rng, 3);
        let params = VoiceParams::default();
        let asp_in = vec![0.1; 128];
        let mut voiced = vec![0.0; 128];
        let mut aspiration = vec![0.0; 128];
        let mut noise_mod = vec![0.0; 128];
        g.process_block(
            &params,
            &asp_in,
            &mut voiced,
            &mut aspiration,
            &mut noise_mod,
        );
        for &v in voiced
            .iter()
            .chain(aspiration.iter())
            .chain(noise_mod.iter())
        {
            assert!(v.is_finite());
        }
    }
}
