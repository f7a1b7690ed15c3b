use crate::math::{interpolate, sqr};
use crate::transient::Transient;

/// Kelly-Lochbaum scattering waveguide: `N` oral segments plus an `M`-segment
/// nasal side branch joined at a three-port junction. Owns no parameters of
/// its own -- everything it reads each block/sample comes from
/// [`crate::tract_shaper::TractShaper`] (target shape) or is passed into
/// [`Tract::run_step`] (glottal/turbulence input, interpolation fraction).
pub struct Tract {
    n: usize,
    nose_len: usize,
    nose_start: usize,
    blade_start: usize,
    tip_start: usize,
    lip_start: usize,

    sample_rate: u32,
    time: f64,

    right: Vec<f64>,
    left: Vec<f64>,
    reflection: Vec<f64>,
    new_reflection: Vec<f64>,
    junction_output_right: Vec<f64>,
    junction_output_left: Vec<f64>,

    pub diameter: Vec<f64>,

    pub transients: Vec<Transient>,

    nose_right: Vec<f64>,
    nose_left: Vec<f64>,
    nose_junction_output_right: Vec<f64>,
    nose_junction_output_left: Vec<f64>,
    nose_reflection: Vec<f64>,
    pub nose_diameter: Vec<f64>,

    reflection_left: f64,
    reflection_right: f64,
    new_reflection_left: f64,
    new_reflection_right: f64,
    reflection_nose: f64,
    new_reflection_nose: f64,
}

const GLOTTAL_REFLECTION: f64 = 0.75;
const LIP_REFLECTION: f64 = -0.85;
const FADE: f64 = 0.999;
const NO_ENERGY_REFLECTION: f64 = 0.999;

fn nose_len_for(n: usize) -> usize {
    28 * n / 44
}

impl Tract {
    pub fn blade_start(&self) -> usize {
        self.blade_start
    }
    pub fn tip_start(&self) -> usize {
        self.tip_start
    }
    pub fn lip_start(&self) -> usize {
        self.lip_start
    }
    pub fn nose_start(&self) -> usize {
        self.nose_start
    }
    pub fn n(&self) -> usize {
        self.n
    }
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn new(n: usize, sample_rate: u32) -> Tract {
        let nose_len = nose_len_for(n);
        let nose_start = n - nose_len + 1;

        let mut tract = Tract {
            n,
            nose_len,
            nose_start,
            blade_start: 10 * n / 44,
            tip_start: 32 * n / 44,
            lip_start: 39 * n / 44,

            sample_rate,
            time: 0.0,

            right: vec![0.0; n],
            left: vec![0.0; n],
            reflection: vec![0.0; n],
            new_reflection: vec![0.0; n],
            junction_output_right: vec![0.0; n],
            junction_output_left: vec![0.0; n + 1],

            diameter: vec![0.0; n],
            transients: Vec::new(),

            nose_right: vec![0.0; nose_len],
            nose_left: vec![0.0; nose_len],
            nose_junction_output_right: vec![0.0; nose_len],
            nose_junction_output_left: vec![0.0; nose_len + 1],
            nose_reflection: vec![0.0; nose_len],
            nose_diameter: vec![0.0; nose_len],

            reflection_left: 0.0,
            reflection_right: 0.0,
            new_reflection_left: 0.0,
            new_reflection_right: 0.0,
            reflection_nose: 0.0,
            new_reflection_nose: 0.0,
        };
        tract.seed_rest_profile();
        tract.seed_nose_profile();
        tract
    }

    fn seed_rest_profile(&mut self) {
        let n = self.n as f64;
        for i in 0..self.n {
            let d = if (i as f64) < 7.0 * n / 44.0 - 0.5 {
                0.6
            } else if (i as f64) < 12.0 * n / 44.0 {
                1.1
            } else {
                1.5
            };
            self.diameter[i] = d;
        }
    }

    fn seed_nose_profile(&mut self) {
        let m = self.nose_len;
        for i in 0..m {
            let d = 2.0 * i as f64 / m as f64;
            let diameter = if d < 1.0 {
                0.4 + 1.6 * d
            } else {
                0.5 + 1.5 * (2.0 - d)
            };
            self.nose_diameter[i] = diameter.min(1.9);
        }
        // Internal nasal-branch reflections are derived once from this rest
        // profile and never recomputed (see DESIGN.md) -- only noseDiameter[0]
        // (the velum) moves after this point, and the three-port junction
        // reflections (which do react to it) are recalculated every block.
        self.calculate_nose_reflections();
    }

    fn calculate_nose_reflections(&mut self) {
        let m = self.nose_len;
        let mut a = vec![0.0; m];
        for i in 0..m {
            a[i] = 1e-6_f64.max(sqr(self.nose_diameter[i]));
        }
        for i in 1..m {
            let sum = a[i - 1] + a[i];
            self.nose_reflection[i] = if sum.abs() > 1e-9 {
                (a[i - 1] - a[i]) / sum
            } else {
                NO_ENERGY_REFLECTION
            };
        }
    }

    /// Recomputes reflection coefficients from the current areas. Called
    /// once per block, after diameters have eased toward their targets.
    pub fn calculate_reflections(&mut self) {
        self.calculate_main_tract_reflections();
        self.calculate_nose_junction_reflections();
    }

    fn calculate_main_tract_reflections(&mut self) {
        let mut a = vec![0.0; self.n];
        for i in 0..self.n {
            a[i] = sqr(self.diameter[i]);
        }
        for i in 1..self.n {
            self.reflection[i] = self.new_reflection[i];
            let sum = a[i - 1] + a[i];
            self.new_reflection[i] = if sum.abs() > 1e-9 {
                (a[i - 1] - a[i]) / sum
            } else {
                NO_ENERGY_REFLECTION
            };
        }
    }

    fn calculate_nose_junction_reflections(&mut self) {
        self.reflection_left = self.new_reflection_left;
        self.reflection_right = self.new_reflection_right;
        self.reflection_nose = self.new_reflection_nose;

        let velum_a = sqr(self.nose_diameter[0]);
        let an0 = sqr(self.diameter[self.nose_start]);
        let an1 = sqr(self.diameter[self.nose_start + 1]);
        let sum = an0 + an1 + velum_a;

        if sum.abs() > 1e-9 {
            self.new_reflection_left = (2.0 * an0 - sum) / sum;
            self.new_reflection_right = (2.0 * an1 - sum) / sum;
            self.new_reflection_nose = (2.0 * velum_a - sum) / sum;
        } else {
            self.new_reflection_left = NO_ENERGY_REFLECTION;
            self.new_reflection_right = NO_ENERGY_REFLECTION;
            self.new_reflection_nose = NO_ENERGY_REFLECTION;
        }
    }

    /// One scattering sub-step at interpolation fraction `lambda`; returns
    /// the unscaled `lip_output + nose_output` sum.
    pub fn run_step(
        &mut self,
        glottal_output: f64,
        fricative_noise_in: f64,
        noise_mod: f64,
        constriction_index: f64,
        constriction_diameter: f64,
        fricative_strength: f64,
        lambda: f64,
    ) -> f64 {
        let n = self.n;

        self.process_transients();
        self.add_turbulence_noise(
            fricative_noise_in,
            noise_mod,
            constriction_index,
            constriction_diameter,
            fricative_strength,
        );

        self.junction_output_right[0] = self.left[0] * GLOTTAL_REFLECTION + glottal_output;
        self.junction_output_left[n] = self.right[n - 1] * LIP_REFLECTION;

        for i in 1..n {
            if i == self.nose_start {
                continue;
            }
            let r = interpolate(self.reflection[i], self.new_reflection[i], lambda);
            let w = r * (self.right[i - 1] + self.left[i]);
            self.junction_output_right[i] = self.right[i - 1] - w;
            self.junction_output_left[i] = self.left[i] + w;
        }

        // Three-port junction at the nose branch.
        let i = self.nose_start;
        let r_l = interpolate(self.reflection_left, self.new_reflection_left, lambda);
        self.junction_output_left[i] =
            r_l * self.right[i - 1] + (1.0 + r_l) * (self.nose_left[0] + self.left[i]);
        let r_r = interpolate(self.reflection_right, self.new_reflection_right, lambda);
        self.junction_output_right[i] =
            r_r * self.left[i] + (1.0 + r_r) * (self.right[i - 1] + self.nose_left[0]);
        let r_n = interpolate(self.reflection_nose, self.new_reflection_nose, lambda);
        self.nose_junction_output_right[0] =
            r_n * self.nose_left[0] + (1.0 + r_n) * (self.left[i] + self.right[i - 1]);

        for i in 0..n {
            self.right[i] = self.junction_output_right[i] * FADE;
            self.left[i] = self.junction_output_left[i + 1] * FADE;
        }
        let lip_output = self.right[n - 1];

        let m = self.nose_len;
        self.nose_junction_output_left[m] = self.nose_right[m - 1] * LIP_REFLECTION;
        for i in 1..m {
            let w = self.nose_reflection[i] * (self.nose_right[i - 1] + self.nose_left[i]);
            self.nose_junction_output_right[i] = self.nose_right[i - 1] - w;
            self.nose_junction_output_left[i] = self.nose_left[i] + w;
        }
        for i in 0..m {
            self.nose_right[i] = self.nose_junction_output_right[i] * FADE;
            self.nose_left[i] = self.nose_junction_output_left[i + 1] * FADE;
        }
        let nose_output = self.nose_right[m - 1];

        self.time += 0.5 / self.sample_rate as f64;

        lip_output + nose_output
    }

    fn process_transients(&mut self) {
        for i in (0..self.transients.len()).rev() {
            let trans = self.transients[i];
            let time_alive = self.time - trans.start_time;
            if time_alive > trans.life_time {
                self.transients.remove(i);
                continue;
            }
            let amplitude = trans.strength * 2f64.powf(-trans.exponent * time_alive) / 2.0;
            self.right[trans.position] += amplitude;
            self.left[trans.position] += amplitude;
        }
    }

    /// Reacts to the current constriction every run-step; no envelope state.
    fn add_turbulence_noise(
        &mut self,
        fricative_noise_in: f64,
        noise_mod: f64,
        constriction_index: f64,
        constriction_diameter: f64,
        fricative_strength: f64,
    ) {
        if !(2.0..=self.n as f64).contains(&constriction_index) || constriction_diameter <= 0.0 {
            return;
        }

        let intensity = fricative_strength * 2.0;
        let turbulence_noise = intensity * noise_mod * fricative_noise_in;

        let thinness = (8.0 * (0.7 - constriction_diameter)).clamp(0.0, 1.0);
        let openness = (30.0 * (constriction_diameter - 0.3)).clamp(0.0, 1.0);
        let shaped = turbulence_noise * thinness * openness;

        let index_floor = constriction_index.floor();
        let delta = constriction_index - index_floor;
        let i0 = index_floor as i64 + 1;
        let i1 = index_floor as i64 + 2;

        if i0 >= 0 && (i0 as usize) < self.n {
            let v = shaped * (1.0 - delta) * 0.5;
            self.right[i0 as usize] += v;
            self.left[i0 as usize] += v;
        }
        if i1 >= 0 && (i1 as usize) < self.n {
            let v = shaped * delta * 0.5;
            self.right[i1 as usize] += v;
            self.left[i1 as usize] += v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_seeds_finite_nonnegative_diameters() {
        let tract = Tract::new(44, 48000);
        assert_eq!(tract.diameter.len(), 44);
        for &d in &tract.diameter {
            assert!(d.is_finite() && d >= 0.0);
        }
        for &d in &tract.nose_diameter {
            assert!(d.is_finite() && d >= 0.0 && d <= 1.9);
        }
    }

    #[test]
    fn run_step_stays_finite_from_rest() {
        let mut tract = Tract::new(44, 48000);
        tract.calculate_reflections();
        for _ in 0..2000 {
            let out = tract.run_step(0.05, 0.0, 0.3, 0.0, 3.0, 0.0, 0.5);
            assert!(out.is_finite());
        }
    }

    #[test]
    fn nose_len_generalizes_with_n() {
        let small = Tract::new(30, 48000);
        let big = Tract::new(60, 48000);
        assert_eq!(small.nose_len, 28 * 30 / 44);
        assert_eq!(big.nose_len, 28 * 60 / 44);
    }
}
