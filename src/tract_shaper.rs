use std::f64::consts::PI;

use crate::{
    math::{self, linear_map, sqr},
    params::VoiceParams,
    tract::Tract,
    transient::Transient,
};

const GRID_OFFSET: f64 = 1.7;

/// Target-diameter shape rules (tongue body, tongue-tip constriction, lip
/// constriction) plus tract easing and transient triggering -- the part of
/// the vocal tract that reacts to control parameters, as opposed to `Tract`
/// itself which only knows about wave scattering.
pub struct TractShaper {
    pub tract: Tract,
    target_diameter: Vec<f64>,
    last_obstruction: i64,
}

impl TractShaper {
    pub fn new(n: usize, sample_rate: u32) -> TractShaper {
        let tract = Tract::new(n, sample_rate);
        let mut shaper = TractShaper {
            target_diameter: tract.diameter.clone(),
            tract,
            last_obstruction: -1,
        };
        shaper.tract.calculate_reflections();
        shaper
    }

    /// Re-`init` on a tract-length change. Always called at block start,
    /// never mid-block.
    pub fn resize(&mut self, n: usize, sample_rate: u32) {
        *self = TractShaper::new(n, sample_rate);
    }

    /// Runs once per block, before the per-sample scattering loop: recomputes
    /// `targetDiameter` from this block's parameters, eases `diameter`
    /// toward it, triggers transients on closure release, then recomputes
    /// the scattering reflection coefficients from the new areas.
    pub fn begin_block(&mut self, params: &VoiceParams, block_time: f64) {
        let velum_override = self.set_target_diameters(params);
        self.adjust_tract_shape(params, block_time, velum_override);
        self.tract.calculate_reflections();
    }

    fn set_target_diameters(&mut self, params: &VoiceParams) -> Option<f64> {
        let n = self.tract.n();
        let blade_start = self.tract.blade_start();
        let tip_start = self.tract.tip_start();
        let lip_start = self.tract.lip_start();
        let nose_start = self.tract.nose_start();

        let tongue_index_seg = (blade_start as f64 + 2.0)
            + params.tongue_index * ((tip_start as f64 - 3.0) - (blade_start as f64 + 2.0));

        for i in 0..n {
            self.target_diameter[i] = Self::tongue_body_diameter(
                i,
                n,
                blade_start,
                tip_start,
                lip_start,
                tongue_index_seg,
                params.tongue_diameter,
            );
        }

        let mut velum_override = None;
        if params.constriction_index > 0.0 && params.constriction_diameter > -1.6 {
            if params.constriction_index > nose_start as f64 && params.constriction_diameter < -0.8
            {
                velum_override = Some(0.4);
            }
            let dia = (params.constriction_diameter - 0.3).max(0.0);
            let width = linear_map(
                params.constriction_index,
                25.0 * n as f64 / 44.0,
                tip_start as f64,
                10.0,
                5.0,
            ) * n as f64
                / 44.0;
            self.apply_constriction_overlay(params.constriction_index, dia, width);
        }

        let lip_index = (n - 2) as f64;
        let lip_dia = (params.lip_diameter - 0.3).max(0.0);
        self.apply_constriction_overlay(lip_index, lip_dia, 5.0);

        velum_override
    }

    #[allow(clippy::too_many_arguments)]
    fn tongue_body_diameter(
        i: usize,
        n: usize,
        blade_start: usize,
        tip_start: usize,
        lip_start: usize,
        tongue_index_seg: f64,
        tongue_diameter: f64,
    ) -> f64 {
        if (i as f64) < 7.0 * n as f64 / 44.0 - 0.5 {
            return 0.6;
        }
        if i < blade_start {
            return 1.1;
        }
        if i >= lip_start {
            return 1.5;
        }

        let t = 1.1 * PI * (tongue_index_seg - i as f64) / (tip_start - blade_start) as f64;
        let fixed_tongue_diameter = 2.0 + (tongue_diameter - 2.0) / 1.5;
        let mut curve = (1.5 - fixed_tongue_diameter + GRID_OFFSET) * t.cos();

        if i + 2 == blade_start || i + 1 == lip_start {
            curve *= 0.8;
        }
        if i == blade_start || i + 2 == lip_start {
            curve *= 0.94;
        }

        1.5 - curve
    }

    fn apply_constriction_overlay(&mut self, index: f64, dia: f64, width: f64) {
        let n = self.tract.n();
        let center = index.round() as i64;
        let hi = (width + 1.0).ceil() as i64;
        let lo = -(width.ceil() as i64) - 1;

        for offset in lo..=hi {
            let k = center + offset;
            if k < 0 || k as usize >= n {
                continue;
            }
            let k = k as usize;
            let relpos = (offset as f64 - index.fract()).abs() - 0.5;
            let shrink = if relpos <= 0.0 {
                0.0
            } else if relpos > width {
                1.0
            } else {
                0.5 * (1.0 - (PI * relpos / width).cos())
            };
            if dia < self.target_diameter[k] {
                self.target_diameter[k] = dia + (self.target_diameter[k] - dia) * shrink;
            }
        }
    }

    fn adjust_tract_shape(&mut self, params: &VoiceParams, block_time: f64, velum_override: Option<f64>) {
        let n = self.tract.n();
        let nose_start = self.tract.nose_start();
        let tip_start = self.tract.tip_start();
        let instant = params.movement_speed < 0.0;
        let amount = block_time * params.movement_speed.abs();

        let mut new_last_obstruction: i64 = -1;
        for i in 0..n {
            let diameter = self.tract.diameter[i];
            let target = self.target_diameter[i];
            if diameter <= 0.0 {
                new_last_obstruction = i as i64;
            }
            if instant {
                self.tract.diameter[i] = target;
                continue;
            }
            let slow_return = if i < nose_start {
                0.6
            } else if i >= tip_start {
                1.0
            } else {
                0.6 + 0.4 * (i - nose_start) as f64 / (tip_start - nose_start) as f64
            };
            self.tract.diameter[i] =
                math::move_towards(diameter, target, slow_return * amount, 2.0 * amount);
        }

        let nose_a0 = sqr(self.tract.nose_diameter[0]);
        if self.last_obstruction >= 0
            && new_last_obstruction < 0
            && nose_a0 < 0.05
            && params.fricative_strength > 0.0
        {
            self.add_transient(self.last_obstruction as usize, params.transient_strength);
        }
        self.last_obstruction = new_last_obstruction;

        let velum_target = velum_override.unwrap_or(params.velum_target);
        self.tract.nose_diameter[0] = if instant {
            velum_target
        } else {
            math::move_towards(
                self.tract.nose_diameter[0],
                velum_target,
                amount * 0.25,
                amount * 0.1,
            )
        };
    }

    fn add_transient(&mut self, position: usize, transient_strength: f64) {
        self.tract.transients.push(Transient {
            position,
            start_time: self.tract.time(),
            life_time: 0.2,
            strength: 0.3 * transient_strength,
            exponent: 200.0,
        });
    }
}
