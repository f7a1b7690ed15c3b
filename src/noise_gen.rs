/// Per-voice deterministic 1-D gradient noise.
///
/// Glottis uses this for vibrato wobble and tenseness/aspiration jitter
/// (see `Glottis::step`/`adjust_block_parameters`). Each voice owns its own
/// `NoiseGenerator`, seeded distinctly, so the wobble of concurrent voices
/// desynchronizes.
///
/// This is plain permutation-table gradient noise (Ken Perlin's 1983
/// construction, restricted to one dimension with unit gradients), not true
/// simplex noise -- any deterministic, approximately-zero-mean,
/// `[-1, 1]`-bounded implementation works equally well here.
pub struct NoiseGenerator {
    perm: [u8; 512],
}

impl NoiseGenerator {
    pub fn new(seed: u16) -> NoiseGenerator {
        let mut p = [0u8; 256];
        for (i, slot) in p.iter_mut().enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates shuffle driven by a tiny xorshift keyed on the seed,
        // so the permutation (and therefore every simplex() call) is fully
        // determined by `seed`.
        let mut state = (seed as u32).wrapping_mul(2654435761).wrapping_add(1);
        let mut next_u32 = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        for i in (1..256).rev() {
            let j = (next_u32() as usize) % (i + 1);
            p.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = p[i & 255];
        }

        NoiseGenerator { perm }
    }

    /// Gradient noise at `x`, in `[-1, 1]` with approximately zero mean.
    pub fn simplex(&self, x: f64) -> f64 {
        let xi = x.floor();
        let xf = x - xi;
        let i0 = (xi as i64 & 255) as usize;
        let i1 = (i0 + 1) & 255;

        let g0 = gradient(self.perm[i0]);
        let g1 = gradient(self.perm[i1]);

        let n0 = g0 * xf;
        let n1 = g1 * (xf - 1.0);

        let u = fade(xf);
        n0 + u * (n1 - n0)
    }
}

fn gradient(hash: u8) -> f64 {
    if hash & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}
