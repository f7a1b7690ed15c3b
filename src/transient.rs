/// A plosive release click injected into the waveguide at a segment where a
/// prior full closure has just reopened.
///
/// Amplitude decays exponentially from `strength` with rate `exponent`,
/// added into both travelling-wave components at `position` until
/// `timeAlive` (tracked externally as `Tract::time - start_time`) exceeds
/// `life_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transient {
    pub position: usize,
    pub start_time: f64,
    pub life_time: f64,
    pub strength: f64,
    pub exponent: f64,
}
