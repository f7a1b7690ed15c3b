//! Control-plane parameter snapshot and the lock-free channel that carries it
//! from a host's control thread into a `Voice`'s audio thread.
//!
//! Transport is `triple_buffer`: the control side (`VoiceHandle`) owns the
//! `Input` half and writes are non-blocking; the audio side (`Voice`) owns
//! the `Output` half and reads the latest published snapshot once at the top
//! of every `process_block`. Neither side ever waits on the other.

use serde::{Deserialize, Serialize};
use triple_buffer::{Input, Output, TripleBuffer};

/// One field per control parameter in the external-interface table.
///
/// `Copy` so it can be written into the triple-buffer's input slot without
/// allocating; units and ranges are documented per field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Fundamental frequency target before vibrato/pitchbend (Hz), 20-2000.
    pub frequency: f64,
    /// Voiced-component gain, 0-1 (0 for unvoiced consonants).
    pub intensity: f64,
    /// LF shape: 0 breathy, 1 pressed.
    pub tenseness: f64,
    /// Final tenseness scaler; loudness derives from `tenseness_mult * tenseness`.
    pub tenseness_mult: f64,
    /// Depth of F0 modulation, 0-1.
    pub vibrato_amount: f64,
    /// Rate of F0 modulation (Hz), 0-100.
    pub vibrato_frequency: f64,
    /// Pitch bend in semitones, +/-24; multiplies frequency by 2^(pitchbend/12).
    pub pitchbend: f64,
    /// Tract length in segments, 30-60. Changing this queues a tract resize.
    pub tract_len: u8,
    /// Target velum opening (cm), 0-0.4.
    pub velum_target: f64,
    /// Tongue-tip constriction position, in segments, 0..tract_len.
    pub constriction_index: f64,
    /// Tongue-tip constriction aperture (cm), 0-5.
    pub constriction_diameter: f64,
    /// Tongue-body horizontal position, as a fraction 0-1 of its travel range.
    pub tongue_index: f64,
    /// Tongue-body vertical position (cm), 2.05-3.5.
    pub tongue_diameter: f64,
    /// Lip aperture (cm), 0-1.5.
    pub lip_diameter: f64,
    /// Diameter easing rate (cm/s), >=0; negative requests instant snapping.
    pub movement_speed: f64,
    /// Turbulence-noise gain, 0-1.
    pub fricative_strength: f64,
    /// Plosive release-click gain, 0-1.
    pub transient_strength: f64,
}

impl Default for VoiceParams {
    fn default() -> VoiceParams {
        VoiceParams {
            frequency: 140.0,
            intensity: 1.0,
            tenseness: 0.6,
            tenseness_mult: 1.0,
            vibrato_amount: 0.005,
            vibrato_frequency: 6.0,
            pitchbend: 0.0,
            tract_len: 44,
            velum_target: 0.01,
            constriction_index: 0.0,
            constriction_diameter: 3.0,
            tongue_index: 0.5,
            tongue_diameter: 2.43,
            lip_diameter: 1.5,
            movement_speed: 15.0,
            fricative_strength: 1.0,
            transient_strength: 1.0,
        }
    }
}

macro_rules! clamp_field {
    ($self:ident, $field:ident, $default:ident, $lo:expr, $hi:expr) => {
        if $self.$field.is_nan() {
            $self.$field = $default.$field;
        } else if $self.$field < $lo || $self.$field > $hi {
            log::warn!(
                "{} out of range ({}), clamping to [{}, {}]",
                stringify!($field),
                $self.$field,
                $lo,
                $hi
            );
            $self.$field = $self.$field.clamp($lo, $hi);
        }
    };
}

impl VoiceParams {
    /// Clamp every field to its declared range and coerce NaN to the
    /// documented default. `tract_len` is clamped first since
    /// `constriction_index`'s upper bound depends on it.
    pub fn sanitize(&mut self) {
        let default = VoiceParams::default();

        if self.tract_len < 30 || self.tract_len > 60 {
            log::warn!(
                "tract_len out of range ({}), clamping to [30, 60]",
                self.tract_len
            );
            self.tract_len = self.tract_len.clamp(30, 60);
        }

        clamp_field!(self, frequency, default, 20.0, 2000.0);
        clamp_field!(self, intensity, default, 0.0, 1.0);
        clamp_field!(self, tenseness, default, 0.0, 1.0);
        clamp_field!(self, tenseness_mult, default, 0.0, 1.0);
        clamp_field!(self, vibrato_amount, default, 0.0, 1.0);
        clamp_field!(self, vibrato_frequency, default, 0.0, 100.0);
        clamp_field!(self, pitchbend, default, -24.0, 24.0);
        clamp_field!(self, velum_target, default, 0.0, 0.4);
        clamp_field!(
            self,
            constriction_index,
            default,
            0.0,
            self.tract_len as f64
        );
        clamp_field!(self, constriction_diameter, default, 0.0, 5.0);
        clamp_field!(self, tongue_index, default, 0.0, 1.0);
        clamp_field!(self, tongue_diameter, default, 2.05, 3.5);
        clamp_field!(self, lip_diameter, default, 0.0, 1.5);
        clamp_field!(self, fricative_strength, default, 0.0, 1.0);
        clamp_field!(self, transient_strength, default, 0.0, 1.0);
        // movement_speed has no upper bound and a negative value is a valid
        // "instant" request; only NaN needs coercion.
        if self.movement_speed.is_nan() {
            self.movement_speed = default.movement_speed;
        }
    }
}

/// Control-thread handle: publishes new `VoiceParams` snapshots.
pub struct VoiceHandle {
    input: Input<VoiceParams>,
}

impl VoiceHandle {
    pub fn set_params(&mut self, params: VoiceParams) {
        self.input.write(params);
    }

    pub fn params(&self) -> &VoiceParams {
        self.input.input_buffer()
    }
}

/// Build a parameter channel: the control-side handle and the audio-side
/// reader a `Voice` keeps for itself.
pub(crate) fn channel(initial: VoiceParams) -> (VoiceHandle, Output<VoiceParams>) {
    let (input, output) = TripleBuffer::new(&initial).split();
    (VoiceHandle { input }, output)
}

/// Serializable twin of `VoiceParams`, for preset export/import. Never read
/// by the audio thread -- only `VoiceParams` crosses the triple-buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParamsSnapshot {
    pub frequency: f64,
    pub intensity: f64,
    pub tenseness: f64,
    pub tenseness_mult: f64,
    pub vibrato_amount: f64,
    pub vibrato_frequency: f64,
    pub pitchbend: f64,
    pub tract_len: u8,
    pub velum_target: f64,
    pub constriction_index: f64,
    pub constriction_diameter: f64,
    pub tongue_index: f64,
    pub tongue_diameter: f64,
    pub lip_diameter: f64,
    pub movement_speed: f64,
    pub fricative_strength: f64,
    pub transient_strength: f64,
}

impl From<VoiceParams> for VoiceParamsSnapshot {
    fn from(p: VoiceParams) -> VoiceParamsSnapshot {
        VoiceParamsSnapshot {
            frequency: p.frequency,
            intensity: p.intensity,
            tenseness: p.tenseness,
            tenseness_mult: p.tenseness_mult,
            vibrato_amount: p.vibrato_amount,
            vibrato_frequency: p.vibrato_frequency,
            pitchbend: p.pitchbend,
            tract_len: p.tract_len,
            velum_target: p.velum_target,
            constriction_index: p.constriction_index,
            constriction_diameter: p.constriction_diameter,
            tongue_index: p.tongue_index,
            tongue_diameter: p.tongue_diameter,
            lip_diameter: p.lip_diameter,
            movement_speed: p.movement_speed,
            fricative_strength: p.fricative_strength,
            transient_strength: p.transient_strength,
        }
    }
}

impl From<VoiceParamsSnapshot> for VoiceParams {
    fn from(s: VoiceParamsSnapshot) -> VoiceParams {
        VoiceParams {
            frequency: s.frequency,
            intensity: s.intensity,
            tenseness: s.tenseness,
            tenseness_mult: s.tenseness_mult,
            vibrato_amount: s.vibrato_amount,
            vibrato_frequency: s.vibrato_frequency,
            pitchbend: s.pitchbend,
            tract_len: s.tract_len,
            velum_target: s.velum_target,
            constriction_index: s.constriction_index,
            constriction_diameter: s.constriction_diameter,
            tongue_index: s.tongue_index,
            tongue_diameter: s.tongue_diameter,
            lip_diameter: s.lip_diameter,
            movement_speed: s.movement_speed,
            fricative_strength: s.fricative_strength,
            transient_strength: s.transient_strength,
        }
    }
}

impl VoiceParamsSnapshot {
    /// Serializes this snapshot as pretty-printed JSON, for a host's own
    /// preset file. The crate does no file I/O itself -- saving/loading the
    /// string is left to the caller.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<VoiceParamsSnapshot> {
        serde_json::from_str(json)
    }
}
