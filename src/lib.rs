//! Real-time articulatory speech synthesizer engine: a generalized,
//! multi-voice reimplementation of the Pink Trombone vocal-tract model.
//!
//! A [`Voice`] bundles one [`Glottis`] (LF-model glottal source) and one
//! [`tract_shaper::TractShaper`] (Kelly-Lochbaum waveguide + nasal side
//! branch). An [`Engine`] owns a growable set of independent voices and
//! offers a serial convenience mixer; hosts that want per-voice threads are
//! free to drive `Voice`s directly instead.

mod engine;
mod error;
mod glottis;
mod math;
mod noise;
mod noise_gen;
mod params;
mod telemetry;
mod tract;
mod tract_shaper;
mod transient;
mod voice;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use glottis::Glottis;
pub use noise::{Filter, NoiseSource, new_bandpass_filter, new_filtered_noise_source};
pub use params::{VoiceHandle, VoiceParams, VoiceParamsSnapshot};
pub use telemetry::{Telemetry, TelemetryReader};
pub use voice::{MAX_BLOCK_LEN, Voice};
