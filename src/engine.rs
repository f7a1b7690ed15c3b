use crate::{
    error::Result,
    params::VoiceHandle,
    telemetry::TelemetryReader,
    voice::Voice,
};

/// Owns a growable set of independent [`Voice`]s and offers a serial
/// convenience mixer. A host that wants each voice on its own thread is
/// free to pull `Voice`s out and drive them directly -- `Engine` itself
/// never spawns a thread.
pub struct Engine {
    sample_rate: u32,
    voices: Vec<Voice>,
    mix_scratch: Vec<f32>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Engine {
        Engine {
            sample_rate,
            voices: Vec::new(),
            mix_scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Adds a voice seeded from `seed`, so its wobble/noise desynchronizes
    /// from every other voice already in the engine. Returns the
    /// control-side handle and telemetry reader for it; the `Voice` itself
    /// stays owned by the engine.
    pub fn add_voice(&mut self, tract_len: u8, seed: u16) -> Result<(VoiceHandle, TelemetryReader)> {
        let (voice, handle, telemetry) = Voice::new(self.sample_rate, tract_len, seed)?;
        log::debug!("engine: added voice (seed={seed}, tract_len={tract_len}), {} total", self.voices.len() + 1);
        self.voices.push(voice);
        Ok((handle, telemetry))
    }

    pub fn remove_voice(&mut self, index: usize) {
        if index < self.voices.len() {
            self.voices.remove(index);
            log::debug!("engine: removed voice {index}, {} remaining", self.voices.len());
        }
    }

    /// Serial convenience driver: runs every voice with the same noise
    /// inputs and sums their output into `mix_into`. Not allocation-free
    /// across calls that grow `mix_into`'s length beyond the previous
    /// call's -- only the per-voice hot path (`Voice::process`) carries
    /// that guarantee.
    pub fn process_block(
        &mut self,
        aspiration_noise_in: &[f64],
        fricative_noise_in: &[f64],
        mix_into: &mut [f32],
    ) {
        for s in mix_into.iter_mut() {
            *s = 0.0;
        }
        if self.mix_scratch.len() < mix_into.len() {
            self.mix_scratch.resize(mix_into.len(), 0.0);
        }
        let scratch = &mut self.mix_scratch[..mix_into.len()];

        for voice in &mut self.voices {
            voice.process(aspiration_noise_in, fricative_noise_in, scratch);
            for (m, s) in mix_into.iter_mut().zip(scratch.iter()) {
                *m += *s;
            }
        }
    }
}
