use std::sync::{Arc, Mutex};

use multivox::{Engine, VoiceParams};
use rodio::{OutputStream, Source};

#[derive(Clone)]
struct EngineSource {
    engine: Arc<Mutex<Engine>>,
    noise: Arc<Vec<f64>>,
    buffer_pos: usize,
    buffer: [f32; 512],
    noise_pos: usize,
}

impl EngineSource {
    fn new(engine: Engine) -> EngineSource {
        // A single shared band-passed-ish white-noise loop stands in for the
        // host's own aspiration/fricative pre-filtering, which this crate
        // leaves entirely to the caller.
        let mut seed: u64 = 0x2545F4914F6CDD1D;
        let noise: Vec<f64> = (0..0x8000)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                2.0 * ((seed >> 11) as f64 / (1u64 << 53) as f64) - 1.0
            })
            .collect();

        EngineSource {
            engine: Arc::new(Mutex::new(engine)),
            noise: Arc::new(noise),
            buffer_pos: 512,
            buffer: [0.0; 512],
            noise_pos: 0,
        }
    }

    fn fill_buffer(&mut self) {
        let len = self.buffer.len();
        let mut aspiration = vec![0.0; len];
        let mut fricative = vec![0.0; len];
        for i in 0..len {
            let idx = (self.noise_pos + i) % self.noise.len();
            aspiration[i] = self.noise[idx];
            fricative[i] = self.noise[(idx + self.noise.len() / 2) % self.noise.len()];
        }
        self.noise_pos = (self.noise_pos + len) % self.noise.len();

        self.engine
            .lock()
            .unwrap()
            .process_block(&aspiration, &fricative, &mut self.buffer);
        self.buffer_pos = 0;
    }
}

impl Iterator for EngineSource {
    type Item = f32;
    fn next(&mut self) -> Option<f32> {
        if self.buffer_pos == self.buffer.len() {
            self.fill_buffer();
        }
        let result = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(result)
    }
}

impl Source for EngineSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.buffer.len())
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.engine.lock().unwrap().sample_rate()
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        None
    }
}

const SAMPLE_RATE: u32 = 48000;

/// `frequency = 440 * 2^(semitone/12)` (A4-based) -- a thin enough
/// convenience that it lives in the demo, not the library.
fn semitone_to_frequency(semitone: f32) -> f64 {
    440.0 * 2f64.powf(semitone as f64 / 12.0)
}

fn main() {
    env_logger::init();

    let mut engine = Engine::new(SAMPLE_RATE);
    let (mut handle, _telemetry) = engine.add_voice(44, 9452).expect("valid construction args");

    let mut params = VoiceParams {
        frequency: semitone_to_frequency(0),
        ..VoiceParams::default()
    };
    handle.set_params(params);

    let source = EngineSource::new(engine);
    let (_stream, stream_handle) = OutputStream::try_default().unwrap();
    stream_handle.play_raw(source.clone()).unwrap();

    for semitone in 0..24 {
        params.frequency = semitone_to_frequency(semitone as f32);
        handle.set_params(params);
        std::thread::sleep(std::time::Duration::from_millis(300));
    }

    for semitone in (0..23).rev() {
        params.frequency = semitone_to_frequency(semitone as f32);
        handle.set_params(params);
        std::thread::sleep(std::time::Duration::from_millis(300));
    }
}
