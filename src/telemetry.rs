//! End-of-block UI/debug telemetry, flowing the opposite direction from
//! `params`: the audio thread writes, the control/UI thread reads. Same
//! `triple_buffer` transport, used in reverse.

use triple_buffer::{Input, Output, TripleBuffer};

/// Current tract shape, refreshed once per block by copying into the
/// existing back buffer (`Voice::process_block`) -- steady state costs one
/// array copy with no allocation; `diameter` only grows on a tract resize.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub diameter: Vec<f64>,
    pub nose_diameter_0: f64,
}

impl Telemetry {
    pub fn new(tract_len: usize) -> Telemetry {
        Telemetry {
            diameter: vec![0.0; tract_len],
            nose_diameter_0: 0.0,
        }
    }
}

/// Control-side reader.
pub struct TelemetryReader {
    output: Output<Telemetry>,
}

impl TelemetryReader {
    pub fn read(&mut self) -> &Telemetry {
        self.output.read()
    }
}

pub(crate) fn channel(tract_len: usize) -> (Input<Telemetry>, TelemetryReader) {
    let (input, output) = TripleBuffer::new(&Telemetry::new(tract_len)).split();
    (input, TelemetryReader { output })
}
