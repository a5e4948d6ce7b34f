#![no_main]

use apmkit::config::{EchoCanceller, GainController, NoiseSuppression};
use apmkit::{AudioProcessing, Config, InputBuffer, StreamConfig};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Sample rate index: 0=8k, 1=16k, 2=32k, 3=48k
    sample_rate_idx: u8,
    /// Number of channels (clamped to 1-2)
    channels: u8,
    /// Channel count claimed by the buffers; may disagree with the session.
    buffer_channels: u8,
    delay_ms: i32,
    render: Vec<i16>,
    /// Samples of any length, including partial frames.
    capture: Vec<f32>,
}

fn sample_rate(idx: u8) -> u32 {
    match idx % 4 {
        0 => 8000,
        1 => 16000,
        2 => 32000,
        _ => 48000,
    }
}

fuzz_target!(|input: FuzzInput| {
    let rate = sample_rate(input.sample_rate_idx);
    let channels = u16::from(input.channels % 2) + 1;
    let Ok(stream) = StreamConfig::new(rate, channels) else {
        return;
    };

    let config = Config {
        echo_canceller: Some(EchoCanceller::default()),
        noise_suppression: Some(NoiseSuppression::default()),
        gain_controller: Some(GainController::default()),
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .stream_config(stream)
        .config(config)
        .build();
    let _ = apm.set_stream_delay_ms(input.delay_ms);

    // Non-finite samples are clamped like any other out-of-range value.
    let capture: Vec<f32> = input
        .capture
        .iter()
        .map(|&s| if s.is_finite() { s } else { 0.0 })
        .collect();
    let num_channels = usize::from(input.buffer_channels % 3) + 1;

    let render = InputBuffer::Interleaved {
        data: &input.render[..],
        num_channels,
    };
    if let Ok(output) = apm.process_render_buffer(render, rate) {
        assert_eq!(output, input.render);
    }
    let capture_buffer = InputBuffer::Interleaved {
        data: &capture[..],
        num_channels,
    };
    if let Ok(output) = apm.process_capture_buffer(capture_buffer, rate) {
        assert_eq!(output.len(), capture.len());
        let processed = capture.len() / stream.num_samples() * stream.num_samples();
        assert!(output[..processed].iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(output[processed..], capture[processed..]);
    }
    assert!((0..=255).contains(&apm.recommended_stream_analog_level()));
});
