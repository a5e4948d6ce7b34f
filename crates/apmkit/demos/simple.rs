//! Minimal echo cancellation demo.
//!
//! Creates synthetic stereo render and capture signals, processes them through
//! the echo canceller and noise suppressor, and verifies that the capture
//! signal was modified.
//!
//! ```sh
//! cargo run -p apmkit --example simple
//! ```

use apmkit::config::{EchoCanceller, NoiseSuppression};
use apmkit::{AudioProcessing, Config, StreamConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), apmkit::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stream_config = StreamConfig::new(48_000, 2)?;
    let num_frames = stream_config.num_frames();

    let config = Config {
        echo_canceller: Some(EchoCanceller::default()),
        noise_suppression: Some(NoiseSuppression::default()),
        ..Default::default()
    };

    let mut apm = AudioProcessing::builder()
        .stream_config(stream_config)
        .config(config)
        .build();
    apm.set_stream_delay_ms(0)?;

    let mut render_out_ch0 = vec![0.0f32; num_frames];
    let mut render_out_ch1 = vec![0.0f32; num_frames];
    let mut capture_out_ch0 = vec![0.0f32; num_frames];
    let mut capture_out_ch1 = vec![0.0f32; num_frames];

    // One second of audio.
    for frame in 0..100 {
        // Synthetic stereo signals that simulate a microphone picking up
        // speaker output (the render signal leaks into the capture signal).
        let (render_ch0, render_ch1, capture_ch0, capture_ch1) =
            sample_stereo_frames(frame * num_frames, num_frames);

        // Tell the echo canceller what is being played through the speakers.
        apm.process_render_f32(
            &[&render_ch0, &render_ch1],
            &mut [&mut render_out_ch0, &mut render_out_ch1],
        )?;
        assert_eq!(
            render_ch0,
            render_out_ch0,
            "render channel 0 should not be modified"
        );
        assert_eq!(
            render_ch1,
            render_out_ch1,
            "render channel 1 should not be modified"
        );

        // Clean the microphone signal.
        apm.process_capture_f32(
            &[&capture_ch0, &capture_ch1],
            &mut [&mut capture_out_ch0, &mut capture_out_ch1],
        )?;
        assert_ne!(
            capture_ch0,
            capture_out_ch0,
            "capture channel 0 should be processed"
        );
    }

    let stats = apm.get_statistics();
    println!("echo detected:     {}", stats.echo_detected);
    if let Some(erle) = stats.echo_return_loss_enhancement_db {
        println!("ERLE:              {erle:.1} dB");
    }
    if let Some(level) = stats.output_rms_dbfs {
        println!("output level:      {level:.0} dBFS");
    }
    if let Some(p) = stats.speech_probability {
        println!("speech probability {p:.2}");
    }
    println!("Processed one second of stereo audio through apmkit.");
    Ok(())
}

/// Stereo render and capture frames starting at sample `offset`, where the
/// capture carries a near-end tone plus an attenuated copy of the render.
fn sample_stereo_frames(
    offset: usize,
    num_frames: usize,
) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut render_ch0 = vec![0.0f32; num_frames];
    let mut render_ch1 = vec![0.0f32; num_frames];
    let mut capture_ch0 = vec![0.0f32; num_frames];
    let mut capture_ch1 = vec![0.0f32; num_frames];

    for i in 0..num_frames {
        let t = (offset + i) as f32;
        render_ch0[i] = (t / 40.0).cos() * 0.4;
        render_ch1[i] = (t / 40.0).cos() * 0.2;
        capture_ch0[i] = (t / 20.0).sin() * 0.4 + render_ch0[i] * 0.2;
        capture_ch1[i] = (t / 20.0).sin() * 0.2 + render_ch1[i] * 0.2;
    }

    (render_ch0, render_ch1, capture_ch0, capture_ch1)
}
