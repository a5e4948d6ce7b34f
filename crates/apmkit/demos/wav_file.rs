//! Process a WAV file through apmkit and write the result.
//!
//! An optional far-end recording (what the speakers played) enables echo
//! cancellation against it, frame by frame.
//!
//! ```sh
//! cargo run -p apmkit --features examples --example wav_file -- \
//!     mic.wav processed.wav --render speaker.wav --ns --agc
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing_subscriber::EnvFilter;

use apmkit::config::{GainControlMode, GainController, NoiseSuppression, NoiseSuppressionLevel};
use apmkit::{AudioProcessing, Config, FrameBuffer, InputBuffer, StreamConfig};

#[derive(Parser, Debug)]
#[command(about = "Process a WAV recording through apmkit")]
struct Args {
    /// Capture (microphone) recording.
    input: PathBuf,

    /// Where to write the processed capture signal.
    output: PathBuf,

    /// Far-end recording with the same format; enables echo cancellation.
    #[arg(long)]
    render: Option<PathBuf>,

    /// Render-to-capture delay hint in milliseconds.
    #[arg(long)]
    delay_ms: Option<i32>,

    /// Enable the 80 Hz high-pass filter.
    #[arg(long)]
    hpf: bool,

    /// Enable noise suppression.
    #[arg(long)]
    ns: bool,

    /// Noise suppression level, 0 (low) to 3 (very high).
    #[arg(long, default_value_t = 1)]
    ns_level: i32,

    /// Enable gain control.
    #[arg(long)]
    agc: bool,

    /// Gain control mode: 0 adaptive analog, 1 adaptive digital, 2 fixed.
    #[arg(long, default_value_t = 1)]
    agc_mode: i32,

    /// Gain of the fixed digital mode in dB.
    #[arg(long, default_value_t = 0.0)]
    fixed_gain_db: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let (spec, capture) = read_wav(&args.input)?;
    let stream_config = StreamConfig::new(spec.sample_rate, spec.channels)
        .with_context(|| format!("{} has an unsupported format", args.input.display()))?;
    let render = match &args.render {
        Some(path) => {
            let (render_spec, render) = read_wav(path)?;
            let render_format = (render_spec.sample_rate, render_spec.channels);
            if render_format != (spec.sample_rate, spec.channels) {
                bail!("{} does not match the capture format", path.display());
            }
            Some(render)
        }
        None => None,
    };

    let config = Config {
        echo_canceller: render.as_ref().map(|_| Default::default()),
        high_pass_filter: args.hpf.then(Default::default),
        noise_suppression: if args.ns {
            Some(NoiseSuppression {
                level: NoiseSuppressionLevel::try_from(args.ns_level)?,
            })
        } else {
            None
        },
        gain_controller: if args.agc {
            Some(GainController {
                mode: GainControlMode::try_from(args.agc_mode)?,
                fixed_gain_db: args.fixed_gain_db,
                ..Default::default()
            })
        } else {
            None
        },
        ..Default::default()
    };

    let mut apm = AudioProcessing::builder()
        .stream_config(stream_config)
        .config(config)
        .build();
    if let Some(delay_ms) = args.delay_ms {
        apm.set_stream_delay_ms(delay_ms)?;
    }

    let num_channels = stream_config.num_channels();
    let framer = FrameBuffer::new(stream_config);
    let capture_frames = framer.submit(
        InputBuffer::Interleaved {
            data: &capture[..],
            num_channels,
        },
        spec.sample_rate,
    )?;
    let mut render_frames = match &render {
        Some(render) => Some(framer.submit(
            InputBuffer::Interleaved {
                data: &render[..],
                num_channels,
            },
            spec.sample_rate,
        )?),
        None => None,
    };

    let mut processed = Vec::with_capacity(capture.len());
    for capture_frame in capture_frames {
        // Past the end of the far-end recording the speakers are silent.
        if let Some(render_frame) = render_frames.as_mut().and_then(Iterator::next) {
            apm.process_render_frame(&render_frame)?;
        }
        let output = apm.process_capture_frame(&capture_frame)?;
        drive_analog_level(&mut apm)?;
        processed.extend_from_slice(output.samples());
    }
    // Trailing partial frame, unprocessed.
    processed.extend_from_slice(&capture[processed.len()..]);

    write_wav(&args.output, spec, &processed)?;

    let stats = apm.get_statistics();
    println!(
        "Wrote {} samples to {}",
        processed.len(),
        args.output.display()
    );
    println!("{stats:#?}");
    Ok(())
}

/// Plays the part of the device: apply the recommended level right away.
fn drive_analog_level(apm: &mut AudioProcessing) -> Result<()> {
    let level = apm.recommended_stream_analog_level();
    apm.set_stream_analog_level(level)?;
    Ok(())
}

/// Read a WAV file as interleaved `[-1, 1]` samples.
fn read_wav(path: &Path) -> Result<(WavSpec, Vec<f32>)> {
    let reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|s| f32::from(s) / 32768.0))
            .collect::<Result<Vec<_>, _>>()?,
        (format, bits) => bail!("unsupported WAV sample format {format:?} with {bits} bits"),
    };
    Ok((spec, samples))
}

fn write_wav(path: &Path, spec: WavSpec, samples: &[f32]) -> Result<()> {
    let spec = WavSpec {
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
        ..spec
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
