#![no_main]

use apmkit::config::{
    EchoCanceller, GainControlMode, GainController, NoiseSuppression, NoiseSuppressionLevel,
    Pipeline,
};
use apmkit::{AudioProcessing, Config, StreamConfig};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    configs: Vec<FuzzConfig>,
    /// Audio samples to process between config changes
    samples: Vec<i16>,
}

#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    max_delay_ms: u16,
    delay_ms: i32,
    hpf_enabled: bool,
    ec_enabled: bool,
    ns_enabled: bool,
    ns_level: u8,
    gc_enabled: bool,
    gc_mode: u8,
    fixed_gain_db: f32,
    red_enabled: bool,
    analog_level: i32,
}

fn ns_level(idx: u8) -> NoiseSuppressionLevel {
    match idx % 4 {
        0 => NoiseSuppressionLevel::Low,
        1 => NoiseSuppressionLevel::Moderate,
        2 => NoiseSuppressionLevel::High,
        _ => NoiseSuppressionLevel::VeryHigh,
    }
}

fn gc_mode(idx: u8) -> GainControlMode {
    match idx % 3 {
        0 => GainControlMode::AdaptiveAnalog,
        1 => GainControlMode::AdaptiveDigital,
        _ => GainControlMode::FixedDigital,
    }
}

fuzz_target!(|input: FuzzInput| {
    let Ok(stream) = StreamConfig::new(16000, 1) else {
        return;
    };
    let frames = stream.num_frames();
    if input.samples.len() < frames || input.configs.is_empty() {
        return;
    }

    let mut apm = AudioProcessing::new(stream);
    let src = &input.samples[..frames];
    let mut dest = vec![0i16; frames];

    for cfg in &input.configs {
        let fixed_gain_db = if cfg.fixed_gain_db.is_finite() { cfg.fixed_gain_db } else { 0.0 };
        let config = Config {
            pipeline: Pipeline {
                max_stream_delay_ms: i32::from(cfg.max_delay_ms % 1000),
            },
            high_pass_filter: cfg.hpf_enabled.then(Default::default),
            echo_canceller: cfg.ec_enabled.then(EchoCanceller::default),
            noise_suppression: cfg.ns_enabled.then(|| NoiseSuppression {
                level: ns_level(cfg.ns_level),
            }),
            gain_controller: cfg.gc_enabled.then(|| GainController {
                mode: gc_mode(cfg.gc_mode),
                fixed_gain_db,
                ..Default::default()
            }),
            residual_echo_detector: cfg.red_enabled.then(Default::default),
        };
        apm.apply_config(config);
        let _ = apm.set_stream_delay_ms(cfg.delay_ms);
        let _ = apm.set_stream_analog_level(cfg.analog_level);

        let mut render = vec![0i16; frames];
        apm.process_render_i16(src, &mut render).unwrap();
        assert_eq!(render, src);
        apm.process_capture_i16(src, &mut dest).unwrap();

        let stats = apm.get_statistics();
        assert!((0..=255).contains(&apm.recommended_stream_analog_level()));
        if let Some(likelihood) = stats.residual_echo_likelihood {
            assert!((0.0..=1.0).contains(&likelihood));
        }
    }
});
