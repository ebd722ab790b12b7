use std::sync::Arc;

use ntsc_compositor::{
    config::PipelineConfig,
    effects::{
        ChromaLowpass, EffectConfiguration, FilterType, HeadSwitchingSettings, InterlaceMode,
        LumaFilter, RingingSettings,
    },
    frame::Frame,
    gpu::{CpuDevice, Device, Geometry},
    kernels::color::{to_rgb, to_yiq},
    pipeline::FramePipeline,
};

const MID_GRAY: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

fn pipeline_on(device: CpuDevice, seed: u64) -> FramePipeline {
    let device: Arc<dyn Device> = Arc::new(device);
    let config = PipelineConfig {
        seed,
        ..PipelineConfig::default()
    };
    FramePipeline::new(device, &config).unwrap()
}

fn pipeline(seed: u64) -> FramePipeline {
    pipeline_on(CpuDevice::new().unwrap(), seed)
}

/// Every band-limiting filter on, every random or displacing effect off
fn filters_only() -> EffectConfiguration {
    EffectConfiguration {
        input_luma_filter: LumaFilter::Notch,
        chroma_lowpass_in: ChromaLowpass::Full,
        chroma_lowpass_out: ChromaLowpass::Full,
        composite_signal: true,
        composite_preemphasis: 1.0,
        chroma_vert_blend: true,
        interlace_mode: InterlaceMode::Interlaced,
        ..EffectConfiguration::passthrough()
    }
}

#[test]
fn flat_gray_survives_the_filters() {
    let mut pipeline = pipeline(0);
    let config = filters_only();
    let input = Frame::new_filled(24, 12, MID_GRAY);

    for _ in 0..4 {
        let output = pipeline.output_image(&input, &config).unwrap();
        assert_eq!((output.width(), output.height()), (24, 12));
        let deviation = output.max_abs_difference(&input).unwrap();
        assert!(deviation < 1e-3, "deviation {}", deviation);
    }
    assert_eq!(pipeline.frame_number(), 4);
}

#[test]
fn passthrough_returns_the_input() {
    let mut pipeline = pipeline(0);
    let input = Frame::color_bars(28, 6);
    let output = pipeline
        .output_image(&input, &EffectConfiguration::passthrough())
        .unwrap();
    assert!(output.max_abs_difference(&input).unwrap() < 1e-3);
}

#[test]
fn yiq_round_trip_holds_for_out_of_gamut_colors() {
    let steps = [-0.25, 0.0, 0.3, 0.75, 1.0, 1.6, 4.0];
    for r in steps {
        for g in steps {
            for b in steps {
                let color = [r, g, b, 0.5];
                let back = to_rgb(to_yiq(color));
                for channel in 0..4 {
                    assert!(
                        (back[channel] - color[channel]).abs() < 1e-3,
                        "{:?} -> {:?}",
                        color,
                        back
                    );
                }
            }
        }
    }
}

#[test]
fn alpha_passes_through_every_effect() {
    let mut pipeline = pipeline(3);
    let input = Frame::from_fn(32, 16, |x, y| {
        let v = (x + y) as f32 / 48.0;
        [v, 1.0 - v, 0.5, 0.25]
    });

    for _ in 0..2 {
        let output = pipeline
            .output_image(&input, &EffectConfiguration::default())
            .unwrap();
        for y in 0..16 {
            for x in 0..32 {
                assert!((output.get_pixel(x, y)[3] - 0.25).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn resource_failure_inside_a_stage_bypasses_it() {
    let geometry = Geometry::new(16, 8);
    // room for the frame pool and nothing else
    let device = CpuDevice::new()
        .unwrap()
        .with_memory_budget(geometry.byte_size() * PipelineConfig::default().pool_size as u64);
    let mut pipeline = pipeline_on(device, 0);

    let mut config = EffectConfiguration::passthrough();
    config.ringing = Some(RingingSettings::default());
    let input = Frame::ramp(16, 8);

    let output = pipeline.output_image(&input, &config).unwrap();
    assert!(output.max_abs_difference(&input).unwrap() < 1e-3);
    assert_eq!(pipeline.stats().stages_bypassed, 1);
    assert_eq!(pipeline.frame_number(), 1);
}

#[test]
fn setup_failure_returns_nothing_and_the_next_frame_recovers() {
    let small = Geometry::new(4, 4);
    let device = CpuDevice::new()
        .unwrap()
        .with_memory_budget(small.byte_size() * PipelineConfig::default().pool_size as u64);
    let mut pipeline = pipeline_on(device, 0);
    let config = EffectConfiguration::passthrough();

    assert!(pipeline.output_image(&Frame::ramp(8, 8), &config).is_none());
    assert_eq!(pipeline.frame_number(), 0);
    assert_eq!(pipeline.stats().frames_failed, 1);

    let output = pipeline.output_image(&Frame::ramp(4, 4), &config).unwrap();
    assert_eq!((output.width(), output.height()), (4, 4));
    assert_eq!(pipeline.frame_number(), 1);
}

#[test]
fn extreme_head_switching_offset_still_renders() {
    let mut pipeline = pipeline(0);
    let mut config = EffectConfiguration::passthrough();
    config.head_switching = Some(HeadSwitchingSettings {
        height: 4,
        offset: u32::MAX,
        ..HeadSwitchingSettings::default()
    });
    assert!(config.validate().is_ok());

    let output = pipeline.output_image(&Frame::ramp(8, 8), &config).unwrap();
    assert_eq!((output.width(), output.height()), (8, 8));
}

#[test]
fn unusable_bandwidth_scale_fails_the_frame() {
    let mut pipeline = pipeline(0);
    let mut config = EffectConfiguration::passthrough();
    config.chroma_lowpass_in = ChromaLowpass::Full;
    config.filter_type = FilterType::Butterworth;
    config.bandwidth_scale = 0.0;

    assert!(pipeline.output_image(&Frame::ramp(8, 8), &config).is_none());
    assert_eq!(pipeline.frame_number(), 0);
}

#[test]
fn equal_seeds_render_equal_frames() {
    let config = EffectConfiguration::default();
    let input = Frame::color_bars(40, 24);

    let render = |seed: u64| {
        let mut pipeline = pipeline(seed);
        (0..3)
            .map(|_| pipeline.output_image(&input, &config).unwrap())
            .collect::<Vec<_>>()
    };

    let first = render(11);
    let second = render(11);
    let other = render(12);
    assert_eq!(first, second);
    assert_ne!(first, other);
    // noise changes from frame to frame
    assert_ne!(first[0], first[1]);
}

#[test]
fn resolution_changes_are_followed() {
    let mut pipeline = pipeline(0);
    let config = EffectConfiguration::default();

    for (width, height) in [(16, 8), (16, 8), (8, 20), (30, 10)] {
        let output = pipeline
            .output_image(&Frame::color_bars(width, height), &config)
            .unwrap();
        assert_eq!((output.width(), output.height()), (width, height));
        for value in output.get_pixel(width / 2, height / 2) {
            assert!(value.is_finite());
        }
    }
    assert_eq!(pipeline.stats().reallocations, 3);
    assert_eq!(pipeline.pool().geometry(), Some(Geometry::new(30, 10)));
}
