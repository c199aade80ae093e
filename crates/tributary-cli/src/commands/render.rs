//! Offline render command.
//!
//! Builds a pipeline from a topology, attaches synthetic inputs and pulls the
//! root block by block on a manual clock, the way a device scheduler would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tributary_config::PipelineConfig;
use tributary_core::{
    ClockRef, Fixed, Format, ManualClock, ReadableStream, RefTime, SignalSource, StreamRef,
    TimelineFunction, VersionedTimelineFunction,
};
use tributary_effects::EffectRegistry;
use tributary_mixer::{GainUpdate, ResamplerPolicy};
use tributary_pipeline::{OutputPipeline, PipelineOptions};

use crate::signal_spec::SignalSpec;
use crate::wav::write_wav;

#[derive(Args)]
pub struct RenderArgs {
    /// Topology file (TOML); defaults to a single group taking every usage
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input signal, `usage:kind:value[:amplitude][@rate]` (repeatable)
    #[arg(short, long = "input", value_name = "SIGNAL", required = true)]
    inputs: Vec<SignalSpec>,

    /// Length of the render in seconds
    #[arg(short, long, default_value = "1.0")]
    duration: f64,

    /// Output WAV file
    #[arg(short, long)]
    output: PathBuf,

    /// Also write what the loopback tap captured
    #[arg(long)]
    loopback: Option<PathBuf>,

    /// Frames per block (overrides the topology)
    #[arg(long)]
    block_size: Option<u32>,

    /// Resampler for inputs that do not match their group's rate
    #[arg(long)]
    resampler: Option<ResamplerPolicy>,

    /// Gain applied to every input, e.g. -6
    #[arg(long, allow_hyphen_values = true)]
    input_gain: Option<f32>,

    /// Reconfigure an effect halfway through, `instance=config` (repeatable)
    #[arg(long = "update", value_name = "INSTANCE=CONFIG")]
    updates: Vec<String>,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if !(args.duration > 0.0 && args.duration.is_finite()) {
        anyhow::bail!("duration must be positive, got {}", args.duration);
    }
    let updates = args
        .updates
        .iter()
        .map(|u| {
            u.split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected INSTANCE=CONFIG, got '{u}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let root = config
        .root_group()
        .with_context(|| format!("root group '{}' not found", config.root))?
        .format()?;

    let manual = Arc::new(ManualClock::new(RefTime::ZERO));
    let clock: ClockRef = manual.clone();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        root.frac_frames_per_ns(),
    )));
    let options = PipelineOptions {
        max_block_size_frames: args.block_size,
        default_resampler: args.resampler,
    };
    let pipeline = OutputPipeline::new(
        &config,
        &EffectRegistry::new(),
        options,
        timeline,
        Arc::clone(&clock),
    )?;

    let loopback = match &args.loopback {
        Some(_) => Some(
            pipeline
                .loopback()
                .context("the topology has no loopback group")?,
        ),
        None => None,
    };

    let mut streams: Vec<StreamRef> = Vec::with_capacity(args.inputs.len());
    for (i, spec) in args.inputs.iter().enumerate() {
        let rate = spec.rate.unwrap_or(root.frames_per_second());
        let format = Format::float(root.channels(), rate)?;
        let stream: StreamRef = Arc::new(
            SignalSource::new(format, spec.waveform, Arc::clone(&clock))
                .with_name(format!("input{i}.{}", spec.usage)),
        );
        let handle =
            pipeline.add_input(Arc::clone(&stream), spec.usage, ResamplerPolicy::Default)?;
        if let Some(db) = args.input_gain {
            pipeline.set_input_gain(&stream, GainUpdate::Source(db))?;
        }
        tracing::info!(
            input = stream.name(),
            group = handle.stage(),
            rate = format.frames_per_second(),
            "attached input"
        );
        streams.push(stream);
    }

    let total = root.frames_for(Duration::from_secs_f64(args.duration));
    let halfway = total / 2;
    let channels = root.channels() as usize;
    let mut output = Vec::with_capacity(total as usize * channels);
    let mut captured = Vec::new();
    let mut tap_cursor = 0i64;
    let mut frame = 0i64;
    let mut updated = updates.is_empty();

    while frame < total {
        if !updated && frame >= halfway {
            for (instance, effect_config) in &updates {
                pipeline.update_effect(instance, effect_config)?;
                tracing::info!(instance, config = effect_config, frame, "updated effect");
            }
            updated = true;
        }

        let ref_time = RefTime::from_nanos(root.duration_of(frame).as_nanos() as i64);
        manual.set(ref_time);
        let wanted = (total - frame) as usize;

        let block = pipeline
            .read_lock(ref_time, frame, wanted)
            .with_context(|| format!("pipeline produced nothing at frame {frame}"))?;
        let frames = block.frames();
        output.extend(block.data().to_normalized());
        drop(block);

        if let Some(tap) = &loopback {
            // The tapped group may run at another rate; follow its timeline.
            let end = root.duration_of(frame + frames as i64).as_nanos() as i64;
            let tap_timeline = tap.ref_time_to_frac_frame().function;
            let tap_end = Fixed::from_raw(tap_timeline.apply(end)).floor();
            while tap_cursor < tap_end {
                let wanted = (tap_end - tap_cursor) as usize;
                let Some(buf) = tap.read_lock(ref_time, tap_cursor, wanted) else {
                    break;
                };
                tap_cursor += buf.frames() as i64;
                captured.extend(buf.data().to_normalized());
            }
        }

        pipeline.trim(ref_time);
        frame += frames as i64;
    }

    for stream in &streams {
        pipeline.remove_input(stream)?;
    }

    write_wav(&args.output, &output, &root)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Rendered {} frames ({:.2}s) from {} input(s) to {}",
        output.len() / channels,
        args.duration,
        streams.len(),
        args.output.display()
    );

    if let (Some(path), Some(tap)) = (&args.loopback, &loopback) {
        write_wav(path, &captured, tap.format())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Loopback capture written to {}", path.display());
    }
    Ok(())
}
