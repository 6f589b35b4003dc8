//! Render the demo graph on a background thread.

use anyhow::{Context, anyhow};
use clap::Args;
use rendergraph_core::{AudioBus, RENDER_QUANTUM_FRAMES, RenderContext};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::common::{init_tracing, load_config};
use crate::demo::DemoGraph;

/// Quanta between two mutations of the graph.
const STEP_INTERVAL: u64 = 32;

/// Render the demo graph.
#[derive(Args)]
pub struct RenderArgs {
    /// Engine configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of render quanta, overriding the configuration
    #[arg(short, long)]
    pub quanta: Option<u64>,

    /// Write the rendered audio to this WAV file
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(quanta) = args.quanta {
        config.render.quanta = quanta;
    }
    init_tracing(&config);

    let options = config.to_context_options()?;
    let context = RenderContext::new(options)?;
    let mut demo = DemoGraph::build(&context, &config.graph)?;

    let quanta = config.render.quanta;
    let channels = options.channels;
    let record = args.output.is_some();
    let pace = config
        .render
        .realtime
        .then(|| Duration::from_secs_f64(RENDER_QUANTUM_FRAMES as f64 / f64::from(options.sample_rate)));

    tracing::info!(
        quanta,
        channels,
        sample_rate = options.sample_rate,
        realtime = pace.is_some(),
        "rendering"
    );

    let (progress_tx, progress_rx) = crossbeam_channel::unbounded::<u64>();
    let render_context = context.clone();
    let started = Instant::now();
    let render_thread = thread::Builder::new()
        .name("render".to_string())
        .spawn(move || {
            let mut out = AudioBus::new(channels, RENDER_QUANTUM_FRAMES);
            let mut samples = Vec::with_capacity(if record {
                quanta as usize * RENDER_QUANTUM_FRAMES * channels
            } else {
                0
            });
            for quantum in 1..=quanta {
                let deadline = pace.map(|period| Instant::now() + period);
                render_context.render_quantum(&mut out);
                if record {
                    for frame in 0..RENDER_QUANTUM_FRAMES {
                        for channel in 0..channels {
                            samples.push(out.channel(channel)[frame]);
                        }
                    }
                }
                // The receiver may have gone away after a failed mutation.
                let _ = progress_tx.send(quantum);
                if let Some(deadline) = deadline {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
            }
            samples
        })
        .context("spawning render thread")?;

    let mut next_step = STEP_INTERVAL;
    let mut step = 0;
    for quantum in progress_rx.iter() {
        if quantum >= next_step && quantum < quanta {
            demo.step(step)?;
            step += 1;
            next_step = quantum + STEP_INTERVAL;
        }
    }

    let samples = render_thread
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;
    let elapsed = started.elapsed();

    let stats = context.stats();
    let muted = (0..demo.voice_count()).filter(|&v| demo.is_muted(v)).count();
    println!(
        "Rendered:    {} quanta ({} frames, {:.3}s) in {:.3}s",
        stats.quanta,
        stats.frames,
        config.duration_seconds(),
        elapsed.as_secs_f64()
    );
    println!("Sample Rate: {} Hz", options.sample_rate);
    println!("Channels:    {channels}");
    println!(
        "Voices:      {} ({muted} muted, feedback {})",
        demo.voice_count(),
        if demo.has_feedback() { "on" } else { "off" }
    );
    println!("Pings:       {}", demo.pings());
    println!("Finalized:   {}", stats.finalized);
    println!("Live Nodes:  {}", stats.live_nodes);
    println!("Last Peak:   {:.4}", demo.peak());

    if let Some(path) = &args.output {
        write_wav(path, &samples, channels, options.sample_rate)?;
        println!("Output:      {}", path.display());
    }

    Ok(())
}

/// Writes interleaved 32-bit float samples.
fn write_wav(path: &Path, samples: &[f32], channels: usize, sample_rate: f32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate: sample_rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    tracing::info!(path = %path.display(), frames = samples.len() / channels, "wrote wav");
    Ok(())
}
