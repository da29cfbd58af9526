//! vigild - rate-limited annotated surveillance daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (stub://, file, RTSP URL or device index)
//! 2. Reads the first frame to fix the output size and derive the output cadence
//! 3. Starts the pipeline (bounded drop-oldest queue, detector thread, output gate)
//! 4. Pumps frames until end of stream or Ctrl-C
//! 5. Stops the pipeline and reports final counters

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vigil::{open_source, Admission, DetectorRegistry, FrameSource, Pipeline, VigildConfig};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video path, RTSP URL, device index or stub://name?frames=N&fps=F.
    #[arg(long)]
    source: Option<String>,
    /// Output file (.mjpeg/.mjpg or .rgb/.raw).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Target output frames per second (capped by the source rate, floor 2).
    #[arg(long)]
    target_fps: Option<f64>,
    /// Detector backend.
    #[arg(long)]
    detector: Option<String>,
    /// Model file for model-backed detectors.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Inference device selector.
    #[arg(long)]
    device: Option<String>,
    /// Minimum detection confidence in [0, 1].
    #[arg(long)]
    conf: Option<f32>,
    /// Hand-off queue capacity.
    #[arg(long)]
    queue_size: Option<usize>,
    /// Disable the diagnostics overlay.
    #[arg(long)]
    no_overlay: bool,
    /// List detector backends and exit.
    #[arg(long)]
    list_detectors: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let registry = DetectorRegistry::with_builtin();
    if args.list_detectors {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut cfg = VigildConfig::load()?;
    apply_args(&mut cfg, args);
    cfg.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    let first = source
        .next_frame()
        .context("could not read first frame")?
        .filter(|frame| !frame.is_empty())
        .ok_or_else(|| anyhow!("could not read first frame from {}", cfg.source))?;
    let frame_size = first.dimensions();
    let pipeline_cfg = cfg.pipeline_config(frame_size, source.nominal_fps());

    log::info!(
        "vigild starting: source={} output={} size={}x{} writer_fps={:.1} detector={}",
        cfg.source,
        pipeline_cfg.output_path.display(),
        frame_size.0,
        frame_size.1,
        pipeline_cfg.writer_fps,
        pipeline_cfg.detector
    );

    let mut pipeline = Pipeline::with_registry(&pipeline_cfg, &registry)?;
    pipeline.start()?;
    pipeline.submit(first);

    let pumped = pump(source.as_mut(), &pipeline, &shutdown);
    let stats = pipeline.stop();

    let source_stats = source.stats();
    log::info!(
        "source {} delivered {} frames",
        source_stats.source,
        source_stats.frames_captured
    );
    let stats = stats?;
    log::info!(
        "vigild finished: submitted={} evicted={} processed={} skipped={} detector_failures={} written={} write_failures={}",
        stats.submitted,
        stats.evicted,
        stats.processed,
        stats.skipped,
        stats.detector_failures,
        stats.written,
        stats.write_failures
    );
    pumped
}

fn apply_args(cfg: &mut VigildConfig, args: Args) {
    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(output) = args.output {
        cfg.output_path = output;
    }
    if let Some(fps) = args.target_fps {
        cfg.target_fps = fps;
    }
    if let Some(detector) = args.detector {
        cfg.detector.backend = detector;
    }
    if let Some(model) = args.model {
        cfg.detector.model_path = model;
    }
    if let Some(device) = args.device {
        cfg.detector.device = Some(device);
    }
    if let Some(conf) = args.conf {
        cfg.detector.conf = conf;
    }
    if let Some(queue_size) = args.queue_size {
        cfg.queue_size = queue_size;
    }
    if args.no_overlay {
        cfg.overlay = false;
    }
}

/// Feed frames into the pipeline until end of stream, a read error or shutdown.
fn pump(source: &mut dyn FrameSource, pipeline: &Pipeline, shutdown: &AtomicBool) -> Result<()> {
    let mut last_health_log = Instant::now();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("shutdown signal received, stopping pipeline...");
            return Ok(());
        }

        let Some(frame) = source.next_frame()? else {
            log::info!("end of stream");
            return Ok(());
        };
        if pipeline.submit(frame) == Admission::Rejected {
            return Ok(());
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let source_stats = source.stats();
            let stats = pipeline.stats();
            log::info!(
                "health={} frames={} queued={} processed={} written={} evicted={} proc_fps={:.1}",
                source.is_healthy(),
                source_stats.frames_captured,
                pipeline.queue_len(),
                stats.processed,
                stats.written,
                stats.evicted,
                stats.processing_fps
            );
            last_health_log = Instant::now();
        }
    }
}
