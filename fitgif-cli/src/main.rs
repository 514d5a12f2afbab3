use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use fitgif::{
    inspect_gif, CancelToken, CommandFilter, ContainerEncoder, DegradationPolicy, EncodeOptions,
    FitEncoder, FitOutcome, FitStatus, GifContainer, Progress, QuantizerKind,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod import;

#[derive(Parser, Debug)]
#[command(name = "fitgif")]
#[command(about = "Frames → GIF89a, re-encoded under cheaper settings until it fits a size budget")]
struct Args {
    /// Directory of .cbor camera frames or .png images
    #[arg(long, value_name = "DIR")]
    in_dir: PathBuf,

    /// Output GIF file path
    #[arg(long, value_name = "FILE")]
    out: PathBuf,

    /// Per-frame delay for PNG input (and CBOR frames without usable timestamps)
    #[arg(long, default_value = "100")]
    delay_ms: u64,

    /// JSON file with EncodeOptions; flags below override its values
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// JSON file with the degradation policy
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,

    #[arg(long)]
    max_colors: Option<u16>,

    /// Disable error-diffusion dithering
    #[arg(long)]
    no_dither: bool,

    #[arg(long)]
    dither_level: Option<f32>,

    /// Concentrate dithering (and palette precision) on the image centre
    #[arg(long)]
    center_focus: bool,

    /// 1 = slowest/best, 10 = fastest
    #[arg(long)]
    speed: Option<u8>,

    /// 0..=100
    #[arg(long)]
    quality: Option<u8>,

    /// 0 = loop forever
    #[arg(long)]
    loop_count: Option<u16>,

    /// 0 = keep source width
    #[arg(long)]
    max_width: Option<u32>,

    /// Size budget in KiB, 0 = unconstrained
    #[arg(long)]
    max_kb: Option<u64>,

    /// Frames closer than this (mean absolute difference, 0..255) are merged
    #[arg(long)]
    similarity: Option<f32>,

    /// Always run the quantizer, even when lossless output was requested
    #[arg(long)]
    no_lossless_fast_path: bool,

    /// Retry ceiling for the size-fit loop
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Palette backend: liq | neuquant
    #[arg(long, default_value = "liq")]
    quantizer: QuantizerKind,

    /// Worker threads, 0 = one per core
    #[arg(long, default_value = "0")]
    threads: usize,

    /// External optimizer the GIF is piped through, e.g. "gifsicle -O3"
    #[arg(long, value_name = "CMD")]
    post_process: Option<String>,

    /// Decode the written GIF and report its structure
    #[arg(long)]
    verify: bool,
}

impl Args {
    fn encode_options(&self) -> Result<EncodeOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse options: {}", path.display()))?
            }
            None => EncodeOptions::default(),
        };

        if let Some(colors) = self.max_colors {
            options.max_colors = colors;
        }
        if self.no_dither {
            options.dither_enabled = false;
        }
        if let Some(level) = self.dither_level {
            options.dither_level = level;
        }
        if self.center_focus {
            options.dither_center_focus = true;
        }
        if let Some(speed) = self.speed {
            options.quantization_speed = speed;
        }
        if let Some(quality) = self.quality {
            options.quantization_quality = quality;
        }
        if let Some(loop_count) = self.loop_count {
            options.loop_count = loop_count;
        }
        if let Some(width) = self.max_width {
            options.max_width_pixels = width;
        }
        if let Some(kb) = self.max_kb {
            options.max_file_size_kb = kb;
        }
        if let Some(threshold) = self.similarity {
            options.similarity_threshold = threshold;
        }
        if self.no_lossless_fast_path {
            options.skip_quantization_when_lossless = false;
        }

        options.validate()?;
        Ok(options)
    }

    fn degradation_policy(&self) -> Result<DegradationPolicy> {
        let mut policy = match &self.policy {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse policy: {}", path.display()))?
            }
            None => DegradationPolicy::default(),
        };
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts;
        }
        Ok(policy)
    }

    fn container(&self) -> Result<Arc<dyn ContainerEncoder>> {
        let gif: Arc<dyn ContainerEncoder> = Arc::new(GifContainer::new());
        match &self.post_process {
            Some(line) => match CommandFilter::from_command_line(line, gif) {
                Some(filter) => Ok(Arc::new(filter)),
                None => bail!("--post-process needs a command"),
            },
            None => Ok(gif),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let started = Instant::now();

    info!(input = %args.in_dir.display(), output = %args.out.display(), "fitgif CLI");

    let options = args.encode_options()?;
    let frames = import::load_frames(&args.in_dir, Duration::from_millis(args.delay_ms))?;

    let encoder = FitEncoder::builder()
        .quantizer_kind(args.quantizer)
        .container(args.container()?)
        .policy(args.degradation_policy()?)
        .threads(args.threads)
        .build()?;

    let last_stage = std::sync::Mutex::new(None);
    let progress = |p: Progress| {
        if let Ok(mut last) = last_stage.lock() {
            if *last != Some((p.attempt, p.stage)) {
                *last = Some((p.attempt, p.stage));
                debug!(attempt = p.attempt, stage = ?p.stage, overall = p.overall, "Progress");
            }
        }
    };

    let outcome = encoder
        .encode_to_path(&frames, &options, &args.out, &progress, &CancelToken::new())
        .with_context(|| format!("Failed to encode {}", args.out.display()))?;

    print_summary(&outcome);

    if args.verify {
        let bytes = std::fs::read(&args.out)?;
        let inspection = inspect_gif(&bytes).context("Written GIF failed to decode")?;
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        if inspection.frame_count != outcome.best.frame_count {
            warn!(
                expected = outcome.best.frame_count,
                decoded = inspection.frame_count,
                "Frame count mismatch"
            );
        }
    }

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Done");
    Ok(())
}

fn print_summary(outcome: &FitOutcome) {
    println!("attempt  knob        size_bytes  frames  dims       colors  similarity  ms");
    for a in &outcome.history {
        println!(
            "{:<8} {:<11} {:<11} {:<7} {:<10} {:<7} {:<11.2} {}",
            a.attempt,
            a.degraded.as_deref().unwrap_or("-"),
            a.size_bytes,
            a.frame_count,
            format!("{}x{}", a.width, a.height),
            a.max_colors,
            a.similarity_threshold,
            a.processing_time_ms
        );
    }

    let status = match outcome.status {
        FitStatus::Satisfied => "satisfied",
        FitStatus::Exhausted => "exhausted (budget unmet, smallest artifact kept)",
    };
    println!("status: {}", status);
    println!(
        "artifact: {} bytes, {} frames, {}x{}",
        outcome.best.achieved_size_bytes,
        outcome.best.frame_count,
        outcome.best.width,
        outcome.best.height
    );
    println!("sha256: {:x}", Sha256::digest(&outcome.best.bytes));
}
