use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use burn::config::Config;
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::{info, warn};
use volreg_core::filter::{AverageImageFilter, HistogramMatchingConfig};
use volreg_core::image::Image;
use volreg_registration::{
    register_affine, AffineRegistrationConfig, CancellationToken, CheckpointObserver, ConsoleObserver,
    DeformablePipeline, DemonsConfig, ObserverSet,
};

mod batch;

use batch::{BatchReport, ImageStatus};

type B = NdArray<f32>;

#[derive(Parser)]
#[command(name = "volreg")]
#[command(about = "Average, affine-register and deformably register 3-D volumes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average pre-aligned volumes into one composite
    Average {
        /// Number of input volumes
        count: usize,

        /// The input volumes followed by the output path
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Affine-register moving volumes to a fixed volume
    ///
    /// Each result is written next to its moving volume as `affine_<name>`.
    Affine {
        /// Number of moving volumes
        count: usize,

        /// Fixed (reference) volume
        fixed: PathBuf,

        /// Moving volumes
        #[arg(required = true)]
        moving: Vec<PathBuf>,

        /// Worker threads across moving volumes
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// JSON registration configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of pyramid levels; the step schedule halves per level
        #[arg(short, long)]
        levels: Option<usize>,
    },

    /// Histogram-match then demons-register a moving volume
    Deformable {
        /// Fixed (reference) volume
        fixed: PathBuf,

        /// Moving volume
        moving: PathBuf,

        /// Output path of the registered volume
        output_base: PathBuf,

        /// Demons iterations
        iterations: usize,

        /// Field smoothing in voxels
        #[arg(long)]
        std_dev: Option<f64>,

        /// Write the warped volume every K iterations
        #[arg(long, value_name = "K")]
        checkpoint_every: Option<usize>,

        /// JSON demons configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON histogram matching configuration
        #[arg(long)]
        matching_config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Average { count, paths } => average(count, &paths),
        Commands::Affine { count, fixed, moving, jobs, config, levels } => {
            affine(count, &fixed, &moving, jobs, config.as_deref(), levels)
        }
        Commands::Deformable {
            fixed,
            moving,
            output_base,
            iterations,
            std_dev,
            checkpoint_every,
            config,
            matching_config,
        } => deformable(
            &fixed,
            &moving,
            &output_base,
            iterations,
            std_dev,
            checkpoint_every,
            config.as_deref(),
            matching_config.as_deref(),
        ),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config<C: Config>(path: &Path) -> Result<C> {
    C::load(path).map_err(|e| anyhow::anyhow!("failed to load config {}: {:?}", path.display(), e))
}

fn read(path: &Path) -> Result<Image<B, 3>> {
    Ok(volreg_io::read_image::<B, _>(path, &Default::default())?)
}

fn average(count: usize, paths: &[PathBuf]) -> Result<ExitCode> {
    if paths.len() != count + 1 {
        bail!(
            "expected {} inputs and one output path, got {} paths",
            count,
            paths.len()
        );
    }
    let (output, inputs) = paths
        .split_last()
        .context("missing output path")?;

    let images = inputs
        .iter()
        .map(|path| read(path))
        .collect::<Result<Vec<_>>>()?;
    info!("Averaging {} volumes", images.len());

    let mean = AverageImageFilter::new()
        .apply(&images)
        .context("averaging failed")?;
    volreg_io::write_image(&mean, output)?;
    println!("Wrote average of {} volumes to {}", count, output.display());
    Ok(ExitCode::SUCCESS)
}

/// `dir/name.nii.gz` becomes `dir/affine_name.nii.gz`.
fn affine_output_path(moving: &Path) -> PathBuf {
    let name = moving
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    moving.with_file_name(format!("affine_{}", name))
}

fn affine(
    count: usize,
    fixed: &Path,
    moving: &[PathBuf],
    jobs: usize,
    config: Option<&Path>,
    levels: Option<usize>,
) -> Result<ExitCode> {
    if moving.len() != count {
        bail!("expected {} moving volumes, got {}", count, moving.len());
    }
    let mut config = match config {
        Some(path) => load_config::<AffineRegistrationConfig>(path)?,
        None => AffineRegistrationConfig::new(),
    };
    if let Some(levels) = levels {
        config = config.with_levels(levels);
    }
    // Fail on a bad configuration before reading any volume.
    volreg_registration::validation::validate_affine_config(&config)?;

    let fixed_image = read(fixed)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("failed to build worker pool")?;
    let cancel = CancellationToken::new();

    let statuses: Vec<ImageStatus> = pool.install(|| {
        moving
            .par_iter()
            .map(|path| {
                let output = affine_output_path(path);
                let outcome = affine_one(&fixed_image, path, &output, &config, &cancel);
                ImageStatus::from_outcome(path.clone(), output, outcome)
            })
            .collect()
    });

    let report = BatchReport::new(statuses);
    report.print();
    Ok(report.exit_code())
}

fn affine_one(
    fixed: &Image<B, 3>,
    moving_path: &Path,
    output: &Path,
    config: &AffineRegistrationConfig,
    cancel: &CancellationToken,
) -> Result<batch::RunSummary> {
    let moving = read(moving_path)?;
    let observers = ObserverSet::<B>::new().with(Arc::new(ConsoleObserver::new(25)));
    let registered = register_affine(fixed, &moving, config.clone(), &observers, cancel)
        .with_context(|| format!("registration of {} failed", moving_path.display()))?;
    volreg_io::write_image(&registered.image, output)?;

    let result = &registered.result;
    for level in result.levels.iter().filter(|l| l.stop.is_failure()) {
        warn!(
            "{}: level {} ended with {:?} after {} iterations",
            moving_path.display(),
            level.level + 1,
            level.stop,
            level.iterations
        );
    }
    Ok(batch::RunSummary {
        iterations: result.iterations,
        final_value: result.final_value,
        degraded: result.degraded,
    })
}

#[allow(clippy::too_many_arguments)]
fn deformable(
    fixed: &Path,
    moving: &Path,
    output: &Path,
    iterations: usize,
    std_dev: Option<f64>,
    checkpoint_every: Option<usize>,
    config: Option<&Path>,
    matching_config: Option<&Path>,
) -> Result<ExitCode> {
    let mut demons = match config {
        Some(path) => load_config::<DemonsConfig>(path)?,
        None => DemonsConfig::new(iterations),
    };
    demons.iterations = iterations;
    if let Some(sigma) = std_dev {
        demons = demons.with_standard_deviation(sigma);
    }
    let matching = match matching_config {
        Some(path) => load_config::<HistogramMatchingConfig>(path)?,
        None => HistogramMatchingConfig::new(),
    };
    let pipeline = DeformablePipeline::new(demons, matching)?;

    let fixed_image = read(fixed)?;
    let moving_image = read(moving)?;
    let matched = pipeline.normalize(&fixed_image, &moving_image)?;

    let mut observers = ObserverSet::<B>::new().with(Arc::new(ConsoleObserver::new(10)));
    if let Some(interval) = checkpoint_every {
        let writer = |image: &Image<B, 3>, path: &Path| volreg_io::write_image(image, path);
        observers.add(Arc::new(CheckpointObserver::new(matched.clone(), output, interval, writer)));
    }

    let registered = pipeline
        .register(&fixed_image, &matched, &observers, &CancellationToken::new())
        .with_context(|| format!("deformable registration of {} failed", moving.display()))?;
    volreg_io::write_image(&registered.image, output)?;

    let status = ImageStatus::from_outcome(
        moving.to_path_buf(),
        output.to_path_buf(),
        Ok(batch::RunSummary {
            iterations: registered.result.iterations,
            final_value: registered.result.final_value,
            degraded: registered.result.degraded,
        }),
    );
    let report = BatchReport::new(vec![status]);
    report.print();
    Ok(report.exit_code())
}
