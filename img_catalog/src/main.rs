use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use img_catalog::classifier::is_asset_container;
use img_catalog::{
    classify, is_accepted_input, walk, ConversionCoordinator, ConvertConfig, JobOutcome,
    PathClassification, ProgressEvent, TargetFormat,
};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::progress_mode::{enable_quiet_mode, set_verbose_mode};
use shared_utils::{
    display_file_name, print_simple_summary, print_summary_report, verbose_eprintln,
    UnifiedProgressBar,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

const PROGRAM: &str = "img_catalog";

#[derive(Parser)]
#[command(name = "img-catalog")]
#[command(version, about = "Batch image converter that keeps asset-catalog manifests in sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert images and rewrite the manifests that reference them
    #[command(name = "run")]
    Run {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// heic, png, jpeg, webp or tiff
        #[arg(short, long, default_value = "heic")]
        target: TargetFormat,

        #[arg(short, long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        /// Worker threads (default: IMG_CATALOG_THREADS, then CPU-based)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Replace outputs that already exist
        #[arg(short, long)]
        force: bool,

        /// Do not copy EXIF/ICC, xattrs and timestamps onto outputs
        #[arg(long)]
        no_metadata: bool,

        #[arg(short, long)]
        verbose: bool,

        /// Print the summary as JSON (hides the progress bar)
        #[arg(long)]
        json: bool,

        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Show how each path would be treated
    Classify {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            target,
            quality,
            threads,
            force,
            no_metadata,
            verbose,
            json,
            log_dir,
        } => {
            let mut log_config = LogConfig::default()
                .with_stderr(verbose)
                .with_level(if verbose { Level::DEBUG } else { Level::INFO });
            if let Some(dir) = log_dir {
                log_config = log_config.with_log_dir(dir);
            }
            if let Err(e) = init_logging(PROGRAM, log_config) {
                eprintln!("⚠️  Logging disabled: {:#}", e);
            }
            set_verbose_mode(verbose);
            if json {
                enable_quiet_mode();
            }

            let mut config = ConvertConfig::default()
                .with_target(target)
                .with_quality(quality)
                .with_overwrite(force)
                .with_preserve_metadata(!no_metadata);
            config.threads = threads;
            config.verbose = verbose;

            run(paths, config, json)
        }
        Commands::Classify { paths } => {
            classify_paths(&paths);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(paths: Vec<PathBuf>, config: ConvertConfig, json: bool) -> Result<ExitCode> {
    let selected: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| {
            let accepted = is_accepted_input(path);
            if !accepted {
                eprintln!(
                    "{} Ignoring {} (not an image, manifest or directory)",
                    style("⚠️").yellow(),
                    path.display()
                );
            }
            accepted
        })
        .collect();

    if selected.is_empty() {
        eprintln!("❌ Nothing to do: no usable input paths");
        return Ok(ExitCode::FAILURE);
    }

    let coordinator = ConversionCoordinator::new(config).context("Failed to set up converter")?;

    let progress = UnifiedProgressBar::new(0, "Converting");
    {
        let progress = progress.clone();
        coordinator.subscribe(move |event| match event {
            ProgressEvent::BatchStarted => progress.set_message("scanning"),
            ProgressEvent::ImageQueued { total, .. } => progress.set_length(*total as u64),
            ProgressEvent::JobFinished {
                path,
                outcome,
                processed,
                ..
            } => {
                progress.set_position(*processed as u64);
                progress.set_message(display_file_name(path));
                match outcome {
                    JobOutcome::Failed(error) => {
                        progress.println(&format!("❌ {} → {}", path.display(), error))
                    }
                    JobOutcome::Skipped(reason) => {
                        verbose_eprintln!("⏭️  {} ({})", path.display(), reason)
                    }
                    JobOutcome::Success => {}
                }
            }
            ProgressEvent::BatchCompleted(summary) => progress.finish_with_message(&format!(
                "{}/{} images",
                summary.processed_images, summary.total_images
            )),
        });
    }

    if !coordinator.start_batch(&selected)? {
        return Ok(ExitCode::SUCCESS);
    }
    let summary = coordinator
        .wait_for_completion()
        .context("Batch finished without a summary")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*summary)?);
    } else if coordinator.config().verbose {
        print_summary_report(
            &summary.images,
            &summary.manifests,
            summary.elapsed(),
            "Asset Conversion",
        );
    } else {
        print_simple_summary(&summary.images, &summary.manifests);
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn classify_paths(paths: &[PathBuf]) {
    for path in paths {
        let class = classify(path);
        print_classification(path, class);
        if class == PathClassification::Directory {
            for item in walk(path) {
                print_classification(&item.path, item.class);
            }
        }
    }
}

fn print_classification(path: &std::path::Path, class: PathClassification) {
    let label = match class {
        PathClassification::Image => style(class.label()).green(),
        PathClassification::Manifest => style(class.label()).cyan(),
        PathClassification::Directory if is_asset_container(path) => style("catalog").magenta(),
        PathClassification::Directory => style(class.label()).blue(),
        PathClassification::Invalid => style(class.label()).dim(),
    };
    println!("{:<10} {}", label, path.display());
}
