//! Command-line tool for the HSI + LiDAR datasets.
//!
//! - Download, verify and decode a dataset into the local cache
//! - Print dataset metadata
//! - Inspect ENVI ROI exports
//! - Write reproducible train/test splits
//! - Render ground truth as PNG

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use hsi_core::cli::{load_toml_config, setup_cli_logging};
use hsi_core::{FetchConfig, SparseLabels};
use hsi_dataset::{
    read_roi_with, render_labels, save_png, AssembledDataset, BlockSeparator, DatasetCache,
    DatasetId, GroundTruth, Palette, Subset,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "hsi")]
#[command(about = "Fetch, verify, split and render remote-sensing datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache root (overrides the config and SCIKIT_LEARN_DATA)
    #[arg(long, global = true)]
    data_home: Option<PathBuf>,

    /// Never download; fail if files are missing
    #[arg(long, global = true)]
    no_download: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download (if needed), verify and decode a dataset
    Fetch {
        /// houston2013, houston2013-mmrs, muufl or trento
        dataset: DatasetId,
    },

    /// Verify the cached files of a dataset without downloading
    Verify { dataset: DatasetId },

    /// Print dataset metadata as JSON
    Info { dataset: DatasetId },

    /// Parse an ENVI ROI text export
    Roi {
        file: PathBuf,

        #[arg(long)]
        height: usize,

        #[arg(long)]
        width: usize,

        /// Blocks start at point index 1 instead of after blank lines
        #[arg(long)]
        sentinel: bool,

        /// Save the labels as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the train/test split of a dataset as JSON
    Split {
        dataset: DatasetId,

        #[arg(short, long)]
        output: PathBuf,

        /// Training pixels per class (datasets without an official split)
        #[arg(long)]
        samples_per_class: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Render ground truth as a PNG
    Render {
        dataset: DatasetId,

        #[arg(long, value_enum, default_value_t = SubsetArg::Full)]
        subset: SubsetArg,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SubsetArg {
    Train,
    Test,
    Full,
}

impl From<SubsetArg> for Subset {
    fn from(arg: SubsetArg) -> Self {
        match arg {
            SubsetArg::Train => Subset::Train,
            SubsetArg::Test => Subset::Test,
            SubsetArg::Full => Subset::Full,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_cli_logging(cli.verbose)?;

    let mut config: FetchConfig = match &cli.config {
        Some(path) => load_toml_config(path)?,
        None => FetchConfig::default(),
    };
    if let Some(data_home) = cli.data_home {
        config.data_home = Some(data_home);
    }
    if cli.no_download {
        config.download_if_missing = false;
    }
    config.validate()?;

    match cli.command {
        Commands::Fetch { dataset } => fetch(&config, dataset)?,
        Commands::Verify { dataset } => verify(&config, dataset)?,
        Commands::Info { dataset } => {
            let metadata = dataset.metadata()?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::Roi {
            file,
            height,
            width,
            sentinel,
            output,
        } => roi(&file, (height, width), sentinel, output.as_deref())?,
        Commands::Split {
            dataset,
            output,
            samples_per_class,
            seed,
        } => {
            if let Some(k) = samples_per_class {
                config.split.samples_per_class = k;
            }
            if let Some(seed) = seed {
                config.split.seed = seed;
            }
            split(&config, dataset, &output)?
        }
        Commands::Render {
            dataset,
            subset,
            output,
        } => render(&config, dataset, subset.into(), &output)?,
    }

    Ok(())
}

fn load(config: &FetchConfig, dataset: DatasetId) -> Result<AssembledDataset> {
    let cache = DatasetCache::from_config(config).context("Failed to set up the data home")?;
    cache
        .fetch(dataset)
        .with_context(|| format!("Failed to fetch {dataset}"))
}

fn fetch(config: &FetchConfig, dataset: DatasetId) -> Result<()> {
    println!("{}", format!("Fetching {dataset}...").green().bold());
    let assembled = load(config, dataset)?;
    let meta = &assembled.metadata;

    println!();
    println!("{}", meta.full_name().cyan().bold());
    println!("  HSI:        {:?}", assembled.hsi.dim());
    println!("  Auxiliary:  {:?}", assembled.aux.dim());
    println!("  Classes:    {}", meta.n_class());
    match &assembled.truth {
        GroundTruth::Split { train, test } => {
            println!("  Train:      {} labeled pixel(s)", train.nnz());
            println!("  Test:       {} labeled pixel(s)", test.nnz());
        }
        GroundTruth::Full(labels) => {
            println!("  Labeled:    {} pixel(s), no official split", labels.nnz());
        }
    }
    Ok(())
}

fn verify(config: &FetchConfig, dataset: DatasetId) -> Result<()> {
    let offline = FetchConfig {
        download_if_missing: false,
        ..config.clone()
    };
    let cache = DatasetCache::from_config(&offline)?;
    let root = cache
        .prepare(dataset)
        .with_context(|| format!("Verification of {dataset} failed"))?;
    println!("{} {}", "OK".green().bold(), root.display());
    Ok(())
}

fn roi(file: &Path, shape: (usize, usize), sentinel: bool, output: Option<&Path>) -> Result<()> {
    let separator = if sentinel {
        BlockSeparator::PointIndexReset
    } else {
        BlockSeparator::BlankLine
    };
    let outcome = read_roi_with(file, shape, separator)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    println!("{}", format!("{} block(s)", outcome.blocks).cyan().bold());
    for (class_id, count) in outcome.labels.class_counts() {
        println!("  class {class_id:>3}: {count} pixel(s)");
    }
    if !outcome.conflicts.is_empty() {
        println!(
            "{}",
            format!("{} ambiguous pixel(s) dropped", outcome.conflicts.len()).yellow()
        );
    }

    if let Some(path) = output {
        outcome.labels.save_json(path)?;
        info!("Labels saved to {}", path.display());
    }
    Ok(())
}

fn split(config: &FetchConfig, dataset: DatasetId, output: &Path) -> Result<()> {
    let assembled = load(config, dataset)?;
    let pair = assembled
        .truth
        .train_test(&config.split)
        .context("Failed to split ground truth")?;

    pair.save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{}", pair.stats());
    println!("{} {}", "Saved".green().bold(), output.display());
    Ok(())
}

fn render(config: &FetchConfig, dataset: DatasetId, subset: Subset, output: &Path) -> Result<()> {
    let assembled = load(config, dataset)?;
    let labels: SparseLabels = match subset {
        Subset::Full => assembled.truth.labels()?,
        Subset::Train => assembled.truth.train_test(&config.split)?.train,
        Subset::Test => assembled.truth.train_test(&config.split)?.test,
    };

    let image = render_labels(&labels, &Palette::for_dataset(dataset));
    save_png(&image, output)?;
    println!(
        "{} {subset} labels of {dataset} to {}",
        "Rendered".green().bold(),
        output.display()
    );
    Ok(())
}
