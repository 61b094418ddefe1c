//! Flowers17 CLI
//!
//! Entry point for splitting the flower index, inspecting splits, driving the
//! image feeds and browsing stored artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use flowers17::dataset::split::SplitStats;
use flowers17::persistence::{HistoryStore, ModelStore};
use flowers17::utils::charts::write_history_chart;
use flowers17::utils::format_share_bar;
use flowers17::utils::logging::{init_logging, LogConfig};
use flowers17::{DatasetSplits, ExperimentConfig, FeedSet, Partition};

/// Dataset tooling for the Oxford 17 flowers experiment
#[derive(Parser, Debug)]
#[command(name = "flowers17")]
#[command(version)]
#[command(about = "Split the flower index, feed augmented batches, inspect stored artifacts", long_about = None)]
struct Cli {
    /// Path to an experiment TOML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Partition the index file into train/test/validation sets
    Split {
        /// Index file (defaults to the configured one)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Fraction of each class used for training
        #[arg(long)]
        train: Option<f64>,

        /// Fraction of each class used for testing
        #[arg(long)]
        test: Option<f64>,

        /// Random seed for a reproducible split
        #[arg(long)]
        seed: Option<u64>,

        /// Check filename numbers against their class block
        #[arg(long, default_value = "false")]
        verify: bool,

        /// Write the split to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the class of each filename
    Classify {
        /// Filenames such as image_0721.jpg
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// Show statistics of a saved split
    Stats {
        /// Split JSON file
        splits: PathBuf,
    },

    /// Pull batches from one partition's image feed
    Feed {
        /// Split JSON file (a fresh split is made when omitted)
        #[arg(short, long)]
        splits: Option<PathBuf>,

        /// Partition to feed: train, test or validation
        #[arg(short, long, default_value = "train")]
        partition: String,

        /// Number of batches to load (defaults to one epoch)
        #[arg(short, long)]
        batches: Option<usize>,
    },

    /// Inspect stored training histories
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Inspect stored models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Print the metrics of a history file
    Show {
        /// File name inside the history directory
        filename: String,
    },

    /// Render a history file as an SVG chart
    Plot {
        /// File name inside the history directory
        filename: String,

        /// Metrics to plot (all when omitted)
        #[arg(short, long)]
        metrics: Vec<String>,

        /// Output SVG path
        #[arg(short, long, default_value = "history.svg")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsAction {
    /// List stored model names
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        config.logging.clone()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Split {
            index,
            train,
            test,
            seed,
            verify,
            output,
        } => cmd_split(&config, index, train, test, seed, verify, output.as_deref()),
        Commands::Classify { filenames } => cmd_classify(&config, &filenames),
        Commands::Stats { splits } => {
            let splits = DatasetSplits::load(&splits)?;
            print_stats(&splits.stats());
            Ok(())
        }
        Commands::Feed {
            splits,
            partition,
            batches,
        } => cmd_feed(&config, splits.as_deref(), &partition, batches),
        Commands::History { action } => cmd_history(&config, action),
        Commands::Models {
            action: ModelsAction::List,
        } => cmd_models_list(&config),
    }
}

fn cmd_split(
    config: &ExperimentConfig,
    index: Option<PathBuf>,
    train: Option<f64>,
    test: Option<f64>,
    seed: Option<u64>,
    verify: bool,
    output: Option<&Path>,
) -> Result<()> {
    let mut split_config = config.split.clone();
    if let Some(train) = train {
        split_config.train_fraction = train;
    }
    if test.is_some() {
        split_config.test_fraction = test;
    }
    if seed.is_some() {
        split_config.seed = seed;
    }
    split_config.verify_filenames |= verify;

    let index = index.unwrap_or_else(|| config.index_path());
    println!("{} {}", "Splitting".cyan().bold(), index.display());

    let splits = DatasetSplits::from_index_file(&index, &config.dataset.classes, &split_config)?;
    print_stats(&splits.stats());

    if let Some(path) = output {
        splits.save(path)?;
        println!("{} {}", "Saved split to".green(), path.display());
    }

    Ok(())
}

fn cmd_classify(config: &ExperimentConfig, filenames: &[String]) -> Result<()> {
    for filename in filenames {
        match config.dataset.classes.classify_filename(filename) {
            Ok(class) => println!("{:24} {}", filename, class.name.green()),
            Err(e) => println!("{:24} {}", filename, e.to_string().red()),
        }
    }
    Ok(())
}

fn cmd_feed(
    config: &ExperimentConfig,
    splits_path: Option<&Path>,
    partition: &str,
    batches: Option<usize>,
) -> Result<()> {
    let partition: Partition = partition.parse()?;

    let splits = match splits_path {
        Some(path) => DatasetSplits::load(path)?,
        None => DatasetSplits::from_index_file(
            config.index_path(),
            &config.dataset.classes,
            &config.split,
        )?,
    };

    let mut feeds = FeedSet::from_splits(&splits, &config.dataset.base_dir, &config.feed)?;
    let feed = feeds.get_mut(partition);
    let total = batches.unwrap_or_else(|| feed.num_batches());

    println!(
        "{} {} ({} images, {} batches per epoch)",
        "Feeding".cyan().bold(),
        partition,
        feed.len(),
        feed.num_batches()
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut images = 0usize;
    let mut last_dims = None;
    for _ in 0..total {
        let batch = feed.next_batch()?;
        images += batch.len();
        last_dims = Some(batch.dims());
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Fed {} images in {} batches", images, total);
    println!("  Images loaded: {}", images);
    println!("  Epochs completed: {}", feed.epoch());
    if let Some(dims) = last_dims {
        println!("  Last batch shape: {:?}", dims);
    }

    Ok(())
}

fn cmd_history(config: &ExperimentConfig, action: HistoryAction) -> Result<()> {
    let store = HistoryStore::new(&config.storage.history_dir);

    match action {
        HistoryAction::Show { filename } => {
            let history = store.load(&filename)?;
            println!(
                "{} {} ({} epochs)",
                "History".cyan().bold(),
                filename,
                history.epochs()
            );
            for (name, values) in history.iter() {
                let last = values.last().map(|v| format!("{:.4}", v)).unwrap_or_default();
                println!("  {:20} last {:>10}   values {}", name, last, values.len());
            }
        }
        HistoryAction::Plot {
            filename,
            metrics,
            output,
        } => {
            let history = store.load(&filename)?;
            let metrics: Vec<&str> = metrics.iter().map(String::as_str).collect();
            write_history_chart(&history, &metrics, &filename, &output)?;
            println!("{} {}", "Chart written to".green(), output.display());
        }
    }

    Ok(())
}

fn cmd_models_list(config: &ExperimentConfig) -> Result<()> {
    let store = ModelStore::new(&config.storage.models_dir);
    let names = store.list()?;

    if names.is_empty() {
        println!("{}", format!("No models in {}", store.dir().display()).yellow());
        return Ok(());
    }

    println!("{}", "Stored models:".cyan().bold());
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

fn print_stats(stats: &SplitStats) {
    println!("{}", stats);

    if stats.total_records == 0 {
        return;
    }
    let share = |n: usize| n as f64 / stats.total_records as f64;
    println!("  train      {}", format_share_bar(share(stats.train_size), 30));
    println!("  test       {}", format_share_bar(share(stats.test_size), 30));
    println!("  validation {}", format_share_bar(share(stats.validation_size), 30));
}
