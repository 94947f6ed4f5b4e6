//! Command-line interface: train a classifier on a labeled image directory,
//! classify a directory of test images, or inspect dataset statistics.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use lenet_classify::backend::{backend_name, default_device, TrainingBackend};
use lenet_classify::dataset::{ImageShape, LabeledDataset, Preprocessor};
use lenet_classify::inference::Classifier;
use lenet_classify::training::{fit, TrainingConfig};
use lenet_classify::utils::{init_logging, write_training_curves, LogConfig};
use lenet_classify::{artifact, AugmentationConfig, DEFAULT_CHANNELS, DEFAULT_IMAGE_SIZE};

/// LeNet5-style image classification
///
/// Trains a small CNN on a directory of labeled images and ranks candidate
/// classes for new images with the resulting artifact pair.
#[derive(Parser, Debug)]
#[command(name = "lenet-classify")]
#[command(version)]
#[command(about = "Train and run a LeNet5-style image classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a model on a labeled image directory
    Train {
        /// Path to the dataset root (one `set-<num>-<label>` directory per class)
        #[arg(short, long)]
        dataset: String,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: usize,

        /// Output model base name (writes `<base>.model.tar.gz` and `<base>.labels.json`)
        #[arg(short, long)]
        model: String,

        /// Enable data augmentation during training
        #[arg(short, long, default_value = "false")]
        augmentation: bool,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Adam learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Square input side length images are resized to
        #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
        image_size: usize,

        /// Train on grayscale images instead of RGB
        #[arg(long, default_value = "false")]
        grayscale: bool,

        /// Fraction of the dataset held out for validation
        #[arg(long, default_value = "0.2")]
        validation_fraction: f64,

        /// Random seed for shuffling, splitting and augmentation
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Classify every image in a directory with a trained model
    Classify {
        /// Model base name used at training time
        #[arg(short, long)]
        model: String,

        /// Path to a directory of test images
        #[arg(short, long)]
        testset: String,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset root
        #[arg(short, long)]
        dataset: String,

        /// Square input side length used when loading
        #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
        image_size: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            dataset,
            epochs,
            model,
            augmentation,
            batch_size,
            learning_rate,
            image_size,
            grayscale,
            validation_fraction,
            seed,
        } => cmd_train(TrainArgs {
            dataset,
            epochs,
            model,
            augmentation,
            batch_size,
            learning_rate,
            image_size,
            grayscale,
            validation_fraction,
            seed,
        }),
        Commands::Classify { model, testset } => cmd_classify(&model, &testset),
        Commands::Stats {
            dataset,
            image_size,
        } => cmd_stats(&dataset, image_size),
    }
}

struct TrainArgs {
    dataset: String,
    epochs: usize,
    model: String,
    augmentation: bool,
    batch_size: usize,
    learning_rate: f64,
    image_size: usize,
    grayscale: bool,
    validation_fraction: f64,
    seed: u64,
}

fn cmd_train(args: TrainArgs) -> Result<()> {
    println!("{}", "Loading dataset...".cyan().bold());

    let channels = if args.grayscale { 1 } else { DEFAULT_CHANNELS };
    let shape = ImageShape::new(args.image_size, channels)?;
    let preprocessor = Preprocessor::new(shape);
    let dataset = LabeledDataset::load(&args.dataset, &preprocessor)
        .with_context(|| format!("failed to load dataset from {}", args.dataset))?;
    dataset.stats().print();

    let config = TrainingConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        validation_fraction: args.validation_fraction,
        augmentation: args.augmentation.then(AugmentationConfig::default),
        seed: args.seed,
    };

    println!();
    println!("{}", "Training configuration:".cyan().bold());
    println!("  Samples:        {}", dataset.len());
    println!("  Classes:        {}", dataset.num_classes());
    println!("  Image shape:    {}x{}x{}", shape.size, shape.size, shape.channels);
    println!("  Epochs:         {}", config.epochs);
    println!("  Batch size:     {}", config.batch_size);
    println!("  Learning rate:  {}", config.learning_rate);
    println!("  Augmentation:   {}", config.augmentation.is_some());
    println!("  Backend:        {}", backend_name());
    println!();

    println!("{}", "Training...".green().bold());
    let device = default_device();
    let run = fit::<TrainingBackend>(&dataset, &config, &device)?;

    artifact::save(&run.artifact, dataset.vocabulary(), &args.model)?;
    println!(
        "  Saved {} and {}",
        artifact::model_path(&args.model).display(),
        artifact::labels_path(&args.model).display()
    );

    let chart_path = PathBuf::from(format!("{}.svg", args.model));
    write_training_curves(&run.history, &chart_path)
        .with_context(|| format!("failed to write training chart {chart_path:?}"))?;
    println!("  Training curves: {}", chart_path.display());

    if let (Some(loss), Some(acc)) = (
        run.history.val_loss.last(),
        run.history.val_accuracy.last(),
    ) {
        println!();
        println!(
            "{} final val loss {:.4}, val accuracy {:.2}%",
            "Training complete:".green().bold(),
            loss,
            acc
        );
    }

    Ok(())
}

fn cmd_classify(model_base: &str, testset: &str) -> Result<()> {
    let device = default_device();
    let classifier = Classifier::<lenet_classify::backend::DefaultBackend>::load(model_base, &device)
        .with_context(|| format!("failed to load model pair with base name {model_base}"))?;

    println!(
        "Loaded model: {} classes, {}x{}x{} input",
        classifier.hyperparams().num_classes,
        classifier.hyperparams().image_size,
        classifier.hyperparams().image_size,
        classifier.hyperparams().channels
    );
    println!();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(testset)
        .with_context(|| format!("failed to read test directory {testset}"))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_image_file(p))
        .collect();
    entries.sort();

    if entries.is_empty() {
        println!("{} no image files in {testset}", "Warning:".yellow());
        return Ok(());
    }

    for path in entries {
        let prediction = classifier
            .classify_file(&path)
            .with_context(|| format!("failed to classify {path:?}"))?;

        println!("{}", path.display().to_string().bold());
        for line in prediction.display_lines() {
            println!("  {line}");
        }
        println!();
    }

    Ok(())
}

fn cmd_stats(dataset: &str, image_size: usize) -> Result<()> {
    let shape = ImageShape::new(image_size, DEFAULT_CHANNELS)?;
    let preprocessor = Preprocessor::new(shape);
    let dataset = LabeledDataset::load(dataset, &preprocessor)?;
    dataset.stats().print();
    Ok(())
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                ["jpg", "jpeg", "png", "bmp"].contains(&ext.as_str())
            })
            .unwrap_or(false)
}
