use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use strum::IntoEnumIterator;
use ytfaces_lib::{load_config_file, BuildParams, Config, OutputType, Partition, YouTubeFacesDB};

#[derive(Parser, Debug)]
#[command(
    name = "ytfaces",
    version,
    about = "Pack the YouTube Faces frames into one array file and read it back in batches."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a database from a RON parameter file.
    Build(BuildArgs),
    /// Open a database, split it and walk through its minibatches.
    Inspect(InspectArgs),
    /// Print the default build parameters as RON.
    Template,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// RON file with the build parameters.
    config: PathBuf,
    /// Overrides the output file of the config.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Overrides the seed of the config.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Database written by `build`.
    filename: PathBuf,
    #[arg(long, default_value_t = 0.2)]
    validation: f64,
    #[arg(long, default_value_t = 0.0)]
    test: f64,
    #[arg(long, default_value_t = 100)]
    batch_size: usize,
    /// Drop the last incomplete minibatch of each partition.
    #[arg(long)]
    drop_rest: bool,
    #[arg(long)]
    mean_removal: bool,
    /// `integer` or `vector`.
    #[arg(long, default_value = "vector")]
    output_type: String,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ytfaces=info".parse()?)
                .add_directive("ytfaces_lib=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => build(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Template => {
            println!("{}", BuildParams::default().config()?);
            Ok(())
        }
    }
}

fn build(args: BuildArgs) -> Result<()> {
    let mut params: BuildParams = load_config_file(&args.config)?;
    if let Some(output) = args.output {
        params.filename = output;
    }
    if args.seed.is_some() {
        params.seed = args.seed;
    }
    let summary = params.build()?;
    println!(
        "{} images of shape {:?} for {} people written to {}",
        summary.nb_images,
        summary.image_shape,
        summary.nb_labels(),
        summary.filename.display()
    );
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let output_type = OutputType::parse_or_default(&args.output_type);
    let mut db = YouTubeFacesDB::open(&args.filename, args.mean_removal, output_type)
        .with_context(|| format!("opening {}", args.filename.display()))?;
    if let Some(seed) = args.seed {
        db = db.with_seed(seed);
    }
    println!(
        "{} images of size {:?}, {} classes",
        db.nb_samples(),
        db.input_dim(),
        db.nb_classes()
    );

    db.split(args.validation, args.test)?;
    for partition in Partition::iter() {
        let mut nb_batches = 0;
        let mut nb_seen = 0;
        for (x, y) in db.generate_batches(args.batch_size, partition, !args.drop_rest)? {
            nb_batches += 1;
            nb_seen += y.len();
            tracing::debug!("{} batch {}: X {:?}", partition, nb_batches, x.shape());
        }
        println!("{partition}: {nb_seen} samples in {nb_batches} batches");
    }
    Ok(())
}
