use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use genefetch::batch::BatchRunner;
use genefetch::config::{Config, ConfigLoader, DEFAULT_CONFIG_FILE, Overrides};
use genefetch::error::GeneFetchError;
use genefetch::eutils::EutilsHttpClient;
use genefetch::fetcher::SequenceFetcher;
use genefetch::output::{HumanOutput, JsonOutput, OutputMode};
use genefetch::rate_gate::IntervalGate;
use genefetch::sink::DirectorySink;

const DEFAULT_RATE: u32 = 2;

#[derive(Parser)]
#[command(name = "genefetch")]
#[command(about = "Download gene region sequences (FASTA) per species from NCBI nucleotide")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search and download sequences for one species or a species file")]
    Fetch(FetchArgs),
    #[command(about = "Write a config file from the given values")]
    Init(InitArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, help = "Gene region, e.g. rbcL or matK")]
    gene: Option<String>,

    #[arg(long, help = "Single species name")]
    species: Option<String>,

    #[arg(long, help = "File with one species name per line")]
    species_file: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value_t = 1, help = "Species processed concurrently")]
    jobs: usize,

    #[arg(long, default_value_t = 0, help = "Retries for throttled or failed calls")]
    retries: usize,

    #[arg(long, default_value_t = DEFAULT_RATE, value_parser = clap::value_parser!(u32).range(1..=10), help = "Remote calls per second")]
    rate: u32,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InitArgs {
    #[arg(long)]
    gene: Option<String>,

    #[arg(long)]
    species_file: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GeneFetchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GeneFetchError) -> u8 {
    match error {
        GeneFetchError::MissingGene
        | GeneFetchError::MissingSpecies
        | GeneFetchError::MissingConfig(_)
        | GeneFetchError::ConfigRead(_)
        | GeneFetchError::ConfigParse(_)
        | GeneFetchError::InvalidGene(_)
        | GeneFetchError::InvalidSpecies(_)
        | GeneFetchError::SpeciesFile { .. } => 2,
        GeneFetchError::Transport { .. } | GeneFetchError::Status { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Fetch(args)) => run_fetch(args),
        Some(Commands::Init(args)) => run_init(args),
        None => Err(miette::Report::msg(
            "command required (try `genefetch fetch --help`)",
        )),
    }
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let FetchArgs {
        gene,
        species,
        species_file,
        output_dir,
        config,
        jobs,
        retries,
        rate,
        json,
    } = args;

    let loaded = ConfigLoader::load(config.as_deref())?;
    let plan = ConfigLoader::resolve(
        loaded,
        Overrides {
            species,
            species_file,
            output_dir,
            gene,
        },
    )?;
    let species = plan.source.load()?;
    if species.is_empty() {
        warn!("species list is empty; nothing to do");
    }

    let sink = DirectorySink::new(plan.output_dir.clone());
    sink.ensure_dir()?;

    let client = EutilsHttpClient::new()?;
    if client.has_api_key() && rate == DEFAULT_RATE {
        info!("NCBI_API_KEY is set; pass --rate to go above {DEFAULT_RATE} calls/second");
    }
    let gate = Arc::new(IntervalGate::per_second(rate));
    let fetcher = SequenceFetcher::new(client, sink, gate).with_retries(retries);

    let summary = BatchRunner::new(&fetcher)
        .with_jobs(jobs)
        .run(&species, &plan.gene);

    let mode = if json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    match mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_summary(&summary).into_diagnostic()?,
    }
    Ok(())
}

fn run_init(args: InitArgs) -> miette::Result<()> {
    let InitArgs {
        gene,
        species_file,
        output_dir,
        config,
    } = args;

    if let Some(file) = species_file.as_deref() {
        let path = PathBuf::from(file);
        if !path.exists() {
            std::fs::write(&path, "").into_diagnostic()?;
            info!("Species file '{file}' created. Add one species name per line.");
        }
    }

    let config_path = PathBuf::from(config);
    let config = Config {
        species_file,
        output_dir,
        gene,
    };
    ConfigLoader::save(&config_path, &config)?;
    info!("Configuration saved to {}", config_path.display());
    Ok(())
}
