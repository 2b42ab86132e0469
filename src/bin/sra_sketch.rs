use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sra_sketch::app::{App, ProgressSink, RunOptions};
use sra_sketch::config::{ConfigLoader, Overrides};
use sra_sketch::domain::{Accession, DownloadFailurePolicy, DownloadMethod};
use sra_sketch::download::{Downloader, KingfisherDownloader, ToolStatus};
use sra_sketch::error::SraSketchError;
use sra_sketch::output::{ConsoleProgress, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "sra-sketch")]
#[command(about = "Download SRA runs with kingfisher and sketch them into sourmash signatures")]
#[command(version, author)]
struct Cli {
    /// Run accessions to download, e.g. ERR1739691
    #[arg(required = true, num_args = 1..)]
    accessions: Vec<String>,

    /// Directory for downloaded FASTQ files and signatures
    #[arg(long, default_value = ".")]
    output_dir: Utf8PathBuf,

    /// Only download SRA file(s) and do not sketch
    #[arg(long)]
    download_only: bool,

    /// Delete fastq file(s) after sketching
    #[arg(long)]
    delete_fastq: bool,

    /// kingfisher download methods, tried in order [default: ena-ftp aws-http prefetch]
    #[arg(short = 'm', long, num_args = 1.., value_enum)]
    download_methods: Option<Vec<DownloadMethod>>,

    /// Threads for download and conversion to fastq [default: 1]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    threads: Option<u32>,

    /// Signature file extension: zip, sig or sig.gz [default: zip]
    #[arg(long)]
    sig_extension: Option<String>,

    /// Print verbose output
    #[arg(long)]
    verbose: bool,

    /// Sketch parameters, e.g. 'dna,k=31,scaled=1000'; repeat for more sketches [default: dna]
    #[arg(short = 'p', long = "param-string")]
    param_strings: Vec<String>,

    /// Abort sketching of an accession on k-mers with non-ACGT bases
    #[arg(long)]
    check_sequence: bool,

    /// Stop the whole run when an accession fails to download
    #[arg(long)]
    abort_on_download_failure: bool,

    /// JSON file with default settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SraSketchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SraSketchError) -> u8 {
    match error {
        SraSketchError::InvalidAccession(_)
        | SraSketchError::InvalidDownloadMethod(_)
        | SraSketchError::InvalidParameterConfiguration { .. }
        | SraSketchError::ConfigRead(_)
        | SraSketchError::ConfigParse(_) => 2,
        SraSketchError::MissingTool(_)
        | SraSketchError::Downloader { .. }
        | SraSketchError::DownloadResultEmpty { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let accessions = cli
        .accessions
        .iter()
        .map(|value| value.parse::<Accession>())
        .collect::<Result<Vec<_>, _>>()?;

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let resolved = ConfigLoader::resolve_config(
        config,
        Overrides {
            param_strings: cli.param_strings,
            download_methods: cli.download_methods,
            threads: cli.threads,
            sig_extension: cli.sig_extension,
            check_sequence: cli.check_sequence,
        },
    )?;

    let downloader = KingfisherDownloader::new();
    if let ToolStatus::Missing { message } = downloader.tool_status() {
        return Err(SraSketchError::MissingTool(message).into());
    }

    let options = RunOptions {
        output_dir: cli.output_dir,
        download_only: cli.download_only,
        delete_fastq: cli.delete_fastq,
        download_methods: resolved.download_methods,
        threads: resolved.threads,
        sig_extension: resolved.sig_extension,
        check_sequence: resolved.check_sequence,
        on_download_failure: if cli.abort_on_download_failure {
            DownloadFailurePolicy::Abort
        } else {
            DownloadFailurePolicy::Skip
        },
    };
    let app = App::new(downloader, resolved.factories, options);

    let console = ConsoleProgress::new(cli.verbose);
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &console,
    };
    let Some(report) = app.run(&accessions, sink)? else {
        return Ok(());
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => ConsoleProgress::print_report(&report),
    }
    Ok(())
}
