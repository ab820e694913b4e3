//! SAM translator CLI
//!
//! Command-line interface for translating SAM templates into CloudFormation.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use sam_translator_common::{OptionsFile, Partition, Template, TransformError, TransformOptions};
use sam_translator_parser::TemplateLoader;
use sam_translator_transform::Translator;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sam-translator")]
#[command(version, about = "Translate AWS SAM templates into CloudFormation", long_about = None)]
#[command(after_help = "EXAMPLES:\n  \
    # Print the translated template\n  \
    sam-translator --template-file template.yaml\n\n  \
    # Write it to a file for a GovCloud stack\n  \
    sam-translator -t template.yaml -o cfn.json \\\n    \
    --region us-gov-west-1 --account-id 111122223333\n\n  \
    # Read defaults from an options file\n  \
    sam-translator -t template.yaml --config options.yaml")]
struct Cli {
    /// Path to the SAM template (JSON or YAML)
    #[arg(short, long)]
    template_file: PathBuf,

    /// Where to write the CloudFormation template ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output_template: String,

    /// Region the stack is deployed to
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Account owning the stack
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Stack name
    #[arg(long)]
    stack_name: Option<String>,

    /// Partition (derived from the region if not specified)
    #[arg(long)]
    partition: Option<PartitionArg>,

    /// YAML options file providing defaults for the flags above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Copy resource Metadata onto generated resources
    #[arg(long)]
    pass_through_metadata: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PartitionArg {
    Aws,
    AwsCn,
    AwsUsGov,
}

impl From<PartitionArg> for Partition {
    fn from(arg: PartitionArg) -> Self {
        match arg {
            PartitionArg::Aws => Partition::Aws,
            PartitionArg::AwsCn => Partition::AwsCn,
            PartitionArg::AwsUsGov => Partition::AwsUsGov,
        }
    }
}

impl std::fmt::Display for PartitionArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Partition::from(*self))
    }
}

/// Why a run failed, mapped onto the process exit code
enum Failure {
    /// Bad input paths or options (exit 2)
    Invocation(anyhow::Error),
    /// The template could not be loaded or transformed (exit 1)
    Transform(TransformError),
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Failure::Invocation(_) => ExitCode::from(2),
            Failure::Transform(_) => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    // clap exits with status 2 on bad flags
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            report(&failure);
            failure.exit_code()
        }
    }
}

/// Logs go to stderr: warn by default, debug with --verbose, RUST_LOG wins.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> std::result::Result<(), Failure> {
    let options = resolve_options(cli).map_err(Failure::Invocation)?;
    debug!(
        region = %options.region,
        partition = %options.partition,
        stack = %options.stack_name,
        "resolved options"
    );

    let content = fs::read_to_string(&cli.template_file)
        .with_context(|| format!("Failed to read template file: {:?}", cli.template_file))
        .map_err(Failure::Invocation)?;

    status(cli, &format!("Translating {}", cli.template_file.display()));
    let template = TemplateLoader::from_str(&content).map_err(Failure::Transform)?;
    let translated = Translator::new(options)
        .and_then(|translator| translator.transform(template))
        .map_err(Failure::Transform)?;

    write_template(&translated, &cli.output_template).map_err(Failure::Invocation)?;

    if cli.output_template != "-" {
        eprintln!(
            "{}",
            format!(
                "✓ Wrote {} resources to {}",
                translated.resources.len(),
                cli.output_template
            )
            .green()
            .bold()
        );
    }
    Ok(())
}

/// Flags (and their environment variables) take precedence over the
/// options file, which takes precedence over the defaults.
fn resolve_options(cli: &Cli) -> Result<TransformOptions> {
    let mut file = match &cli.config {
        Some(path) => OptionsFile::load(path)
            .with_context(|| format!("Failed to load options file: {:?}", path))?,
        None => OptionsFile::default(),
    };

    if let Some(region) = &cli.region {
        file.region = Some(region.clone());
    }
    if let Some(account_id) = &cli.account_id {
        file.account_id = Some(account_id.clone());
    }
    if let Some(stack_name) = &cli.stack_name {
        file.stack_name = Some(stack_name.clone());
    }
    if let Some(partition) = cli.partition {
        file.partition = Some(partition.into());
    }
    if cli.pass_through_metadata {
        file.pass_through_metadata = Some(true);
    }
    Ok(file.into_options())
}

fn write_template(template: &Template, destination: &str) -> Result<()> {
    let json =
        serde_json::to_string_pretty(template).context("Failed to serialize the template")?;

    if destination == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", json).context("Failed to write to stdout")?;
    } else {
        fs::write(destination, format!("{}\n", json))
            .with_context(|| format!("Failed to write output template: {}", destination))?;
    }
    Ok(())
}

/// Progress line on stderr; stdout may be carrying the template.
fn status(cli: &Cli, message: &str) {
    if cli.verbose {
        eprintln!("{} {}", "→".cyan(), message);
    }
}

fn report(failure: &Failure) {
    match failure {
        Failure::Invocation(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
        }
        Failure::Transform(TransformError::Conversion(errors)) => {
            eprintln!(
                "{}",
                format!("✗ Transformation failed in {} resource(s)", errors.len())
                    .red()
                    .bold()
            );
            for (logical_id, error) in errors.iter() {
                eprintln!("  {} {}", logical_id.yellow().bold(), error);
            }
        }
        Failure::Transform(err) => {
            eprintln!("{} {}", "✗ Transformation failed:".red().bold(), err);
        }
    }
}
