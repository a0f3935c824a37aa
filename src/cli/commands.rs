use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{parse_servers, resolve_config};
use crate::document::DocFormat;
use crate::generator::{inspect, DiskSink, Generator, GeneratorOptions, RunReport, Scan, WriteAction};

/// Command-line interface for gtg
#[derive(Parser)]
#[command(name = "gtg", version)]
#[command(about = "Generate HTTP transport code from annotated Rust service traits", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate transport code and the API document
    Generate(GenerateArgs),
    /// List annotated services and their routes without writing anything
    Inspect {
        /// Directory scanned for annotated traits
        #[arg(long = "in", default_value = "./src")]
        input: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Directory scanned for annotated traits
    #[arg(long = "in", default_value = "./src")]
    pub input: PathBuf,

    /// Directory receiving the API document (default: the input directory)
    #[arg(long)]
    pub swagger: Option<PathBuf>,

    /// Write the document as JSON
    #[arg(long, conflicts_with = "yaml", default_value_t = false)]
    pub json: bool,

    /// Write the document as YAML (the default)
    #[arg(long, default_value_t = false)]
    pub yaml: bool,

    /// Document title
    #[arg(long)]
    pub title: Option<String>,

    /// Document description
    #[arg(long)]
    pub desc: Option<String>,

    /// Document version
    #[arg(long)]
    pub version: Option<String>,

    /// Document servers as `url = description`, one per line
    #[arg(long)]
    pub servers: Option<String>,

    /// Configuration file (default: `gtg.toml` in the input directory or crate root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report what would change without writing files
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// Execute the parsed command
///
/// # Errors
///
/// Returns an error if the source tree cannot be read, the configuration is
/// invalid, or any service failed to generate.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => {
            let options = generator_options(&args)?;
            let mut sink = if args.dry_run {
                DiskSink::dry_run()
            } else {
                DiskSink::new()
            };
            let report = Generator::new(options).run(&mut sink)?;
            print_report(&report, args.dry_run);
            if !report.is_success() {
                anyhow::bail!("{} failure(s) during generation", report.failures.len());
            }
            Ok(())
        }
        Commands::Inspect { input } => {
            let scan = inspect(&input)?;
            print_scan(&scan, &input);
            if !scan.failures.is_empty() {
                anyhow::bail!("{} invalid service(s)", scan.failures.len());
            }
            Ok(())
        }
    }
}

/// Merge the configuration file and flags into generator options
///
/// Flags win over file values; `--servers` replaces the configured list.
pub fn generator_options(args: &GenerateArgs) -> anyhow::Result<GeneratorOptions> {
    let config = resolve_config(args.config.as_deref(), &args.input)?;
    let mut document = config.document.info()?;
    if let Some(title) = &args.title {
        document.title.clone_from(title);
    }
    if let Some(desc) = &args.desc {
        document.description.clone_from(desc);
    }
    if let Some(version) = &args.version {
        document.version.clone_from(version);
    }
    if let Some(servers) = &args.servers {
        document.servers = parse_servers(servers).context("Invalid --servers")?;
    }

    let format = if args.json {
        DocFormat::Json
    } else if args.yaml {
        DocFormat::Yaml
    } else {
        config.document.doc_format()?.unwrap_or_default()
    };

    let mut options = GeneratorOptions::new(&args.input);
    options.document_dir = args.swagger.clone().or(config.document.output);
    options.format = format;
    options.document = document;
    Ok(options)
}

fn print_report(report: &RunReport, dry_run: bool) {
    let verb = if dry_run { "would write" } else { "wrote" };
    for file in report.files.iter().filter(|f| f.action.writes()) {
        println!("{verb} {}", file.path.display());
    }
    for skip in &report.skipped {
        println!(
            "skipped {} ({}: file is not generated)",
            skip.path.display(),
            skip.service
        );
    }
    if let Some(doc) = report.document.as_ref().filter(|d| d.action.writes()) {
        println!("{verb} {}", doc.path.display());
    }
    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    println!(
        "{} service(s), {} file(s) {verb}, {} unchanged, {} skipped, {} failure(s)",
        report.services.len(),
        report.count(WriteAction::Create) + report.count(WriteAction::Overwrite),
        report.count(WriteAction::Unchanged),
        report.skipped.len(),
        report.failures.len()
    );
}

fn print_scan(scan: &Scan, input: &Path) {
    if scan.services.is_empty() && scan.failures.is_empty() {
        println!("no annotated services below {}", input.display());
    }
    for spec in &scan.services {
        let kinds: Vec<&str> = spec.processors.iter().map(|k| k.as_str()).collect();
        println!("{} ({})", spec.interface_name, spec.source_path.display());
        println!("  processors: {}", kinds.join(" "));
        println!("  output: {}", spec.output_dir().display());
        for method in &spec.methods {
            println!("  {:<28} {}", method.route(), method.name);
        }
    }
    for path in &scan.unparsed {
        eprintln!("warning: could not parse {}", path.display());
    }
    for failure in &scan.failures {
        eprintln!("error: {failure}");
    }
}
