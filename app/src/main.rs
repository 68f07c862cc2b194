//! ABOUTME: capcheck: parse, validate and re-emit CAP alert files
//! ABOUTME: Exit status 0 when clean, 1 on ERROR findings, 2 on unreadable or non-CAP input

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cap_alert::{CapJsonBuilder, CapXmlBuilder, CapXmlParser, Level, Reasons};
use cap_config::{Config, OutputFormat};
use cap_core::telemetry;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "capcheck", version, about = "Check and convert CAP alert documents")]
struct Cli {
    /// CAP XML files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// What to print for each file
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Spaces per nesting level for xml/json output; 0 for compact
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=16))]
    indent: Option<u32>,

    /// Check against the published schema only
    #[arg(long)]
    strict_schema: bool,

    /// Re-emit alerts even when they have ERROR findings
    #[arg(long)]
    no_validate: bool,

    /// Lowest finding level to print (info, recommendation, warning, error)
    #[arg(long)]
    min_level: Option<String>,

    /// Configuration file (defaults to ./capkit.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Xml,
    Json,
    Reasons,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Xml => OutputFormat::Xml,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Reasons => OutputFormat::Reasons,
        }
    }
}

/// Per-file result; the worst one across all files decides the exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Clean,
    Invalid,
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Clean => ExitCode::SUCCESS,
            Outcome::Invalid => ExitCode::from(1),
            Outcome::Failed => ExitCode::from(2),
        }
    }
}

struct Options {
    format: OutputFormat,
    indent: usize,
    min_level: Level,
    validate: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("capcheck: {}", e);
            return Outcome::Failed.into();
        }
    };
    apply_overrides(&cli, &mut config);

    telemetry::init_tracing(&config.telemetry.env, "capcheck");
    tracing::debug!(?config, "Configuration loaded");

    let Some(min_level) = Level::parse(&config.output.min_level) else {
        eprintln!("capcheck: unknown level {:?}", config.output.min_level);
        return Outcome::Failed.into();
    };
    let options = Options {
        format: config.output.format,
        indent: config.output.indent.unwrap_or(0) as usize,
        min_level,
        validate: config.parser.validate,
    };

    // Findings are escalated here, per file, so the parser always returns them
    let parser = CapXmlParser::new(false).with_strict_schema(config.parser.strict_schema);

    let outcome = cli
        .files
        .iter()
        .map(|path| check_file(&parser, path, &options))
        .max()
        .unwrap_or(Outcome::Clean);
    tracing::info!(files = cli.files.len(), outcome = ?outcome, "capcheck finished");
    outcome.into()
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    if let Some(indent) = cli.indent {
        config.output.indent = Some(indent);
    }
    if cli.strict_schema {
        config.parser.strict_schema = true;
    }
    if cli.no_validate {
        config.parser.validate = false;
    }
    if let Some(min_level) = &cli.min_level {
        config.output.min_level = min_level.clone();
    }
}

fn check_file(parser: &CapXmlParser, path: &Path, options: &Options) -> Outcome {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            return Outcome::Failed;
        }
    };

    let mut reasons = Reasons::new();
    let alert = match parser.parse_from_with_reasons(BufReader::new(file), &mut reasons) {
        Ok(alert) => alert,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Rejected document");
            eprintln!("{}: {}", path.display(), e);
            return Outcome::Failed;
        }
    };

    print_reasons(path, &reasons, options);

    let has_errors = reasons.contains_with_level_or_higher(Level::Error);
    let rendered = match options.format {
        OutputFormat::Reasons => None,
        _ if has_errors && options.validate => {
            tracing::warn!(path = %path.display(), "Not re-emitting alert with ERROR findings");
            None
        }
        OutputFormat::Xml => Some(CapXmlBuilder::new().with_indent(options.indent).to_xml(&alert)),
        OutputFormat::Json => Some(CapJsonBuilder::new().with_indent(options.indent).to_json(&alert)),
    };
    match rendered {
        Some(Ok(text)) => println!("{}", text),
        Some(Err(e)) => {
            eprintln!("{}: {}", path.display(), e);
            return Outcome::Failed;
        }
        None => {}
    }

    if has_errors {
        Outcome::Invalid
    } else {
        Outcome::Clean
    }
}

/// Findings go to stdout in reasons mode and to stderr when stdout carries the alert
fn print_reasons(path: &Path, reasons: &Reasons, options: &Options) {
    for reason in reasons.get_with_level_or_higher(options.min_level) {
        let line = format!(
            "{}: {} {} {}",
            path.display(),
            reason.level(),
            reason.code(),
            reason
        );
        if options.format == OutputFormat::Reasons {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }
}
