use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// Import from blockcheck-core
use blockcheck_core::{
    Block, CheckConfig, ConfigError, DocumentChecker, LabelledDocument, ReportFormat, Selector,
};

/// Report has error-severity issues
const EXIT_ISSUES: u8 = 1;
/// Config, selector or processing failure
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "blockcheck")]
#[command(about = "Classify document blocks with declarative rules and check their content")]
struct Args {
    /// Document to check (.xhtml/.html or a .json block dump)
    #[arg(short, long)]
    input: PathBuf,

    /// Check config (YAML). Without one, blocks are loaded but nothing is classified.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report format: json or markdown
    #[arg(short = 'f', long, default_value = "markdown")]
    format: String,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run a selector against the labelled document and print the matches instead of a report
    #[arg(short, long)]
    query: Option<String>,

    /// With --query, print only the number of matches
    #[arg(long, requires = "query")]
    count: bool,

    /// Write the labelled blocks as a JSON block dump
    #[arg(long)]
    dump_blocks: Option<PathBuf>,

    /// Print the classifier evaluation order and exit
    #[arg(long)]
    show_order: bool,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over -v when set
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                eprintln!("❌ Invalid configuration: {config_error}");
            } else {
                eprintln!("❌ {e:#}");
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    let config = match &args.config {
        Some(path) => {
            let config = CheckConfig::load_from_file(path)?;
            tracing::info!("📋 Loaded config from: {}", path.display());
            config
        }
        None => {
            tracing::info!("📋 No config given, using an empty rule set");
            CheckConfig::default()
        }
    };
    let format = ReportFormat::parse(&args.format)?;
    let checker = DocumentChecker::new(&config)?;

    if args.show_order {
        for (position, class_name) in checker.classifier().evaluation_order().iter().enumerate() {
            println!("{position:>3}  {class_name}");
        }
        return Ok(0);
    }

    if let Some(query) = &args.query {
        // parse before loading so a typo fails fast
        let selector = Selector::parse(query).context("invalid --query selector")?;
        let doc = checker.label(checker.load_file(&args.input)?);
        dump_blocks_if_requested(args, &doc)?;
        print_matches(&selector.evaluate(&doc), args.count);
        return Ok(0);
    }

    let outcome = checker.check_file(&args.input, args.profile)?;
    dump_blocks_if_requested(args, &outcome.document)?;

    let report = &outcome.report;
    match &args.output {
        Some(path) => {
            report.save_with_format(path, format)?;
            eprintln!("💾 Report saved to: {}", path.display());
        }
        None => println!("{}", report.render(format)?),
    }

    eprintln!(
        "📊 {} blocks, {} issues in {}",
        report.block_count,
        report.issues.len(),
        file_name(&args.input)
    );
    Ok(if report.has_errors() { EXIT_ISSUES } else { 0 })
}

fn dump_blocks_if_requested(args: &Args, doc: &LabelledDocument) -> Result<()> {
    if let Some(path) = &args.dump_blocks {
        let json = serde_json::to_string_pretty(doc.blocks())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write block dump {}", path.display()))?;
        eprintln!("💾 {} labelled blocks saved to: {}", doc.len(), path.display());
    }
    Ok(())
}

fn print_matches(blocks: &[&Block], count_only: bool) {
    if count_only {
        println!("{}", blocks.len());
        return;
    }
    if blocks.is_empty() {
        eprintln!("No matching blocks");
        return;
    }
    for block in blocks {
        let classes: Vec<&str> = block.classes().iter().map(String::as_str).collect();
        println!(
            "[{}] {} {{{}}} {}",
            block.index(),
            block.kind(),
            classes.join(", "),
            block.preview(80)
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string()
}
