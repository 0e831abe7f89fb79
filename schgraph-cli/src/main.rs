//! schgraph CLI - schematic connectivity and ERC from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use schgraph::{CheckResult, ErcEngine, ErcOptions, GraphCore, GraphOptions, Severity, TieBreak};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schgraph")]
#[command(about = "Hierarchical schematic connectivity and ERC tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Build sheet instances on a single thread
    #[arg(long, global = true)]
    serial: bool,

    /// Tie-break between equally strong net name drivers
    #[arg(long, value_enum, global = true, default_value = "uuid")]
    tie_break: TieBreakArg,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the nets of a schematic
    Nets {
        /// Path to a JSON schematic
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Run electrical rules checks
    Check {
        /// Path to a JSON schematic
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if issues found at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        /// Only run these rules (repeatable)
        #[arg(long = "rule", value_name = "ID")]
        rules: Vec<String>,

        /// Report pins of reused sub-sheets once per instance
        #[arg(long)]
        no_dedupe: bool,
    },

    /// Print recalculation statistics
    Stats {
        /// Path to a JSON schematic
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List available ERC rules
    Rules,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakArg {
    Uuid,
    Creation,
    Alphabetical,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Uuid => TieBreak::Uuid,
            TieBreakArg::Creation => TieBreak::CreationOrder,
            TieBreakArg::Alphabetical => TieBreak::Alphabetical,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(format!("schgraph={}", default_level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = GraphOptions {
        parallel: !cli.serial,
        tie_break: cli.tie_break.into(),
        ..Default::default()
    };

    let result = match cli.command {
        Commands::Nets { file, format } => handle_nets(&file, options, format),
        Commands::Check {
            file,
            format,
            fail_on,
            rules,
            no_dedupe,
        } => {
            let erc = ErcOptions {
                rules,
                dedupe_pins: !no_dedupe,
            };
            handle_check(&file, options, &erc, format, fail_on)
        }
        Commands::Stats { file } => handle_stats(&file, options),
        Commands::Rules => {
            handle_rules();
            Ok(0)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn handle_nets(file: &Path, options: GraphOptions, format: OutputFormat) -> anyhow::Result<i32> {
    let schematic =
        GraphCore::load(file).with_context(|| format!("failed to load {}", file.display()))?;
    let graph = GraphCore::build(&schematic, options)?;
    tracing::debug!(
        file = %file.display(),
        nets = graph.stats().nets,
        buses = graph.stats().buses,
        "graph built"
    );

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "nets": graph.nets(),
                "buses": graph.buses(),
                "netlist": graph.netlist(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human | OutputFormat::Github => {
            println!("\nFile: {}", file.display());
            println!("{}", "─".repeat(60));
            for net in graph.netlist() {
                let nodes: Vec<String> = net
                    .nodes
                    .iter()
                    .map(|n| format!("{}-{}", n.reference, n.pin))
                    .collect();
                println!("  {:>4}  {:<24} {}", net.code, net.name, nodes.join(" "));
            }
            for bus in graph.buses() {
                println!("  bus   {:<24} [{}]", bus.name, bus.members.join(" "));
            }
        }
    }
    Ok(0)
}

fn handle_check(
    file: &Path,
    options: GraphOptions,
    erc: &ErcOptions,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> anyhow::Result<i32> {
    let result = GraphCore::check_file(file, options, erc)
        .with_context(|| format!("failed to check {}", file.display()))?;

    match format {
        OutputFormat::Human => output_human(&result),
        OutputFormat::Json => output_json(&result)?,
        OutputFormat::Github => output_github(&result),
    }

    if let Some(severity) = fail_on {
        if should_fail(&result, &severity) {
            return Ok(1);
        }
    }
    Ok(0)
}

fn should_fail(result: &CheckResult, severity: &FailOnSeverity) -> bool {
    match severity {
        FailOnSeverity::Error => result.has_errors(),
        FailOnSeverity::Warning => result.has_warnings_or_errors(),
    }
}

fn output_human(result: &CheckResult) {
    if let Some(file) = &result.file {
        println!("\nFile: {}", file.display());
    }
    println!("{}", "─".repeat(60));

    if result.total_issues() == 0 {
        println!("  No issues found");
        return;
    }

    for (severity, title) in [
        (Severity::Error, "ERRORS"),
        (Severity::Warning, "WARNINGS"),
        (Severity::Info, "INFO"),
    ] {
        let matching: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect();
        if matching.is_empty() {
            continue;
        }
        println!("\n  {}:", title);
        for issue in matching {
            println!("    - [{}] {}", issue.rule_id, issue.message);
            println!("      Sheet: {}", issue.sheet);
            if let Some(ref net) = issue.net {
                println!("      Net: {}", net);
            }
        }
    }

    println!("\n  Summary:");
    println!("    Errors:   {}", result.stats.errors);
    println!("    Warnings: {}", result.stats.warnings);
    println!("    Info:     {}", result.stats.info);
}

fn output_json(result: &CheckResult) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "file": result.file.as_ref().map(|f| f.display().to_string()),
        "issues": result.issues,
        "stats": result.stats,
        "graph": result.graph,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_github(result: &CheckResult) {
    let file = result
        .file
        .as_ref()
        .map(|f| f.display().to_string())
        .unwrap_or_default();
    for issue in &result.issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "notice",
        };
        println!("::{} file={}::{}", level, file, issue.message.replace('\n', " "));
    }
}

fn handle_stats(file: &Path, options: GraphOptions) -> anyhow::Result<i32> {
    let schematic =
        GraphCore::load(file).with_context(|| format!("failed to load {}", file.display()))?;
    let graph = GraphCore::build(&schematic, options)?;
    let stats = graph.stats();

    println!("Sheet instances:    {}", stats.instances);
    println!("Items:              {}", stats.items);
    println!("Subgraphs:          {}", stats.subgraphs);
    println!("Nets:               {}", stats.nets);
    println!("Buses:              {}", stats.buses);
    println!("Conditions:         {}", stats.conditions);
    println!(
        "Propagation passes: {}{}",
        stats.propagation_passes,
        if stats.converged { "" } else { " (not converged)" }
    );
    println!("Elapsed:            {} ms", stats.elapsed_ms);
    Ok(0)
}

fn handle_rules() {
    println!("Available ERC rules:\n");

    let rules = [
        (
            "graph_conditions",
            "Driver conflicts, bus width mismatches, unconnected sheet pins",
        ),
        ("unconnected_pin", "Symbol pins with nothing attached"),
        ("dangling_label", "Labels not attached to any wire or pin"),
        (
            "noconnect_connected",
            "No-connect markers on nets joining several pins",
        ),
    ];
    let enabled = ErcEngine::with_default_rules();
    for (id, description) in rules {
        let marker = if enabled.rule_ids().contains(&id) { "*" } else { " " };
        println!("  {} {:<22} {}", marker, id, description);
    }
}
