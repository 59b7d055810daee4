use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::LevelFilter;

use plumb::consts::{DEFAULT_CALL_COST, DEFAULT_OBJDUMP};
use plumb::{analyze_files, AnalysisConfig, FileWriter, Report};

/// Estimate worst-case stack usage from compiled object files
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Object files to analyze (compiled with -fstack-usage)
    #[clap(required = true)]
    objects: Vec<PathBuf>,
    /// Disassembler executable used to read call sites
    #[clap(long, default_value = DEFAULT_OBJDUMP)]
    objdump: String,
    /// Bytes charged to every call on top of the compiler-reported frame
    #[clap(long, default_value_t = DEFAULT_CALL_COST)]
    call_cost: u64,
    /// Don't warn when a bare symbol name matches several definitions
    #[clap(long)]
    no_ambiguity_warnings: bool,
    /// Restrict analysis to the given function names (repeatable)
    #[clap(long, value_name = "NAME")]
    only: Vec<String>,
    /// Write report.json and manifest.json to this directory
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Enable verbose logging (use multiple times for more verbosity)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let mut builder = Builder::new();
    let log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    builder
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(args) {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let config = AnalysisConfig {
        objdump: args.objdump,
        call_cost: args.call_cost,
        log_ambiguous: !args.no_ambiguity_warnings,
        allowlist: if args.only.is_empty() {
            None
        } else {
            Some(args.only.iter().cloned().collect())
        },
    };

    let result = analyze_files(&args.objects, &config).context("stack analysis failed")?;
    let report = Report::from_result(&result);
    report.print();

    if let Some(dir) = &args.output {
        FileWriter::new()
            .write_results(&report, &result, dir)
            .with_context(|| format!("writing results to {}", dir.display()))?;
        println!("\n{}", "Results written to:".bright_green().bold());
        println!("- {}", dir.join("report.json").display());
        println!("- {}", dir.join("manifest.json").display());
    }

    log::info!(
        "analyzed {} object files in {:.2?}",
        args.objects.len(),
        start_time.elapsed()
    );

    Ok(())
}
