#![forbid(unsafe_code)]

use chrono::NaiveDate;
use error_iter::ErrorIter as _;
use fifotax::engine::{Engine, EngineConfig};
use fifotax::imports::bitcointrade::read_statement;
use fifotax::model::events::group_events;
use fifotax::model::reports::{
    CashSaleReport, FullReport, ReconciliationReport, ReportWindow, SwapReport,
};
use fifotax::model::results::ProcessedLedger;
use fifotax::model::Stats;
use is_terminal::IsTerminal as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::{env, process::ExitCode};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

const DEFAULT_SWAP_WINDOW_START: &str = "2022-01-01";
const DEFAULT_SWAP_WINDOW_END: &str = "2025-12-31";

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - RUST_LOG configures log filtering, e.g. `RUST_LOG=debug`"]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read an exchange statement CSV from a file.
    #[long]
    input_statement: Vec<PathBuf>,

    /// Write report CSVs to this output directory.
    #[short('o')]
    report_path: Option<PathBuf>,

    /// Report CSVs written to an output directory will be given
    ///   this prefix.
    #[short('p')]
    #[default("")]
    report_prefix: String,

    /// First day of the swap reporting window (YYYY-MM-DD).
    ///   Default is "2022-01-01".
    #[long]
    swap_window_start: Option<String>,

    /// Last day of the swap reporting window (YYYY-MM-DD).
    ///   Default is "2025-12-31".
    #[long]
    swap_window_end: Option<String>,

    /// Holding period in days beyond which realized gains are exempt.
    #[default(365)]
    exemption_days: u16,

    /// Skip the cash-sale report.
    skip_sales: bool,

    /// Skip the swap report.
    skip_swaps: bool,

    /// Skip the custodial-reconciliation report.
    skip_reconciliation: bool,

    /// Skip the consolidated full report.
    skip_full: bool,

    /// Enable verbose output.
    /// Prints secondary report CSVs to stdout when not written to a file.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to import {0:?}")]
    Import(PathBuf, #[source] fifotax::errors::StatementError),

    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error")]
    Date(#[from] chrono::ParseError),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    // This is very useful to see the input CSV row that caused a panic.
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    let mut stats = Stats::default();
    let mut events = Vec::new();
    for input_statement in args.input_statement {
        events.extend(
            read_statement(&mut stats, &input_statement)
                .map_err(|e| Error::Import(input_statement, e))?,
        );
    }

    let groups = group_events(events);
    debug!("Processing {count} transaction groups", count = groups.len());

    let config = EngineConfig {
        exemption_days: i64::from(args.exemption_days),
    };
    let ledger = Engine::new(config).process(&groups);

    let window = ReportWindow {
        from: parse_window_date(args.swap_window_start.as_deref(), DEFAULT_SWAP_WINDOW_START)?,
        until: parse_window_date(args.swap_window_end.as_deref(), DEFAULT_SWAP_WINDOW_END)?,
    };

    let report_path = args.report_path.as_deref();
    let prefix = args.report_prefix.as_str();

    if !args.skip_sales {
        let sales = CashSaleReport::new(&ledger);
        emit_report(&sales, "Cash Sale Report", "cash_sales.csv", report_path, prefix, true)?;
    }

    if !args.skip_swaps {
        let swaps = SwapReport::new(&ledger, window);
        emit_report(&swaps, "Swap Report", "swaps.csv", report_path, prefix, args.verbose)?;
    }

    if !args.skip_reconciliation {
        let reconciliation = ReconciliationReport::new(&ledger);
        emit_report(
            &reconciliation,
            "Custodial Reconciliation Report",
            "reconciliation.csv",
            report_path,
            prefix,
            args.verbose,
        )?;
    }

    if !args.skip_full {
        let full = FullReport::new(&ledger);
        emit_report(&full, "Full Report", "full_ledger.csv", report_path, prefix, args.verbose)?;
    }

    print_findings(&ledger);
    stats.pretty_print();

    Ok(())
}

fn parse_window_date(arg: Option<&str>, default: &str) -> Result<NaiveDate, chrono::ParseError> {
    arg.unwrap_or(default).parse()
}

/// Write a report CSV into the output directory, or print it to stdout when no
/// directory was given and `print_to_stdout` allows it.
fn emit_report<R: Display>(
    report: &R,
    title: &str,
    filename: &str,
    report_path: Option<&Path>,
    prefix: &str,
    print_to_stdout: bool,
) -> Result<(), Error> {
    if let Some(path) = report_path.map(|root| root.join(format!("{prefix}{filename}"))) {
        std::fs::write(&path, report.to_string())?;

        let written = format!("{title} written to {path}", path = path.display());
        println!("{written}");
        println!("{underline}", underline = underline(&written));
        println!();
    } else if print_to_stdout {
        println!("{title}");
        println!("{underline}", underline = underline(title));
        println!();
        println!("{report}");
        println!();
    }

    Ok(())
}

fn underline(text: &str) -> String {
    text.chars()
        .map(|c| if c == ' ' { ' ' } else { '=' })
        .collect()
}

/// Report any data-quality findings to the user. These never abort a run; they
/// are the checklist for reconciling against bank and exchange statements.
fn print_findings(ledger: &ProcessedLedger) {
    let title = "Data-Quality Findings";
    println!("{title}");
    println!("{underline}", underline = underline(title));
    println!();

    if ledger.findings.is_empty() {
        println!("No issues detected! 🎉");
    } else {
        for finding in &ledger.findings {
            println!("  ⚠️ {finding}");
        }
    }

    println!();
}
