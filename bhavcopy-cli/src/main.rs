//! bhavcopy CLI: download, load and inspect NSE bhav copies.
//!
//! Commands:
//! - `download`: fetch daily bhav copies and write canonical CSV files
//! - `load`: upsert downloaded CSV files into the DuckDB store
//! - `symbols`: list stored symbols
//! - `history`: print one symbol's stored sessions

mod logging;

use anyhow::{bail, Context, Result};
use bhavcopy_core::{
    parse_date, BhavFetcher, CanonicalRecord, DateSelection, ReqwestSource, SchemaResolver,
    EXCHANGE_START_DATE,
};
use bhavcopy_runner::config::AppConfig;
use bhavcopy_runner::plan::{effective_merge, large_range_notice};
use bhavcopy_runner::{
    discover_files, load_files, write_unit, BatchOptions, BatchOrchestrator, BatchProgress,
    BatchSummary, LoadProgress, LoadSummary, SilentProgress, StdoutProgress,
};
use bhavcopy_store::BhavStore;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "bhavcopy", about = "NSE daily bhav copy downloader and loader")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download bhav copies and save them as canonical CSV.
    Download(DownloadArgs),
    /// Load downloaded CSV files into the store.
    Load(LoadArgs),
    /// List distinct symbols in the store.
    Symbols {
        /// Only symbols traded in this series (e.g. EQ).
        #[arg(long)]
        series: Option<String>,

        /// Database path. Overrides BHAVCOPY_DB and the config file.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print stored sessions for one symbol.
    History {
        symbol: String,

        #[arg(long, default_value = "EQ")]
        series: String,

        /// First date, inclusive.
        #[arg(long)]
        from: Option<String>,

        /// Last date, inclusive.
        #[arg(long)]
        to: Option<String>,

        /// Database path. Overrides BHAVCOPY_DB and the config file.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print rows as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["today", "yesterday", "days", "date", "from", "all"])
))]
struct DownloadArgs {
    /// Today's session (published after market close).
    #[arg(long)]
    today: bool,

    /// The previous calendar day.
    #[arg(long)]
    yesterday: bool,

    /// The last N weekdays up to today.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// One date (YYYY-MM-DD, DD-MM-YYYY or DD/MM/YYYY).
    #[arg(long)]
    date: Option<String>,

    /// Start of a date range.
    #[arg(long)]
    from: Option<String>,

    /// End of the range. Defaults to today.
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Every weekday since the exchange opened. Requires --yes.
    #[arg(long)]
    all: bool,

    /// Confirm a full-history download.
    #[arg(long, requires = "all")]
    yes: bool,

    /// Keep only this series (case-insensitive), e.g. EQ.
    #[arg(long)]
    series: Option<String>,

    /// Write one merged file instead of one file per date.
    #[arg(long, default_value_t = false)]
    merge: bool,

    /// Output directory. Defaults to the config's output.dir.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Only warnings and the summary.
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Print the summary as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct LoadArgs {
    /// Directory holding bhav_*.csv files. Defaults to the config's output.dir.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Database path. Overrides BHAVCOPY_DB and the config file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Only files starting on or after this date.
    #[arg(long)]
    since: Option<String>,

    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Print the load summary as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = match &cli.command {
        Commands::Download(args) => args.quiet,
        Commands::Load(args) => args.quiet,
        _ => false,
    };
    logging::init(quiet);

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Download(args) => run_download(&config, args),
        Commands::Load(args) => run_load(&config, args),
        Commands::Symbols { series, db } => run_symbols(&config, series, db),
        Commands::History {
            symbol,
            series,
            from,
            to,
            db,
            json,
        } => run_history(&config, &symbol, &series, from, to, db, json),
    }
}

fn parse_optional(input: Option<&str>) -> Result<Option<NaiveDate>> {
    Ok(input.map(parse_date).transpose()?)
}

fn selection_from(args: &DownloadArgs) -> Result<DateSelection> {
    if args.today {
        return Ok(DateSelection::Today);
    }
    if args.yesterday {
        return Ok(DateSelection::Yesterday);
    }
    if let Some(n) = args.days {
        return Ok(DateSelection::LastDays(n));
    }
    if let Some(date) = args.date.as_deref() {
        return Ok(DateSelection::Single(parse_date(date)?));
    }
    if let Some(from) = args.from.as_deref() {
        return Ok(DateSelection::Range {
            from: parse_date(from)?,
            to: parse_optional(args.to.as_deref())?,
        });
    }
    if args.all {
        if !args.yes {
            bail!(
                "--all downloads every weekday since {EXCHANGE_START_DATE}; pass --yes to confirm"
            );
        }
        return Ok(DateSelection::All);
    }
    bail!("choose one of --today, --yesterday, --days, --date, --from or --all")
}

fn run_download(config: &AppConfig, args: DownloadArgs) -> Result<()> {
    let selection = selection_from(&args)?;
    let today = chrono::Local::now().date_naive();
    let dates = selection.resolve(today)?;
    let merge = effective_merge(args.merge, dates.len());
    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir());
    let chatty = !args.quiet && !args.json;

    if chatty {
        println!("Mode       : {}", selection.describe(today));
        println!("Dates      : {}", dates.len());
        println!("Series     : {}", args.series.as_deref().unwrap_or("all"));
        println!("Merge      : {merge}");
        println!("Output dir : {}", output_dir.display());
        if let Some(notice) = large_range_notice(dates.len()) {
            println!("\n{notice}");
        }
        println!();
    }

    let source = ReqwestSource::new(&config.source)?;
    let fetcher = BhavFetcher::new(source, SchemaResolver::from_config(&config.source));
    let progress: &dyn BatchProgress = if chatty { &StdoutProgress } else { &SilentProgress };
    let options = BatchOptions {
        series_filter: args.series.clone(),
        merge,
        require_published: selection.is_today().then_some(today),
    };

    let result = BatchOrchestrator::new(&fetcher, progress).run(&dates, &options)?;

    let mut outputs = Vec::with_capacity(result.units.len());
    for unit in &result.units {
        let path = write_unit(&output_dir, unit)
            .with_context(|| format!("writing output to {}", output_dir.display()))?;
        outputs.push(path);
    }

    let summary = BatchSummary::from_result(&result, outputs);
    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("\n{}", summary.render_text());
    }
    if merge && summary.outputs.is_empty() {
        bail!("No data downloaded, nothing to save.");
    }
    Ok(())
}

fn run_load(config: &AppConfig, args: LoadArgs) -> Result<()> {
    let input_dir = args.input_dir.clone().unwrap_or_else(|| config.output_dir());
    if !input_dir.is_dir() {
        bail!("input directory does not exist: {}", input_dir.display());
    }
    let since = parse_optional(args.since.as_deref())?;

    let discovery = discover_files(&input_dir, since)?;
    for file in &discovery.spanning {
        warn!(
            file = %file.name(),
            "merged file starts before --since and was skipped; rerun with --since {} to include it",
            file.start
        );
    }
    if discovery.files.is_empty() {
        println!("No bhav_*.csv files to load in {}", input_dir.display());
        return Ok(());
    }

    let db_path = config.store_path(args.db.as_deref());
    let store = BhavStore::open(&db_path)
        .with_context(|| format!("opening store {}", db_path.display()))?
        .with_load_timeout(config.load_timeout());

    let chatty = !args.quiet && !args.json;
    if chatty {
        println!(
            "Loading {} file(s) from {} into {}",
            discovery.files.len(),
            input_dir.display(),
            db_path.display()
        );
    }
    let progress: &dyn LoadProgress = if chatty { &StdoutProgress } else { &SilentProgress };
    let summary = load_files(&store, &discovery.files, progress);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_load_summary(&summary);
    }

    if summary.failed() > 0 {
        bail!(
            "{} file(s) failed to load; first error: {}",
            summary.failed(),
            summary.first_error().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn print_load_summary(summary: &LoadSummary) {
    println!();
    println!("Files processed     : {}", summary.processed());
    println!("Total rows          : {}", summary.total_rows());
    println!("Upserted            : {}", summary.upserted());
    println!("Skipped with errors : {}", summary.failed());
    if let Some(e) = summary.first_error() {
        println!("First error         : {e}");
    }
}

fn open_store(config: &AppConfig, db: Option<PathBuf>) -> Result<BhavStore> {
    let path = config.store_path(db.as_deref());
    if !path.exists() {
        bail!("store not found: {} (run `bhavcopy load` first)", path.display());
    }
    BhavStore::open(&path).with_context(|| format!("opening store {}", path.display()))
}

fn run_symbols(config: &AppConfig, series: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let store = open_store(config, db)?;
    let symbols = store.symbols(series.as_deref())?;
    for symbol in &symbols {
        println!("{symbol}");
    }
    eprintln!("{} symbol(s)", symbols.len());
    Ok(())
}

fn run_history(
    config: &AppConfig,
    symbol: &str,
    series: &str,
    from: Option<String>,
    to: Option<String>,
    db: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let from = parse_optional(from.as_deref())?;
    let to = parse_optional(to.as_deref())?;
    let store = open_store(config, db)?;
    let rows = store.history(symbol, series, from, to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No rows for {} {}", symbol.trim().to_uppercase(), series.trim().to_uppercase());
        return Ok(());
    }

    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>14}",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    println!("{}", "-".repeat(69));
    for r in &rows {
        print_row(r);
    }
    Ok(())
}

fn print_row(r: &CanonicalRecord) {
    fn price(v: Option<f64>) -> String {
        v.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"))
    }
    let volume = r.volume.map_or_else(|| "-".to_string(), |v| v.to_string());
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>14}",
        r.trading_date,
        price(r.open),
        price(r.high),
        price(r.low),
        price(r.close),
        volume
    );
}
