//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::info;

use crate::adapters::command_log_adapter::FileCommandLog;
use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::event_store_adapter::FileEventStore;
use crate::adapters::file_config_adapter::{ConfigRateAdapter, FileConfigAdapter};
use crate::adapters::market_calendar_adapter::MarketCalendarAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backup::is_command_line;
use crate::domain::config_validation::validate_stalker_config;
use crate::domain::error::StalkerError;
use crate::domain::fetch_config::FetchConfig;
use crate::domain::market::{legal_values, MarketId};
use crate::domain::report::{ReportFilters, ReportPreCalculator};
use crate::domain::sref::SRef;
use crate::domain::stalker::StalkerEngine;
use crate::domain::threshold::{check_period, HoldingThresholdAnalyzer, DEFAULT_LOOKBACK};
use crate::ports::command_log_port::CommandLogPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stalker", about = "Command-sourced stock portfolio tracker")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply commands and append them to the command log
    Apply {
        #[arg(short, long)]
        config: PathBuf,
        /// Command lines, e.g. "Add-Portfolio PfName=Growth"
        commands: Vec<String>,
        /// Read further commands from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Replay the command log and print a summary
    Replay {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write the command log, optionally limited to some stocks
    Backup {
        #[arg(short, long)]
        config: PathBuf,
        /// Stock references (MARKET$SYMBOL), comma separated
        #[arg(long, value_delimiter = ',')]
        sref: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the command log with a backup after replaying it
    Restore {
        #[arg(short, long)]
        config: PathBuf,
        input: PathBuf,
    },
    /// Print the valuation report
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        portfolio: Option<String>,
        /// Markets to include, comma separated
        #[arg(long, value_delimiter = ',')]
        market: Vec<String>,
        /// Sector filter SECTOR:FIELD, repeatable
        #[arg(long)]
        sector: Vec<String>,
        #[arg(long)]
        owned_only: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scan holdings for cost threshold crossings
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        period: Option<usize>,
    },
    /// Inspect or prune stored events
    Events {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        action: EventsAction,
    },
    /// Validate a provider assignment file and show the result
    FetchConfig { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum EventsAction {
    /// List stored events
    List,
    /// Remove events dated before a day (YYYY-MM-DD)
    Prune {
        #[arg(long)]
        before: NaiveDate,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Apply {
            config,
            commands,
            file,
        } => run_apply(&config, commands, file.as_ref()),
        Command::Replay { config } => run_replay(&config),
        Command::Backup {
            config,
            sref,
            output,
        } => run_backup(&config, &sref, output.as_ref()),
        Command::Restore { config, input } => run_restore(&config, &input),
        Command::Report {
            config,
            portfolio,
            market,
            sector,
            owned_only,
            output,
        } => run_report(
            &config,
            portfolio,
            &market,
            &sector,
            owned_only,
            output.as_ref(),
        ),
        Command::Scan { config, period } => run_scan(&config, period),
        Command::Events { config, action } => run_events(&config, action),
        Command::FetchConfig { file } => run_fetch_config(&file),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StalkerError> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| StalkerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    validate_stalker_config(&adapter)?;
    Ok(adapter)
}

fn required_path(config: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, StalkerError> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| StalkerError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

/// Opens the command log and replays it.
pub fn open_engine(config: &dyn ConfigPort) -> Result<(FileCommandLog, StalkerEngine), StalkerError> {
    let log = FileCommandLog::new(required_path(config, "stalker", "command_log")?);
    let engine = StalkerEngine::replay(log.load()?)?;
    Ok((log, engine))
}

fn read_lines(path: &Path) -> Result<Vec<String>, StalkerError> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::to_string)
        .collect())
}

/// Writes to `path`, or stdout when absent.
fn with_output(
    path: Option<&PathBuf>,
    f: impl FnOnce(&mut dyn Write) -> Result<(), StalkerError>,
) -> Result<(), StalkerError> {
    match path {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            f(&mut file)
        }
        None => f(&mut std::io::stdout().lock()),
    }
}

fn run_apply(
    config_path: &Path,
    mut commands: Vec<String>,
    file: Option<&PathBuf>,
) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (mut log, mut engine) = open_engine(&config)?;
    if let Some(file) = file {
        commands.extend(read_lines(file)?);
    }
    let commands: Vec<&str> = commands
        .iter()
        .map(|c| c.trim())
        .filter(|c| is_command_line(c))
        .collect();

    // Nothing is logged unless every command applies.
    for command in &commands {
        if let Err(e) = engine.apply(command) {
            if let StalkerError::CmdParse(pe) = &e {
                eprintln!("{}", pe.display_with_context(command));
            }
            return Err(e);
        }
    }
    for command in &commands {
        log.append(command)?;
    }
    info!(commands = commands.len(), "applied");
    println!("Applied {} command(s)", commands.len());
    Ok(())
}

fn run_replay(config_path: &Path) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (_, engine) = open_engine(&config)?;
    let data = engine.snapshot();
    println!("Commands:   {}", engine.backup(None).len());
    println!("Portfolios: {}", data.portfolios.len());
    for pf in &data.portfolios {
        println!(
            "  {}: {} stock(s), {} holding(s), {} trade(s), {} order(s), {} dividend(s)",
            pf.name,
            pf.srefs.len(),
            pf.holdings.len(),
            pf.trades.len(),
            pf.orders.len(),
            pf.dividends.len()
        );
    }
    println!("Alarms:     {}", data.alarms.len());
    println!("Sectors:    {}", engine.sectors().len());
    Ok(())
}

fn parse_srefs(values: &[String]) -> Result<Vec<SRef>, StalkerError> {
    values.iter().map(|s| SRef::from_str(s.trim())).collect()
}

fn run_backup(
    config_path: &Path,
    srefs: &[String],
    output: Option<&PathBuf>,
) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (_, engine) = open_engine(&config)?;
    let srefs = parse_srefs(srefs)?;
    let lines = engine.backup((!srefs.is_empty()).then_some(srefs.as_slice()));
    with_output(output, |out| {
        for line in &lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    })?;
    eprintln!("Backed up {} command(s)", lines.len());
    Ok(())
}

fn run_restore(config_path: &Path, input: &Path) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (mut log, mut engine) = open_engine(&config)?;
    let lines = read_lines(input)?;
    let restored = engine.restore(&lines)?;
    log.replace(&engine.backup(None))?;
    println!("Restored {restored} command(s) from {}", input.display());
    Ok(())
}

fn parse_markets(values: &[String]) -> Result<Option<HashSet<MarketId>>, StalkerError> {
    let markets = values
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| {
            MarketId::from_str(m).map_err(|_| StalkerError::InvalidValue {
                field: "Market".into(),
                value: m.to_string(),
                reason: format!("one of: {}", legal_values::<MarketId>()),
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;
    Ok((!markets.is_empty()).then_some(markets))
}

/// Parses `SECTOR:FIELD` filters into allowed fields per sector.
pub fn parse_sector_filters(values: &[String]) -> Result<HashMap<usize, HashSet<usize>>, StalkerError> {
    let mut filters: HashMap<usize, HashSet<usize>> = HashMap::new();
    for value in values {
        let parsed = value
            .split_once(':')
            .and_then(|(s, f)| Some((s.trim().parse::<usize>().ok()?, f.trim().parse::<usize>().ok()?)));
        let Some((sector, field)) = parsed else {
            return Err(StalkerError::InvalidValue {
                field: "sector".into(),
                value: value.clone(),
                reason: "expected SECTOR:FIELD".into(),
            });
        };
        filters.entry(sector).or_default().insert(field);
    }
    Ok(filters)
}

/// Report filters from the `[report]` section, overridden by command line values.
pub fn build_report_filters(
    config: &dyn ConfigPort,
    portfolio: Option<&str>,
    markets: &[String],
    sectors: &[String],
    owned_only: bool,
) -> Result<ReportFilters, StalkerError> {
    let portfolio = portfolio
        .map(str::to_string)
        .or_else(|| config.get_string("report", "portfolio"))
        .filter(|p| !p.trim().is_empty());
    let markets = if markets.is_empty() {
        let configured = config.get_string("report", "markets").unwrap_or_default();
        parse_markets(&configured.split(',').map(str::to_string).collect::<Vec<_>>())?
    } else {
        parse_markets(markets)?
    };
    Ok(ReportFilters {
        portfolios: portfolio.map(|p| HashSet::from([p.trim().to_string()])),
        markets,
        sector_fields: parse_sector_filters(sectors)?,
        owned_only: owned_only || config.get_bool("report", "owned_only", false),
    })
}

fn run_report(
    config_path: &Path,
    portfolio: Option<String>,
    markets: &[String],
    sectors: &[String],
    owned_only: bool,
    output: Option<&PathBuf>,
) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (_, engine) = open_engine(&config)?;
    let filters = build_report_filters(&config, portfolio.as_deref(), markets, sectors, owned_only)?;

    let prices = CsvPriceAdapter::new(required_path(&config, "prices", "data_dir")?);
    let rates = ConfigRateAdapter::from_config(&config)?;
    let meta = MarketCalendarAdapter::from_clock(MarketId::iter().collect());
    let snapshot = engine.snapshot();
    let report = ReportPreCalculator::new(&snapshot, &prices, &meta, &rates, &filters).calculate();

    with_output(output, |out| TextReportAdapter.write(&report, out))
}

fn run_scan(config_path: &Path, period: Option<usize>) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let (_, engine) = open_engine(&config)?;
    let period = match period {
        Some(period) => check_period(period)?,
        None => {
            let configured = config.get_int("prices", "lookback_period", DEFAULT_LOOKBACK as i64);
            usize::try_from(configured).unwrap_or(DEFAULT_LOOKBACK)
        }
    };

    let prices = CsvPriceAdapter::new(required_path(&config, "prices", "data_dir")?);
    let rates = ConfigRateAdapter::from_config(&config)?;
    let meta = MarketCalendarAdapter::from_clock(MarketId::iter().collect());
    let mut store = FileEventStore::load(required_path(&config, "stalker", "event_store")?)?;

    let analyzer = HoldingThresholdAnalyzer::new(&prices, &rates, &meta);
    let snapshot = engine.snapshot();
    let emitted = analyzer.scan(period, &prices, &snapshot, &mut store);
    store.save()?;

    for record in &store.records()[store.records().len() - emitted..] {
        println!("{record}");
    }
    println!("{emitted} event(s)");
    Ok(())
}

fn run_events(config_path: &Path, action: EventsAction) -> Result<(), StalkerError> {
    let config = load_config(config_path)?;
    let mut store = FileEventStore::load(required_path(&config, "stalker", "event_store")?)?;
    match action {
        EventsAction::List => {
            for record in store.records() {
                println!("{record}");
            }
        }
        EventsAction::Prune { before } => {
            let pruned = store.prune(before);
            store.save()?;
            println!("Pruned {pruned} event(s)");
        }
    }
    Ok(())
}

fn run_fetch_config(path: &Path) -> Result<(), StalkerError> {
    let mut fetch = FetchConfig::new()?;
    for (index, line) in read_lines(path)?.iter().enumerate() {
        if !is_command_line(line) {
            continue;
        }
        fetch.apply(line).map_err(|source| StalkerError::Replay {
            line: index + 1,
            command: line.trim().to_string(),
            source: Box::new(source),
        })?;
    }
    for market in MarketId::iter() {
        match fetch.provider(market) {
            Some(provider) => println!("{market}: {provider}"),
            None => println!("{market}: -"),
        }
    }
    Ok(())
}
