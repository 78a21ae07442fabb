use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use rowsift::cursor::{Column, JsonlCursor, ParquetCursor, RowCursor, RowCursorExt, RowRecord};
use rowsift::dsl::Grammar;
use rowsift::{Dynamic, Predicate, PredicateBuilder};
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_BATCH_SIZE, FiltersConfig, InputFormat, RuntimeConfig};
use crate::sinks::{DataSink, JsonlSink, ParquetSink};
use crate::utils::ProgressCounter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file (.jsonl, .parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Filter expression, e.g. "([Name] == 'a') || ([Number] > 2)"
    #[arg(short = 'e', long, conflicts_with = "name")]
    pub filter: Option<String>,

    /// Name of a filter defined in the filters file
    #[arg(short, long, requires = "filters")]
    pub name: Option<String>,

    /// Filter configuration file (YAML)
    #[arg(short, long, env = "ROWSIFT_FILTERS")]
    pub filters: Option<PathBuf>,

    /// Output file (.jsonl, .parquet), or - for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Output format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Input format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Operator table: compatible (bare `<` reads as `<=`) or strict
    #[arg(long)]
    pub grammar: Option<Grammar>,

    /// Rows read and evaluated per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Stop after this many matching rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    #[value(name = "jsonl", alias = "json")]
    Jsonl,
    #[value(name = "parquet")]
    Parquet,
}

impl OutputFormat {
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub scanned: u64,
    pub matched: u64,
    pub failed: u64,
}

pub fn resolve_runtime(cli: &Cli) -> Result<RuntimeConfig> {
    let file = cli
        .filters
        .as_deref()
        .map(|path| {
            FiltersConfig::load(path)
                .with_context(|| format!("Config: Failed to load filters from {:?}", path))
        })
        .transpose()?;

    let filter = match (&cli.filter, &cli.name, &file) {
        (Some(filter), _, _) => filter.clone(),
        (None, Some(name), Some(file)) => file.filter(name)?.to_string(),
        _ => anyhow::bail!("CLI: Provide --filter, or --name together with --filters"),
    };

    let input_format = cli
        .input_format
        .or_else(|| InputFormat::detect(&cli.input))
        .context("CLI: Could not detect input format from extension; use --input-format")?;

    Ok(RuntimeConfig {
        filter,
        grammar: cli
            .grammar
            .or_else(|| file.as_ref().and_then(|f| f.grammar))
            .unwrap_or_default(),
        batch_size: cli
            .batch_size
            .or_else(|| file.as_ref().and_then(|f| f.batch_size))
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .max(1),
        limit: cli.limit,
        input_format,
    })
}

pub fn resolve_output_format(cli: &Cli) -> Result<OutputFormat> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    if cli.output == Path::new("-") {
        return Ok(OutputFormat::Jsonl);
    }
    let ext = cli
        .output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("jsonl" | "ndjson" | "json") => Ok(OutputFormat::Jsonl),
        Some("parquet") => Ok(OutputFormat::Parquet),
        _ => anyhow::bail!("CLI: Could not detect output format from extension; use --format"),
    }
}

pub fn compile_filter(runtime: &RuntimeConfig) -> Result<Predicate<dyn Dynamic>> {
    let predicate = PredicateBuilder::<dyn Dynamic>::new()
        .grammar(runtime.grammar)
        .build(&runtime.filter)
        .with_context(|| format!("Filter: Failed to compile {:?}", runtime.filter))?;
    tracing::info!("Filter: {}", predicate.filter().expr());
    Ok(predicate)
}

pub fn init_sink(
    format: OutputFormat,
    output: &Path,
    batch_size: usize,
    columns: Option<Vec<Column>>,
) -> Result<Box<dyn DataSink>> {
    match format {
        OutputFormat::Jsonl => {
            if output == Path::new("-") {
                tracing::info!("Sink: {} -> stdout", format.label());
                Ok(Box::new(JsonlSink::stdout()?))
            } else {
                tracing::info!("Sink: {} -> {:?}", format.label(), output);
                Ok(Box::new(JsonlSink::new(output)?))
            }
        }
        OutputFormat::Parquet => {
            if output == Path::new("-") {
                anyhow::bail!("CLI: Parquet output to stdout is not supported");
            }
            tracing::info!("Sink: {} -> {:?}", format.label(), output);
            let sink = ParquetSink::new(output, batch_size)?;
            Ok(Box::new(match columns {
                Some(columns) => sink.with_columns(columns)?,
                None => sink,
            }))
        }
    }
}

/// Compile the filter, open the input and write every matching row.
pub fn run(cli: &Cli, runtime: &RuntimeConfig, format: OutputFormat) -> Result<RunStats> {
    let predicate = compile_filter(runtime)?;

    let (stats, mut sink) = match runtime.input_format {
        InputFormat::Jsonl => {
            let cursor = JsonlCursor::open(&cli.input)
                .with_context(|| format!("Input: Failed to open {:?}", cli.input))?;
            let mut sink = init_sink(format, &cli.output, runtime.batch_size, None)?;
            let stats = filter_rows(cursor, &predicate, sink.as_mut(), runtime, cli.verbose)?;
            (stats, sink)
        }
        InputFormat::Parquet => {
            let cursor = ParquetCursor::open(&cli.input, runtime.batch_size)
                .with_context(|| format!("Input: Failed to open {:?}", cli.input))?;
            tracing::info!("Input: {} columns", cursor.columns().len());
            let columns = cursor.columns().to_vec();
            let mut sink = init_sink(format, &cli.output, runtime.batch_size, Some(columns))?;
            let stats = filter_rows(cursor, &predicate, sink.as_mut(), runtime, cli.verbose)?;
            (stats, sink)
        }
    };

    sink.finish().context("Pipeline: Failed to finalize sink")?;
    Ok(stats)
}

/// Read rows in batches, evaluate each batch in parallel and write the matches
/// in input order.
pub fn filter_rows<C: RowCursor>(
    cursor: C,
    predicate: &Predicate<dyn Dynamic>,
    sink: &mut dyn DataSink,
    runtime: &RuntimeConfig,
    verbose: bool,
) -> Result<RunStats> {
    let mut records = cursor.records();
    let mut stats = RunStats::default();
    let progress = ProgressCounter::new("Scanning rows", 100_000, verbose);
    let limit = runtime.limit.map_or(u64::MAX, |limit| limit as u64);

    while stats.matched < limit {
        let batch: Vec<RowRecord> = records
            .by_ref()
            .take(runtime.batch_size)
            .collect::<Result<_, _>>()
            .with_context(|| format!("Input: Failed reading row {}", stats.scanned + 1))?;
        if batch.is_empty() {
            break;
        }

        let verdicts: Vec<_> = batch
            .par_iter()
            .map(|record| predicate.test(record))
            .collect();

        for (offset, (record, verdict)) in batch.iter().zip(verdicts).enumerate() {
            match verdict {
                Ok(true) if stats.matched < limit => {
                    sink.add_record(record)?;
                    stats.matched += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!("Row {}: {}", stats.scanned + offset as u64 + 1, err);
                }
            }
        }

        stats.scanned += batch.len() as u64;
        progress.inc(batch.len() as u64);
    }

    progress.finish();
    Ok(stats)
}
