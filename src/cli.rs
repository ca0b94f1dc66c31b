use crate::codec::CompressionMethod;
use crate::config::{BlfConfig, DEFAULT_CHUNK_SIZE};
use crate::error::BlfError;
use crate::file::BlfFile;
use crate::record::{ObjectType, Record};
use crate::statistics::FileStatistics;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = "Inspect and rewrite chunked binary log (BLF) files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows header statistics, chunk and record counts
    Info {
        /// Input file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lists records, one per line
    Dump {
        /// Input file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Rewrites a file with different chunking or compression
    Recompress {
        /// Input file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Compression method [none, zlib, lz4, zstd]
        #[arg(short, long, default_value = "zlib")]
        method: CompressionMethod,

        /// Compression level (default: the method's default)
        #[arg(short = 'L', long)]
        level: Option<u16>,

        /// Uncompressed bytes per chunk
        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Decompress and compress chunks on worker threads
        #[arg(short, long)]
        background: bool,
    },
}

#[derive(Serialize)]
struct FileInfo {
    path: PathBuf,
    chunk_count: usize,
    record_count: usize,
    uncompressed_size: u64,
    records_by_kind: BTreeMap<String, usize>,
    statistics: FileStatistics,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Info { input, json } => info(input, *json),
        Commands::Dump { input, limit } => dump(input, *limit),
        Commands::Recompress { input, output, method, level, chunk_size, background } => {
            let config = BlfConfig::default()
                .with_compression(*method)
                .with_level(level.unwrap_or_else(|| method.default_level()))
                .with_chunk_size(*chunk_size)
                .with_background_io(*background);
            recompress(input, output, config)
        }
    }
}

fn kind_name(kind: u32) -> String {
    match ObjectType::try_from(kind) {
        Ok(kind) => format!("{:?}", kind),
        Err(tag) => format!("Unknown({})", tag),
    }
}

fn open(input: &Path) -> Result<BlfFile> {
    BlfFile::open(input).with_context(|| format!("failed to open {}", input.display()))
}

fn info(input: &Path, json: bool) -> Result<()> {
    let file = open(input)?;
    let mut records_by_kind = BTreeMap::new();
    for entry in file.index() {
        *records_by_kind.entry(kind_name(entry.kind)).or_insert(0) += 1;
    }
    let info = FileInfo {
        path: input.to_path_buf(),
        chunk_count: file.chunk_count()?,
        record_count: file.len(),
        uncompressed_size: file.uncompressed_size()?,
        records_by_kind,
        statistics: file.statistics()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let stats = &info.statistics;
    let ratio = if stats.file_size > 0 { info.uncompressed_size as f64 / stats.file_size as f64 } else { 0.0 };
    println!("{}", input.display());
    println!("  Application:       {} v{}.{}.{}", stats.application.id, stats.application.major, stats.application.minor, stats.application.build);
    println!("  API version:       {}.{}.{}.{}", stats.api.major, stats.api.minor, stats.api.build, stats.api.patch);
    println!("  File Size:         {} bytes", stats.file_size);
    println!("  Uncompressed Size: {} bytes", info.uncompressed_size);
    println!("  Ratio:             {:.2}x", ratio);
    println!("  Chunks:            {}", info.chunk_count);
    println!("  Records:           {} (header says {})", info.record_count, stats.object_count);
    if let Some(start) = stats.measurement_start_time.to_naive() {
        println!("  Measurement Start: {}", start);
    }
    if let Some(last) = stats.last_object_time.to_naive() {
        println!("  Last Object:       {}", last);
    }
    for (kind, count) in &info.records_by_kind {
        println!("    {:<18} {}", kind, count);
    }
    Ok(())
}

fn dump(input: &Path, limit: Option<usize>) -> Result<()> {
    let mut file = open(input)?;
    let index = file.index().to_vec();
    let limit = limit.unwrap_or(index.len());

    for (number, entry) in index.iter().enumerate().take(limit) {
        match file.read() {
            Ok(Some(record)) => println!(
                "{:>8}  {:<18} {:>16} ns  {:>6} bytes",
                number,
                kind_name(entry.kind),
                record.envelope.timestamp_nanos(),
                entry.object_size
            ),
            Ok(None) => break,
            Err(BlfError::UnknownKind { envelope }) => println!(
                "{:>8}  {:<18} {:>16} ns  {:>6} bytes  (skipped)",
                number,
                kind_name(envelope.kind),
                envelope.timestamp_nanos(),
                envelope.object_size
            ),
            Err(e) => return Err(e).with_context(|| format!("failed to read record {}", number)),
        }
    }
    Ok(())
}

fn recompress(input: &Path, output: &Path, config: BlfConfig) -> Result<()> {
    println!("Recompressing {} to {}...", input.display(), output.display());
    let start = Instant::now();

    let read_config = BlfConfig::default().with_background_io(config.background_io);
    let mut source = BlfFile::open_with(input, read_config)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let header = source.statistics()?;
    let mut target = BlfFile::create(output, config)
        .with_context(|| format!("failed to create {}", output.display()))?;
    target.set_application(header.application)?;
    target.set_api(header.api)?;
    target.set_objects_read(header.objects_read)?;
    target.set_measurement_start_time(header.measurement_start_time)?;

    let pb = ProgressBar::new(source.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] Records {pos}/{len} ({eta})")?
        .progress_chars("#>-")
    );

    let mut copied = 0usize;
    let mut skipped = 0usize;
    for result in source.records() {
        match result {
            Ok(record) => {
                write_record(&mut target, &record)?;
                copied += 1;
            }
            Err(e) if e.is_recoverable() => {
                warn!("dropping record: {}", e);
                skipped += 1;
            }
            Err(e) => return Err(e).context("failed to read source record"),
        }
        pb.inc(1);
    }
    pb.finish_with_message("Recompression finished");

    target.close().with_context(|| format!("failed to finalize {}", output.display()))?;
    let stats = target.statistics()?;
    let before = source.file_size()?;
    let duration = start.elapsed();

    println!("Recompression successful!");
    println!("  Records Copied:   {}", copied);
    println!("  Records Skipped:  {}", skipped);
    println!("  Original Size:    {} bytes", before);
    println!("  New Size:         {} bytes", stats.file_size);
    println!("  Chunks:           {}", target.chunk_count()?);
    println!("  Elapsed Time:     {:.2?}", duration);
    Ok(())
}

fn write_record(target: &mut BlfFile, record: &Record) -> Result<()> {
    target.write(record).with_context(|| format!("failed to write {:?} record", record.kind()))
}
