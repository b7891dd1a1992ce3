//! `keyshard` developer CLI.
//!
//! Splits a JSON dataset into shard readers and scans serialized readers,
//! optionally stopping early and writing a checkpoint to resume from.

mod dataset;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dataset::Dataset;
use keyshard_core::db::{JobSpec, ShardReader, ShardSplitter};
use serde_json::Value as JsonValue;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "keyshard", version, about = "Split and scan keyshard datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a collection into shard readers and print them as JSON.
    Split {
        /// Dataset file (entity models plus records).
        #[arg(long, env = "KEYSHARD_DATA")]
        data: PathBuf,

        /// Job spec, TOML or JSON by extension.
        #[arg(long)]
        job: PathBuf,
    },

    /// Read records from serialized shard readers as JSON lines.
    Scan {
        #[arg(long, env = "KEYSHARD_DATA")]
        data: PathBuf,

        /// One reader object or an array of readers.
        #[arg(long)]
        reader: PathBuf,

        /// Stop after this many records.
        #[arg(long)]
        limit: Option<usize>,

        /// Where to write the readers' progress when the scan stops.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Split { data, job } => split(&data, &job),
        Command::Scan {
            data,
            reader,
            limit,
            checkpoint,
        } => scan(&data, &reader, limit, checkpoint.as_deref()),
    }
}

fn load_job(path: &Path) -> Result<JobSpec> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading job {}", path.display()))?;

    let job = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => JobSpec::from_toml_str(&raw)?,
        Some("json") => JobSpec::from_json_str(&raw)?,
        _ => bail!("job file {} must end in .toml or .json", path.display()),
    };

    Ok(job)
}

fn split(data: &Path, job: &Path) -> Result<()> {
    let dataset = Dataset::load(data)?;
    let job = load_job(job)?;

    let readers = ShardSplitter::new(&dataset.catalog, &dataset.store).split(&job)?;
    let encoded = readers
        .iter()
        .map(ShardReader::to_json)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(entity = %job.entity_kind, readers = readers.len(), "split complete");
    println!("{}", serde_json::to_string_pretty(&encoded)?);

    Ok(())
}

fn scan(
    data: &Path,
    reader: &Path,
    limit: Option<usize>,
    checkpoint: Option<&Path>,
) -> Result<()> {
    let dataset = Dataset::load(data)?;
    let raw = fs::read_to_string(reader)
        .with_context(|| format!("reading readers {}", reader.display()))?;
    let document: JsonValue = serde_json::from_str(&raw)?;

    let single = !document.is_array();
    let documents = match document {
        JsonValue::Array(items) => items,
        other => vec![other],
    };
    let mut readers = documents
        .iter()
        .map(|doc| ShardReader::from_json(doc, &dataset.catalog.filters))
        .collect::<Result<Vec<_>, _>>()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut emitted = 0usize;

    // The limit is checked before pulling, so a checkpoint never skips a record.
    'readers: for reader in &mut readers {
        let mut records = reader.iter(&dataset.catalog, &dataset.store)?;
        loop {
            if limit.is_some_and(|limit| emitted >= limit) {
                break 'readers;
            }
            let Some(item) = records.next() else {
                break;
            };
            let (_, record) = item?;
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
            emitted += 1;
        }
    }

    tracing::info!(records = emitted, "scan stopped");

    if let Some(path) = checkpoint {
        let mut progress = readers
            .iter()
            .map(ShardReader::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        let document = if single {
            progress.pop().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Array(progress)
        };

        fs::write(path, serde_json::to_string_pretty(&document)?)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
    }

    Ok(())
}
