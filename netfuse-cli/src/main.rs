//! # netfuse - Batch Gene Ranking Queries
//!
//! Runs query files against a directory dataset and writes one result file
//! per query.
//!
//! ## Usage
//!
//! ```bash
//! # Rank genes for two queries, top scores only
//! netfuse --data ./data --results ./out query1.txt query2.txt
//!
//! # Every gene with its z-score
//! netfuse --data ./data --results ./out --out scores --scoring-method z query1.txt
//!
//! # Write the fused network instead of a ranking
//! netfuse --data ./data --results ./out --out combined-network query1.txt
//!
//! # Show the networks and genes available for organism 4
//! netfuse --data ./data --list-networks 4
//! netfuse --data ./data --list-genes 4
//! ```
//!
//! ## Options
//!
//! - `--data <DIR>`: Dataset root directory
//! - `--results <DIR>`: Existing directory for result files
//! - `--out <FORMAT>`: genes, scores, json or combined-network (default: genes)
//! - `--scoring-method <METHOD>`: discriminant, z or context (default: discriminant)
//! - `--threads <N>`: Worker and compute threads (default: all cores)
//! - `--list-networks <ORG>`: Print the networks of an organism and exit
//! - `--list-genes <ORG>`: Print the gene ids of an organism and exit
//! - `-v`: More logging; repeat for more detail
//!
//! Results for `dir/query1.txt` are written to `<results>/query1-results.<ext>`.

mod output;
mod query;

use clap::{Arg, ArgAction, Command};
use netfuse_core::data::FileDataset;
use netfuse_core::pool::{Job, JobId, QueryPool};
use netfuse_core::types::NetworkId;
use netfuse_core::*;
use output::{write_combined_network, write_genes, write_networks, write_response, OutputFormat};
use query::QueryFile;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn cli() -> Command {
    Command::new("netfuse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gene ranking by network fusion and label propagation")
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .value_name("DIR")
                .required(true)
                .help("Dataset root directory"),
        )
        .arg(
            Arg::new("results")
                .short('r')
                .long("results")
                .value_name("DIR")
                .help("Directory where results are written (must exist)"),
        )
        .arg(
            Arg::new("out")
                .short('o')
                .long("out")
                .value_name("FORMAT")
                .help("Output format: genes, scores, json, combined-network")
                .value_parser(["genes", "scores", "json", "combined-network"])
                .default_value("genes"),
        )
        .arg(
            Arg::new("scoring-method")
                .short('s')
                .long("scoring-method")
                .value_name("METHOD")
                .help("Gene scoring method: discriminant, z, context")
                .value_parser(["discriminant", "z", "context"])
                .default_value("discriminant"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Number of worker threads (default: all cores)"),
        )
        .arg(
            Arg::new("list-networks")
                .long("list-networks")
                .value_name("ORG")
                .value_parser(clap::value_parser!(i64))
                .help("List the networks of an organism and exit"),
        )
        .arg(
            Arg::new("list-genes")
                .long("list-genes")
                .value_name("ORG")
                .value_parser(clap::value_parser!(i64))
                .conflicts_with("list-networks")
                .help("List the gene ids of an organism and exit"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase logging verbosity"),
        )
        .arg(
            Arg::new("queries")
                .value_name("QUERY_FILE")
                .num_args(0..)
                .action(ArgAction::Append)
                .help("Query files to run"),
        )
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// Result file path for a query file
fn result_path(results: &Path, query: &Path, format: OutputFormat) -> PathBuf {
    let base = query
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "query".to_string());
    results.join(format!("{base}-results.{}", format.extension()))
}

/// Every network of the organism, one category per network group
fn all_network_groups(engine: &FusionEngine, organism: &OrganismRef) -> FusionResult<Vec<Vec<NetworkId>>> {
    let mut groups: BTreeMap<i64, Vec<NetworkId>> = BTreeMap::new();
    for network in engine.cache().networks(organism)? {
        groups.entry(network.group_id).or_default().push(network.id);
    }
    Ok(groups.into_values().collect())
}

fn write_result<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()
}

/// Main entry point for the netfuse CLI.
///
/// Parses arguments, opens the dataset, runs every query file on the worker
/// pool and writes one result file per query.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let data = matches.get_one::<String>("data").ok_or("Missing --data")?;
    let threads = matches.get_one::<usize>("threads").copied();
    let config = EngineConfig {
        num_threads: threads,
        ..Default::default()
    };
    let engine = Arc::new(FusionEngine::with_config(Arc::new(FileDataset::open(data)?), config)?);

    if let Some(&organism_id) = matches.get_one::<i64>("list-networks") {
        let networks = engine.cache().networks(&OrganismRef::core(organism_id))?;
        let mut stdout = BufWriter::new(io::stdout().lock());
        write_networks(&mut stdout, &networks)?;
        stdout.flush()?;
        return Ok(());
    }

    if let Some(&organism_id) = matches.get_one::<i64>("list-genes") {
        let nodes = engine.cache().node_index(&OrganismRef::core(organism_id))?;
        let mut stdout = BufWriter::new(io::stdout().lock());
        write_genes(&mut stdout, nodes.ids())?;
        stdout.flush()?;
        return Ok(());
    }

    let queries: Vec<PathBuf> = matches
        .get_many::<String>("queries")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    if queries.is_empty() {
        return Err("No query files given".into());
    }
    let results_dir = PathBuf::from(matches.get_one::<String>("results").ok_or("Missing --results")?);
    if !results_dir.is_dir() {
        return Err(format!("Results directory {} does not exist", results_dir.display()).into());
    }

    let format: OutputFormat = matches
        .get_one::<String>("out")
        .map_or(Ok(OutputFormat::Genes), |s| s.parse())?;
    let scoring_method: ScoringMethod = matches
        .get_one::<String>("scoring-method")
        .map_or(Ok(ScoringMethod::Discriminant), |s| s.parse())?;

    let workers = threads.unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    let pool = QueryPool::new(Arc::clone(&engine), workers, workers * 2)?;
    let next_job = AtomicU64::new(0);
    let mut outputs: HashMap<JobId, PathBuf> = HashMap::new();
    let mut failed = 0usize;

    for query_path in &queries {
        let request = QueryFile::read(query_path).and_then(|query| {
            let organism = OrganismRef::core(query.organism_id);
            query.to_request(|| all_network_groups(&engine, &organism))
        });
        let request = match request {
            Ok(request) => request
                .with_scoring_method(scoring_method)
                .with_result_policy(format.result_policy())
                .with_task(format.task()),
            Err(e) => {
                error!(query = %query_path.display(), "{e}");
                failed += 1;
                continue;
            }
        };
        let id = next_job.fetch_add(1, Ordering::Relaxed);
        outputs.insert(id, result_path(&results_dir, query_path, format));
        pool.submit(Job::new(id, request))?;
    }

    for result in pool.finish() {
        let Some(path) = outputs.get(&result.id) else {
            continue;
        };
        match result.outcome {
            Ok(QueryOutcome::Completed(response)) => {
                write_result(path, |writer| write_response(writer, &response, format))?;
                info!(
                    output = %path.display(),
                    genes = response.ranked_nodes.len(),
                    method = %response.resolved_combining_method,
                    "wrote results"
                );
            }
            Ok(QueryOutcome::Combined(network)) => {
                write_result(path, |writer| write_combined_network(writer, &network))?;
                info!(
                    output = %path.display(),
                    interactions = network.interactions.len(),
                    method = %network.resolved_combining_method,
                    "wrote combined network"
                );
            }
            Ok(QueryOutcome::Cancelled) => {
                error!(output = %path.display(), "query cancelled");
                failed += 1;
            }
            Err(e) => {
                error!(output = %path.display(), "{e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} queries failed", queries.len()).into());
    }
    eprintln!("Finished {} queries.", queries.len());
    Ok(())
}
