//! corral — cluster the rows of a CSV file with parallel k-means and
//! write a plain text report grouping rows by cluster.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use corral_compute::Kmeans;
use corral_ingest::{numeric_fields, points_from_table, read_csv};
use corral_pool::TaskPool;
use corral_report::{empty_clusters, group_by_cluster, write_report};

/// Cluster CSV rows into K groups using parallel k-means.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about)]
struct Cli {
    /// Path to the input CSV file (first line must be a header).
    #[arg(long, env = "CORRAL_INPUT")]
    input: PathBuf,

    /// Number of clusters.
    #[arg(long, short = 'k', env = "CORRAL_CLUSTERS", default_value_t = 8)]
    clusters: usize,

    /// Upper bound on Lloyd's iterations.
    #[arg(long, default_value_t = 1000)]
    max_iterations: usize,

    /// Worker threads. 0 = available parallelism.
    #[arg(long, env = "CORRAL_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Read at most this many data rows.
    #[arg(long)]
    limit: Option<usize>,

    /// Seed for reproducible centroid initialization.
    #[arg(long)]
    seed: Option<u64>,

    /// Report output path.
    #[arg(long, default_value = "output.txt")]
    output: PathBuf,

    /// Fields to echo per row in the report. Defaults to every
    /// non-numeric field.
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let table = read_csv(&cli.input, cli.limit)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    info!("Read {} rows from {}", table.len(), cli.input.display());

    let features = numeric_fields(&table);
    if features.is_empty() {
        bail!("no numeric fields found in {}", cli.input.display());
    }
    info!("Clustering on {} numeric fields: {:?}", features.len(), features);

    let points = Arc::new(points_from_table(&table, &features)?);

    let workers = resolve_workers(cli.workers);
    let pool = TaskPool::new(workers).context("failed to start worker pool")?;
    info!("Started worker pool with {} threads", workers);

    let mut engine = Kmeans::new(cli.clusters, features.len(), cli.max_iterations)?;
    let summary = match cli.seed {
        Some(seed) => {
            engine.fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(seed))?
        }
        None => engine.fit(&points, &pool)?,
    };
    info!(
        "Fit complete after {} iterations (converged: {})",
        summary.iterations, summary.converged
    );

    let stranded = empty_clusters(&points, cli.clusters);
    if !stranded.is_empty() {
        info!("{} clusters attracted no points: {:?}", stranded.len(), stranded);
    }

    let display_fields = display_fields(&cli, table.headers(), &features);
    let groups = group_by_cluster(&points);
    let file = File::create(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    write_report(BufWriter::new(file), &groups, &table, &display_fields)?;
    info!("Wrote report to {}", cli.output.display());

    Ok(())
}

/// Resolve worker thread count (0 means use available parallelism).
fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    } else {
        requested
    }
}

/// Report fields: explicit `--fields` wins, then non-numeric columns,
/// then every column (for all-numeric files).
fn display_fields(cli: &Cli, headers: &[String], features: &[String]) -> Vec<String> {
    if !cli.fields.is_empty() {
        return cli.fields.clone();
    }
    let non_numeric: Vec<String> = headers
        .iter()
        .filter(|header| !features.contains(header))
        .cloned()
        .collect();
    if non_numeric.is_empty() {
        headers.to_vec()
    } else {
        non_numeric
    }
}
