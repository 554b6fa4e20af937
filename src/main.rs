//! IrisForge: iris classification and K-Means cluster plots from the command line
//!
//! This is the main entrypoint that loads the model registry once, then
//! answers a single prediction, renders a cluster plot, or serves a batch
//! of JSON requests in parallel.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use irisforge::cli::{Args, Command};
use irisforge::{cluster, render, ModelRegistry, RenderConfig, Response, Service};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();
    let registry = ModelRegistry::load(&args.registry_config()).context("Model registry could not be loaded")?;
    log::info!("Model registry ready in {:.2}s", start_time.elapsed().as_secs_f64());

    let service = Service::with_config(Arc::new(registry), args.cluster_config(), RenderConfig::default());

    match &args.command {
        Command::PredictSetosa(features) => {
            let record = features.to_record()?;
            print_response(&service.predict_setosa(&record))
        }
        Command::PredictVersicolorVirginica(features) => {
            let record = features.to_record()?;
            print_response(&service.predict_versicolor_virginica(&record))
        }
        Command::Cluster {
            clusters,
            output: Some(output),
            ..
        } => run_cluster_to_file(&service, *clusters, output),
        Command::Cluster { clusters, .. } => {
            print_response(&service.compute_clusters(&serde_json::json!({ "k": clusters })))
        }
        Command::Batch { input } => run_batch(&service, input.as_deref()),
    }
}

/// Print a response as one JSON line; error responses also fail the process
fn print_response(response: &Response) -> Result<()> {
    println!("{}", serde_json::to_string(response)?);
    if let Response::Error { error } = response {
        anyhow::bail!("{}", error);
    }
    Ok(())
}

/// Cluster, print statistics and write the plot as a PNG file
fn run_cluster_to_file(service: &Service, k: i64, output: &Path) -> Result<()> {
    println!("=== K-Means Clustering ===\n");

    let dataset = service.registry().dataset();
    let model_start = Instant::now();
    let assignment = cluster(k, dataset, service.cluster_config())?;
    let model_time = model_start.elapsed();

    println!("✓ Clustered {} points into {} clusters", dataset.len(), assignment.n_clusters);
    println!("  Fitting time: {:.2}s", model_time.as_secs_f64());
    println!("  Within-cluster sum of squares: {:.2}", assignment.inertia);

    println!("\n=== Cluster Statistics ===");
    for (i, &size) in assignment.cluster_sizes().iter().enumerate() {
        let percentage = (size as f64 / dataset.len() as f64) * 100.0;
        println!("Cluster {}: {} points ({:.1}%)", i, size, percentage);
    }

    println!("\nCluster centroids:");
    println!("  Cluster | Sepal L | Sepal W | Petal L | Petal W");
    println!("  --------|---------|---------|---------|--------");
    for (i, row) in assignment.centroids.outer_iter().enumerate() {
        println!(
            "  {:7} | {:7.2} | {:7.2} | {:7.2} | {:7.2}",
            i, row[0], row[1], row[2], row[3]
        );
    }

    let payload = render(dataset, &assignment, assignment.n_clusters, service.render_config())?;
    fs::write(output, &payload.bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nPlot saved to: {}", output.display());

    Ok(())
}

/// Read request lines, answer them in parallel and print responses in order
fn run_batch(service: &Service, input: Option<&Path>) -> Result<()> {
    let reader: Box<dyn Read> = match input {
        Some(path) if path != Path::new("-") => {
            Box::new(fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?)
        }
        _ => Box::new(io::stdin()),
    };

    let lines: Vec<String> = BufReader::new(reader)
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read batch input")?
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let batch_start = Instant::now();
    let responses = service.handle_batch(&lines);
    log::info!(
        "Answered {} requests in {:.2}s",
        responses.len(),
        batch_start.elapsed().as_secs_f64()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for response in &responses {
        serde_json::to_writer(&mut out, response)?;
        writeln!(out)?;
    }
    Ok(())
}
