//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::{json, Value};

use crate::model::{ClusterConfig, DEFAULT_SEED};
use crate::registry::{RegistryConfig, DEFAULT_DATASET, DEFAULT_SETOSA_MODEL, DEFAULT_VERSICOLOR_VIRGINICA_MODEL};

/// Iris species classification and K-Means cluster plots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Classifier artifact for Setosa vs Not Setosa
    #[arg(long, env = "IRISFORGE_SETOSA_MODEL", default_value = DEFAULT_SETOSA_MODEL)]
    pub setosa_model: PathBuf,

    /// Classifier artifact for Versicolor vs Virginica
    #[arg(long, env = "IRISFORGE_VV_MODEL", default_value = DEFAULT_VERSICOLOR_VIRGINICA_MODEL)]
    pub versicolor_virginica_model: PathBuf,

    /// Reference dataset CSV used for clustering
    #[arg(long, env = "IRISFORGE_DATASET", default_value = DEFAULT_DATASET)]
    pub dataset: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a flower as Setosa or Not Setosa
    PredictSetosa(FeatureArgs),

    /// Classify a non-Setosa flower as Versicolor or Virginica
    PredictVersicolorVirginica(FeatureArgs),

    /// Cluster the reference dataset and render the scatter plot
    Cluster {
        /// Number of clusters for K-Means (2-10)
        #[arg(short = 'k', long, default_value = "3", allow_negative_numbers = true)]
        clusters: i64,

        /// Write the PNG here instead of printing the JSON response
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum iterations for K-Means algorithm
        #[arg(long, default_value = "300")]
        max_iters: u64,

        /// Tolerance for K-Means convergence
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,

        /// Number of K-Means initialisations
        #[arg(long, default_value = "10")]
        n_runs: usize,

        /// Seed for centroid initialisation
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },

    /// Answer JSON request lines in parallel, one JSON response per line
    Batch {
        /// File with one request per line; stdin when omitted or "-"
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// The four measurements, as flags or as one JSON record
#[derive(ClapArgs, Debug)]
pub struct FeatureArgs {
    #[arg(long, required_unless_present = "json", allow_negative_numbers = true)]
    pub sepal_length: Option<f64>,

    #[arg(long, required_unless_present = "json", allow_negative_numbers = true)]
    pub sepal_width: Option<f64>,

    #[arg(long, required_unless_present = "json", allow_negative_numbers = true)]
    pub petal_length: Option<f64>,

    #[arg(long, required_unless_present = "json", allow_negative_numbers = true)]
    pub petal_width: Option<f64>,

    /// Raw JSON record, e.g. '{"sepal_length": 5.1, "sepal_width": 3.5, ...}'
    #[arg(long, conflicts_with_all = ["sepal_length", "sepal_width", "petal_length", "petal_width"])]
    pub json: Option<String>,
}

impl FeatureArgs {
    /// Build the untyped record handed to the feature validator
    ///
    /// Flags that were not given are left out so validation rejects them.
    pub fn to_record(&self) -> anyhow::Result<Value> {
        if let Some(ref raw) = self.json {
            return serde_json::from_str(raw).context("--json is not valid JSON");
        }

        let mut record = serde_json::Map::new();
        let fields = [
            ("sepal_length", self.sepal_length),
            ("sepal_width", self.sepal_width),
            ("petal_length", self.petal_length),
            ("petal_width", self.petal_width),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                record.insert(name.to_string(), json!(value));
            }
        }
        Ok(Value::Object(record))
    }
}

impl Args {
    /// Artifact locations for the model registry
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            setosa_model: self.setosa_model.clone(),
            versicolor_virginica_model: self.versicolor_virginica_model.clone(),
            dataset: self.dataset.clone(),
        }
    }

    /// K-Means settings from the `cluster` subcommand, defaults otherwise
    pub fn cluster_config(&self) -> ClusterConfig {
        match self.command {
            Command::Cluster {
                max_iters,
                tolerance,
                n_runs,
                seed,
                ..
            } => ClusterConfig {
                max_iters,
                tolerance,
                n_runs,
                seed,
            },
            _ => ClusterConfig::default(),
        }
    }
}
