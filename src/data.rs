//! Feature vectors and the reference dataset, loaded from CSV with Polars

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};
use polars::prelude::*;

use crate::error::ServiceError;

/// Column names of the four measurements, in vector order
pub const FEATURE_NAMES: [&str; 4] = ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Column holding the ground-truth species
pub const SPECIES_COLUMN: &str = "species";

/// Number of measurements per flower
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Four finite measurements of a single flower, in centimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    /// Build a vector, rejecting NaN and infinite components
    pub fn new(values: [f64; N_FEATURES]) -> crate::Result<Self> {
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(ServiceError::invalid_input(format!(
                "{} is not a finite number",
                FEATURE_NAMES[idx]
            )));
        }
        Ok(Self(values))
    }

    pub fn sepal_length(&self) -> f64 {
        self.0[0]
    }

    pub fn sepal_width(&self) -> f64 {
        self.0[1]
    }

    pub fn petal_length(&self) -> f64 {
        self.0[2]
    }

    pub fn petal_width(&self) -> f64 {
        self.0[3]
    }

    pub fn as_array(&self) -> &[f64; N_FEATURES] {
        &self.0
    }
}

/// Ground-truth iris species of a reference point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Setosa,
    Versicolor,
    Virginica,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Setosa => "setosa",
            Species::Versicolor => "versicolor",
            Species::Virginica => "virginica",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = String;

    /// Accepts both `setosa` and the UCI spelling `Iris-setosa`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.strip_prefix("iris-").unwrap_or(&name) {
            "setosa" => Ok(Species::Setosa),
            "versicolor" => Ok(Species::Versicolor),
            "virginica" => Ok(Species::Virginica),
            _ => Err(format!("unknown species '{}'", s.trim())),
        }
    }
}

/// Fixed labeled points the clustering engine partitions
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    /// Raw measurements, shape (n_points, 4)
    features: Array2<f64>,
    /// Species of each row
    species: Vec<Species>,
}

impl ReferenceDataset {
    /// Assemble a dataset from a feature matrix and matching species labels
    pub fn new(features: Array2<f64>, species: Vec<Species>) -> crate::Result<Self> {
        if features.ncols() != N_FEATURES {
            return Err(ServiceError::startup(
                "reference dataset",
                format!("expected {} feature columns, got {}", N_FEATURES, features.ncols()),
            ));
        }
        if features.nrows() == 0 {
            return Err(ServiceError::startup("reference dataset", "dataset has no rows"));
        }
        if features.nrows() != species.len() {
            return Err(ServiceError::startup(
                "reference dataset",
                format!(
                    "{} feature rows but {} species labels",
                    features.nrows(),
                    species.len()
                ),
            ));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ServiceError::startup(
                "reference dataset",
                "feature matrix contains non-finite values",
            ));
        }
        Ok(Self { features, species })
    }

    /// Unlabeled feature matrix, shape (n_points, 4)
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Values of one feature across every point
    pub fn column(&self, feature: usize) -> ArrayView1<'_, f64> {
        self.features.column(feature)
    }
}

/// Load the reference dataset from a CSV file
///
/// # Arguments
/// * `file_path` - CSV with a header naming the four feature columns and `species`
///
/// # Returns
/// * `ReferenceDataset` with raw (unscaled) measurements
pub fn load_reference_dataset(file_path: impl AsRef<Path>) -> crate::Result<ReferenceDataset> {
    let file_path = file_path.as_ref();
    let artifact = format!("reference dataset '{}'", file_path.display());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| ServiceError::startup(&artifact, e))?;

    let dataset = dataframe_to_dataset(&df).map_err(|reason| ServiceError::startup(&artifact, reason))?;

    log::info!(
        "Loaded reference dataset from {} ({} points)",
        file_path.display(),
        dataset.len()
    );
    Ok(dataset)
}

/// Convert the loaded frame into a feature matrix plus species labels
fn dataframe_to_dataset(df: &DataFrame) -> Result<ReferenceDataset, String> {
    let n_samples = df.height();
    if n_samples == 0 {
        return Err("dataset has no rows".to_string());
    }

    let mut columns = Vec::with_capacity(N_FEATURES);
    for name in FEATURE_NAMES {
        columns.push(feature_column(df, name).map_err(|e| format!("column '{}': {}", name, e))?);
    }

    let mut raw_data = Vec::with_capacity(n_samples * N_FEATURES);
    for row in 0..n_samples {
        for (name, column) in FEATURE_NAMES.iter().zip(&columns) {
            match column[row] {
                Some(value) if value.is_finite() => raw_data.push(value),
                Some(value) => return Err(format!("row {}: {} is {}", row + 1, name, value)),
                None => return Err(format!("row {}: {} is missing or not numeric", row + 1, name)),
            }
        }
    }

    let species = species_column(df)?;
    let features = Array2::from_shape_vec((n_samples, N_FEATURES), raw_data).map_err(|e| e.to_string())?;

    ReferenceDataset::new(features, species).map_err(|e| match e {
        ServiceError::StartupFailure { reason, .. } => reason,
        other => other.to_string(),
    })
}

fn feature_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    let values = column.f64()?.into_iter().collect();
    Ok(values)
}

fn species_column(df: &DataFrame) -> Result<Vec<Species>, String> {
    let column = df
        .column(SPECIES_COLUMN)
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| format!("column '{}': {}", SPECIES_COLUMN, e))?;
    let labels = column
        .str()
        .map_err(|e| format!("column '{}': {}", SPECIES_COLUMN, e))?;

    labels
        .into_iter()
        .enumerate()
        .map(|(row, label)| match label {
            Some(label) => label.parse().map_err(|e| format!("row {}: {}", row + 1, e)),
            None => Err(format!("row {}: species is missing", row + 1)),
        })
        .collect()
}
