//! Process-lifetime holder of the two classifiers and the reference dataset

use std::path::PathBuf;

use crate::classifier::{load_classifier, BinaryClassifier};
use crate::data::{load_reference_dataset, ReferenceDataset};

/// Default location of the Setosa-vs-rest classifier artifact
pub const DEFAULT_SETOSA_MODEL: &str = "models/model_binary1.json";
/// Default location of the Versicolor-vs-Virginica classifier artifact
pub const DEFAULT_VERSICOLOR_VIRGINICA_MODEL: &str = "models/model_binary2.json";
/// Default location of the reference dataset
pub const DEFAULT_DATASET: &str = "data/iris.csv";

/// Where the registry reads its artifacts from
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub setosa_model: PathBuf,
    pub versicolor_virginica_model: PathBuf,
    pub dataset: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            setosa_model: PathBuf::from(DEFAULT_SETOSA_MODEL),
            versicolor_virginica_model: PathBuf::from(DEFAULT_VERSICOLOR_VIRGINICA_MODEL),
            dataset: PathBuf::from(DEFAULT_DATASET),
        }
    }
}

/// Read-only models and data shared by every request
///
/// Built once at startup and handed out behind an `Arc`; nothing mutates
/// it afterwards, so readers need no locking.
#[derive(Debug)]
pub struct ModelRegistry {
    setosa: Box<dyn BinaryClassifier>,
    versicolor_virginica: Box<dyn BinaryClassifier>,
    dataset: ReferenceDataset,
}

impl ModelRegistry {
    /// Assemble a registry from already constructed parts
    pub fn new(
        setosa: Box<dyn BinaryClassifier>,
        versicolor_virginica: Box<dyn BinaryClassifier>,
        dataset: ReferenceDataset,
    ) -> Self {
        Self {
            setosa,
            versicolor_virginica,
            dataset,
        }
    }

    /// Load every artifact named in `config`
    ///
    /// Any missing or malformed artifact is a `StartupFailure`.
    pub fn load(config: &RegistryConfig) -> crate::Result<Self> {
        let setosa = load_classifier(&config.setosa_model)?;
        let versicolor_virginica = load_classifier(&config.versicolor_virginica_model)?;
        let dataset = load_reference_dataset(&config.dataset)?;

        Ok(Self::new(Box::new(setosa), Box::new(versicolor_virginica), dataset))
    }

    /// Classifier A: Setosa (1) vs Not Setosa (0)
    pub fn setosa_classifier(&self) -> &dyn BinaryClassifier {
        self.setosa.as_ref()
    }

    /// Classifier B: Versicolor (0) vs Virginica (1)
    pub fn versicolor_virginica_classifier(&self) -> &dyn BinaryClassifier {
        self.versicolor_virginica.as_ref()
    }

    pub fn dataset(&self) -> &ReferenceDataset {
        &self.dataset
    }
}
