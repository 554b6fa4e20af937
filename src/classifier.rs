//! Binary classifiers and dispatch from class index to species label

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{FeatureVector, N_FEATURES};
use crate::error::ServiceError;
use crate::registry::ModelRegistry;

/// A pre-trained decision function returning class index 0 or 1
pub trait BinaryClassifier: Send + Sync + fmt::Debug {
    fn predict(&self, features: &FeatureVector) -> crate::Result<usize>;
}

/// Label returned to callers of the two prediction operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Setosa,
    NotSetosa,
    Versicolor,
    Virginica,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Setosa => "Setosa",
            Label::NotSetosa => "Not Setosa",
            Label::Versicolor => "Versicolor",
            Label::Virginica => "Virginica",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logistic regression over the four raw measurements
///
/// Predicts class 1 when `w·x + b > 0`, i.e. when the sigmoid exceeds 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: [f64; N_FEATURES],
    pub intercept: f64,
}

/// On-disk form of a classifier artifact
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ClassifierArtifact {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl LogisticModel {
    pub fn new(coefficients: [f64; N_FEATURES], intercept: f64) -> crate::Result<Self> {
        if coefficients.iter().chain(std::iter::once(&intercept)).any(|v| !v.is_finite()) {
            return Err(ServiceError::startup(
                "classifier",
                "coefficients and intercept must be finite",
            ));
        }
        Ok(Self {
            coefficients,
            intercept,
        })
    }

    /// Raw decision value `w·x + b`
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.coefficients
            .iter()
            .zip(features.as_array())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }

    /// Probability of class 1
    pub fn probability(&self, features: &FeatureVector) -> f64 {
        1.0 / (1.0 + (-self.decision_function(features)).exp())
    }
}

impl BinaryClassifier for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> crate::Result<usize> {
        let decision = self.decision_function(features);
        if !decision.is_finite() {
            return Err(ServiceError::invalid_input(format!(
                "decision value {} is not finite",
                decision
            )));
        }
        log::debug!(
            "Logistic decision {:.4}, probability of class 1 {:.4}",
            decision,
            self.probability(features)
        );
        Ok(usize::from(decision > 0.0))
    }
}

/// Load a classifier artifact from a JSON file
pub fn load_classifier(path: impl AsRef<Path>) -> crate::Result<LogisticModel> {
    let path = path.as_ref();
    let artifact = format!("classifier '{}'", path.display());

    let text = fs::read_to_string(path).map_err(|e| ServiceError::startup(&artifact, e))?;
    let model = parse_classifier(&text).map_err(|e| match e {
        ServiceError::StartupFailure { reason, .. } => ServiceError::startup(&artifact, reason),
        other => other,
    })?;

    log::info!(
        "Loaded classifier from {} (intercept {:.4})",
        path.display(),
        model.intercept
    );
    Ok(model)
}

fn parse_classifier(text: &str) -> crate::Result<LogisticModel> {
    let artifact: ClassifierArtifact =
        serde_json::from_str(text).map_err(|e| ServiceError::startup("classifier", e))?;

    match artifact {
        ClassifierArtifact::LogisticRegression {
            coefficients,
            intercept,
        } => {
            let coefficients: [f64; N_FEATURES] = coefficients.try_into().map_err(|v: Vec<f64>| {
                ServiceError::startup(
                    "classifier",
                    format!("expected {} coefficients, got {}", N_FEATURES, v.len()),
                )
            })?;
            LogisticModel::new(coefficients, intercept)
        }
    }
}

/// Classify with the Setosa-vs-rest model (class 1 is Setosa)
pub fn classify_setosa(registry: &ModelRegistry, features: &FeatureVector) -> crate::Result<Label> {
    match registry.setosa_classifier().predict(features)? {
        1 => Ok(Label::Setosa),
        0 => Ok(Label::NotSetosa),
        other => Err(unexpected_class(other)),
    }
}

/// Classify with the Versicolor-vs-Virginica model (class 1 is Virginica)
///
/// Only meaningful for flowers that are not Setosa. That is not checked here;
/// the two classifiers are queried independently.
pub fn classify_versicolor_virginica(
    registry: &ModelRegistry,
    features: &FeatureVector,
) -> crate::Result<Label> {
    match registry.versicolor_virginica_classifier().predict(features)? {
        0 => Ok(Label::Versicolor),
        1 => Ok(Label::Virginica),
        other => Err(unexpected_class(other)),
    }
}

fn unexpected_class(class: usize) -> ServiceError {
    ServiceError::invalid_input(format!("classifier returned class {}", class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ReferenceDataset, Species};
    use ndarray::Array2;

    #[derive(Debug)]
    struct FixedClass(usize);

    impl BinaryClassifier for FixedClass {
        fn predict(&self, _features: &FeatureVector) -> crate::Result<usize> {
            Ok(self.0)
        }
    }

    fn create_test_registry(a: usize, b: usize) -> ModelRegistry {
        let features = Array2::from_shape_vec((2, 4), vec![5.1, 3.5, 1.4, 0.2, 6.3, 3.3, 6.0, 2.5]).unwrap();
        let dataset = ReferenceDataset::new(features, vec![Species::Setosa, Species::Virginica]).unwrap();
        ModelRegistry::new(Box::new(FixedClass(a)), Box::new(FixedClass(b)), dataset)
    }

    fn sample() -> FeatureVector {
        FeatureVector::new([5.1, 3.5, 1.4, 0.2]).unwrap()
    }

    #[test]
    fn test_setosa_label_mapping() {
        assert_eq!(classify_setosa(&create_test_registry(1, 0), &sample()).unwrap(), Label::Setosa);
        assert_eq!(classify_setosa(&create_test_registry(0, 0), &sample()).unwrap(), Label::NotSetosa);
    }

    #[test]
    fn test_versicolor_virginica_label_mapping() {
        assert_eq!(
            classify_versicolor_virginica(&create_test_registry(0, 0), &sample()).unwrap(),
            Label::Versicolor
        );
        assert_eq!(
            classify_versicolor_virginica(&create_test_registry(0, 1), &sample()).unwrap(),
            Label::Virginica
        );
    }

    #[test]
    fn test_out_of_domain_class_is_invalid_input() {
        let registry = create_test_registry(2, 7);
        assert!(matches!(
            classify_setosa(&registry, &sample()),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            classify_versicolor_virginica(&registry, &sample()),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_logistic_decision() {
        let model = LogisticModel::new([0.0, 0.0, -1.0, 0.0], 2.5).unwrap();
        let short_petal = FeatureVector::new([5.0, 3.0, 1.5, 0.2]).unwrap();
        let long_petal = FeatureVector::new([6.0, 3.0, 5.0, 1.8]).unwrap();

        assert_eq!(model.predict(&short_petal).unwrap(), 1);
        assert_eq!(model.predict(&long_petal).unwrap(), 0);
        assert!(model.probability(&short_petal) > 0.5);
    }

    #[test]
    fn test_overflowing_decision_is_invalid_input() {
        let model = LogisticModel::new([f64::MAX, f64::MAX, 0.0, 0.0], 0.0).unwrap();
        let features = FeatureVector::new([f64::MAX, f64::MAX, 0.0, 0.0]).unwrap();
        assert!(matches!(model.predict(&features), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_classifier_artifact() {
        let model = parse_classifier(
            r#"{"kind": "logistic_regression", "coefficients": [1.0, 2.0, 3.0, 4.0], "intercept": -1.5}"#,
        )
        .unwrap();
        assert_eq!(model.coefficients, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(model.intercept, -1.5);
    }

    #[test]
    fn test_parse_classifier_rejects_malformed() {
        let malformed = [
            "not json",
            r#"{"kind": "random_forest", "trees": []}"#,
            r#"{"kind": "logistic_regression", "coefficients": [1.0, 2.0], "intercept": 0.0}"#,
            r#"{"kind": "logistic_regression", "coefficients": [1.0, 2.0, 3.0, 4.0]}"#,
        ];
        for text in malformed {
            let err = parse_classifier(text).unwrap_err();
            assert!(err.is_fatal(), "{} should be a startup failure", text);
        }
    }
}
