//! Request boundary: the three operations exposed to the transport layer
//!
//! Every operation takes an untyped JSON value and returns a [`Response`];
//! errors never escape past this point. A [`Service`] is cheap to clone and
//! can be shared across threads, all clones reading the same registry.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::{classify_setosa, classify_versicolor_virginica, Label};
use crate::data::FeatureVector;
use crate::error::ServiceError;
use crate::model::{cluster, ClusterConfig};
use crate::registry::ModelRegistry;
use crate::validate::parse_cluster_count;
use crate::viz::{render, ImagePayload, RenderConfig};

/// Uniform response shape of every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Prediction { prediction: String },
    Plot { plot_url: String },
    Error { error: String },
}

impl Response {
    pub fn error(err: &ServiceError) -> Self {
        Response::Error {
            error: err.public_message(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// HTTP status a transport layer should attach
    pub fn status_code(&self) -> u16 {
        if self.is_error() {
            400
        } else {
            200
        }
    }
}

impl From<crate::Result<Label>> for Response {
    fn from(result: crate::Result<Label>) -> Self {
        match result {
            Ok(label) => Response::Prediction {
                prediction: label.as_str().to_string(),
            },
            Err(err) => Response::error(&err),
        }
    }
}

impl From<crate::Result<ImagePayload>> for Response {
    fn from(result: crate::Result<ImagePayload>) -> Self {
        match result {
            Ok(payload) => Response::Plot {
                plot_url: payload.to_data_uri(),
            },
            Err(err) => Response::error(&err),
        }
    }
}

/// One line of batch input, e.g. `{"op": "compute_clusters", "payload": {"k": 3}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum ServiceRequest {
    PredictSetosa(Value),
    PredictVersicolorVirginica(Value),
    ComputeClusters(Value),
}

/// Handle to the shared registry plus clustering and rendering settings
#[derive(Debug, Clone)]
pub struct Service {
    registry: Arc<ModelRegistry>,
    cluster_config: ClusterConfig,
    render_config: RenderConfig,
}

impl Service {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self::with_config(registry, ClusterConfig::default(), RenderConfig::default())
    }

    pub fn with_config(
        registry: Arc<ModelRegistry>,
        cluster_config: ClusterConfig,
        render_config: RenderConfig,
    ) -> Self {
        Self {
            registry,
            cluster_config,
            render_config,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn cluster_config(&self) -> &ClusterConfig {
        &self.cluster_config
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    /// `{"prediction": "Setosa" | "Not Setosa"}` or `{"error": "Invalid Input"}`
    pub fn predict_setosa(&self, record: &Value) -> Response {
        let result = FeatureVector::from_record(record).and_then(|features| classify_setosa(&self.registry, &features));
        log_failure("predict_setosa", &result);
        result.into()
    }

    /// `{"prediction": "Versicolor" | "Virginica"}` or `{"error": "Invalid Input"}`
    pub fn predict_versicolor_virginica(&self, record: &Value) -> Response {
        let result = FeatureVector::from_record(record)
            .and_then(|features| classify_versicolor_virginica(&self.registry, &features));
        log_failure("predict_versicolor_virginica", &result);
        result.into()
    }

    /// `{"plot_url": "data:image/png;base64,..."}` or `{"error": ...}`
    pub fn compute_clusters(&self, request: &Value) -> Response {
        let result = self.cluster_plot(request);
        log_failure("compute_clusters", &result);
        result.into()
    }

    /// Run clustering and rendering, returning the raw payload
    pub fn cluster_plot(&self, request: &Value) -> crate::Result<ImagePayload> {
        let k = parse_cluster_count(request)?;
        let dataset = self.registry.dataset();
        let assignment = cluster(k, dataset, &self.cluster_config)?;
        render(dataset, &assignment, assignment.n_clusters, &self.render_config)
    }

    /// Dispatch a typed request to its operation
    pub fn handle(&self, request: &ServiceRequest) -> Response {
        match request {
            ServiceRequest::PredictSetosa(record) => self.predict_setosa(record),
            ServiceRequest::PredictVersicolorVirginica(record) => self.predict_versicolor_virginica(record),
            ServiceRequest::ComputeClusters(request) => self.compute_clusters(request),
        }
    }

    /// Parse and answer one JSON request line
    pub fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<ServiceRequest>(line) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                log::debug!("Rejected malformed request line: {}", e);
                Response::Error {
                    error: format!("Malformed request: {}", e),
                }
            }
        }
    }

    /// Answer many request lines in parallel, keeping input order
    pub fn handle_batch<S: AsRef<str> + Sync>(&self, lines: &[S]) -> Vec<Response> {
        lines.par_iter().map(|line| self.handle_line(line.as_ref())).collect()
    }
}

fn log_failure<T>(operation: &str, result: &crate::Result<T>) {
    match result {
        Err(err @ ServiceError::InvalidInput(_)) => log::debug!("{} rejected: {}", operation, err),
        Err(err) => log::warn!("{} failed: {}", operation, err),
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::BinaryClassifier;
    use crate::data::{ReferenceDataset, Species};
    use ndarray::Array2;
    use serde_json::json;

    /// Class 1 when the petal length falls on the `above` side of `threshold`
    #[derive(Debug)]
    struct PetalCut {
        threshold: f64,
        above: bool,
    }

    impl BinaryClassifier for PetalCut {
        fn predict(&self, features: &FeatureVector) -> crate::Result<usize> {
            Ok(usize::from((features.petal_length() > self.threshold) == self.above))
        }
    }

    fn create_test_service() -> Service {
        let mut values = Vec::new();
        let mut species = Vec::new();
        for i in 0..12 {
            let offset = i as f64 * 0.05;
            let (row, label) = match i % 3 {
                0 => ([5.0 + offset, 3.4, 1.4, 0.2], Species::Setosa),
                1 => ([6.0 + offset, 2.8, 4.4, 1.4], Species::Versicolor),
                _ => ([7.0 + offset, 3.0, 6.0, 2.2], Species::Virginica),
            };
            values.extend_from_slice(&row);
            species.push(label);
        }
        let features = Array2::from_shape_vec((12, 4), values).unwrap();
        let dataset = ReferenceDataset::new(features, species).unwrap();

        let setosa = PetalCut {
            threshold: 2.5,
            above: false,
        };
        let virginica = PetalCut {
            threshold: 5.0,
            above: true,
        };
        let registry = ModelRegistry::new(Box::new(setosa), Box::new(virginica), dataset);
        Service::new(Arc::new(registry))
    }

    fn record(petal_length: f64) -> Value {
        json!({
            "sepal_length": 5.8,
            "sepal_width": 3.0,
            "petal_length": petal_length,
            "petal_width": 1.0
        })
    }

    #[test]
    fn test_predict_setosa() {
        let service = create_test_service();
        assert_eq!(
            service.predict_setosa(&record(1.4)),
            Response::Prediction {
                prediction: "Setosa".to_string()
            }
        );
        assert_eq!(
            service.predict_setosa(&record(4.5)),
            Response::Prediction {
                prediction: "Not Setosa".to_string()
            }
        );
    }

    #[test]
    fn test_predict_versicolor_virginica() {
        let service = create_test_service();
        assert_eq!(
            service.predict_versicolor_virginica(&record(4.5)),
            Response::Prediction {
                prediction: "Versicolor".to_string()
            }
        );
        assert_eq!(
            service.predict_versicolor_virginica(&record(5.8)),
            Response::Prediction {
                prediction: "Virginica".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_record_gives_generic_error() {
        let service = create_test_service();
        let response = service.predict_setosa(&json!({"sepal_length": 5.1}));

        assert_eq!(
            response,
            Response::Error {
                error: "Invalid Input".to_string()
            }
        );
        assert_eq!(response.status_code(), 400);
    }

    #[test]
    fn test_compute_clusters() {
        let service = create_test_service();
        let response = service.compute_clusters(&json!({"k": 3}));

        match &response {
            Response::Plot { plot_url } => {
                let encoded = plot_url.strip_prefix("data:image/png;base64,").unwrap();
                assert!(!encoded.is_empty());
            }
            other => panic!("expected a plot, got {:?}", other),
        }
        assert_eq!(response.status_code(), 200);
    }

    #[test]
    fn test_compute_clusters_out_of_range() {
        let service = create_test_service();
        for k in [
            json!(1),
            json!(11),
            json!("0"),
            json!(u64::MAX),
            json!("99999999999999999999"),
            json!("-99999999999999999999"),
        ] {
            assert_eq!(
                service.compute_clusters(&json!({ "k": k })),
                Response::Error {
                    error: "k must be between 2 and 10".to_string()
                }
            );
        }
    }

    #[test]
    fn test_render_and_clustering_failures_keep_their_message() {
        let render_failure: crate::Result<ImagePayload> = Err(ServiceError::render("boom"));
        assert_eq!(
            Response::from(render_failure),
            Response::Error {
                error: "boom".to_string()
            }
        );

        let clustering_failure: crate::Result<ImagePayload> =
            Err(ServiceError::ClusteringFailure("empty cluster".to_string()));
        let response = Response::from(clustering_failure);
        assert_eq!(
            response,
            Response::Error {
                error: "empty cluster".to_string()
            }
        );
        assert_eq!(response.status_code(), 400);
    }

    #[test]
    fn test_compute_clusters_bad_k() {
        let service = create_test_service();
        let response = service.compute_clusters(&json!({"k": "many"}));
        assert!(response.is_error());
    }

    #[test]
    fn test_response_serialization() {
        let prediction = Response::Prediction {
            prediction: "Setosa".to_string(),
        };
        assert_eq!(serde_json::to_value(&prediction).unwrap(), json!({"prediction": "Setosa"}));

        let error = Response::Error {
            error: "Invalid Input".to_string(),
        };
        assert_eq!(serde_json::to_value(&error).unwrap(), json!({"error": "Invalid Input"}));
    }

    #[test]
    fn test_handle_batch_keeps_order() {
        let service = create_test_service();
        let lines = vec![
            r#"{"op": "predict_setosa", "payload": {"sepal_length": 5.1, "sepal_width": 3.5, "petal_length": 1.4, "petal_width": 0.2}}"#,
            r#"{"op": "compute_clusters", "payload": {"k": 11}}"#,
            r#"{"op": "predict_versicolor_virginica", "payload": {"sepal_length": 6.5, "sepal_width": 3.0, "petal_length": 5.5, "petal_width": 1.8}}"#,
            r#"not json"#,
            r#"{"op": "compute_clusters", "payload": {"k": 2}}"#,
        ];

        let responses = service.handle_batch(&lines);
        assert_eq!(responses.len(), 5);
        assert_eq!(
            responses[0],
            Response::Prediction {
                prediction: "Setosa".to_string()
            }
        );
        assert!(responses[1].is_error());
        assert_eq!(
            responses[2],
            Response::Prediction {
                prediction: "Virginica".to_string()
            }
        );
        assert!(responses[3].is_error());
        assert!(matches!(responses[4], Response::Plot { .. }));
    }
}
