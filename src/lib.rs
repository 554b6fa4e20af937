//! IrisForge: iris species classification and on-demand K-Means cluster plots
//!
//! This library loads two pre-trained binary classifiers and the iris
//! reference dataset once, validates incoming feature records, dispatches
//! them to the right classifier, and clusters the reference dataset into
//! a scatter plot returned as an inline PNG data URI.

pub mod classifier;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod registry;
pub mod service;
pub mod validate;
pub mod viz;

// Re-export public items for easier access
pub use classifier::{classify_setosa, classify_versicolor_virginica, BinaryClassifier, Label, LogisticModel};
pub use cli::Args;
pub use data::{load_reference_dataset, FeatureVector, ReferenceDataset, Species};
pub use error::ServiceError;
pub use model::{cluster, ClusterAssignment, ClusterConfig};
pub use registry::{ModelRegistry, RegistryConfig};
pub use service::{Response, Service, ServiceRequest};
pub use viz::{render, ImagePayload, RenderConfig};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ServiceError>;
