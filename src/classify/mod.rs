//! Sound classification as seen from the pipeline.
//!
//! * [`SoundClassifier`]: async trait implemented by classifier backends.
//! * [`ApiClassifier`]: HTTP client for an audio-classification service.
//! * [`ClassificationAdapter`]: wraps any classifier; failures become an
//!   empty result so one channel can never abort a frame.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sound_radar::classify::{ApiClassifier, ClassificationAdapter};
//! use sound_radar::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let api = ApiClassifier::from_config(&config.classifier, 16_000);
//!     let adapter = ClassificationAdapter::new(Arc::new(api));
//!
//!     let result = adapter.classify(&vec![0.0; 16_000], 3).await;
//!     println!("{:?} in {:?}", result.predictions, result.latency);
//! }
//! ```

pub mod adapter;
pub mod classifier;

pub use adapter::{Classification, ClassificationAdapter};
pub use classifier::{ApiClassifier, ClassifyError, Prediction, SoundClassifier};
