// THEORY:
// This file is the main entry point for the `chili_ripeness` library crate. It exports
// the `PredictionOrchestrator` and its result types as the high-level interface: hand
// it image bytes (or a decoded `RgbImage`) and get back one labelled, timed answer per
// model. The image-processing and model internals live in `core_modules`, where each
// stage is a pure function that can be tested on its own.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use core_modules::registry::{ModelRegistry, ModelType};
pub use error::{ChiliError, ModelNotFoundError, Result};
pub use parallel_pipeline::{PredictionOrchestrator, WorkerPool};
pub use pipeline::{InferenceEngine, PredictionPair, PredictionResult};
