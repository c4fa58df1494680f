// THEORY:
// The `pipeline` module is the single-model API of the engine. `InferenceEngine`
// takes a decoded image and one `ModelType` and runs the full stack:
//
//   Preprocessor -> FeatureExtractor -> bundle (scaler, pca, classifier, labels)
//
// The CPU-heavy part runs on the shared `WorkerPool`, never on the async executor. The
// registry is injected, so every engine in a process can share one model cache.

use crate::core_modules::artifacts::{ModelArtifactBundle, ProbabilitySupport};
use crate::core_modules::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::core_modules::preprocessor::{PreprocessedImage, Preprocessor};
use crate::core_modules::registry::{ModelRegistry, ModelType};
use crate::error::Result;
use crate::parallel_pipeline::WorkerPool;
use image::RgbImage;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// The answer of one model for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "model")]
    pub model_name: String,
    pub label: String,
    /// In `[0, 1]`, three decimals.
    pub confidence: f64,
    pub duration_ms: u64,
}

/// Both models' answers for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPair {
    pub svm: PredictionResult,
    pub knn: PredictionResult,
}

pub fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Max posterior for calibrated models, exactly 1.0 otherwise.
pub fn confidence(support: ProbabilitySupport, probabilities: Option<&Array1<f64>>) -> f64 {
    match (support, probabilities) {
        (ProbabilitySupport::Calibrated, Some(probabilities)) => {
            let best = probabilities.iter().cloned().fold(0.0f64, f64::max);
            round_to_millis(best.clamp(0.0, 1.0))
        }
        _ => 1.0,
    }
}

pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    pool: Arc<WorkerPool>,
    preprocessor: Arc<Preprocessor>,
    extractor: Arc<FeatureExtractor>,
}

impl InferenceEngine {
    pub fn new(registry: Arc<ModelRegistry>, pool: Arc<WorkerPool>) -> Self {
        Self {
            registry,
            pool,
            preprocessor: Arc::new(Preprocessor::new()),
            extractor: Arc::new(FeatureExtractor),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub async fn predict(&self, image: Arc<RgbImage>, model_type: ModelType) -> Result<PredictionResult> {
        let bundle = self.registry.get(model_type).await?;
        let preprocessor = Arc::clone(&self.preprocessor);
        let extractor = Arc::clone(&self.extractor);

        let result = self
            .pool
            .run(move || infer(&preprocessor, &extractor, &bundle, &image, model_type))
            .await;
        if let Err(err) = &result {
            warn!(model = %model_type, error = %err, "prediction failed");
        }
        result
    }

    /// Preprocessing output alone, for inspection and debugging dumps.
    pub async fn preprocess(&self, image: Arc<RgbImage>) -> Result<PreprocessedImage> {
        let preprocessor = Arc::clone(&self.preprocessor);
        self.pool.run(move || Ok(preprocessor.run(&image))).await
    }

    pub async fn features(&self, image: Arc<RgbImage>) -> Result<FeatureVector> {
        let preprocessor = Arc::clone(&self.preprocessor);
        let extractor = Arc::clone(&self.extractor);
        self.pool.run(move || Ok(extractor.extract(&preprocessor.run(&image)))).await
    }
}

/// The synchronous body of one prediction. `duration_ms` includes preprocessing: the
/// clock starts before `Preprocessor::run` and stops after label decoding.
pub fn infer(
    preprocessor: &Preprocessor,
    extractor: &FeatureExtractor,
    bundle: &ModelArtifactBundle,
    image: &RgbImage,
    model_type: ModelType,
) -> Result<PredictionResult> {
    let started = Instant::now();

    // Stage 1: Image processing
    let processed = preprocessor.run(image);

    // Stage 2: Feature extraction
    let features = extractor.extract(&processed);

    // Stage 3: Model
    let classification = bundle.classify(&features)?;
    let confidence = confidence(bundle.probability, classification.probabilities.as_ref());

    let duration_ms = started.elapsed().as_millis() as u64;
    debug!(
        model = %model_type,
        label = %classification.label,
        confidence,
        duration_ms,
        mask = ?processed.mask_origin,
        "prediction complete"
    );

    Ok(PredictionResult {
        model_name: model_type.display_name().to_string(),
        label: classification.label,
        confidence,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::artifacts::ModelArtifactBundle;
    use crate::test_support::{artifact_dir, knn_artifact, red_ellipse_on_green, svm_artifact, CLASS_NAMES};
    use ndarray::array;

    #[test]
    fn confidence_rules() {
        let p = array![0.12345, 0.87655];
        assert_eq!(confidence(ProbabilitySupport::Calibrated, Some(&p)), 0.877);
        assert_eq!(confidence(ProbabilitySupport::Unsupported, Some(&p)), 1.0);
        assert_eq!(confidence(ProbabilitySupport::Unsupported, None), 1.0);
        assert_eq!(confidence(ProbabilitySupport::Calibrated, Some(&array![1.2, -0.1])), 1.0);
    }

    #[test]
    fn rounding_keeps_three_decimals() {
        assert_eq!(round_to_millis(0.33333), 0.333);
        assert_eq!(round_to_millis(0.6667), 0.667);
        assert_eq!(round_to_millis(1.0), 1.0);
    }

    #[test]
    fn serialized_result_uses_wire_names() {
        let result = PredictionResult {
            model_name: "SVM".into(),
            label: "Matang".into(),
            confidence: 0.5,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["model"], "SVM");
        assert_eq!(json["duration_ms"], 12);
        assert!(json.get("model_name").is_none());
    }

    #[test]
    fn infer_without_probability_reports_full_confidence() {
        let bundle = ModelArtifactBundle::from_file(svm_artifact(false)).unwrap();
        let result = infer(&Preprocessor::new(), &FeatureExtractor, &bundle, &red_ellipse_on_green(), ModelType::Svm)
            .unwrap();
        assert_eq!(result.model_name, "SVM");
        assert_eq!(result.confidence, 1.0);
        assert!(CLASS_NAMES.contains(&result.label.as_str()));
    }

    #[test]
    fn infer_with_probability_reports_a_posterior() {
        for (model_type, file) in [(ModelType::Svm, svm_artifact(true)), (ModelType::Knn, knn_artifact())] {
            let bundle = ModelArtifactBundle::from_file(file).unwrap();
            let result =
                infer(&Preprocessor::new(), &FeatureExtractor, &bundle, &red_ellipse_on_green(), model_type).unwrap();
            assert!((0.0..=1.0).contains(&result.confidence));
            assert_eq!(round_to_millis(result.confidence), result.confidence);
        }
    }

    #[tokio::test]
    async fn engine_predicts_through_the_registry() {
        let dir = artifact_dir(true);
        let registry = Arc::new(ModelRegistry::from_dir(dir.path()));
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let engine = InferenceEngine::new(registry, pool);

        let image = Arc::new(red_ellipse_on_green());
        let knn = engine.predict(Arc::clone(&image), ModelType::Knn).await.unwrap();
        assert_eq!(knn.model_name, "KNN");
        assert!(CLASS_NAMES.contains(&knn.label.as_str()));
        assert!(engine.registry().is_initialized());

        let features = engine.features(image).await.unwrap();
        assert_eq!(features.len(), crate::core_modules::feature_extractor::FEATURE_LENGTH);
    }
}
