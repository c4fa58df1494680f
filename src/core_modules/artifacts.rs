// THEORY:
// A model artifact is everything needed to turn a raw feature vector into a label:
//
//   features -> StandardScaler -> Pca -> classifier -> LabelEncoder -> class name
//
// On disk it is one self-describing JSON document per model. `ModelArtifactBundle`
// is the validated, immutable in-memory form: every shape is checked once at load, so
// applying a bundle to a well-formed feature vector can only fail on numeric grounds.

use crate::core_modules::classifier::{Classifier, ClassifierModel};
use crate::core_modules::feature_extractor::{FeatureVector, FEATURE_LENGTH};
use crate::error::{ChiliError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found}, expected {}", FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("malformed artifact: {0}")]
    Malformed(String),
}

// --- On-disk layout ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaParams {
    pub mean: Vec<f64>,
    /// One row per component, each `FEATURE_LENGTH` wide.
    pub components: Vec<Vec<f64>>,
}

/// A class as the encoder saw it during training: a string or an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Number(i64),
    Text(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Number(n) => write!(f, "{}", n),
            ClassLabel::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<ClassLabel>,
}

impl LabelEncoder {
    pub fn inverse_transform(&self, index: usize) -> Option<&ClassLabel> {
        self.classes.get(index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub format_version: u32,
    pub model: ClassifierModel,
    pub scaler: ScalerParams,
    pub pca: PcaParams,
    pub label_encoder: LabelEncoder,
    pub class_names: Vec<String>,
}

// --- Validated form ---

#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    fn from_params(params: ScalerParams) -> std::result::Result<Self, ArtifactError> {
        if params.mean.len() != FEATURE_LENGTH || params.scale.len() != FEATURE_LENGTH {
            return Err(ArtifactError::Malformed(format!(
                "scaler expects {} features, found mean {} / scale {}",
                FEATURE_LENGTH,
                params.mean.len(),
                params.scale.len()
            )));
        }
        // A zero scale marks a constant training feature; it passes through unscaled.
        let scale = params.scale.into_iter().map(|s| if s == 0.0 { 1.0 } else { s }).collect();
        Ok(Self { mean: Array1::from(params.mean), scale })
    }

    pub fn transform(&self, batch: ArrayView2<f64>) -> Array2<f64> {
        (&batch - &self.mean) / &self.scale
    }
}

#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    components: Array2<f64>,
}

impl Pca {
    fn from_params(params: PcaParams) -> std::result::Result<Self, ArtifactError> {
        let rows = params.components.len();
        if params.mean.len() != FEATURE_LENGTH || rows == 0 {
            return Err(ArtifactError::Malformed(format!(
                "pca needs a {}-wide mean and at least one component",
                FEATURE_LENGTH
            )));
        }
        if params.components.iter().any(|row| row.len() != FEATURE_LENGTH) {
            return Err(ArtifactError::Malformed(format!("pca components must be {} wide", FEATURE_LENGTH)));
        }
        let flat: Vec<f64> = params.components.into_iter().flatten().collect();
        let components = Array2::from_shape_vec((rows, FEATURE_LENGTH), flat)
            .map_err(|err| ArtifactError::Malformed(err.to_string()))?;
        Ok(Self { mean: Array1::from(params.mean), components })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn transform(&self, batch: ArrayView2<f64>) -> Array2<f64> {
        (&batch - &self.mean).dot(&self.components.t())
    }
}

/// Whether a model can report a posterior for its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbabilitySupport {
    Calibrated,
    Unsupported,
}

/// Outcome of applying a bundle to one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class_index: usize,
    pub label: String,
    pub probabilities: Option<Array1<f64>>,
}

#[derive(Debug, Clone)]
pub struct ModelArtifactBundle {
    pub classifier: ClassifierModel,
    pub scaler: StandardScaler,
    pub pca: Pca,
    pub label_encoder: LabelEncoder,
    pub class_names: Vec<String>,
    pub probability: ProbabilitySupport,
}

impl ModelArtifactBundle {
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, ArtifactError> {
        Self::from_file(serde_json::from_slice(bytes)?)
    }

    pub fn from_file(file: ArtifactFile) -> std::result::Result<Self, ArtifactError> {
        if file.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion { found: file.format_version });
        }
        file.model.validate().map_err(ArtifactError::Malformed)?;

        let scaler = StandardScaler::from_params(file.scaler)?;
        let pca = Pca::from_params(file.pca)?;
        if file.model.n_features() != pca.n_components() {
            return Err(ArtifactError::Malformed(format!(
                "classifier expects {} inputs but pca yields {}",
                file.model.n_features(),
                pca.n_components()
            )));
        }
        if file.label_encoder.classes.len() != file.model.n_classes() {
            return Err(ArtifactError::Malformed(format!(
                "label encoder has {} classes, classifier has {}",
                file.label_encoder.classes.len(),
                file.model.n_classes()
            )));
        }

        let probability = match &file.model {
            ClassifierModel::Svm(svm) if svm.probability.is_none() => ProbabilitySupport::Unsupported,
            _ => ProbabilitySupport::Calibrated,
        };

        let bundle = Self {
            classifier: file.model,
            scaler,
            pca,
            label_encoder: file.label_encoder,
            class_names: file.class_names,
            probability,
        };
        for index in 0..bundle.label_encoder.classes.len() {
            bundle.decode_label(index).map_err(|err| ArtifactError::Malformed(err.to_string()))?;
        }
        Ok(bundle)
    }

    /// Scaler then PCA, applied to the vector as a one-row batch.
    pub fn transform(&self, features: &FeatureVector) -> Result<Array1<f64>> {
        if features.len() != FEATURE_LENGTH {
            return Err(ChiliError::inference(format!(
                "expected {} features, got {}",
                FEATURE_LENGTH,
                features.len()
            )));
        }
        let batch = features.view().insert_axis(Axis(0));
        let reduced = self.pca.transform(self.scaler.transform(batch).view());
        let row = reduced.index_axis_move(Axis(0), 0);
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ChiliError::inference("projected features are not finite"));
        }
        Ok(row)
    }

    /// Maps an encoded class to a display name: the encoder's class if it is itself a
    /// known name, otherwise the class read as an index into `class_names`.
    pub fn decode_label(&self, class_index: usize) -> Result<String> {
        let class = self
            .label_encoder
            .inverse_transform(class_index)
            .ok_or_else(|| ChiliError::inference(format!("class index {} has no encoder entry", class_index)))?;
        let raw = class.to_string();
        if self.class_names.iter().any(|name| *name == raw) {
            return Ok(raw);
        }
        raw.parse::<usize>()
            .ok()
            .and_then(|index| self.class_names.get(index))
            .cloned()
            .ok_or_else(|| ChiliError::inference(format!("class {:?} matches no class name", raw)))
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<Classification> {
        let reduced = self.transform(features)?;
        let class_index = self.classifier.predict(reduced.view());
        let probabilities = match self.probability {
            ProbabilitySupport::Calibrated => self.classifier.predict_proba(reduced.view()),
            ProbabilitySupport::Unsupported => None,
        };
        let label = self.decode_label(class_index)?;
        Ok(Classification { class_index, label, probabilities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{knn_artifact, svm_artifact, CLASS_NAMES};

    #[test]
    fn valid_artifacts_load() {
        let svm = ModelArtifactBundle::from_file(svm_artifact(false)).unwrap();
        assert_eq!(svm.probability, ProbabilitySupport::Unsupported);
        let svm = ModelArtifactBundle::from_file(svm_artifact(true)).unwrap();
        assert_eq!(svm.probability, ProbabilitySupport::Calibrated);
        let knn = ModelArtifactBundle::from_file(knn_artifact()).unwrap();
        assert_eq!(knn.probability, ProbabilitySupport::Calibrated);
    }

    #[test]
    fn json_round_trip_preserves_the_file() {
        let file = knn_artifact();
        let json = serde_json::to_vec(&file).unwrap();
        let parsed: ArtifactFile = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, file);
        assert!(ModelArtifactBundle::from_json(&json).is_ok());
    }

    #[test]
    fn numeric_encoder_classes_index_class_names() {
        let bundle = ModelArtifactBundle::from_file(knn_artifact()).unwrap();
        for (index, name) in CLASS_NAMES.iter().enumerate() {
            assert_eq!(bundle.decode_label(index).unwrap(), *name);
        }
        assert!(bundle.decode_label(CLASS_NAMES.len()).is_err());
    }

    #[test]
    fn named_encoder_classes_are_used_verbatim() {
        let mut file = knn_artifact();
        file.label_encoder.classes = vec![
            ClassLabel::Text("Matang".into()),
            ClassLabel::Text("Belum Matang".into()),
            ClassLabel::Text("Setengah Matang".into()),
        ];
        let bundle = ModelArtifactBundle::from_file(file).unwrap();
        assert_eq!(bundle.decode_label(0).unwrap(), "Matang");
    }

    #[test]
    fn unresolvable_classes_are_rejected_at_load() {
        let mut file = knn_artifact();
        file.label_encoder.classes[2] = ClassLabel::Text("Busuk".into());
        assert!(matches!(ModelArtifactBundle::from_file(file), Err(ArtifactError::Malformed(_))));
    }

    #[test]
    fn shape_mismatches_are_rejected_at_load() {
        let mut file = knn_artifact();
        file.scaler.mean.pop();
        assert!(matches!(ModelArtifactBundle::from_file(file), Err(ArtifactError::Malformed(_))));

        let mut file = svm_artifact(false);
        file.pca.components.pop();
        assert!(matches!(ModelArtifactBundle::from_file(file), Err(ArtifactError::Malformed(_))));

        let mut file = knn_artifact();
        file.label_encoder.classes.pop();
        assert!(matches!(ModelArtifactBundle::from_file(file), Err(ArtifactError::Malformed(_))));

        let mut file = knn_artifact();
        file.format_version = 7;
        assert!(matches!(
            ModelArtifactBundle::from_file(file),
            Err(ArtifactError::UnsupportedVersion { found: 7 })
        ));
    }

    #[test]
    fn zero_scale_passes_features_through() {
        let mut file = knn_artifact();
        file.scaler.mean = vec![0.0; FEATURE_LENGTH];
        file.scaler.scale = vec![0.0; FEATURE_LENGTH];
        let bundle = ModelArtifactBundle::from_file(file).unwrap();
        let batch = Array2::from_elem((1, FEATURE_LENGTH), 3.0);
        let scaled = bundle.scaler.transform(batch.view());
        assert!(scaled.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn pca_projects_onto_component_rows() {
        let bundle = ModelArtifactBundle::from_file(knn_artifact()).unwrap();
        let mut batch = Array2::zeros((1, FEATURE_LENGTH));
        batch[[0, 0]] = 2.0;
        let projected = bundle.pca.transform(batch.view());
        assert_eq!(projected.dim(), (1, bundle.pca.n_components()));
    }
}
