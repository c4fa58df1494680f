//! Fixtures shared by the unit tests: synthetic images and small deterministic models.

use crate::core_modules::artifacts::{ArtifactFile, ClassLabel, LabelEncoder, PcaParams, ScalerParams, FORMAT_VERSION};
use crate::core_modules::classifier::{ClassifierModel, Kernel, KnnModel, NeighbourWeights, PlattParameters, SvmModel};
use crate::core_modules::color_histogram::COLOR_FEATURES;
use crate::core_modules::feature_extractor::FEATURE_LENGTH;
use crate::core_modules::registry::ModelType;
use image::{Rgb, RgbImage};
use std::path::Path;

pub const CLASS_NAMES: [&str; 3] = ["Belum Matang", "Matang", "Setengah Matang"];

/// `(min_x, min_y, max_x, max_y)` of the filled ellipse in `red_ellipse_on_green`.
pub const ELLIPSE_BOUNDS: (u32, u32, u32, u32) = (90, 60, 210, 140);

/// 300x200 red ellipse (center 150,100, semi-axes 60 and 40) on a green backdrop.
pub fn red_ellipse_on_green() -> RgbImage {
    RgbImage::from_fn(300, 200, |x, y| {
        let u = (x as f64 - 150.0) / 60.0;
        let v = (y as f64 - 100.0) / 40.0;
        if u * u + v * v <= 1.0 { Rgb([220, 20, 30]) } else { Rgb([40, 160, 60]) }
    })
}

/// A second, clearly different input for cross-talk checks.
pub fn orange_disk_on_brown() -> RgbImage {
    RgbImage::from_fn(240, 240, |x, y| {
        let inside = (x as f64 - 110.0).hypot(y as f64 - 130.0) <= 70.0;
        if inside { Rgb([240, 120, 20]) } else { Rgb([110, 70, 40]) }
    })
}

fn scaler() -> ScalerParams {
    ScalerParams { mean: vec![0.0; FEATURE_LENGTH], scale: vec![1.0; FEATURE_LENGTH] }
}

/// Two components: total hue mass in the red end of the histogram minus the green
/// middle, and the mean shape signature.
fn pca() -> PcaParams {
    let mut hue = vec![0.0; FEATURE_LENGTH];
    for bin in 0..16 {
        hue[bin] = if bin < 2 || bin >= 14 { 1.0 } else { -1.0 };
    }
    let mut shape = vec![0.0; FEATURE_LENGTH];
    for value in shape.iter_mut().skip(COLOR_FEATURES).take(32) {
        *value = 1.0 / 32.0;
    }
    PcaParams { mean: vec![0.0; FEATURE_LENGTH], components: vec![hue, shape] }
}

fn label_encoder() -> LabelEncoder {
    LabelEncoder { classes: (0..CLASS_NAMES.len()).map(|i| ClassLabel::Text(i.to_string())).collect() }
}

pub fn svm_artifact(with_probability: bool) -> ArtifactFile {
    let model = SvmModel {
        kernel: Kernel::Linear,
        support_vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
        n_support: vec![1, 1, 1],
        dual_coef: vec![vec![1.0, -1.0, -1.0], vec![1.0, 1.0, -1.0]],
        intercept: vec![0.1, -0.2, 0.3],
        probability: with_probability.then(|| PlattParameters { prob_a: vec![-2.0; 3], prob_b: vec![0.0; 3] }),
    };
    ArtifactFile {
        format_version: FORMAT_VERSION,
        model: ClassifierModel::Svm(model),
        scaler: scaler(),
        pca: pca(),
        label_encoder: label_encoder(),
        class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn knn_artifact() -> ArtifactFile {
    let model = KnnModel {
        k: 3,
        weights: NeighbourWeights::Distance,
        p: 2.0,
        fit_x: vec![
            vec![-0.5, 0.0],
            vec![-0.4, 0.9],
            vec![0.5, 0.8],
            vec![0.6, 0.9],
            vec![0.0, 0.5],
            vec![0.1, 0.4],
        ],
        fit_y: vec![0, 0, 1, 1, 2, 2],
        n_classes: CLASS_NAMES.len(),
    };
    ArtifactFile {
        format_version: FORMAT_VERSION,
        model: ClassifierModel::Knn(model),
        scaler: scaler(),
        pca: pca(),
        label_encoder: label_encoder(),
        class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn write_artifact(dir: &Path, model_type: ModelType, file: &ArtifactFile) {
    let bytes = serde_json::to_vec_pretty(file).expect("serialize artifact");
    std::fs::write(dir.join(model_type.file_name()), bytes).expect("write artifact");
}

/// Writes both model files and returns the directory guard.
pub fn artifact_dir(svm_probability: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write_artifact(dir.path(), ModelType::Svm, &svm_artifact(svm_probability));
    write_artifact(dir.path(), ModelType::Knn, &knn_artifact());
    dir
}
