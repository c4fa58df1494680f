// THEORY:
// The `ModelRegistry` owns the process-wide model cache. The first `get` loads every
// model type in one go on tokio's blocking pool. The load runs inside a `OnceLock` on
// that blocking thread, not inside the caller's future: a first caller that times out
// or is cancelled leaves the load running, and every later caller waits on the same
// lock, so each artifact is read at most once. The outcome is remembered either way:
// a missing or malformed artifact is a deployment error, and retrying on every request
// would only hide it.

use crate::core_modules::artifacts::{ArtifactError, ModelArtifactBundle};
use crate::error::{ModelNotFoundError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Svm,
    Knn,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Svm, ModelType::Knn];

    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelType::Svm => "svm",
            ModelType::Knn => "knn",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_model.json", self.file_stem())
    }

    /// Name reported in prediction results.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Svm => "SVM",
            ModelType::Knn => "KNN",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where bundles come from. Implementations are called from a blocking thread.
pub trait ArtifactSource: Send + Sync + 'static {
    fn location(&self, model_type: ModelType) -> PathBuf;
    fn load(&self, model_type: ModelType) -> std::result::Result<ModelArtifactBundle, ArtifactError>;
}

/// Reads `<models_dir>/<model_type>_model.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactSource {
    models_dir: PathBuf,
}

impl FileArtifactSource {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self { models_dir: models_dir.into() }
    }
}

impl ArtifactSource for FileArtifactSource {
    fn location(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.file_name())
    }

    fn load(&self, model_type: ModelType) -> std::result::Result<ModelArtifactBundle, ArtifactError> {
        let bytes = std::fs::read(self.location(model_type))?;
        ModelArtifactBundle::from_json(&bytes)
    }
}

type BundleMap = HashMap<ModelType, Arc<ModelArtifactBundle>>;
type LoadOutcome = std::result::Result<Arc<BundleMap>, ModelNotFoundError>;

pub struct ModelRegistry {
    source: Arc<dyn ArtifactSource>,
    bundles: Arc<OnceLock<LoadOutcome>>,
}

impl ModelRegistry {
    pub fn new(source: impl ArtifactSource) -> Self {
        Self { source: Arc::new(source), bundles: Arc::new(OnceLock::new()) }
    }

    pub fn from_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self::new(FileArtifactSource::new(models_dir))
    }

    /// The bundle for `model_type`, loading every model on first use.
    pub async fn get(&self, model_type: ModelType) -> Result<Arc<ModelArtifactBundle>> {
        let loaded = match self.bundles.get() {
            Some(loaded) => loaded.clone(),
            None => self.initialize().await,
        };
        let bundles = loaded?;
        bundles.get(&model_type).cloned().ok_or_else(|| {
            ModelNotFoundError {
                model_type: model_type.to_string(),
                path: self.source.location(model_type),
                reason: "not loaded".to_string(),
            }
            .into()
        })
    }

    /// True once every model has loaded successfully.
    pub fn is_initialized(&self) -> bool {
        matches!(self.bundles.get(), Some(Ok(_)))
    }

    /// The cached load failure, if loading has been attempted and failed.
    pub fn load_error(&self) -> Option<&ModelNotFoundError> {
        self.bundles.get().and_then(|loaded| loaded.as_ref().err())
    }

    async fn initialize(&self) -> LoadOutcome {
        let cell = Arc::clone(&self.bundles);
        let source = Arc::clone(&self.source);
        let loading = tokio::task::spawn_blocking(move || cell.get_or_init(|| load_all(source.as_ref())).clone());

        match loading.await {
            Ok(outcome) => outcome,
            // A panicking loader leaves the lock empty; nothing is cached.
            Err(join_error) => Err(ModelNotFoundError {
                model_type: "all".to_string(),
                path: self.source.location(ModelType::Svm),
                reason: format!("loader task failed: {}", join_error),
            }),
        }
    }
}

fn load_all(source: &dyn ArtifactSource) -> LoadOutcome {
    let mut bundles = HashMap::with_capacity(ModelType::ALL.len());
    for model_type in ModelType::ALL {
        let started = Instant::now();
        let path = source.location(model_type);
        let bundle = match source.load(model_type) {
            Ok(bundle) => bundle,
            Err(err) => {
                let err = ModelNotFoundError { model_type: model_type.to_string(), path, reason: err.to_string() };
                error!(error = %err, "model registry failed to initialize");
                return Err(err);
            }
        };
        info!(
            model = %model_type,
            path = %path.display(),
            components = bundle.pca.n_components(),
            classes = bundle.class_names.len(),
            probability = ?bundle.probability,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model artifact loaded"
        );
        bundles.insert(model_type, Arc::new(bundle));
    }
    Ok(Arc::new(bundles))
}
