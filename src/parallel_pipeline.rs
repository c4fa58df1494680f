// THEORY:
// Concurrency layer. A `WorkerPool` is a fixed set of named OS threads draining one
// shared job queue; async callers hand it a closure and await the answer on a oneshot
// channel, so image processing never blocks the tokio executor. A queued job whose
// caller has gone away (timeout, cancellation, failed sibling) is dropped unstarted.
//
// The `PredictionOrchestrator` fans one image out to both models on that pool and
// joins the two answers into a `PredictionPair`. Either failure fails the request.

use crate::config::EngineConfig;
use crate::core_modules::decoder::decode_image;
use crate::core_modules::registry::{ModelRegistry, ModelType};
use crate::error::{ChiliError, Result};
use crate::pipeline::{InferenceEngine, PredictionPair};
use futures::future::try_join;
use image::RgbImage;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    job_sender: Option<mpsc::UnboundedSender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (job_sender, job_receiver) = mpsc::unbounded_channel::<Job>();
        let job_receiver = Arc::new(Mutex::new(job_receiver));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = Arc::clone(&job_receiver);
            let worker = thread::Builder::new()
                .name(format!("chili-worker-{}", index))
                .spawn(move || Self::worker_loop(&receiver))?;
            workers.push(worker);
        }
        debug!(threads = size, "worker pool started");

        Ok(Self { job_sender: Some(job_sender), workers })
    }

    fn worker_loop(receiver: &Mutex<mpsc::UnboundedReceiver<Job>>) {
        loop {
            let job = {
                let mut queue = match receiver.lock() {
                    Ok(queue) => queue,
                    Err(poisoned) => poisoned.into_inner(),
                };
                queue.blocking_recv()
            };
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Runs `job` on a worker thread. Panics come back as `ChiliError::Inference`.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .job_sender
            .as_ref()
            .ok_or_else(|| ChiliError::inference("worker pool is shut down"))?;
        let (result_sender, result_receiver) = oneshot::channel::<Result<T>>();

        let task: Job = Box::new(move || {
            if result_sender.is_closed() {
                debug!("caller went away, skipping queued job");
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "job panicked on worker thread");
                Err(ChiliError::inference(format!("worker panicked: {}", message)))
            });
            if result_sender.send(outcome).is_err() {
                debug!("caller went away, discarding finished job");
            }
        });

        sender
            .send(task)
            .map_err(|_| ChiliError::inference("failed to send job to worker pool"))?;
        result_receiver
            .await
            .map_err(|_| ChiliError::inference("worker dropped the job"))?
    }

    /// Stops accepting jobs, lets queued ones finish and joins every worker.
    pub fn shutdown(mut self) {
        self.job_sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop once it drains.
        self.job_sender.take();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct PredictionOrchestrator {
    engine: Arc<InferenceEngine>,
    request_timeout: Option<Duration>,
}

impl PredictionOrchestrator {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine, request_timeout: None }
    }

    pub fn from_config(config: &EngineConfig) -> std::io::Result<Self> {
        let registry = Arc::new(ModelRegistry::from_dir(&config.models_dir));
        let pool = Arc::new(WorkerPool::new(config.worker_threads)?);
        info!(
            models_dir = %config.models_dir.display(),
            worker_threads = pool.size(),
            timeout_ms = config.request_timeout.map(|t| t.as_millis() as u64),
            "prediction orchestrator configured"
        );
        Ok(Self::new(Arc::new(InferenceEngine::new(registry, pool))).with_timeout(config.request_timeout))
    }

    pub fn with_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn engine(&self) -> &Arc<InferenceEngine> {
        &self.engine
    }

    /// Loads every model now instead of on the first request.
    pub async fn warm_up(&self) -> Result<()> {
        for model_type in ModelType::ALL {
            self.engine.registry().get(model_type).await?;
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.engine.registry().is_initialized()
    }

    /// Both models on the same image, concurrently.
    pub async fn predict_all(&self, image: Arc<RgbImage>) -> Result<PredictionPair> {
        let svm = self.engine.predict(Arc::clone(&image), ModelType::Svm);
        let knn = self.engine.predict(image, ModelType::Knn);
        let (svm, knn) = try_join(svm, knn).await?;
        Ok(PredictionPair { svm, knn })
    }

    pub async fn predict_all_within(&self, image: Arc<RgbImage>, timeout: Duration) -> Result<PredictionPair> {
        bounded(timeout, self.predict_all(image)).await
    }

    /// `predict_all` under the configured timeout, for callers that already hold the image.
    pub async fn predict_image(&self, image: Arc<RgbImage>) -> Result<PredictionPair> {
        match self.request_timeout {
            Some(timeout) => bounded(timeout, self.predict_all(image)).await,
            None => self.predict_all(image).await,
        }
    }

    /// Decodes on the worker pool, then predicts; the configured timeout covers both.
    pub async fn predict_bytes(&self, bytes: Vec<u8>) -> Result<PredictionPair> {
        let request = async move {
            let pool = self.engine.pool();
            let image = pool.run(move || decode_image(&bytes)).await?;
            debug!(width = image.width(), height = image.height(), "image decoded");
            self.predict_all(Arc::new(image)).await
        };
        match self.request_timeout {
            Some(timeout) => bounded(timeout, request).await,
            None => request.await,
        }
    }
}

async fn bounded<T>(timeout: Duration, request: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "prediction abandoned after timeout");
            Err(ChiliError::Timeout(timeout))
        }
    }
}
