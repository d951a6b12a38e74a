//! Bounded-concurrency thumbnail generation.
//!
//! Threading model:
//! - `run` returns at once; a dispatch job on the pool answers cache hits
//!   without touching the rasterizer
//! - misses are spawned on the same dedicated rayon pool, whose size is the
//!   worker ceiling from [`AppConfig`](crate::config::AppConfig)
//! - every job sends exactly one [`JobResult`] on the sink channel, whatever
//!   happens to the document (including a rasterizer panic)

use crate::config::RASTER_ZOOM_FACTOR;
use crate::document::{Document, Epoch, JobOutcome, JobResult};
use crate::error::{AppError, RasterError, Result};
use crate::file_utils::PathExt;
use crate::rasterizer::Rasterizer;
use crate::thumbnail_cache::ThumbnailCache;
use log::{debug, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Shared view of the active epoch.
///
/// The controller advances it; workers read it to skip jobs that were
/// superseded before they started.
#[derive(Debug, Clone, Default)]
pub struct EpochGate {
    current: Arc<AtomicU64>,
}

impl EpochGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_to(&self, epoch: Epoch) {
        self.current.store(epoch.value(), Ordering::Release);
    }

    pub fn current(&self) -> Epoch {
        Epoch::new(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}

/// Everything a worker needs, cloned once per job.
#[derive(Clone)]
struct JobContext {
    cache: Arc<ThumbnailCache>,
    rasterizer: Arc<dyn Rasterizer>,
    gate: EpochGate,
    zoom: f32,
}

/// Produces or fetches the thumbnail of every document in a batch.
pub struct GenerationPipeline {
    context: JobContext,
    pool: rayon::ThreadPool,
}

impl GenerationPipeline {
    /// Creates a pipeline with at most `max_workers` concurrent renders.
    pub fn new(
        cache: Arc<ThumbnailCache>,
        rasterizer: Arc<dyn Rasterizer>,
        max_workers: usize,
        gate: EpochGate,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .thread_name(|i| format!("thumbnail-worker-{}", i))
            .build()
            .map_err(|e| AppError::WorkerPool(e.to_string()))?;

        Ok(Self {
            context: JobContext {
                cache,
                rasterizer,
                gate,
                zoom: RASTER_ZOOM_FACTOR,
            },
            pool,
        })
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.context.cache
    }

    pub fn gate(&self) -> &EpochGate {
        &self.context.gate
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Emits one result per document on `sink`, tagged with `epoch`.
    ///
    /// Does not touch the filesystem on the calling thread. Results arrive
    /// later in any order.
    pub fn run(&self, documents: &[Document], epoch: Epoch, sink: &Sender<JobResult>) {
        let paths: Vec<PathBuf> = documents
            .iter()
            .map(|document| document.path().to_path_buf())
            .collect();
        let context = self.context.clone();
        let sink = sink.clone();
        self.pool.spawn(move || context.dispatch(paths, epoch, sink));
    }
}

impl JobContext {
    /// Answers cache hits and spawns one render job per miss.
    fn dispatch(self, paths: Vec<PathBuf>, epoch: Epoch, sink: Sender<JobResult>) {
        let mut cache_hits = 0;
        let mut misses = 0;

        for path in paths {
            if self.cache.has(&path) {
                cache_hits += 1;
                let image = self.cache.resolve(&path);
                send(&sink, &path, epoch, JobOutcome::Ready(image));
                continue;
            }

            misses += 1;
            let context = self.clone();
            let sink = sink.clone();
            // Called from a pool thread, so the job lands on the same pool.
            rayon::spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    context.generate(&path, epoch)
                }))
                .unwrap_or_else(|_| {
                    warn!("Rasterizer panicked on {}", path.format_for_log());
                    JobOutcome::Failed(context.cache.placeholder())
                });
                send(&sink, &path, epoch, outcome);
            });
        }

        debug!("Epoch {}: {} cached, {} dispatched", epoch, cache_hits, misses);
    }

    fn generate(&self, path: &Path, epoch: Epoch) -> JobOutcome {
        if !self.gate.is_current(epoch) {
            trace!("Skipping superseded job {} for {}", epoch, path.display());
            return JobOutcome::Failed(self.cache.placeholder());
        }

        // Another epoch may have rendered this document while we were queued.
        if self.cache.has(path) {
            return JobOutcome::Ready(self.cache.resolve(path));
        }

        let bitmap = match self.render(path) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!("Using placeholder: {}", e);
                return JobOutcome::Failed(self.cache.placeholder());
            }
        };

        match self.cache.store(path, &bitmap) {
            Ok(stored) => JobOutcome::Ready(stored),
            Err(e) => {
                warn!("{}; keeping thumbnail for this session only", e);
                match self.cache.store_ephemeral(path, &bitmap) {
                    Ok(scratch) => JobOutcome::Ready(scratch),
                    Err(e) => {
                        warn!("Cannot keep thumbnail for {}: {}", path.display(), e);
                        JobOutcome::Failed(self.cache.placeholder())
                    }
                }
            }
        }
    }

    fn render(&self, path: &Path) -> std::result::Result<image::RgbImage, RasterError> {
        if !path.is_file() {
            return Err(RasterError::Missing(path.to_path_buf()));
        }
        if self.rasterizer.page_count(path)? == 0 {
            return Err(RasterError::NoPages(path.to_path_buf()));
        }
        self.rasterizer.rasterize_first_page(path, self.zoom)
    }
}

fn send(sink: &Sender<JobResult>, path: &Path, epoch: Epoch, outcome: JobOutcome) {
    let result = JobResult {
        document_path: path.to_path_buf(),
        epoch,
        outcome,
    };
    if sink.send(result).is_err() {
        trace!("Result receiver gone; dropping result for {}", path.display());
    }
}
