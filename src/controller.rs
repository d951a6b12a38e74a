//! Epoch bookkeeping between the view model and the generation pipeline.
//!
//! The controller lives on the coordinating thread. Workers never touch it;
//! they only send [`JobResult`]s into the channel it owns. A result is
//! applied only if its epoch is still the active one, so switching folders
//! or filters mid-batch can never leak thumbnails from an older request.

use crate::document::{Document, Epoch, JobOutcome, JobResult};
use crate::pipeline::GenerationPipeline;
use log::{debug, info, trace};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Completed and total job counts for the active epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// What [`BatchController::request`] did with a requested set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A pipeline run was started for `total` documents.
    Started { epoch: Epoch, total: usize },
    /// The set was empty; nothing was started.
    Empty { epoch: Epoch },
}

/// Events produced for accepted (current-epoch) results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    ThumbnailReady { document: PathBuf, image: PathBuf },
    ThumbnailFailed { document: PathBuf, image: PathBuf },
    Progress(Progress),
    BatchComplete { epoch: Epoch },
}

/// Serializes requested-set changes against the always-running pipeline.
pub struct BatchController {
    pipeline: GenerationPipeline,
    active: Epoch,
    progress: Progress,
    results_tx: Sender<JobResult>,
    results_rx: Receiver<JobResult>,
}

impl BatchController {
    pub fn new(pipeline: GenerationPipeline) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        let active = pipeline.gate().current();
        Self {
            pipeline,
            active,
            progress: Progress::default(),
            results_tx,
            results_rx,
        }
    }

    pub fn active_epoch(&self) -> Epoch {
        self.active
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    /// Supersedes the current batch with `documents`.
    ///
    /// Jobs of the previous epoch keep running if they already started;
    /// their results are dropped on arrival.
    pub fn request(&mut self, documents: &[Document]) -> RequestOutcome {
        self.active = self.active.next();
        self.pipeline.gate().advance_to(self.active);
        self.progress = Progress {
            completed: 0,
            total: documents.len(),
        };

        if documents.is_empty() {
            debug!("Epoch {}: empty request, nothing to generate", self.active);
            return RequestOutcome::Empty { epoch: self.active };
        }

        info!(
            "Epoch {}: generating thumbnails for {} documents",
            self.active,
            documents.len()
        );
        self.pipeline.run(documents, self.active, &self.results_tx);
        RequestOutcome::Started {
            epoch: self.active,
            total: documents.len(),
        }
    }

    /// Applies one result if it belongs to the active epoch.
    pub fn accept(&mut self, result: JobResult) -> Vec<BatchEvent> {
        if result.epoch != self.active {
            trace!(
                "Dropping stale result {} for {} (active {})",
                result.epoch,
                result.document_path.display(),
                self.active
            );
            return Vec::new();
        }
        if self.progress.is_complete() {
            trace!("Ignoring surplus result for {}", result.document_path.display());
            return Vec::new();
        }

        self.progress.completed += 1;

        let document = result.document_path;
        let mut events = vec![match result.outcome {
            JobOutcome::Ready(image) => BatchEvent::ThumbnailReady { document, image },
            JobOutcome::Failed(image) => BatchEvent::ThumbnailFailed { document, image },
        }];
        events.push(BatchEvent::Progress(self.progress));

        if self.progress.is_complete() {
            info!(
                "Epoch {}: batch complete ({} thumbnails)",
                self.active, self.progress.total
            );
            events.push(BatchEvent::BatchComplete { epoch: self.active });
        }
        events
    }

    /// Drains all results that have arrived, without blocking.
    pub fn poll(&mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        loop {
            match self.results_rx.try_recv() {
                Ok(result) => events.extend(self.accept(result)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Waits up to `timeout` for the next result, then drains the rest.
    pub fn wait(&mut self, timeout: Duration) -> Vec<BatchEvent> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(result) => {
                let mut events = self.accept(result);
                events.extend(self.poll());
                events
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{make_documents, FakeRasterizer, GatedRasterizer};
    use crate::pipeline::EpochGate;
    use crate::rasterizer::Rasterizer;
    use crate::thumbnail_cache::ThumbnailCache;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    fn controller(
        cache_dir: &Path,
        rasterizer: Arc<dyn Rasterizer>,
        workers: usize,
    ) -> BatchController {
        let cache = Arc::new(ThumbnailCache::open(cache_dir));
        let pipeline =
            GenerationPipeline::new(cache, rasterizer, workers, EpochGate::new()).unwrap();
        BatchController::new(pipeline)
    }

    fn run_to_completion(controller: &mut BatchController) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        for _ in 0..200 {
            events.extend(controller.wait(Duration::from_millis(50)));
            if controller.progress().is_complete() {
                break;
            }
        }
        events
    }

    fn result(path: &str, epoch: u64) -> JobResult {
        JobResult {
            document_path: PathBuf::from(path),
            epoch: Epoch::new(epoch),
            outcome: JobOutcome::Ready(PathBuf::from(format!("{}.png", path))),
        }
    }

    #[test]
    fn epochs_strictly_increase() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mut controller = controller(cache_dir.path(), Arc::new(FakeRasterizer::default()), 1);

        let first = match controller.request(&[]) {
            RequestOutcome::Empty { epoch } => epoch,
            other => panic!("unexpected {:?}", other),
        };
        let second = match controller.request(&[]) {
            RequestOutcome::Empty { epoch } => epoch,
            other => panic!("unexpected {:?}", other),
        };
        assert!(second > first);
        assert_eq!(controller.pipeline().gate().current(), second);
    }

    #[test]
    fn stale_results_are_dropped() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mut controller = controller(cache_dir.path(), Arc::new(FakeRasterizer::default()), 1);
        controller.request(&[]);
        controller.request(&[]);
        controller.progress = Progress { completed: 0, total: 1 };

        assert!(controller.accept(result("/f/a.pdf", 1)).is_empty());
        assert_eq!(controller.progress().completed, 0);

        let events = controller.accept(result("/f/a.pdf", 2));
        assert_eq!(
            events,
            vec![
                BatchEvent::ThumbnailReady {
                    document: PathBuf::from("/f/a.pdf"),
                    image: PathBuf::from("/f/a.pdf.png"),
                },
                BatchEvent::Progress(Progress { completed: 1, total: 1 }),
                BatchEvent::BatchComplete { epoch: Epoch::new(2) },
            ]
        );
    }

    #[test]
    fn batch_completes_after_all_results() {
        let docs_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let docs = make_documents(docs_dir.path(), &["a.pdf", "corrupt.pdf", "c.pdf"]);
        let mut controller = controller(cache_dir.path(), Arc::new(FakeRasterizer::default()), 2);

        let outcome = controller.request(&docs);
        assert!(matches!(outcome, RequestOutcome::Started { total: 3, .. }));

        let events = run_to_completion(&mut controller);
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress(p) => Some(p.completed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3]);

        let failed = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::ThumbnailFailed { .. }))
            .count();
        assert_eq!(failed, 1);

        let completions: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::BatchComplete { .. }))
            .collect();
        assert_eq!(completions.len(), 1);
    }

    #[test]
    fn superseded_batch_never_reaches_events() {
        let docs_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let old_docs = make_documents(docs_dir.path(), &["old1.pdf", "old2.pdf"]);
        let new_docs = make_documents(docs_dir.path(), &["new.pdf"]);

        let (release_tx, release_rx) = mpsc::channel();
        let rasterizer = Arc::new(GatedRasterizer {
            release: Mutex::new(release_rx),
            renders: AtomicUsize::new(0),
        });
        let mut controller = controller(cache_dir.path(), rasterizer, 1);

        controller.request(&old_docs);
        let second = match controller.request(&new_docs) {
            RequestOutcome::Started { epoch, .. } => epoch,
            other => panic!("unexpected {:?}", other),
        };
        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }

        let events = run_to_completion(&mut controller);
        for event in &events {
            match event {
                BatchEvent::ThumbnailReady { document, .. }
                | BatchEvent::ThumbnailFailed { document, .. } => {
                    assert!(document.ends_with("new.pdf"), "stale event for {:?}", document)
                }
                BatchEvent::BatchComplete { epoch } => assert_eq!(*epoch, second),
                BatchEvent::Progress(p) => assert_eq!(p.total, 1),
            }
        }
        assert_eq!(controller.progress(), Progress { completed: 1, total: 1 });
    }
}
