//! Batch coordination
//!
//! [`ConversionCoordinator`] turns a list of selected paths into jobs on a
//! dedicated rayon pool and reports when they have all finished.
//!
//! Threads involved:
//! - the caller of [`ConversionCoordinator::start_batch`] classifies, walks
//!   directories and spawns jobs, and is the only writer of `total_images`;
//! - pool workers run the jobs;
//! - the `conversion-reporter` thread receives every job result over a
//!   channel. It alone writes `processed_images` and calls observers, and
//!   it moves the state to Complete once `BatchCompleted` has been delivered.
//!
//! Completion is detected by a [`JoinBarrier`]. Dispatch holds a token of its
//! own until every job is spawned, so the count cannot reach zero early.

use crate::barrier::JoinBarrier;
use crate::classifier::{classify, PathClassification};
use crate::codec::{codec_for, Codec};
use crate::config::ConvertConfig;
use crate::converter::ImageConverter;
use crate::job::{BatchSummary, JobKind, JobOutcome};
use crate::manifest::ManifestRewriter;
use crate::walker::walk;
use crate::{CatalogError, Result};
use serde::Serialize;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterState {
    Idle,
    Running,
    Complete,
}

impl ConverterState {
    pub fn label(self) -> &'static str {
        match self {
            ConverterState::Idle => "not-started",
            ConverterState::Running => "in-progress",
            ConverterState::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub state: ConverterState,
    pub processed_images: usize,
    pub total_images: usize,
}

/// Delivered to observers, always on the reporter thread.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    BatchStarted,
    ImageQueued {
        path: PathBuf,
        total: usize,
    },
    JobFinished {
        kind: JobKind,
        path: PathBuf,
        outcome: JobOutcome,
        processed: usize,
        total: usize,
    },
    BatchCompleted(Arc<BatchSummary>),
}

type Observer = Box<dyn Fn(&ProgressEvent) + Send>;

enum ReporterMessage {
    Started,
    Queued { path: PathBuf, total: usize },
    Finished { kind: JobKind, path: PathBuf, outcome: JobOutcome },
    Drained,
    Shutdown,
}

struct Status {
    state: ConverterState,
    summary: Option<Arc<BatchSummary>>,
}

struct Shared {
    status: Mutex<Status>,
    completed: Condvar,
    total_images: AtomicUsize,
    processed_images: AtomicUsize,
    observers: Mutex<Vec<Observer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn notify(&self, event: &ProgressEvent) {
        for observer in lock(&self.observers).iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                error!("Progress observer panicked");
            }
        }
    }
}

/// The two kinds of work a job can do.
struct JobRunner {
    converter: ImageConverter,
    rewriter: ManifestRewriter,
}

impl JobRunner {
    fn run(&self, kind: JobKind, path: &Path) -> JobOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match kind {
            JobKind::Image => self.converter.convert(path),
            JobKind::Manifest => self.rewriter.rewrite(path).map(|report| {
                if report.is_unchanged() {
                    JobOutcome::Skipped("nothing to rewrite".to_string())
                } else {
                    JobOutcome::Success
                }
            }),
        }));

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(path = %path.display(), %kind, error = %e, "Job failed");
                JobOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(path = %path.display(), %kind, panic = %message, "Job panicked");
                JobOutcome::Failed(format!("panicked: {}", message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Per-batch dispatch bookkeeping.
struct Dispatch {
    barrier: Arc<JoinBarrier>,
    seen: HashSet<PathBuf>,
    /// Output path of each image queued for conversion, keyed to its source
    destinations: HashMap<PathBuf, PathBuf>,
    jobs: usize,
}

pub struct ConversionCoordinator {
    config: ConvertConfig,
    shared: Arc<Shared>,
    runner: Arc<JobRunner>,
    pool: rayon::ThreadPool,
    reporter_tx: Sender<ReporterMessage>,
    reporter: Option<JoinHandle<()>>,
}

impl ConversionCoordinator {
    /// Build a coordinator with the codec `config.target` calls for.
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        let codec = codec_for(&config)?;
        Self::with_codec(config, codec)
    }

    pub fn with_codec(config: ConvertConfig, codec: Arc<dyn Codec>) -> Result<Self> {
        config.validate()?;
        let threads = config.worker_threads(codec.workload());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("conversion-worker-{}", i))
            .build()
            .map_err(|e| CatalogError::ThreadPool(e.to_string()))?;

        let shared = Arc::new(Shared {
            status: Mutex::new(Status {
                state: ConverterState::Idle,
                summary: None,
            }),
            completed: Condvar::new(),
            total_images: AtomicUsize::new(0),
            processed_images: AtomicUsize::new(0),
            observers: Mutex::new(Vec::new()),
        });

        let (reporter_tx, reporter_rx) = mpsc::channel();
        let reporter = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("conversion-reporter".to_string())
                .spawn(move || reporter_loop(reporter_rx, shared))?
        };

        let runner = Arc::new(JobRunner {
            converter: ImageConverter::new(Arc::clone(&codec), &config),
            rewriter: ManifestRewriter::new(config.target),
        });

        info!(
            target_format = %config.target,
            codec = codec.name(),
            threads,
            "Coordinator ready"
        );

        Ok(Self {
            config,
            shared,
            runner,
            pool,
            reporter_tx,
            reporter: Some(reporter),
        })
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Register an observer. Observers run on the reporter thread, in
    /// registration order, and must not call `subscribe` themselves.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ProgressEvent) + Send + 'static,
    {
        lock(&self.shared.observers).push(Box::new(observer));
    }

    pub fn state(&self) -> ConverterState {
        lock(&self.shared.status).state
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state();
        ProgressSnapshot {
            state,
            processed_images: self.shared.processed_images.load(Ordering::Acquire),
            total_images: self.shared.total_images.load(Ordering::Acquire),
        }
    }

    /// Classify and dispatch `paths`, returning once every job is spawned.
    ///
    /// Returns `Ok(false)` for an empty list, leaving state and counters as
    /// they were, and `Err(BatchInProgress)` while a batch is running.
    pub fn start_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Result<bool> {
        if paths.is_empty() {
            debug!("Empty selection, nothing to start");
            return Ok(false);
        }

        {
            let mut status = lock(&self.shared.status);
            if status.state == ConverterState::Running {
                return Err(CatalogError::BatchInProgress);
            }
            status.state = ConverterState::Running;
            status.summary = None;
            // The reporter has handled every message of the previous batch
            // before it marked it Complete, so resetting here races nothing.
            self.shared.total_images.store(0, Ordering::Release);
            self.shared.processed_images.store(0, Ordering::Release);
        }
        self.report(ReporterMessage::Started);

        let barrier = {
            let tx = self.reporter_tx.clone();
            JoinBarrier::new(move || {
                let _ = tx.send(ReporterMessage::Drained);
            })
        };
        let dispatch_token = barrier.enter();
        let mut dispatch = Dispatch {
            barrier,
            seen: HashSet::new(),
            destinations: HashMap::new(),
            jobs: 0,
        };

        for path in paths {
            self.dispatch_path(path.as_ref(), &mut dispatch);
        }

        info!(
            selected = paths.len(),
            jobs = dispatch.jobs,
            images = self.shared.total_images.load(Ordering::Acquire),
            "Batch dispatched"
        );
        drop(dispatch_token);
        Ok(true)
    }

    /// Block until the running batch completes and return its summary.
    /// Returns the previous summary (or `None`) when nothing is running.
    pub fn wait_for_completion(&self) -> Option<Arc<BatchSummary>> {
        let mut status = lock(&self.shared.status);
        while status.state == ConverterState::Running {
            status = self
                .shared
                .completed
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
        status.summary.clone()
    }

    fn dispatch_path(&self, path: &Path, dispatch: &mut Dispatch) {
        match classify(path) {
            PathClassification::Directory => {
                let mut walker = walk(path);
                for item in walker.by_ref() {
                    if item.class.is_work_item() {
                        self.enqueue(item.path, item.class, dispatch);
                    }
                }
                if walker.unreadable() > 0 {
                    warn!(
                        root = %path.display(),
                        skipped = walker.unreadable(),
                        "Some entries could not be read"
                    );
                }
            }
            class => self.enqueue(path.to_path_buf(), class, dispatch),
        }
    }

    fn enqueue(&self, path: PathBuf, class: PathClassification, dispatch: &mut Dispatch) {
        let kind = match class {
            PathClassification::Image => JobKind::Image,
            PathClassification::Manifest => JobKind::Manifest,
            other => {
                debug!(path = %path.display(), class = other.label(), "Ignoring path");
                return;
            }
        };

        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !dispatch.seen.insert(key.clone()) {
            debug!(path = %path.display(), "Already queued in this batch");
            return;
        }

        if kind == JobKind::Image {
            let collision = self.claim_destination(&key, dispatch);
            let total = self.shared.total_images.fetch_add(1, Ordering::AcqRel) + 1;
            self.report(ReporterMessage::Queued {
                path: path.clone(),
                total,
            });
            if let Some(reason) = collision {
                warn!(path = %path.display(), %reason, "Not converting");
                // Dispatch still holds its token, so this lands before Drained
                self.report(ReporterMessage::Finished {
                    kind,
                    path,
                    outcome: JobOutcome::Failed(reason),
                });
                return;
            }
        }

        let token = dispatch.barrier.enter();
        let runner = Arc::clone(&self.runner);
        let tx = self.reporter_tx.clone();
        dispatch.jobs += 1;

        self.pool.spawn(move || {
            let outcome = runner.run(kind, &path);
            let _ = tx.send(ReporterMessage::Finished {
                kind,
                path,
                outcome,
            });
            // Leave only after the result is queued, so Drained follows it
            drop(token);
        });
    }

    /// Reserve the output path of `source` for this batch.
    ///
    /// Returns why the image cannot be converted when an earlier image of the
    /// same batch already writes to that path (`a.png` and `a.jpg` both map
    /// to `a.heic`). Images already in the target format write nothing.
    fn claim_destination(&self, source: &Path, dispatch: &mut Dispatch) -> Option<String> {
        let converter = &self.runner.converter;
        if converter.is_already_target(source) {
            return None;
        }
        match dispatch.destinations.entry(converter.destination_for(source)) {
            Entry::Occupied(owner) => Some(format!(
                "output {} is already produced from {}",
                owner.key().display(),
                owner.get().display()
            )),
            Entry::Vacant(slot) => {
                slot.insert(source.to_path_buf());
                None
            }
        }
    }

    fn report(&self, message: ReporterMessage) {
        if self.reporter_tx.send(message).is_err() {
            error!("Reporter thread is gone");
        }
    }
}

impl Drop for ConversionCoordinator {
    fn drop(&mut self) {
        let _ = self.reporter_tx.send(ReporterMessage::Shutdown);
        if let Some(handle) = self.reporter.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn reporter_loop(rx: Receiver<ReporterMessage>, shared: Arc<Shared>) {
    let mut summary = BatchSummary::default();
    let mut started = Instant::now();

    for message in rx {
        match message {
            ReporterMessage::Started => {
                summary = BatchSummary::default();
                started = Instant::now();
                shared.notify(&ProgressEvent::BatchStarted);
            }
            ReporterMessage::Queued { path, total } => {
                shared.notify(&ProgressEvent::ImageQueued { path, total });
            }
            ReporterMessage::Finished {
                kind,
                path,
                outcome,
            } => {
                let processed = match kind {
                    JobKind::Image => shared.processed_images.fetch_add(1, Ordering::AcqRel) + 1,
                    JobKind::Manifest => shared.processed_images.load(Ordering::Acquire),
                };
                let total = shared.total_images.load(Ordering::Acquire);
                summary.record(kind, path.clone(), &outcome);
                shared.notify(&ProgressEvent::JobFinished {
                    kind,
                    path,
                    outcome,
                    processed,
                    total,
                });
            }
            ReporterMessage::Drained => {
                summary.total_images = shared.total_images.load(Ordering::Acquire);
                summary.processed_images = shared.processed_images.load(Ordering::Acquire);
                summary.elapsed_secs = started.elapsed().as_secs_f64();
                let finished = Arc::new(mem::take(&mut summary));
                info!(
                    images = finished.total_images,
                    failed = finished.images.failed + finished.manifests.failed,
                    elapsed_secs = finished.elapsed_secs,
                    "Batch complete"
                );
                // Still Running here: state and summary change in one step below
                shared.notify(&ProgressEvent::BatchCompleted(Arc::clone(&finished)));

                let mut status = lock(&shared.status);
                status.state = ConverterState::Complete;
                status.summary = Some(finished);
                shared.completed.notify_all();
            }
            ReporterMessage::Shutdown => break,
        }
    }
    debug!("Reporter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ImageCrateCodec, ImageMetadata, SourceImage, TargetFormat};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::mpsc::channel;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Reads nothing, writes the source bytes' length as the output. Sources
    /// containing `bad` fail to open.
    struct StubCodec {
        gate: Arc<Mutex<()>>,
    }

    impl StubCodec {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Mutex::new(())),
            })
        }
    }

    impl Codec for StubCodec {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn open(&self, src: &Path) -> Result<SourceImage> {
            let bytes = fs::read(src)?;
            if bytes.starts_with(b"bad") {
                return Err(CatalogError::ImageOpen {
                    path: src.to_path_buf(),
                    reason: "stub refuses".to_string(),
                });
            }
            Ok(SourceImage {
                image: DynamicImage::ImageRgb8(RgbImage::new(1, 1)),
                metadata: ImageMetadata::default(),
            })
        }

        fn write(&self, _source: &SourceImage, dst: &Path) -> Result<()> {
            let _open = self.gate.lock().unwrap();
            fs::write(dst, b"out")?;
            Ok(())
        }
    }

    fn config() -> ConvertConfig {
        ConvertConfig::default()
            .with_target(TargetFormat::Heic)
            .with_threads(4)
            .with_preserve_metadata(false)
    }

    fn coordinator(codec: Arc<StubCodec>) -> ConversionCoordinator {
        ConversionCoordinator::with_codec(config(), codec).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let coord = coordinator(StubCodec::new());
        assert_eq!(
            coord.snapshot(),
            ProgressSnapshot {
                state: ConverterState::Idle,
                processed_images: 0,
                total_images: 0
            }
        );
        assert_eq!(coord.state().label(), "not-started");
        assert!(coord.wait_for_completion().is_none());
    }

    #[test]
    fn test_empty_selection_changes_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        let coord = coordinator(StubCodec::new());

        assert!(coord.start_batch(&[dir.path()]).unwrap());
        coord.wait_for_completion().unwrap();
        let before = coord.snapshot();

        let empty: [&Path; 0] = [];
        assert!(!coord.start_batch(&empty).unwrap());
        assert_eq!(coord.snapshot(), before);
        assert_eq!(before.state, ConverterState::Complete);
        assert_eq!(before.total_images, 1);
    }

    #[test]
    fn test_image_manifest_and_invalid() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.png");
        let manifest = dir.path().join("Contents.json");
        let invalid = dir.path().join("notes.txt");
        fs::write(&image, b"x").unwrap();
        fs::write(&manifest, r#"{"images":[{"filename":"a.png"}]}"#).unwrap();
        fs::write(&invalid, b"x").unwrap();

        let coord = coordinator(StubCodec::new());
        assert!(coord.start_batch(&[&image, &manifest, &invalid]).unwrap());
        let summary = coord.wait_for_completion().unwrap();

        assert_eq!(summary.total_images, 1);
        assert_eq!(summary.processed_images, 1);
        assert_eq!(summary.images.succeeded, 1);
        assert_eq!(summary.manifests.succeeded, 1);
        assert_eq!(summary.images.total + summary.manifests.total, 2);
        assert_eq!(coord.state(), ConverterState::Complete);

        assert!(dir.path().join("a.heic").is_file());
        assert!(fs::read_to_string(&manifest).unwrap().contains("a.heic"));
    }

    #[test]
    fn test_directory_expansion_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let set = dir.path().join("Icon.imageset");
        fs::create_dir_all(set.join("nested")).unwrap();
        fs::write(set.join("a.png"), b"x").unwrap();
        fs::write(set.join("nested/b.jpg"), b"x").unwrap();
        fs::write(set.join("Contents.json"), r#"{"filename":"a.png"}"#).unwrap();

        let coord = coordinator(StubCodec::new());
        // The file is also reachable through its directory
        coord.start_batch(&[set.clone(), set.join("a.png")]).unwrap();
        let summary = coord.wait_for_completion().unwrap();

        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.manifests.total, 1);
    }

    #[test]
    fn test_processed_matches_total_at_completion() {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            fs::write(dir.path().join(format!("img{}.png", i)), b"x").unwrap();
        }
        fs::write(dir.path().join("bad.png"), b"bad").unwrap();

        let coord = coordinator(StubCodec::new());
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        coord.subscribe(move |event| {
            let _ = tx.lock().unwrap().send(event.clone());
        });

        coord.start_batch(&[dir.path()]).unwrap();
        let summary = coord.wait_for_completion().unwrap();
        assert_eq!(summary.total_images, 41);
        assert_eq!(summary.processed_images, 41);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ProgressEvent::BatchStarted)));
        assert!(matches!(events.last(), Some(ProgressEvent::BatchCompleted(_))));

        let mut finished = 0;
        for event in &events {
            if let ProgressEvent::JobFinished {
                processed, total, ..
            } = event
            {
                assert!(processed <= total);
                finished += 1;
            }
        }
        assert_eq!(finished, 41);
    }

    #[test]
    fn test_failures_are_recorded_not_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.png"), b"x").unwrap();
        fs::write(dir.path().join("bad.png"), b"bad").unwrap();
        fs::write(dir.path().join("broken.json"), b"{ nope").unwrap();

        let coord = coordinator(StubCodec::new());
        coord.start_batch(&[dir.path()]).unwrap();
        let summary = coord.wait_for_completion().unwrap();

        assert_eq!(summary.images.succeeded, 1);
        assert_eq!(summary.images.failed, 1);
        assert_eq!(summary.manifests.failed, 1);
        assert!(summary.has_failures());
        assert_eq!(summary.processed_images, summary.total_images);
        assert!(summary.images.errors[0].0.ends_with("bad.png"));
    }

    #[test]
    fn test_second_batch_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.png");
        fs::write(&image, b"x").unwrap();

        let codec = StubCodec::new();
        let gate = Arc::clone(&codec.gate);
        let coord = coordinator(codec);

        let held = gate.lock().unwrap();
        assert!(coord.start_batch(&[&image]).unwrap());
        assert_eq!(coord.state(), ConverterState::Running);
        assert!(matches!(
            coord.start_batch(&[&image]),
            Err(CatalogError::BatchInProgress)
        ));
        drop(held);

        coord.wait_for_completion().unwrap();
        assert_eq!(coord.state().label(), "complete");

        // A finished coordinator accepts the next batch and resets counters
        fs::remove_file(dir.path().join("a.heic")).unwrap();
        assert!(coord.start_batch(&[&image]).unwrap());
        let summary = coord.wait_for_completion().unwrap();
        assert_eq!(summary.total_images, 1);
        assert_eq!(summary.images.succeeded, 1);
    }

    #[test]
    fn test_stays_running_until_last_image_finishes() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.png");
        let manifest = dir.path().join("Contents.json");
        fs::write(&image, b"x").unwrap();
        fs::write(&manifest, r#"{"filename":"a.png"}"#).unwrap();

        let codec = StubCodec::new();
        let gate = Arc::clone(&codec.gate);
        let coord = coordinator(codec);
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        coord.subscribe(move |event| {
            if let ProgressEvent::JobFinished { kind, .. } = event {
                let _ = tx.lock().unwrap().send(*kind);
            }
        });

        let held = gate.lock().unwrap();
        coord.start_batch(&[&image, &manifest]).unwrap();
        let first = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(first, JobKind::Manifest);

        thread::scope(|scope| {
            let waiter = scope.spawn(|| coord.wait_for_completion());
            thread::sleep(Duration::from_millis(50));
            assert_eq!(coord.state(), ConverterState::Running);
            assert_eq!(coord.snapshot().processed_images, 0);
            assert!(!waiter.is_finished());

            drop(held);
            let summary = waiter.join().unwrap().unwrap();
            assert_eq!(summary.images.succeeded, 1);
            assert_eq!(summary.manifests.succeeded, 1);
        });
        assert_eq!(coord.state(), ConverterState::Complete);
        assert_eq!(rx.try_recv().unwrap(), JobKind::Image);
    }

    #[test]
    fn test_completion_observer_runs_before_next_batch_can_start() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.png");
        fs::write(&first, b"x").unwrap();

        let coord = coordinator(StubCodec::new());
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel::<()>();
        let observer = Mutex::new((entered_tx, release_rx));
        coord.subscribe(move |event| {
            if let ProgressEvent::BatchCompleted(summary) = event {
                let observer = observer.lock().unwrap();
                let _ = observer.0.send(summary.total_images);
                let _ = observer.1.recv();
            }
        });

        coord.start_batch(&[&first]).unwrap();
        assert_eq!(entered_rx.recv_timeout(Duration::from_secs(10)).unwrap(), 1);
        assert_eq!(coord.state(), ConverterState::Running);
        assert!(matches!(
            coord.start_batch(&[&first]),
            Err(CatalogError::BatchInProgress)
        ));

        // One release per batch
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        let summary = coord.wait_for_completion().unwrap();
        assert_eq!(summary.total_images, 1);
        assert_eq!(coord.state(), ConverterState::Complete);

        let second = dir.path().join("second");
        fs::create_dir(&second).unwrap();
        fs::write(second.join("b.png"), b"x").unwrap();
        fs::write(second.join("c.png"), b"x").unwrap();
        coord.start_batch(&[&second]).unwrap();
        let summary = coord.wait_for_completion().unwrap();
        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.images.succeeded, 2);
        assert_eq!(entered_rx.recv_timeout(Duration::from_secs(10)).unwrap(), 2);
    }

    #[test]
    fn test_images_sharing_an_output_are_not_both_converted() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("a.png");
        let jpg = dir.path().join("a.jpg");
        fs::write(&png, b"x").unwrap();
        fs::write(&jpg, b"x").unwrap();

        let coord = coordinator(StubCodec::new());
        coord.start_batch(&[&png, &jpg]).unwrap();
        let summary = coord.wait_for_completion().unwrap();

        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.processed_images, 2);
        assert_eq!(summary.images.succeeded, 1);
        assert_eq!(summary.images.failed, 1);
        let (failed, reason) = &summary.images.errors[0];
        assert!(failed.ends_with("a.jpg"));
        assert!(reason.contains("a.heic"));
        assert!(reason.contains("a.png"));
        assert!(dir.path().join("a.heic").is_file());
    }

    #[test]
    fn test_only_invalid_paths_still_completes() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(StubCodec::new());
        coord
            .start_batch(&[dir.path().join("missing.png")])
            .unwrap();
        let summary = coord.wait_for_completion().unwrap();
        assert_eq!(summary.total_images, 0);
        assert_eq!(coord.state(), ConverterState::Complete);
    }

    #[test]
    fn test_real_png_to_jpeg_batch() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("photo.png");
        RgbImage::from_pixel(16, 16, Rgb([0, 128, 255])).save(&src).unwrap();
        let before = fs::read(&src).unwrap();

        let config = config().with_target(TargetFormat::Jpeg);
        let codec = Arc::new(ImageCrateCodec::new(TargetFormat::Jpeg, 80).unwrap());
        let coord = ConversionCoordinator::with_codec(config, codec).unwrap();

        coord.start_batch(&[&src]).unwrap();
        let summary = coord.wait_for_completion().unwrap();

        assert_eq!(summary.images.succeeded, 1);
        assert_eq!(fs::read(&src).unwrap(), before);
        let outputs: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(outputs.len(), 2);
        assert!(image::open(dir.path().join("photo.jpg")).is_ok());
    }

    #[test]
    fn test_panicking_observer_does_not_stall_batch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        let coord = coordinator(StubCodec::new());
        coord.subscribe(|_| panic!("observer bug"));

        coord.start_batch(&[dir.path()]).unwrap();
        assert!(coord.wait_for_completion().is_some());
    }
}
