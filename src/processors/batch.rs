// image-convert/src/processors/batch.rs
use super::worker::{WorkerJob, WorkerProcess};
use crate::core::{ConversionResult, ConvertError, ConvertOptions, Result};
use crate::utils::is_supported_format;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use walkdir::WalkDir;

/// Converts every supported image in a directory on a pool of worker
/// processes.
pub struct BatchConverter {
    options: ConvertOptions,
    workers: usize,
    worker_program: Option<PathBuf>,
    show_progress: bool,
}

impl BatchConverter {
    /// `workers == 0` means one per available CPU.
    ///
    /// Workers run the current executable unless
    /// [`with_worker_program`](Self::with_worker_program) says otherwise, so
    /// the calling binary must start `main` with
    /// [`worker::run_if_worker()`](super::worker::run_if_worker).
    pub fn new(options: ConvertOptions, workers: usize) -> Self {
        Self {
            options,
            workers,
            worker_program: None,
            show_progress: false,
        }
    }

    /// Executable started in worker mode; defaults to the current one. It
    /// must call [`worker::run_if_worker()`](super::worker::run_if_worker)
    /// on startup.
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Results arrive in completion order. Per-image failures are
    /// [`ConversionResult::Failed`] items; only setup problems return `Err`,
    /// including a worker program that cannot be started in worker mode.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<ConversionResult>> {
        if !input_dir.is_dir() {
            return Err(ConvertError::InvalidParameter(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        let image_paths = collect_image_paths(input_dir)?;
        if image_paths.is_empty() {
            log::warn!("No image files found in {}", input_dir.display());
            return Ok(Vec::new());
        }

        let total = image_paths.len();
        let slots = effective_workers(self.workers).min(total);
        let program = match &self.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()?,
        };

        log::info!(
            "Converting {} images from {} with {} workers",
            total,
            input_dir.display(),
            slots
        );

        // The first worker is started up front so a program that cannot act
        // as a worker fails the batch instead of every item.
        let mut first_worker = Some(WorkerProcess::spawn(&program)?);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(slots)
            .build()
            .map_err(|e| ConvertError::Worker(format!("Failed to create thread pool: {}", e)))?;

        let pb = self.create_progress_bar(total);
        let queue = Mutex::new(image_paths.into_iter());
        let (tx, rx) = mpsc::channel();

        let mut results = Vec::with_capacity(total);

        // Slots run on the pool while this thread drains results.
        pool.in_place_scope(|scope| {
            for _ in 0..slots {
                let tx = tx.clone();
                let queue = &queue;
                let program = program.as_path();
                let options = self.options;
                let worker = first_worker.take();
                scope.spawn(move |_| run_slot(program, worker, queue, output_dir, options, tx));
            }
            drop(tx);

            for result in rx {
                if let Some(error) = result.error() {
                    log::error!("Failed to convert {}: {}", result.input().display(), error);
                }
                pb.inc(1);
                results.push(result);
            }
        });

        let failed = results.iter().filter(|r| r.is_failed()).count();
        pb.finish_with_message(format!(
            "Converted {} images ({} failed)",
            results.len() - failed,
            failed
        ));

        Ok(results)
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// One supervising slot: owns at most one live worker and keeps pulling
/// paths until the queue is empty.
fn run_slot(
    program: &Path,
    mut worker: Option<WorkerProcess>,
    queue: &Mutex<std::vec::IntoIter<PathBuf>>,
    output_dir: &Path,
    options: ConvertOptions,
    tx: mpsc::Sender<ConversionResult>,
) {
    loop {
        let next = match queue.lock() {
            Ok(mut paths) => paths.next(),
            Err(poisoned) => poisoned.into_inner().next(),
        };
        let Some(image_path) = next else { break };

        let job = WorkerJob {
            image_path,
            output_dir: output_dir.to_path_buf(),
            options,
        };

        let result = dispatch(program, &mut worker, &job)
            .unwrap_or_else(|e| ConversionResult::failed(&job.image_path, e.to_string()));

        if tx.send(result).is_err() {
            break;
        }
    }
}

/// Runs `job` on the slot's worker, spawning one if needed. A worker that
/// fails is dropped so the next job gets a fresh process.
fn dispatch(
    program: &Path,
    worker: &mut Option<WorkerProcess>,
    job: &WorkerJob,
) -> Result<ConversionResult> {
    let mut process = match worker.take() {
        Some(process) => process,
        None => WorkerProcess::spawn(program)?,
    };

    let result = process.convert(job);
    if result.is_ok() {
        *worker = Some(process);
    } else {
        log::warn!("Replacing worker process {}", process.id());
    }
    result
}

/// Convenience wrapper over [`BatchConverter`] without a progress bar.
///
/// Workers run the current executable, which must call
/// [`worker::run_if_worker()`](super::worker::run_if_worker) first thing in
/// `main`.
pub fn convert_batch(
    input_dir: &Path,
    output_dir: &Path,
    workers: Option<usize>,
    options: &ConvertOptions,
) -> Result<Vec<ConversionResult>> {
    BatchConverter::new(*options, workers.unwrap_or(0)).process_directory(input_dir, output_dir)
}

/// Direct children of `input_dir` with a supported extension, sorted by name.
pub fn collect_image_paths(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(ConvertError::Io(e.into())),
            Err(e) => {
                log::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_supported_format(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

pub fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "d.tiff", "e.bmp", "f.webp", "notes.txt", "g.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();
        std::fs::write(dir.path().join("nested.png").join("inner.png"), b"x").unwrap();

        let names: Vec<String> = collect_image_paths(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, ["a.jpg", "b.PNG", "c.jpeg", "d.tiff", "e.bmp", "f.webp"]);
    }

    #[test]
    fn test_collect_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(collect_image_paths(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_effective_workers() {
        assert_eq!(effective_workers(3), 3);
        assert!(effective_workers(0) >= 1);
    }

    #[test]
    fn test_empty_directory_returns_no_results() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();

        let results = BatchConverter::new(ConvertOptions::default(), 2)
            .with_worker_program("/nonexistent/worker")
            .process_directory(dir.path(), dir.path())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_input_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();

        let err = convert_batch(&file, dir.path(), None, &ConvertOptions::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unspawnable_worker_is_setup_error() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let err = BatchConverter::new(ConvertOptions::default(), 2)
            .with_worker_program("/nonexistent/worker")
            .process_directory(dir.path(), dir.path())
            .unwrap_err();

        assert!(matches!(err, ConvertError::Worker(_)));
        assert!(err.to_string().contains("Failed to spawn worker"));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_without_worker_mode_fails_fast() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let err = BatchConverter::new(ConvertOptions::default(), 2)
            .with_worker_program("/bin/echo")
            .process_directory(dir.path(), dir.path())
            .unwrap_err();

        assert!(err.to_string().contains("run_if_worker"), "{}", err);
    }
}
