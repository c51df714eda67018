// image-convert/src/processors/worker.rs
//! Child-process side of batch conversion.
//!
//! A worker is the current executable started with `IMAGE_CONVERT_WORKER=1`.
//! It first announces itself with a [`WorkerHello`] line, then reads one JSON
//! [`WorkerJob`] per line on stdin and answers one JSON [`ConversionResult`]
//! per line on stdout until stdin closes.
//!
//! Every binary that links this crate and may act as a worker program must
//! call [`run_if_worker`] before anything else in `main`.

use crate::core::converter::convert_one;
use crate::core::{ConversionResult, ConvertError, ConvertOptions, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub const WORKER_ENV: &str = "IMAGE_CONVERT_WORKER";
/// Log level handed from the parent to its workers.
pub const WORKER_LOG_ENV: &str = "IMAGE_CONVERT_WORKER_LOG";
const WORKER_NAME: &str = "image-convert";

/// First line a worker writes, before reading any job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHello {
    pub worker: String,
    pub pid: u32,
}

impl WorkerHello {
    fn current() -> Self {
        Self {
            worker: WORKER_NAME.to_string(),
            pid: std::process::id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJob {
    pub image_path: PathBuf,
    pub output_dir: PathBuf,
    pub options: ConvertOptions,
}

impl WorkerJob {
    pub fn run(&self) -> ConversionResult {
        match convert_one(&self.image_path, &self.output_dir, &self.options) {
            Ok(result) => result,
            Err(e) => ConversionResult::failed(&self.image_path, e.to_string()),
        }
    }
}

pub fn is_worker() -> bool {
    std::env::var_os(WORKER_ENV).is_some_and(|value| value == "1")
}

/// Turns this process into a worker when launched as one; never returns in
/// that case. Binaries call this before parsing their arguments.
pub fn run_if_worker() {
    if !is_worker() {
        return;
    }

    let level = std::env::var(WORKER_LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    let _ = env_logger::Builder::new().filter_level(level).try_init();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let code = match serve(stdin.lock(), stdout.lock()) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Worker stopped: {}", e);
            1
        }
    };

    std::process::exit(code);
}

/// Worker loop: the hello line, then one result line out per job line in.
pub fn serve<R: BufRead, W: Write>(reader: R, mut writer: W) -> Result<()> {
    write_line(&mut writer, &WorkerHello::current())?;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<WorkerJob>(&line) {
            Ok(job) => {
                log::debug!("Worker {} converting {}", std::process::id(), job.image_path.display());
                job.run()
            }
            Err(e) => ConversionResult::failed(Path::new(""), format!("Malformed worker job: {}", e)),
        };

        write_line(&mut writer, &result)?;
    }

    Ok(())
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| ConvertError::Worker(format!("Failed to encode worker message: {}", e)))?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Parent-side handle to one worker process.
pub struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    /// Starts `program` in worker mode and waits for its hello line.
    ///
    /// A program that answers with anything else is killed and reported as
    /// not running in worker mode.
    pub fn spawn(program: &Path) -> Result<Self> {
        let mut child = Command::new(program)
            .env(WORKER_ENV, "1")
            .env(WORKER_LOG_ENV, log::max_level().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                ConvertError::Worker(format!(
                    "Failed to spawn worker {}: {}",
                    program.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| ConvertError::Worker("Worker stdout was not captured".to_string()))?;

        let mut process = Self {
            child,
            stdin,
            stdout,
        };
        if let Err(e) = process.handshake(program) {
            if let Err(kill) = process.child.kill() {
                log::debug!("Worker process {} already gone: {}", process.id(), kill);
            }
            return Err(e);
        }

        log::debug!("Spawned worker process {}", process.id());
        Ok(process)
    }

    fn handshake(&mut self, program: &Path) -> Result<()> {
        let not_a_worker = |detail: String| {
            ConvertError::Worker(format!(
                "{} did not start in worker mode ({}); binaries must call \
                 worker::run_if_worker() first",
                program.display(),
                detail
            ))
        };

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(not_a_worker("exited without a hello".to_string()));
        }

        match serde_json::from_str::<WorkerHello>(&line) {
            Ok(hello) if hello.worker == WORKER_NAME => Ok(()),
            Ok(hello) => Err(not_a_worker(format!("unknown worker {:?}", hello.worker))),
            Err(_) => Err(not_a_worker(format!("unexpected output {:?}", line.trim()))),
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Sends one job and blocks until its result arrives.
    ///
    /// An `Err` means the process is unusable (it crashed or broke the
    /// protocol); a per-image failure is an `Ok(ConversionResult::Failed)`.
    pub fn convert(&mut self, job: &WorkerJob) -> Result<ConversionResult> {
        let mut request = serde_json::to_string(job)
            .map_err(|e| ConvertError::Worker(format!("Failed to encode job: {}", e)))?;
        request.push('\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ConvertError::Worker("Worker stdin is closed".to_string()))?;
        if let Err(e) = stdin.write_all(request.as_bytes()).and_then(|_| stdin.flush()) {
            return Err(self.exited(job, &e.to_string()));
        }

        let mut response = String::new();
        let read = self.stdout.read_line(&mut response)?;
        if read == 0 {
            return Err(self.exited(job, "no result"));
        }

        serde_json::from_str(&response)
            .map_err(|e| ConvertError::Worker(format!("Malformed worker response: {}", e)))
    }

    fn exited(&mut self, job: &WorkerJob, detail: &str) -> ConvertError {
        let status = match self.child.wait() {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };
        ConvertError::Worker(format!(
            "Worker process exited ({}, {}) while converting {}",
            status,
            detail,
            job.image_path.display()
        ))
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        // Closing stdin ends the worker loop.
        drop(self.stdin.take());
        if let Err(e) = self.child.wait() {
            log::warn!("Failed to reap worker process {}: {}", self.child.id(), e);
        }
    }
}
