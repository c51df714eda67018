// image-convert/src/server/mod.rs
//! Network front-ends: the REST API and the MCP tool server.

pub mod mcp;
pub mod rest;
pub mod sse;
pub mod stdio;

use crate::core::converter::convert_one;
use crate::core::request::ConversionRequest;
use crate::core::{ConversionResult, ConvertError, Mode, Result};
use crate::processors::BatchConverter;
use std::path::PathBuf;

/// Settings shared by every server front-end.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Executable used for batch workers; `None` re-enters the current one.
    pub worker_program: Option<PathBuf>,
}

impl ServerConfig {
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Converts one file off the async executor.
    pub async fn convert_single(&self, request: ConversionRequest) -> Result<ConversionResult> {
        run_blocking(move || {
            let prepared = request.prepare(Mode::Single)?;
            convert_one(&prepared.input, &prepared.output_dir, &prepared.options)
        })
        .await
    }

    /// Converts a directory off the async executor.
    pub async fn convert_batch(&self, request: ConversionRequest) -> Result<Vec<ConversionResult>> {
        let worker_program = self.worker_program.clone();
        run_blocking(move || {
            let prepared = request.prepare(Mode::Batch)?;
            let mut converter =
                BatchConverter::new(prepared.options, prepared.workers.unwrap_or(0));
            if let Some(program) = worker_program {
                converter = converter.with_worker_program(program);
            }
            converter.process_directory(&prepared.input, &prepared.output_dir)
        })
        .await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ConvertError::Worker(format!("Conversion task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_convert_single_off_executor() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("photo.png");
        RgbImage::from_pixel(10, 10, Rgb([9, 9, 9])).save(&input).unwrap();

        let mut request = ConversionRequest::new(&input);
        request.options.format = crate::core::OutputFormat::Webp;

        let result = ServerConfig::default().convert_single(request).await.unwrap();
        assert!(result.webp().unwrap().exists());
    }

    #[tokio::test]
    async fn test_convert_batch_rejects_file_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("photo.png");
        std::fs::write(&input, b"x").unwrap();

        let err = ServerConfig::default()
            .convert_batch(ConversionRequest::new(&input))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
