// image-convert/src/cli.rs
use crate::core::request::ConversionRequest;
use crate::core::validation::check_quality;
use crate::core::{
    ConversionResult, ConvertError, ConvertOptions, Mode, OutputFormat, DEFAULT_AVIF_QUALITY,
    DEFAULT_WEBP_QUALITY,
};
use crate::presets::list_presets;
use crate::processors::BatchConverter;
use crate::stats::ConversionStats;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "image-convert",
    version,
    about = "Convert images to WebP and AVIF",
    after_help = "Precedence: defaults, then flags, then --preset, then --quality."
)]
pub struct Cli {
    /// Input image, or a directory with --batch
    pub input: Option<PathBuf>,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Both)]
    pub format: FormatArg,

    /// Quality for both formats (1-100), applied last
    #[arg(short, long, allow_hyphen_values = true)]
    pub quality: Option<i64>,

    /// WebP quality (1-100)
    #[arg(long, default_value_t = i64::from(DEFAULT_WEBP_QUALITY), allow_hyphen_values = true)]
    pub webp_quality: i64,

    /// AVIF quality (1-100)
    #[arg(long, default_value_t = i64::from(DEFAULT_AVIF_QUALITY), allow_hyphen_values = true)]
    pub avif_quality: i64,

    /// Lossless WebP
    #[arg(short, long)]
    pub lossless: bool,

    /// Maximum output width in pixels
    #[arg(short = 'W', long)]
    pub max_width: Option<u32>,

    /// Maximum output height in pixels
    #[arg(short = 'H', long)]
    pub max_height: Option<u32>,

    /// Convert every supported image in the input directory
    #[arg(long)]
    pub batch: bool,

    /// Worker processes for batch mode (default: CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Named preset, see --list-presets
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Print the available presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Print compression statistics (single mode)
    #[arg(short, long)]
    pub stats: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Webp,
    Avif,
    Both,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Webp => OutputFormat::Webp,
            FormatArg::Avif => OutputFormat::Avif,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

impl Cli {
    /// Builds the request the flags describe. Range errors surface here.
    pub fn to_request(&self, input: PathBuf) -> crate::core::Result<ConversionRequest> {
        let options = ConvertOptions {
            format: self.format.into(),
            webp_quality: check_quality("webp_quality", self.webp_quality)?,
            avif_quality: check_quality("avif_quality", self.avif_quality)?,
            lossless: self.lossless,
            max_width: self.max_width,
            max_height: self.max_height,
        };

        let mut request = ConversionRequest::new(input);
        request.output_dir = self.output.clone();
        request.options = options;
        request.workers = self.workers;
        request.preset = self.preset.clone();
        request.quality = self
            .quality
            .map(|q| check_quality("quality", q))
            .transpose()?;
        request.mode = Some(if self.batch { Mode::Batch } else { Mode::Single });

        Ok(request)
    }
}

/// Runs the command line and returns the process exit code.
pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    if cli.list_presets {
        print_presets();
        return Ok(ExitCode::SUCCESS);
    }

    let Some(input) = cli.input.clone() else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    let request = cli.to_request(input)?;

    if cli.batch {
        run_batch(&request)
    } else {
        run_single(&request, cli.stats)
    }
}

fn run_single(request: &ConversionRequest, show_stats: bool) -> anyhow::Result<ExitCode> {
    let prepared = request.prepare(Mode::Single)?;

    let result = crate::core::converter::convert_one(
        &prepared.input,
        &prepared.output_dir,
        &prepared.options,
    )?;

    for path in [result.webp(), result.avif()].into_iter().flatten() {
        println!("Created: {}", path.display());
    }

    if show_stats {
        let stats = ConversionStats::collect(&prepared.input, result.webp(), result.avif())
            .context("Failed to collect statistics")?;
        println!("\n{}", stats);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_batch(request: &ConversionRequest) -> anyhow::Result<ExitCode> {
    let prepared = request.prepare(Mode::Batch)?;

    let results = BatchConverter::new(prepared.options, prepared.workers.unwrap_or(0))
        .with_progress(true)
        .process_directory(&prepared.input, &prepared.output_dir)
        .with_context(|| format!("Batch conversion of {} failed", prepared.input.display()))?;

    let failures: Vec<&ConversionResult> = results.iter().filter(|r| r.is_failed()).collect();

    println!(
        "{} succeeded, {} failed",
        results.len() - failures.len(),
        failures.len()
    );
    for failure in &failures {
        println!(
            "  {}: {}",
            failure.input().display(),
            failure.error().unwrap_or_default()
        );
    }

    if failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_presets() {
    println!("Available presets:");
    for (name, description) in list_presets() {
        println!("  {:<16} {}", name, description);
    }
}

/// Error line for stderr; validation problems get their own prefix.
pub fn describe_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ConvertError>() {
        Some(e) if e.is_validation() => format!("Validation error: {}", e),
        Some(e) if e.is_conversion() => format!("Conversion error: {}", e),
        _ => format!("Error: {:#}", error),
    }
}
