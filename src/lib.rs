pub mod cli;
pub mod core;
pub mod presets;
pub mod processors;
pub mod server;
pub mod stats;
pub mod utils;

pub use crate::core::converter::{convert_one, Converter};
pub use crate::core::request::{ConversionRequest, PreparedRequest};
pub use crate::core::validation::{
    validate_dimensions, validate_file_size, validate_path, validate_request,
};
pub use crate::core::{
    ConversionResult, ConvertError, ConvertOptions, Mode, OutputFormat, Result, TargetFormat,
    MAX_DIMENSION, MAX_FILE_SIZE_MB, SUPPORTED_EXTENSIONS,
};
pub use presets::{apply_preset, get_preset, list_presets, PresetConfig};
pub use processors::{convert_batch, worker, BatchConverter, Encoder, Loader, Resizer};
pub use stats::{calculate_savings, ConversionStats, Savings};
pub use utils::{format_size, is_supported_format};

