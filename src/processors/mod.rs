// image-convert/src/processors/mod.rs
mod batch;
mod encoder;
mod loader;
mod resizer;
pub mod worker;

pub use batch::{collect_image_paths, convert_batch, effective_workers, BatchConverter};
pub use encoder::{Encoder, DEFAULT_AVIF_SPEED};
pub use loader::Loader;
pub use resizer::Resizer;
