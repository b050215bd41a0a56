pub mod barrier;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod converter;
pub mod coordinator;
pub mod errors;
pub mod job;
pub mod manifest;
pub mod walker;

pub use barrier::{BarrierToken, JoinBarrier};
pub use classifier::{classify, is_accepted_input, PathClassification};
pub use codec::{codec_for, Codec, HeifEncCodec, ImageCrateCodec, TargetFormat};
pub use config::ConvertConfig;
pub use converter::ImageConverter;
pub use coordinator::{ConversionCoordinator, ConverterState, ProgressEvent, ProgressSnapshot};
pub use job::{BatchSummary, JobKind, JobOutcome};
pub use manifest::{ManifestRewriter, RewriteReport};
pub use walker::{walk, ClassifiedPath, DirectoryWalker};

pub use errors::{CatalogError, Result};
