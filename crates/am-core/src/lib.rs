/// Configuration, types, and shared structures for audiomon.
///
/// This crate contains the block and feature types, the threshold and
/// analysis configuration, and the seams (`Renderer`, `CancelToken`) used
/// across the audiomon workspace.

pub mod cancel;
pub mod config;
pub mod error;
pub mod frame;
pub mod traits;

pub use cancel::CancelToken;
pub use config::{MonitorConfig, ThresholdConfig};
pub use error::CoreError;
pub use frame::{AudioBlock, BlockReport, ClassificationResult, FeatureSet, Level, Pitch, Tempo};
