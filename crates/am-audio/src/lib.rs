// Audio capture, block buffering, feature extraction and classification for audiomon.

pub mod buffer;
pub mod capture;
pub mod centroid;
pub mod classifier;
pub mod decode;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod pitch;
pub mod source;
pub mod synth;
pub mod tempo;
pub mod volume;

pub use error::AudioError;
pub use source::BlockSource;
