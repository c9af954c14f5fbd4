use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// An audio block could not be built from the given samples.
    #[error("Bloc audio invalide : {len} échantillons @ {sample_rate}Hz")]
    InvalidBlock {
        /// Number of samples supplied.
        len: usize,
        /// Sample rate supplied.
        sample_rate: u32,
    },
}
