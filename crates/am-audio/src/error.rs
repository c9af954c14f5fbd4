use thiserror::Error;

/// Errors originating from the audio module.
///
/// Every variant is fatal to the analysis loop.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio input device found.
    #[error("Aucun périphérique audio d'entrée trouvé")]
    NoInputDevice,

    /// Unsupported audio format.
    #[error("Format audio non supporté : {0}")]
    UnsupportedFormat(String),

    /// Audio stream error (build, play, or reported by the device callback).
    #[error("Erreur de stream audio : {0}")]
    StreamError(String),

    /// The device delivered no samples for too long.
    #[error("Périphérique audio bloqué : aucun échantillon depuis {0} ms")]
    Stalled(u64),

    /// Audio decode error.
    #[error("Erreur de décodage : {0}")]
    DecodeError(String),
}
