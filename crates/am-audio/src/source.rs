use crate::error::AudioError;

/// Fournit des échantillons mono f32 au pipeline.
///
/// Implémenté par : `MicCapture`, `FileSource`, `SignalSource`.
///
/// Le sample rate est fixé à l'ouverture et ne change plus.
///
/// # Example
/// ```
/// use am_audio::source::BlockSource;
/// use am_audio::AudioError;
///
/// struct Silence;
/// impl BlockSource for Silence {
///     fn sample_rate(&self) -> u32 { 44100 }
///     fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
///         out.fill(0.0);
///         Ok(out.len())
///     }
///     fn stop(&mut self) -> Result<(), AudioError> { Ok(()) }
/// }
/// ```
pub trait BlockSource {
    /// Sample rate du flux, en Hz.
    fn sample_rate(&self) -> u32;

    /// Remplit le début de `out` et retourne le nombre d'échantillons écrits.
    ///
    /// Bloque tant qu'aucun échantillon n'est disponible. Retourne `Ok(0)`
    /// uniquement en fin de flux (sources finies).
    ///
    /// # Errors
    /// Any error is fatal to the pipeline (device failure, stall, decode).
    fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError>;

    /// Arrête la capture. Appelé exactement une fois en fin de run ;
    /// la libération du périphérique suit au drop.
    ///
    /// # Errors
    /// Returns an error if the device refuses to stop.
    fn stop(&mut self) -> Result<(), AudioError>;
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
        (**self).read(out)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        (**self).stop()
    }
}
