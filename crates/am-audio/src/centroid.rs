use crate::fft::{FftPipeline, hann_window};

/// Énergie spectrale totale en dessous de laquelle le bloc est considéré silencieux.
const SILENCE_FLOOR: f32 = 1e-10;

/// Spectral centroid extractor: energy-weighted mean frequency of a block.
///
/// The block is zero-padded on the right by `n - (len % n)` samples
/// (`n` = transform size) and cut into `n`-sample frames. Each frame's
/// samples are Hann-windowed over their own length before the transform;
/// frames made only of padding carry no energy and are skipped. The
/// centroid of the summed magnitude spectra is the single representative
/// value for the block.
///
/// # Example
/// ```
/// use am_audio::centroid::SpectralCentroid;
/// let mut centroid = SpectralCentroid::new(44100, 1024, 2048);
/// assert_eq!(centroid.compute(&[0.0; 1024]), 0.0);
/// ```
pub struct SpectralCentroid {
    fft: FftPipeline,
    sample_rate: u32,
    block_size: usize,
    /// Une fenêtre par trame portant des échantillons.
    windows: Vec<Vec<f32>>,
    frame: Vec<f32>,
    accum: Vec<f32>,
}

impl SpectralCentroid {
    /// Create an extractor for blocks of `block_size` samples.
    ///
    /// # Panics
    /// Panics if `block_size` or `fft_size` is 0.
    #[must_use]
    pub fn new(sample_rate: u32, block_size: usize, fft_size: usize) -> Self {
        assert!(block_size > 0, "block size must be > 0");
        let fft = FftPipeline::new(fft_size);
        let frames = padded_len(block_size, fft_size) / fft_size;
        let windows = (0..frames)
            .map(|f| block_size.saturating_sub(f * fft_size).min(fft_size))
            .filter(|&len| len > 0)
            .map(hann_window)
            .collect();
        let accum = vec![0.0; fft.bins()];
        Self {
            fft,
            sample_rate,
            block_size,
            windows,
            frame: vec![0.0; fft_size],
            accum,
        }
    }

    /// Spectral centroid of `samples`, in Hz. 0 for a silent block.
    ///
    /// # Panics
    /// Panics if `samples.len()` differs from the block size given at
    /// construction.
    pub fn compute(&mut self, samples: &[f32]) -> f32 {
        assert_eq!(
            samples.len(),
            self.block_size,
            "spectral centroid: block length mismatch"
        );

        self.accum.fill(0.0);
        for (chunk, window) in samples.chunks(self.fft.fft_size()).zip(&self.windows) {
            for ((dst, &s), &w) in self.frame.iter_mut().zip(chunk).zip(window) {
                *dst = s * w;
            }
            self.frame[chunk.len()..].fill(0.0);

            let magnitudes = self.fft.process(&self.frame);
            for (acc, &m) in self.accum.iter_mut().zip(magnitudes) {
                *acc += m;
            }
        }

        let total: f32 = self.accum.iter().sum();
        if total <= SILENCE_FLOOR {
            return 0.0;
        }
        let weighted: f32 = self
            .accum
            .iter()
            .enumerate()
            .map(|(i, &m)| self.fft.bin_hz(i, self.sample_rate) * m)
            .sum();
        weighted / total
    }
}

/// Longueur après zero-padding : toujours un multiple de `fft_size`,
/// strictement plus long que le bloc (jamais de padding négatif).
///
/// # Panics
/// Panics if `fft_size` is 0.
///
/// # Example
/// ```
/// use am_audio::centroid::padded_len;
/// assert_eq!(padded_len(1024, 2048), 2048);
/// assert_eq!(padded_len(3000, 2048), 4096);
/// assert_eq!(padded_len(2048, 2048), 4096);
/// ```
#[must_use]
pub fn padded_len(block_len: usize, fft_size: usize) -> usize {
    assert!(fft_size > 0, "FFT size must be > 0");
    block_len + (fft_size - block_len % fft_size)
}
