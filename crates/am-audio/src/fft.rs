use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// FFT pipeline: real FFT using realfft, zero-padded on the right.
///
/// Pre-allocates the FFT plan and scratch buffers for zero-allocation hot path.
///
/// # Example
/// ```
/// use am_audio::fft::FftPipeline;
/// let fft = FftPipeline::new(2048);
/// assert_eq!(fft.bins(), 1025);
/// ```
pub struct FftPipeline {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
}

impl FftPipeline {
    /// Create a new FFT pipeline with the given transform size.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let magnitudes = vec![0.0; spectrum_buf.len()];

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            magnitudes,
            plan,
        }
    }

    /// Magnitude spectrum of `samples` (N/2+1 bins).
    ///
    /// `samples` shorter than the transform are zero-padded on the right;
    /// longer inputs are truncated to the transform size.
    ///
    /// # Example
    /// ```
    /// use am_audio::fft::FftPipeline;
    /// let mut fft = FftPipeline::new(256);
    /// let samples = vec![0.0f32; 100];
    /// let spectrum = fft.process(&samples);
    /// assert_eq!(spectrum.len(), 129); // N/2 + 1
    /// assert!(spectrum.iter().all(|&m| m == 0.0));
    /// ```
    pub fn process(&mut self, samples: &[f32]) -> &[f32] {
        let n = self.fft_size.min(samples.len());
        self.input_buf[..n].copy_from_slice(&samples[..n]);
        self.input_buf[n..].fill(0.0);

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            self.magnitudes.fill(0.0);
            return &self.magnitudes;
        }

        let norm = self.fft_size as f32;
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum_buf) {
            *mag = c.norm() / norm;
        }
        &self.magnitudes
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced by [`FftPipeline::process`].
    #[must_use]
    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Center frequency of bin `i`, in Hz.
    #[inline]
    #[must_use]
    pub fn bin_hz(&self, i: usize, sample_rate: u32) -> f32 {
        i as f32 * sample_rate as f32 / self.fft_size as f32
    }
}

/// Hann window coefficients (symmetric, zero at both ends).
///
/// # Example
/// ```
/// use am_audio::fft::hann_window;
/// let w = hann_window(5);
/// assert_eq!(w.len(), 5);
/// assert!(w[0].abs() < 1e-6 && (w[2] - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (len as f32 - 1.0)).cos()))
        .collect()
}
