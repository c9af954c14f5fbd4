use am_core::frame::Pitch;

/// YIN fundamental-frequency estimator.
///
/// For a block of `N` samples the integration window is `W = N / 2`:
///
/// - difference function `d(τ) = Σ_{j<W} (x[j] - x[j+τ])²`
/// - cumulative mean normalized difference `d'(τ) = d(τ)·τ / Σ_{k=1..τ} d(k)`,
///   with `d'(0) = 1` and `d'(τ) = 1` while the running sum is zero
/// - the first `τ` in the search range with `d'(τ) < tolerance` is followed
///   down to its local minimum and refined by parabolic interpolation.
///
/// No lag under the tolerance means the block is unvoiced.
///
/// # Example
/// ```
/// use am_audio::pitch::PitchDetector;
/// use am_core::frame::Pitch;
///
/// let sr = 44100;
/// let block: Vec<f32> = (0..1024)
///     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
///     .collect();
/// let mut yin = PitchDetector::new(sr, 1024, 0.8, 40.0, 4000.0);
/// let hz = yin.estimate(&block).frequency().unwrap();
/// assert!((hz - 440.0).abs() < 4.4);
/// assert_eq!(yin.estimate(&[0.0; 1024]), Pitch::Unvoiced);
/// ```
pub struct PitchDetector {
    sample_rate: u32,
    block_size: usize,
    tolerance: f32,
    tau_min: usize,
    tau_max: usize,
    /// `d'(τ)` pour τ ∈ [0, tau_max + 1].
    cmnd: Vec<f32>,
}

impl PitchDetector {
    /// Create a detector for blocks of `block_size` samples, searching
    /// fundamentals between `min_hz` and `max_hz`.
    ///
    /// The lowest reachable frequency is also bounded by the window: lags
    /// never exceed `block_size / 2 - 2`.
    #[must_use]
    pub fn new(
        sample_rate: u32,
        block_size: usize,
        tolerance: f32,
        min_hz: f32,
        max_hz: f32,
    ) -> Self {
        let sr = sample_rate as f32;
        let window = block_size / 2;
        let tau_min = ((sr / max_hz.max(1.0)).floor() as usize).max(2);
        let tau_max = ((sr / min_hz.max(1.0)).ceil() as usize).min(window.saturating_sub(2));
        if tau_min > tau_max {
            log::warn!(
                "Bloc de {block_size} échantillons trop court pour la plage {min_hz}-{max_hz}Hz : \
                 toute hauteur sera non voisée"
            );
        } else {
            log::debug!(
                "YIN : lags {tau_min}..={tau_max} ({:.1}-{:.1}Hz), tolérance {tolerance}",
                sr / tau_max as f32,
                sr / tau_min as f32
            );
        }
        Self {
            sample_rate,
            block_size,
            tolerance,
            tau_min,
            tau_max,
            cmnd: vec![1.0; tau_max + 2],
        }
    }

    /// Estimate the pitch of one block.
    ///
    /// # Panics
    /// Panics if `samples.len()` differs from the block size given at
    /// construction.
    pub fn estimate(&mut self, samples: &[f32]) -> Pitch {
        assert_eq!(
            samples.len(),
            self.block_size,
            "pitch: block length mismatch"
        );
        if self.tau_min > self.tau_max {
            return Pitch::Unvoiced;
        }

        self.fill_cmnd(samples);

        match self.first_dip() {
            Some(tau) => {
                let lag = self.refine(tau);
                Pitch::from_frequency(self.sample_rate as f32 / lag)
            }
            None => Pitch::Unvoiced,
        }
    }

    /// Difference function and its cumulative mean normalization, in place.
    fn fill_cmnd(&mut self, samples: &[f32]) {
        let window = samples.len() / 2;
        let (head, _) = samples.split_at(window);

        self.cmnd[0] = 1.0;
        let mut running = 0.0f64;
        for tau in 1..self.cmnd.len() {
            let shifted = &samples[tau..tau + window];
            let d: f64 = head
                .iter()
                .zip(shifted)
                .map(|(&a, &b)| {
                    let delta = f64::from(a - b);
                    delta * delta
                })
                .sum();
            running += d;
            self.cmnd[tau] = if running > 0.0 {
                (d * tau as f64 / running) as f32
            } else {
                1.0
            };
        }
    }

    /// Smallest lag under the tolerance, followed down to its local minimum.
    fn first_dip(&self) -> Option<usize> {
        let last = self.cmnd.len() - 1;
        let mut tau = (self.tau_min..=self.tau_max).find(|&t| self.cmnd[t] < self.tolerance)?;
        while tau < last && self.cmnd[tau + 1] < self.cmnd[tau] {
            tau += 1;
        }
        Some(tau)
    }

    /// Interpolation parabolique autour de `tau`.
    fn refine(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.cmnd.len() {
            return tau as f32;
        }
        let (a, b, c) = (self.cmnd[tau - 1], self.cmnd[tau], self.cmnd[tau + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() <= f32::EPSILON {
            return tau as f32;
        }
        let shift = (0.5 * (a - c) / denom).clamp(-1.0, 1.0);
        tau as f32 + shift
    }
}
