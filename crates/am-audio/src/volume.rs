/// RMS energy: `sqrt(mean(sample²))`.
///
/// Always defined and ≥ 0; an empty slice yields 0.
///
/// # Example
/// ```
/// use am_audio::volume::rms;
/// assert_eq!(rms(&[0.0; 1024]), 0.0);
/// assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    // Accumulate in f64: blocks are long and mostly quiet.
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}
