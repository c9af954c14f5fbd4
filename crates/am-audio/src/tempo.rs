use am_core::config::AnalysisConfig;
use am_core::frame::Tempo;

use crate::buffer::HistoryWindow;
use crate::fft::{FftPipeline, hann_window};

/// Compression logarithmique des magnitudes avant le calcul du flux.
const LOG_GAMMA: f32 = 1000.0;
/// Variance d'enveloppe en dessous de laquelle il n'y a aucune pulsation.
const FLAT_ENVELOPE: f64 = 1e-9;
/// Autocorrélation normalisée minimale du lag retenu.
const MIN_CLARITY: f64 = 0.3;
/// Part du pic qu'une sous-division doit atteindre pour devenir la période.
const SUBDIVISION_RATIO: f64 = 0.4;

/// Onset-strength tempo estimator.
///
/// Each appended block contributes one spectral-flux value: the frame made
/// of the previous and the current block is Hann-windowed, its magnitudes
/// log-compressed, and the positive increase over the previous frame summed.
/// The flux values live in a bounded [`HistoryWindow`]; the estimate always
/// uses exactly the current window contents.
///
/// The period is the lag with the highest normalized autocorrelation. A
/// click train correlates just as well at two or three beats as at one, so
/// that peak is then divided by the largest `k` whose sub-lag still reaches
/// 40 % of it. Results outside the configured BPM range
/// are reported as [`Tempo::NoPulse`].
///
/// # Example
/// ```
/// use am_audio::tempo::TempoEstimator;
/// use am_core::config::AnalysisConfig;
/// use am_core::frame::Tempo;
///
/// let mut tempo = TempoEstimator::new(44100, 1024, &AnalysisConfig::default());
/// tempo.append(&[0.0; 1024]);
/// assert_eq!(tempo.estimate(), Tempo::InsufficientHistory);
/// ```
pub struct TempoEstimator {
    block_size: usize,
    fft: FftPipeline,
    window: Vec<f32>,
    /// Bloc précédent suivi du bloc courant.
    frame: Vec<f32>,
    scratch: Vec<f32>,
    prev_spectrum: Vec<f32>,
    onsets: HistoryWindow<f32>,
    min_history: usize,
    lag_min: usize,
    lag_max: usize,
    min_bpm: f64,
    max_bpm: f64,
    /// Blocs par minute : `bpm = blocks_per_minute / lag`.
    blocks_per_minute: f64,
}

impl TempoEstimator {
    /// Create an estimator for `block_size`-sample blocks at `sample_rate`.
    ///
    /// # Panics
    /// Panics if `block_size` or `sample_rate` is 0.
    #[must_use]
    pub fn new(sample_rate: u32, block_size: usize, config: &AnalysisConfig) -> Self {
        assert!(block_size > 0, "block size must be > 0");
        assert!(sample_rate > 0, "sample rate must be > 0");

        let blocks_per_minute = 60.0 * f64::from(sample_rate) / block_size as f64;
        let min_bpm = f64::from(config.tempo_min_bpm);
        let max_bpm = f64::from(config.tempo_max_bpm);
        let shortest = (blocks_per_minute / max_bpm).ceil() as usize;
        let longest = (blocks_per_minute / min_bpm).floor() as usize;
        let lag_min = shortest.max(2);
        let lag_max = longest.max(lag_min);
        if shortest < 2 || longest < lag_min {
            log::warn!(
                "Blocs trop longs pour couvrir {min_bpm}-{max_bpm} BPM : lags {lag_min}..={lag_max} \
                 ({:.1}-{:.1} BPM), les tempos hors plage seront ignorés",
                blocks_per_minute / lag_max as f64,
                blocks_per_minute / lag_min as f64
            );
        }

        let (min_history, capacity) = config.tempo_history_blocks(sample_rate, block_size);
        let min_history = if min_history < lag_max + 2 {
            log::warn!(
                "Historique de tempo relevé de {min_history} à {} blocs (lag max {lag_max})",
                lag_max + 2
            );
            lag_max + 2
        } else {
            min_history
        };
        let capacity = capacity.max(min_history);
        log::debug!(
            "Tempo : lags {lag_min}..={lag_max}, historique {min_history}/{capacity} blocs"
        );

        let frame_len = 2 * block_size;
        let fft = FftPipeline::new(frame_len);
        let prev_spectrum = vec![0.0; fft.bins()];
        Self {
            block_size,
            fft,
            window: hann_window(frame_len),
            frame: vec![0.0; frame_len],
            scratch: vec![0.0; frame_len],
            prev_spectrum,
            onsets: HistoryWindow::new(capacity),
            min_history,
            lag_min,
            lag_max,
            min_bpm,
            max_bpm,
            blocks_per_minute,
        }
    }

    /// Append one block to the onset history. Returns its onset strength.
    ///
    /// # Panics
    /// Panics if `samples.len()` differs from the block size given at
    /// construction.
    pub fn append(&mut self, samples: &[f32]) -> f32 {
        assert_eq!(
            samples.len(),
            self.block_size,
            "tempo: block length mismatch"
        );

        self.frame.copy_within(self.block_size.., 0);
        self.frame[self.block_size..].copy_from_slice(samples);
        for ((dst, &s), &w) in self.scratch.iter_mut().zip(&self.frame).zip(&self.window) {
            *dst = s * w;
        }

        let magnitudes = self.fft.process(&self.scratch);
        let mut flux = 0.0f32;
        for (prev, &m) in self.prev_spectrum.iter_mut().zip(magnitudes) {
            let cur = (1.0 + LOG_GAMMA * m).ln();
            flux += (cur - *prev).max(0.0);
            *prev = cur;
        }

        self.onsets.push(flux);
        flux
    }

    /// Nombre de blocs actuellement dans la fenêtre.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.onsets.len()
    }

    /// Blocs nécessaires avant la première estimation.
    #[must_use]
    pub fn min_history(&self) -> usize {
        self.min_history
    }

    /// Dominant tempo of the current window.
    #[must_use]
    pub fn estimate(&self) -> Tempo {
        if self.onsets.len() < self.min_history {
            return Tempo::InsufficientHistory;
        }

        let envelope = smooth(self.onsets.iter().map(|&v| f64::from(v)));
        let n = envelope.len();
        let mean = envelope.iter().sum::<f64>() / n as f64;
        let centered: Vec<f64> = envelope.iter().map(|v| v - mean).collect();
        let variance = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
        if variance <= FLAT_ENVELOPE {
            return Tempo::NoPulse;
        }

        // Autocorrélation normalisée, lags lag_min-1..=lag_max+1 pour l'interpolation.
        let first = self.lag_min - 1;
        let last = self.lag_max + 1;
        let raw: Vec<f64> = (first..=last)
            .map(|lag| autocorrelation(&centered, lag) / variance)
            .collect();

        let best = (1..raw.len() - 1).max_by(|&a, &b| raw[a].total_cmp(&raw[b]));
        let Some(best) = best else {
            return Tempo::NoPulse;
        };
        if raw[best] < MIN_CLARITY {
            return Tempo::NoPulse;
        }

        let peak = (first + best) as f64 + parabolic_shift(raw[best - 1], raw[best], raw[best + 1]);
        let divisor = self.beat_divisor(&raw, first, peak, raw[best]);
        let bpm = self.blocks_per_minute * divisor as f64 / peak;
        if bpm < self.min_bpm || bpm > self.max_bpm {
            return Tempo::NoPulse;
        }
        Tempo::Bpm(bpm as f32)
    }

    /// Largest `k` such that `peak / k` is still a searched lag whose
    /// correlation reaches `SUBDIVISION_RATIO * peak_score`; 1 otherwise.
    fn beat_divisor(&self, raw: &[f64], first: usize, peak: f64, peak_score: f64) -> usize {
        let floor = self.lag_min as f64 - 0.5;
        let max_divisor = self.lag_max / self.lag_min;
        (2..=max_divisor)
            .rev()
            .find(|&k| {
                let lag = peak / k as f64;
                if lag < floor {
                    return false;
                }
                // Le sous-lag tombe entre deux lags entiers : on garde le meilleur.
                let score = [lag.floor() as usize, lag.ceil() as usize]
                    .into_iter()
                    .filter_map(|l| raw.get(l.checked_sub(first)?))
                    .fold(f64::NEG_INFINITY, |acc, &r| acc.max(r));
                score >= SUBDIVISION_RATIO * peak_score
            })
            .unwrap_or(1)
    }
}

/// Lissage triangulaire [1/4, 1/2, 1/4], bords répliqués.
fn smooth(values: impl ExactSizeIterator<Item = f64>) -> Vec<f64> {
    let raw: Vec<f64> = values.collect();
    let n = raw.len();
    (0..n)
        .map(|i| {
            let left = raw[i.saturating_sub(1)];
            let right = raw[(i + 1).min(n - 1)];
            0.25 * left + 0.5 * raw[i] + 0.25 * right
        })
        .collect()
}

/// Mean of `x[t] * x[t + lag]` over the overlapping part.
fn autocorrelation(x: &[f64], lag: usize) -> f64 {
    if lag >= x.len() {
        return 0.0;
    }
    let overlap = x.len() - lag;
    let sum: f64 = x[..overlap].iter().zip(&x[lag..]).map(|(a, b)| a * b).sum();
    sum / overlap as f64
}

fn parabolic_shift(a: f64, b: f64, c: f64) -> f64 {
    let denom = a - 2.0 * b + c;
    if denom.abs() <= f64::EPSILON {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;
    const BLOCK: usize = 1024;

    /// Click train: one full-scale impulse per beat.
    fn click_blocks(bpm: f64, secs: f64) -> Vec<Vec<f32>> {
        let total = (secs * f64::from(SR)) as usize;
        let period = 60.0 * f64::from(SR) / bpm;
        let mut signal = vec![0.0f32; total];
        let mut beat = 0.0;
        while (beat as usize) < total {
            signal[beat as usize] = 1.0;
            beat += period;
        }
        signal.chunks_exact(BLOCK).map(<[f32]>::to_vec).collect()
    }

    fn tone_block(index: usize) -> Vec<f32> {
        (0..BLOCK)
            .map(|i| {
                // Phase in f64: f32 time stamps jitter audibly after a few seconds.
                let t = (index * BLOCK + i) as f64 / f64::from(SR);
                (0.5 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as f32
            })
            .collect()
    }

    #[test]
    fn insufficient_history_until_minimum() {
        let config = AnalysisConfig::default();
        let mut tempo = TempoEstimator::new(SR, BLOCK, &config);
        let blocks = click_blocks(120.0, 8.0);
        for (i, block) in blocks.iter().enumerate() {
            tempo.append(block);
            if i + 1 < tempo.min_history() {
                assert_eq!(tempo.estimate(), Tempo::InsufficientHistory, "block {i}");
            }
        }
        assert_eq!(tempo.min_history(), 130);
        assert!(!matches!(tempo.estimate(), Tempo::InsufficientHistory));
    }

    #[test]
    fn click_trains_within_five_bpm() {
        for bpm in [45.0, 60.0, 90.0, 120.0, 150.0, 180.0, 200.0, 230.0] {
            let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
            for block in click_blocks(bpm, 8.0) {
                tempo.append(&block);
            }
            match tempo.estimate() {
                Tempo::Bpm(found) => assert!(
                    (f64::from(found) - bpm).abs() <= 5.0,
                    "{bpm} BPM estimated as {found}"
                ),
                other => panic!("{bpm} BPM: expected a tempo, got {other:?}"),
            }
        }
    }

    #[test]
    fn fast_tempo_is_not_halved() {
        let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
        for block in click_blocks(210.0, 8.0) {
            tempo.append(&block);
        }
        let found = tempo.estimate().bpm().unwrap_or_default();
        assert!(found > 200.0, "210 BPM estimated as {found}");
    }

    #[test]
    fn never_reports_a_tempo_outside_the_configured_range() {
        // 8 kHz / 2048 is ~234 blocks per minute: for 100-110 BPM the only
        // lag left is 3 blocks, i.e. 78 BPM.
        let config = AnalysisConfig {
            tempo_min_bpm: 100.0,
            tempo_max_bpm: 110.0,
            ..AnalysisConfig::default()
        };
        let (sr, block) = (8000u32, 2048usize);
        let mut tempo = TempoEstimator::new(sr, block, &config);
        let mut signal = vec![0.0f32; 20 * sr as usize];
        for beat in signal.iter_mut().step_by(3 * block) {
            *beat = 1.0;
        }
        for chunk in signal.chunks_exact(block) {
            tempo.append(chunk);
        }
        assert!(tempo.history_len() >= tempo.min_history());
        assert_eq!(tempo.estimate(), Tempo::NoPulse);
    }

    #[test]
    fn steady_tone_has_no_pulse() {
        let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
        for i in 0..400 {
            tempo.append(&tone_block(i));
        }
        assert_eq!(tempo.estimate(), Tempo::NoPulse);
    }

    #[test]
    fn silence_has_no_pulse() {
        let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
        for _ in 0..200 {
            tempo.append(&[0.0; BLOCK]);
        }
        assert_eq!(tempo.estimate(), Tempo::NoPulse);
    }

    #[test]
    fn window_eviction_tracks_a_tempo_change() {
        let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
        for block in click_blocks(90.0, 8.0) {
            tempo.append(&block);
        }
        // 9 s of 140 BPM fully replaces the 8 s window.
        for block in click_blocks(140.0, 9.0) {
            tempo.append(&block);
        }
        assert!(tempo.history_len() <= 345);
        let found = tempo.estimate().bpm().unwrap_or_default();
        assert!((f64::from(found) - 140.0).abs() <= 5.0, "got {found}");
    }

    #[test]
    fn onset_strength_spikes_on_click() {
        let mut tempo = TempoEstimator::new(SR, BLOCK, &AnalysisConfig::default());
        tempo.append(&[0.0; BLOCK]);
        tempo.append(&[0.0; BLOCK]);
        let mut click = vec![0.0; BLOCK];
        click[100] = 1.0;
        assert!(tempo.append(&click) > 1.0);
    }
}
