use am_core::config::ThresholdConfig;
use am_core::frame::{ClassificationResult, FeatureSet, Level, Pitch, Tempo};

/// Compare each feature of a block against its threshold.
///
/// A value strictly above its threshold is `High`; anything else,
/// including a value equal to the threshold or NaN, is `Low`. Undefined
/// features (unvoiced pitch, tempo without history or pulse) are
/// `Unknown`. Pitch is compared on the MIDI scale.
///
/// Pure function: the same inputs always give the same result.
///
/// # Example
/// ```
/// use am_audio::classifier::classify;
/// use am_core::config::ThresholdConfig;
/// use am_core::frame::{FeatureSet, Level, Pitch, Tempo};
///
/// let features = FeatureSet {
///     volume: 0.7,
///     pitch: Pitch::from_frequency(220.0),
///     tempo: Tempo::InsufficientHistory,
///     spectral_centroid: 2500.0,
/// };
/// let result = classify(&features, &ThresholdConfig::default());
/// assert_eq!(result.volume, Level::High);
/// assert_eq!(result.pitch, Level::Low);
/// assert_eq!(result.tempo, Level::Unknown);
/// assert_eq!(result.centroid, Level::High);
/// ```
#[must_use]
pub fn classify(features: &FeatureSet, thresholds: &ThresholdConfig) -> ClassificationResult {
    ClassificationResult {
        volume: level(features.volume, thresholds.volume),
        pitch: match features.pitch {
            Pitch::Voiced { midi, .. } => level(midi, thresholds.pitch),
            Pitch::Unvoiced => Level::Unknown,
        },
        tempo: match features.tempo {
            Tempo::Bpm(bpm) => level(bpm, thresholds.tempo),
            Tempo::InsufficientHistory | Tempo::NoPulse => Level::Unknown,
        },
        centroid: level(features.spectral_centroid, thresholds.centroid),
    }
}

/// `High` ssi `value > threshold` (NaN → `Low`).
#[inline]
fn level(value: f32, threshold: f32) -> Level {
    if value > threshold {
        Level::High
    } else {
        Level::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(volume: f32, hz: f32, tempo: Tempo, centroid: f32) -> FeatureSet {
        FeatureSet {
            volume,
            pitch: Pitch::from_frequency(hz),
            tempo,
            spectral_centroid: centroid,
        }
    }

    #[test]
    fn all_high() {
        let f = features(0.9, 880.0, Tempo::Bpm(140.0), 5000.0);
        let r = classify(&f, &ThresholdConfig::default());
        assert_eq!(
            r,
            ClassificationResult {
                volume: Level::High,
                pitch: Level::High,
                tempo: Level::High,
                centroid: Level::High,
            }
        );
    }

    #[test]
    fn equal_to_threshold_is_low() {
        let t = ThresholdConfig {
            volume: 0.25,
            pitch: 69.0,
            tempo: 100.0,
            centroid: 1000.0,
        };
        let f = FeatureSet {
            volume: 0.25,
            pitch: Pitch::Voiced {
                frequency: 440.0,
                midi: 69.0,
            },
            tempo: Tempo::Bpm(100.0),
            spectral_centroid: 1000.0,
        };
        let r = classify(&f, &t);
        assert_eq!(r.volume, Level::Low);
        assert_eq!(r.pitch, Level::Low);
        assert_eq!(r.tempo, Level::Low);
        assert_eq!(r.centroid, Level::Low);
    }

    #[test]
    fn undefined_features_are_unknown() {
        let t = ThresholdConfig::default();
        for tempo in [Tempo::InsufficientHistory, Tempo::NoPulse] {
            let r = classify(&features(0.0, 0.0, tempo, 0.0), &t);
            assert_eq!(r.pitch, Level::Unknown);
            assert_eq!(r.tempo, Level::Unknown);
            // Silence is still a measured volume and centroid.
            assert_eq!(r.volume, Level::Low);
            assert_eq!(r.centroid, Level::Low);
        }
    }

    #[test]
    fn pitch_compares_on_midi_scale() {
        let t = ThresholdConfig::default();
        // Middle C is MIDI 60.
        assert_eq!(classify(&features(0.0, 250.0, Tempo::NoPulse, 0.0), &t).pitch, Level::Low);
        assert_eq!(classify(&features(0.0, 270.0, Tempo::NoPulse, 0.0), &t).pitch, Level::High);
    }

    #[test]
    fn nan_is_low() {
        let f = features(f32::NAN, 440.0, Tempo::Bpm(f32::NAN), f32::NAN);
        let r = classify(&f, &ThresholdConfig::default());
        assert_eq!(r.volume, Level::Low);
        assert_eq!(r.tempo, Level::Low);
        assert_eq!(r.centroid, Level::Low);
    }

    #[test]
    fn deterministic() {
        let f = features(0.51, 300.0, Tempo::Bpm(121.0), 1999.0);
        let t = ThresholdConfig::default();
        let first = classify(&f, &t);
        for _ in 0..10 {
            assert_eq!(classify(&f, &t), first);
        }
    }
}
