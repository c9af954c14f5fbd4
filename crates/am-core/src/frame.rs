use crate::error::CoreError;

/// Un bloc d'analyse : `block_size` échantillons mono f32 à fréquence fixe.
///
/// Immuable une fois produit. La longueur et le sample rate sont constants
/// sur toute la durée d'un run.
///
/// # Example
/// ```
/// use am_core::frame::AudioBlock;
/// let block = AudioBlock::new(0, vec![0.0; 1024], 44100).unwrap();
/// assert_eq!(block.len(), 1024);
/// assert!((block.duration_secs() - 1024.0 / 44100.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    index: u64,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBlock {
    /// Build a block from owned samples.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidBlock` if `samples` is empty or
    /// `sample_rate` is 0.
    pub fn new(index: u64, samples: Vec<f32>, sample_rate: u32) -> Result<Self, CoreError> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(CoreError::InvalidBlock {
                len: samples.len(),
                sample_rate,
            });
        }
        Ok(Self {
            index,
            samples,
            sample_rate,
        })
    }

    /// Position of this block in the stream, starting at 0.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Échantillons mono, normalisés [-1, 1].
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`: empty blocks are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Durée réelle couverte par le bloc, en secondes.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Fundamental frequency of a block, or the unvoiced sentinel.
///
/// A voiced pitch is always finite and strictly positive; it is never
/// encoded as 0.
///
/// # Example
/// ```
/// use am_core::frame::Pitch;
/// let a4 = Pitch::from_frequency(440.0);
/// assert!((a4.midi().unwrap() - 69.0).abs() < 1e-4);
/// assert_eq!(Pitch::from_frequency(0.0), Pitch::Unvoiced);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Pitch {
    /// Pas de périodicité fiable dans le bloc.
    #[default]
    Unvoiced,
    /// Hauteur détectée.
    Voiced {
        /// Fréquence fondamentale en Hz.
        frequency: f32,
        /// Même hauteur sur l'échelle continue des demi-tons (69 = A4).
        midi: f32,
    },
}

impl Pitch {
    /// Convert a frequency to a pitch. Non-finite or non-positive
    /// frequencies map to `Unvoiced`.
    #[must_use]
    pub fn from_frequency(frequency: f32) -> Self {
        if frequency.is_finite() && frequency > 0.0 {
            Self::Voiced {
                frequency,
                midi: 69.0 + 12.0 * (frequency / 440.0).log2(),
            }
        } else {
            Self::Unvoiced
        }
    }

    #[must_use]
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            Self::Voiced { frequency, .. } => Some(frequency),
            Self::Unvoiced => None,
        }
    }

    #[must_use]
    pub fn midi(&self) -> Option<f32> {
        match *self {
            Self::Voiced { midi, .. } => Some(midi),
            Self::Unvoiced => None,
        }
    }

    #[must_use]
    pub fn is_voiced(&self) -> bool {
        matches!(self, Self::Voiced { .. })
    }
}

/// Estimated tempo, or why there is none yet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Tempo {
    /// Pas encore assez de blocs dans la fenêtre d'historique.
    #[default]
    InsufficientHistory,
    /// Historique suffisant mais enveloppe d'onsets sans périodicité.
    NoPulse,
    /// Tempo dominant en battements par minute.
    Bpm(f32),
}

impl Tempo {
    #[must_use]
    pub fn bpm(&self) -> Option<f32> {
        match *self {
            Self::Bpm(bpm) => Some(bpm),
            Self::InsufficientHistory | Self::NoPulse => None,
        }
    }
}

/// Features extraites d'un seul bloc. Produit neuf à chaque bloc.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureSet {
    /// Énergie RMS, toujours ≥ 0.
    pub volume: f32,
    pub pitch: Pitch,
    pub tempo: Tempo,
    /// Centroïde spectral en Hz (0 pour un bloc silencieux).
    pub spectral_centroid: f32,
}

/// Niveau qualitatif d'une feature après comparaison au seuil.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Level {
    /// Valeur ≤ seuil.
    Low,
    /// Valeur strictement > seuil.
    High,
    /// Feature indéfinie (non voisé, historique insuffisant, pas de pulsation).
    #[default]
    Unknown,
}

impl Level {
    /// Short label used by the renderers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Unknown => "--",
        }
    }
}

/// Per-feature levels for one block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClassificationResult {
    pub volume: Level,
    pub pitch: Level,
    pub tempo: Level,
    pub centroid: Level,
}

/// Ce que le pipeline remet au renderer pour chaque bloc.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockReport {
    /// Index du bloc dans le flux.
    pub index: u64,
    pub features: FeatureSet,
    pub classification: ClassificationResult,
}
