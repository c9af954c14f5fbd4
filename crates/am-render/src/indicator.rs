use am_core::frame::{ClassificationResult, FeatureSet, Level, Pitch, Tempo};
use ratatui::style::Color;

/// The four monitored features, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    Volume,
    Pitch,
    Tempo,
    Centroid,
}

impl Feature {
    pub const ALL: [Self; 4] = [Self::Volume, Self::Pitch, Self::Tempo, Self::Centroid];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Volume => "Volume",
            Self::Pitch => "Pitch",
            Self::Tempo => "Tempo",
            Self::Centroid => "Spectral Centroid",
        }
    }

    /// Niveau de cette feature dans une classification.
    #[must_use]
    pub fn level(self, classification: &ClassificationResult) -> Level {
        match self {
            Self::Volume => classification.volume,
            Self::Pitch => classification.pitch,
            Self::Tempo => classification.tempo,
            Self::Centroid => classification.centroid,
        }
    }

    /// Couleur de l'indicateur : (High, Low) par feature, gris foncé si inconnu.
    ///
    /// # Example
    /// ```
    /// use am_core::frame::Level;
    /// use am_render::indicator::Feature;
    /// use ratatui::style::Color;
    /// assert_eq!(Feature::Volume.color(Level::High), Color::Red);
    /// assert_eq!(Feature::Volume.color(Level::Low), Color::Green);
    /// assert_eq!(Feature::Tempo.color(Level::Unknown), Color::DarkGray);
    /// ```
    #[must_use]
    pub fn color(self, level: Level) -> Color {
        let (high, low) = match self {
            Self::Volume => (Color::Red, Color::Green),
            Self::Pitch => (Color::Magenta, Color::Cyan),
            Self::Tempo => (Color::Yellow, Color::Blue),
            Self::Centroid => (Color::White, Color::Gray),
        };
        match level {
            Level::High => high,
            Level::Low => low,
            Level::Unknown => Color::DarkGray,
        }
    }

    /// Valeur mesurée, formatée pour l'affichage.
    #[must_use]
    pub fn value_text(self, features: &FeatureSet) -> String {
        match self {
            Self::Volume => format!("{:.3}", features.volume),
            Self::Pitch => match features.pitch {
                Pitch::Voiced { frequency, midi } => format!("{frequency:.1}Hz ({midi:.1})"),
                Pitch::Unvoiced => "unvoiced".to_string(),
            },
            Self::Tempo => match features.tempo {
                Tempo::Bpm(bpm) => format!("{bpm:.1} BPM"),
                Tempo::InsufficientHistory => "warming up".to_string(),
                Tempo::NoPulse => "no pulse".to_string(),
            },
            Self::Centroid => format!("{:.0}Hz", features.spectral_centroid),
        }
    }
}
