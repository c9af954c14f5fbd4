use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Configuration complète du moniteur, chargée une fois au démarrage.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use am_core::config::MonitorConfig;
/// let config = MonitorConfig::default();
/// assert_eq!(config.audio.sample_rate, 44100);
/// assert_eq!(config.audio.block_size, 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MonitorConfig {
    pub audio: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub thresholds: ThresholdConfig,
    pub display: DisplayConfig,
}

/// Capture parameters: what is requested from the input device.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CaptureConfig {
    /// Sample rate demandé au périphérique, en Hz.
    pub sample_rate: u32,
    /// Taille d'un bloc d'analyse, en échantillons.
    pub block_size: usize,
    /// Retard maximal toléré dans le ring buffer, en blocs. Au-delà, les
    /// échantillons les plus anciens sont jetés.
    pub max_backlog_blocks: usize,
    /// Délai sans données avant de déclarer le périphérique bloqué.
    pub stall_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1024,
            max_backlog_blocks: 4,
            stall_timeout_ms: 2000,
        }
    }
}

/// Paramètres des extracteurs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AnalysisConfig {
    /// Seuil absolu YIN sur la différence normalisée [0.01, 1.0].
    pub pitch_tolerance: f32,
    /// Plus basse fondamentale recherchée, en Hz.
    pub pitch_min_hz: f32,
    /// Plus haute fondamentale recherchée, en Hz.
    pub pitch_max_hz: f32,
    /// Taille de transformée du centroïde spectral.
    pub centroid_fft_size: usize,
    /// Borne basse de la recherche de tempo.
    pub tempo_min_bpm: f32,
    /// Borne haute de la recherche de tempo.
    pub tempo_max_bpm: f32,
    /// Historique minimal avant toute estimation de tempo, en secondes.
    pub tempo_min_history_secs: f32,
    /// Capacité de la fenêtre d'historique du tempo, en secondes.
    pub tempo_window_secs: f32,
    /// Exécuter les extracteurs en parallèle (rayon).
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pitch_tolerance: 0.8,
            pitch_min_hz: 40.0,
            pitch_max_hz: 4000.0,
            centroid_fft_size: 2048,
            tempo_min_bpm: 40.0,
            tempo_max_bpm: 240.0,
            tempo_min_history_secs: 3.0,
            tempo_window_secs: 8.0,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Minimum history and window capacity, in blocks, for the given stream.
    ///
    /// # Example
    /// ```
    /// use am_core::config::AnalysisConfig;
    /// let (min, cap) = AnalysisConfig::default().tempo_history_blocks(44100, 1024);
    /// assert_eq!(min, 130);
    /// assert_eq!(cap, 345);
    /// ```
    #[must_use]
    pub fn tempo_history_blocks(&self, sample_rate: u32, block_size: usize) -> (usize, usize) {
        let min = blocks_for_secs(self.tempo_min_history_secs, sample_rate, block_size);
        let cap = blocks_for_secs(self.tempo_window_secs, sample_rate, block_size).max(min);
        (min, cap)
    }

    /// Longest tempo lag searched, in blocks (slowest tempo).
    #[must_use]
    pub fn tempo_max_lag(&self, sample_rate: u32, block_size: usize) -> usize {
        let blocks_per_sec = f64::from(sample_rate) / block_size.max(1) as f64;
        (60.0 * blocks_per_sec / f64::from(self.tempo_min_bpm.max(1.0))).ceil() as usize
    }
}

/// Nombre de blocs couvrant `secs` secondes, arrondi au supérieur.
#[must_use]
pub fn blocks_for_secs(secs: f32, sample_rate: u32, block_size: usize) -> usize {
    (f64::from(secs) * f64::from(sample_rate) / block_size.max(1) as f64).ceil() as usize
}

/// Seuils de classification. Valeur strictement supérieure → `High`.
///
/// # Example
/// ```
/// use am_core::config::ThresholdConfig;
/// let t = ThresholdConfig::default();
/// assert_eq!(t.pitch, 60.0);
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct ThresholdConfig {
    /// Seuil RMS.
    pub volume: f32,
    /// Seuil de hauteur, en demi-tons MIDI (60 = do central).
    pub pitch: f32,
    /// Seuil de tempo, en BPM.
    pub tempo: f32,
    /// Seuil de centroïde spectral, en Hz.
    pub centroid: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            pitch: 60.0,
            tempo: 120.0,
            centroid: 2000.0,
        }
    }
}

/// Display mode enumeration.
///
/// # Example
/// ```
/// use am_core::config::DisplayMode;
/// assert!(matches!(DisplayMode::default(), DisplayMode::Line));
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DisplayMode {
    /// Une ligne colorée par bloc (défilement).
    #[default]
    Line,
    /// Une seule ligne réécrite en place.
    Inline,
    /// Tableau de bord plein écran ratatui.
    Tui,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    /// Afficher les valeurs numériques à côté des indicateurs.
    pub show_values: bool,
}

impl MonitorConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        let a = &mut self.audio;
        a.sample_rate = a.sample_rate.clamp(8000, 192_000);
        a.block_size = a.block_size.clamp(64, 16384);
        a.max_backlog_blocks = a.max_backlog_blocks.clamp(1, 64);
        a.stall_timeout_ms = a.stall_timeout_ms.clamp(100, 60_000);

        let n = &mut self.analysis;
        n.pitch_tolerance = n.pitch_tolerance.clamp(0.01, 1.0);
        n.pitch_min_hz = n.pitch_min_hz.clamp(20.0, 5000.0);
        n.pitch_max_hz = n.pitch_max_hz.clamp(20.0, 20000.0);
        n.centroid_fft_size = n.centroid_fft_size.clamp(16, 65536);
        n.tempo_min_bpm = n.tempo_min_bpm.clamp(10.0, 600.0);
        n.tempo_max_bpm = n.tempo_max_bpm.clamp(10.0, 600.0);
        n.tempo_min_history_secs = n.tempo_min_history_secs.clamp(0.5, 60.0);
        n.tempo_window_secs = n.tempo_window_secs.clamp(0.5, 120.0);

        let t = &mut self.thresholds;
        t.volume = t.volume.max(0.0);
        t.tempo = t.tempo.max(0.0);
        t.centroid = t.centroid.max(0.0);
    }

    /// Check cross-field consistency.
    ///
    /// # Errors
    /// Returns `CoreError::Config` describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), CoreError> {
        let n = &self.analysis;
        if n.pitch_min_hz >= n.pitch_max_hz {
            return Err(CoreError::Config(format!(
                "pitch_min_hz ({}) doit être < pitch_max_hz ({})",
                n.pitch_min_hz, n.pitch_max_hz
            )));
        }
        if n.tempo_min_bpm >= n.tempo_max_bpm {
            return Err(CoreError::Config(format!(
                "tempo_min_bpm ({}) doit être < tempo_max_bpm ({})",
                n.tempo_min_bpm, n.tempo_max_bpm
            )));
        }
        if n.tempo_min_history_secs > n.tempo_window_secs {
            return Err(CoreError::Config(format!(
                "tempo_min_history_secs ({}) dépasse tempo_window_secs ({})",
                n.tempo_min_history_secs, n.tempo_window_secs
            )));
        }
        let (min_blocks, _) = n.tempo_history_blocks(self.audio.sample_rate, self.audio.block_size);
        let max_lag = n.tempo_max_lag(self.audio.sample_rate, self.audio.block_size);
        if min_blocks < max_lag + 2 {
            return Err(CoreError::Config(format!(
                "historique de tempo trop court : {min_blocks} blocs pour un lag de {max_lag} \
                 (augmenter tempo_min_history_secs ou tempo_min_bpm)"
            )));
        }
        Ok(())
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    audio: Option<AudioSection>,
    analysis: Option<AnalysisSection>,
    thresholds: Option<ThresholdSection>,
    display: Option<DisplaySection>,
}

#[derive(Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
    block_size: Option<usize>,
    max_backlog_blocks: Option<usize>,
    stall_timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct AnalysisSection {
    pitch_tolerance: Option<f32>,
    pitch_min_hz: Option<f32>,
    pitch_max_hz: Option<f32>,
    centroid_fft_size: Option<usize>,
    tempo_min_bpm: Option<f32>,
    tempo_max_bpm: Option<f32>,
    tempo_min_history_secs: Option<f32>,
    tempo_window_secs: Option<f32>,
    parallel: Option<bool>,
}

#[derive(Deserialize)]
struct ThresholdSection {
    volume: Option<f32>,
    pitch: Option<f32>,
    tempo: Option<f32>,
    centroid: Option<f32>,
}

#[derive(Deserialize)]
struct DisplaySection {
    mode: Option<DisplayMode>,
    show_values: Option<bool>,
}

/// Assigne `$src.$field` à `$dst.$field` pour chaque champ présent.
macro_rules! merge {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $src.$field {
                $dst.$field = v;
            }
        )+
    };
}

/// Parse a TOML document and merge it over the defaults.
///
/// # Errors
/// Returns an error if the document is not valid TOML, or if the merged
/// configuration is inconsistent.
///
/// # Example
/// ```
/// use am_core::config::parse_config;
/// let config = parse_config("[thresholds]\nvolume = 0.2\n").unwrap();
/// assert_eq!(config.thresholds.volume, 0.2);
/// assert_eq!(config.thresholds.pitch, 60.0);
/// ```
pub fn parse_config(content: &str) -> Result<MonitorConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = MonitorConfig::default();

    if let Some(a) = file.audio {
        merge!(
            config.audio,
            a,
            sample_rate,
            block_size,
            max_backlog_blocks,
            stall_timeout_ms
        );
    }
    if let Some(n) = file.analysis {
        merge!(
            config.analysis,
            n,
            pitch_tolerance,
            pitch_min_hz,
            pitch_max_hz,
            centroid_fft_size,
            tempo_min_bpm,
            tempo_max_bpm,
            tempo_min_history_secs,
            tempo_window_secs,
            parallel,
        );
    }
    if let Some(t) = file.thresholds {
        merge!(config.thresholds, t, volume, pitch, tempo, centroid);
    }
    if let Some(d) = file.display {
        merge!(config.display, d, mode, show_values);
    }

    config.clamp_all();
    config.validate()?;
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file does not exist, cannot be read or parsed,
/// or describes an inconsistent configuration.
///
/// # Example
/// ```no_run
/// use am_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Configuration invalide dans {}", path.display()))?;
    log::info!("Configuration chargée depuis {}", path.display());
    Ok(config)
}
