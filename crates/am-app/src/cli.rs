use std::path::{Path, PathBuf};

use am_audio::synth::Signal;
use am_core::config::{DisplayMode, MonitorConfig};
use clap::{Parser, ValueEnum};

/// audiomon : moniteur audio temps réel : volume, hauteur, tempo, centroïde.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source audio : "mic", chemin vers un fichier audio, ou signal
    /// synthétique (sine:440, clicks:120, noise, silence).
    #[arg(short, long, default_value = "mic")]
    pub input: String,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Mode d'affichage (remplace [display].mode).
    #[arg(short, long, value_enum)]
    pub display: Option<DisplayArg>,

    /// Sample rate demandé, en Hz.
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Taille de bloc, en échantillons.
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Arrêter après N blocs.
    #[arg(long)]
    pub max_blocks: Option<u64>,

    /// Durée des signaux synthétiques, en secondes (infini par défaut).
    #[arg(long)]
    pub duration: Option<f64>,

    /// Lire fichiers et signaux aussi vite que possible, sans cadence temps réel.
    #[arg(long, default_value_t = false)]
    pub no_pacing: bool,

    /// Afficher les valeurs numériques à côté des indicateurs.
    #[arg(long, default_value_t = false)]
    pub values: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DisplayArg {
    Line,
    Inline,
    Tui,
}

impl From<DisplayArg> for DisplayMode {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::Line => Self::Line,
            DisplayArg::Inline => Self::Inline,
            DisplayArg::Tui => Self::Tui,
        }
    }
}

/// Source choisie par `--input`.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Mic,
    File(PathBuf),
    Synth(Signal),
}

impl Input {
    /// Nom court pour le titre du tableau de bord.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Mic => "microphone".to_string(),
            Self::File(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            Self::Synth(signal) => format!("{signal:?}"),
        }
    }
}

impl Cli {
    /// Resolve `--input`: microphone keywords, then an existing file, then
    /// a synthetic signal.
    ///
    /// # Errors
    /// Returns an error if the argument is none of these.
    pub fn input(&self) -> anyhow::Result<Input> {
        let arg = self.input.trim();
        if matches!(arg, "mic" | "default" | "microphone") {
            return Ok(Input::Mic);
        }
        if Path::new(arg).exists() {
            return Ok(Input::File(PathBuf::from(arg)));
        }
        match arg.parse::<Signal>() {
            Ok(signal) => Ok(Input::Synth(signal)),
            Err(e) => anyhow::bail!("Source audio introuvable : {arg} ({e})"),
        }
    }

    /// Appliquer les overrides CLI à la configuration chargée.
    ///
    /// # Errors
    /// Returns an error if the overridden configuration is inconsistent.
    pub fn apply_overrides(&self, config: &mut MonitorConfig) -> anyhow::Result<()> {
        if let Some(display) = self.display {
            config.display.mode = display.into();
        }
        if let Some(rate) = self.sample_rate {
            config.audio.sample_rate = rate;
        }
        if let Some(size) = self.block_size {
            config.audio.block_size = size;
        }
        if self.values {
            config.display.show_values = true;
        }
        config.clamp_all();
        config.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("audiomon").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.input().unwrap(), Input::Mic);
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert_eq!(cli.log_level, "warn");
        assert!(cli.display.is_none());
    }

    #[test]
    fn synthetic_inputs() {
        let cli = parse(&["-i", "clicks:128"]);
        assert_eq!(cli.input().unwrap(), Input::Synth(Signal::Clicks { bpm: 128.0 }));
        assert!(parse(&["--input", "nowhere.wav"]).input().is_err());
    }

    #[test]
    fn existing_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("noise");
        std::fs::write(&file, b"").unwrap();
        let arg = file.display().to_string();
        assert_eq!(parse(&["--input", &arg]).input().unwrap(), Input::File(file));
    }

    #[test]
    fn overrides_apply_then_clamp() {
        let cli = parse(&["--display", "tui", "--block-size", "10", "--sample-rate", "48000", "--values"]);
        let mut config = MonitorConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.display.mode, DisplayMode::Tui);
        assert_eq!(config.audio.block_size, 64);
        assert_eq!(config.audio.sample_rate, 48000);
        assert!(config.display.show_values);
    }

    #[test]
    fn unknown_display_is_rejected() {
        assert!(Cli::try_parse_from(["audiomon", "--display", "hologram"]).is_err());
    }
}
