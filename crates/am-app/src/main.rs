use am_audio::BlockSource;
use am_audio::capture::MicCapture;
use am_audio::decode::FileSource;
use am_audio::pipeline::run_pipeline;
use am_audio::synth::SignalSource;
use am_core::CancelToken;
use am_core::config::{DisplayMode, MonitorConfig};
use am_core::traits::Renderer;
use am_render::{LineRenderer, TuiRenderer};
use anyhow::{Context, Result};
use clap::Parser;

pub mod cli;

use cli::{Cli, Input};

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config, puis les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config)?;

    // 4. Ouvrir la source
    let input = cli.input()?;
    let source = open_source(&input, &cli, &config)?;

    // 5. Ctrl-C → annulation coopérative (le bloc en cours se termine)
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Impossible d'installer le handler Ctrl-C")?;

    // 6. Boucle d'analyse
    let mut renderer: Box<dyn Renderer> = match config.display.mode {
        DisplayMode::Tui => Box::new(
            TuiRenderer::new(cancel.clone(), config.thresholds, input.label())
                .context("Impossible d'initialiser le terminal")?,
        ),
        mode @ (DisplayMode::Line | DisplayMode::Inline) => Box::new(LineRenderer::stdout(
            mode == DisplayMode::Inline,
            config.display.show_values,
        )),
    };
    let summary = run_pipeline(source, &mut renderer, &config, &cancel, cli.max_blocks)?;

    log::info!("{} blocs analysés ({:?})", summary.blocks, summary.exit);
    Ok(())
}

/// Charge le fichier de config, ou les défauts s'il n'existe pas.
fn resolve_config(cli: &Cli) -> Result<MonitorConfig> {
    if cli.config.exists() {
        am_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(MonitorConfig::default())
    }
}

fn open_source(input: &Input, cli: &Cli, config: &MonitorConfig) -> Result<Box<dyn BlockSource>> {
    let paced = !cli.no_pacing;
    Ok(match input {
        Input::Mic => Box::new(MicCapture::open(&config.audio)?),
        Input::File(path) => Box::new(FileSource::open(path, paced)?),
        Input::Synth(signal) => {
            let mut source = SignalSource::new(*signal, config.audio.sample_rate).paced(paced);
            if let Some(secs) = cli.duration {
                source = source.with_duration(secs);
            }
            Box::new(source)
        }
    })
}
