use std::io;
use std::time::Duration;

use am_core::cancel::CancelToken;
use am_core::config::ThresholdConfig;
use am_core::frame::BlockReport;
use am_core::traits::Renderer;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;

use crate::dashboard::{self, DashboardView};
use crate::rate::BlockRate;

/// Full-screen ratatui dashboard.
///
/// Takes over the terminal on creation and restores it in
/// [`Renderer::finish`] (or on drop). Key presses are polled between
/// blocks: `q`, `Esc` or `Ctrl-C` cancel the run through the shared token,
/// since raw mode swallows the interrupt signal.
pub struct TuiRenderer {
    terminal: DefaultTerminal,
    cancel: CancelToken,
    thresholds: ThresholdConfig,
    source: String,
    rate: BlockRate,
    restored: bool,
}

impl TuiRenderer {
    /// Enter the alternate screen and raw mode.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be initialized.
    pub fn new(cancel: CancelToken, thresholds: ThresholdConfig, source: impl Into<String>) -> io::Result<Self> {
        let terminal = ratatui::try_init()?;
        log::debug!("Terminal ratatui initialisé");
        Ok(Self {
            terminal,
            cancel,
            thresholds,
            source: source.into(),
            rate: BlockRate::new(64),
            restored: false,
        })
    }

    /// Traite les événements clavier en attente, sans bloquer.
    fn poll_keys(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && is_quit_key(&key)
            {
                log::info!("Arrêt demandé depuis le tableau de bord");
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    fn restore(&mut self) {
        if !self.restored {
            self.restored = true;
            ratatui::restore();
        }
    }
}

impl Renderer for TuiRenderer {
    fn render(&mut self, report: &BlockReport) -> io::Result<()> {
        self.poll_keys()?;
        self.rate.tick();
        let view = DashboardView {
            report: Some(report),
            thresholds: &self.thresholds,
            source: &self.source,
            block_rate: self.rate.per_second(),
            block_interval_ms: self.rate.interval_ms,
        };
        self.terminal.draw(|frame| dashboard::draw(frame, &view))?;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.restore();
        Ok(())
    }
}

impl Drop for TuiRenderer {
    fn drop(&mut self) {
        self.restore();
    }
}

/// `q`, `Esc` ou `Ctrl-C` (appui uniquement).
fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_keys() {
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit_key(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
    }

    #[test]
    fn key_release_is_ignored() {
        let mut key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert!(!is_quit_key(&key));
    }
}
