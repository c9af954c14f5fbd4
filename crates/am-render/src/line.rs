use std::io::{self, Write};

use am_core::frame::BlockReport;
use am_core::traits::Renderer;
use crossterm::queue;
use crossterm::style::{Color as TermColor, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use ratatui::style::Color;

use crate::indicator::Feature;

/// Indicateur affiché pour chaque feature.
const SQUARE: char = '■';

/// One colored status line per block.
///
/// ```text
/// Volume: ■ | Pitch: ■ | Tempo: ■ | Spectral Centroid: ■
/// ```
///
/// In inline mode the same line is rewritten in place instead of scrolling.
///
/// # Example
/// ```
/// use am_core::frame::BlockReport;
/// use am_core::traits::Renderer;
/// use am_render::line::LineRenderer;
///
/// let mut renderer = LineRenderer::new(Vec::new(), false, false);
/// renderer.render(&BlockReport::default()).unwrap();
/// let text = String::from_utf8(renderer.into_inner()).unwrap();
/// assert!(text.contains("Spectral Centroid: "));
/// ```
pub struct LineRenderer<W: Write> {
    out: W,
    inline: bool,
    show_values: bool,
    rendered: u64,
}

impl LineRenderer<io::Stdout> {
    /// Renderer on standard output.
    #[must_use]
    pub fn stdout(inline: bool, show_values: bool) -> Self {
        Self::new(io::stdout(), inline, show_values)
    }
}

impl<W: Write> LineRenderer<W> {
    #[must_use]
    pub fn new(out: W, inline: bool, show_values: bool) -> Self {
        Self {
            out,
            inline,
            show_values,
            rendered: 0,
        }
    }

    /// Lignes émises jusqu'ici.
    #[must_use]
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for LineRenderer<W> {
    fn render(&mut self, report: &BlockReport) -> io::Result<()> {
        if self.inline {
            queue!(self.out, Print('\r'), Clear(ClearType::CurrentLine))?;
        }

        for (i, feature) in Feature::ALL.into_iter().enumerate() {
            if i > 0 {
                queue!(self.out, Print(" | "))?;
            }
            let level = feature.level(&report.classification);
            queue!(
                self.out,
                Print(feature.label()),
                Print(": "),
                SetForegroundColor(term_color(feature.color(level))),
                Print(SQUARE),
                ResetColor
            )?;
            if self.show_values {
                queue!(self.out, Print(format!(" {}", feature.value_text(&report.features))))?;
            }
        }

        if !self.inline {
            queue!(self.out, Print('\n'))?;
        }
        self.rendered += 1;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.inline && self.rendered > 0 {
            // Rendre la main au shell sur une ligne propre.
            queue!(self.out, Print('\n'))?;
        }
        self.out.flush()
    }
}

/// Palette ratatui → couleurs crossterm (seules les teintes de l'indicateur).
fn term_color(color: Color) -> TermColor {
    match color {
        Color::Red => TermColor::Red,
        Color::Green => TermColor::Green,
        Color::Magenta => TermColor::Magenta,
        Color::Cyan => TermColor::Cyan,
        Color::Yellow => TermColor::Yellow,
        Color::Blue => TermColor::Blue,
        Color::White => TermColor::White,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        _ => TermColor::Reset,
    }
}

#[cfg(test)]
mod tests {
    use am_core::frame::{ClassificationResult, FeatureSet, Level, Pitch, Tempo};

    use super::*;

    fn report(level: Level) -> BlockReport {
        BlockReport {
            index: 3,
            features: FeatureSet {
                volume: 0.75,
                pitch: Pitch::from_frequency(440.0),
                tempo: Tempo::Bpm(128.0),
                spectral_centroid: 2500.0,
            },
            classification: ClassificationResult {
                volume: level,
                pitch: level,
                tempo: level,
                centroid: level,
            },
        }
    }

    fn render_text(renderer: LineRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    /// Texte sans séquences d'échappement ANSI.
    fn strip_ansi(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for end in chars.by_ref() {
                    if end.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                plain.push(c);
            }
        }
        plain
    }

    #[test]
    fn emits_feature_labels_in_order() {
        let mut renderer = LineRenderer::new(Vec::new(), false, false);
        renderer.render(&report(Level::High)).unwrap();
        let plain = strip_ansi(&render_text(renderer));
        assert_eq!(
            plain,
            "Volume: ■ | Pitch: ■ | Tempo: ■ | Spectral Centroid: ■\n"
        );
    }

    #[test]
    fn colors_follow_levels() {
        let mut high = LineRenderer::new(Vec::new(), false, false);
        high.render(&report(Level::High)).unwrap();
        let high = render_text(high);
        // Red foreground for a loud block, green for a quiet one.
        assert!(high.contains("\u{1b}[38;5;9m"), "{high:?}");

        let mut low = LineRenderer::new(Vec::new(), false, false);
        low.render(&report(Level::Low)).unwrap();
        let low = render_text(low);
        assert!(low.contains("\u{1b}[38;5;10m"), "{low:?}");
    }

    #[test]
    fn values_are_optional() {
        let mut renderer = LineRenderer::new(Vec::new(), false, true);
        renderer.render(&report(Level::High)).unwrap();
        let plain = strip_ansi(&render_text(renderer));
        assert!(plain.contains("Volume: ■ 0.750"));
        assert!(plain.contains("Tempo: ■ 128.0 BPM"));
    }

    #[test]
    fn inline_mode_rewrites_one_line() {
        let mut renderer = LineRenderer::new(Vec::new(), true, false);
        for _ in 0..3 {
            renderer.render(&report(Level::Low)).unwrap();
        }
        renderer.finish().unwrap();
        assert_eq!(renderer.rendered(), 3);
        let text = render_text(renderer);
        assert_eq!(text.matches('\r').count(), 3);
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.ends_with('\n'));
    }
}
