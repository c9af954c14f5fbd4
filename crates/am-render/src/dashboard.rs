use am_core::config::ThresholdConfig;
use am_core::frame::{BlockReport, Level};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use crate::indicator::Feature;

/// Everything the dashboard shows for one frame.
pub struct DashboardView<'a> {
    /// Dernier bloc analysé (aucun avant le premier bloc).
    pub report: Option<&'a BlockReport>,
    pub thresholds: &'a ThresholdConfig,
    /// Nom de la source affiché dans le titre.
    pub source: &'a str,
    pub block_rate: f64,
    /// Intervalle entre les deux derniers blocs, en ms.
    pub block_interval_ms: f64,
}

/// Draw the full dashboard: title, 2×2 feature tiles, volume gauge, footer.
pub fn draw(frame: &mut Frame, view: &DashboardView) {
    let area = frame.area();
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(8),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(area);

    let title = Line::from(vec![
        Span::styled(" audiomon ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw(format!("─ {}", view.source)),
    ]);
    frame.render_widget(Paragraph::new(title), rows[0]);

    let halves = Layout::vertical([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)]).split(rows[1]);
    let mut tiles = Vec::with_capacity(4);
    for half in halves.iter() {
        tiles.extend(
            Layout::horizontal([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
                .split(*half)
                .iter()
                .copied(),
        );
    }
    for (feature, tile) in Feature::ALL.into_iter().zip(tiles) {
        draw_tile(frame, tile, feature, view);
    }

    draw_volume_gauge(frame, rows[2], view);

    let index = view.report.map_or_else(|| "-".to_string(), |r| r.index.to_string());
    let footer = Line::from(vec![
        Span::raw(format!(
            " bloc {index} · {:.1} blocs/s · {:.1}ms ",
            view.block_rate, view.block_interval_ms
        )),
        Span::styled("q/Esc quitter", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(footer), rows[3]);
}

fn threshold_text(feature: Feature, thresholds: &ThresholdConfig) -> String {
    match feature {
        Feature::Volume => format!("seuil {:.2}", thresholds.volume),
        Feature::Pitch => format!("seuil MIDI {:.0}", thresholds.pitch),
        Feature::Tempo => format!("seuil {:.0} BPM", thresholds.tempo),
        Feature::Centroid => format!("seuil {:.0}Hz", thresholds.centroid),
    }
}

/// Une tuile : indicateur coloré, niveau, valeur et seuil.
fn draw_tile(frame: &mut Frame, area: Rect, feature: Feature, view: &DashboardView) {
    let (level, value) = match view.report {
        Some(report) => (
            feature.level(&report.classification),
            feature.value_text(&report.features),
        ),
        None => (Level::Unknown, "-".to_string()),
    };
    let color = feature.color(level);

    let lines = vec![
        Line::from(Span::styled(
            format!("■ {}", level.label().to_uppercase()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(value),
        Line::from(Span::styled(
            threshold_text(feature, view.thresholds),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let tile = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {} ", feature.label())),
    );
    frame.render_widget(tile, area);
}

fn draw_volume_gauge(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let (volume, level) = view
        .report
        .map_or((0.0, Level::Unknown), |r| (r.features.volume, r.classification.volume));
    let ratio = f64::from(volume).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" RMS "))
        .gauge_style(Style::default().fg(Feature::Volume.color(level)))
        .ratio(if ratio.is_finite() { ratio } else { 0.0 })
        .label(format!("{volume:.3}"));
    frame.render_widget(gauge, area);
}
