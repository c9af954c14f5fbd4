/// Terminal renderers for audiomon.
///
/// Provides the colored status line, the ratatui dashboard, per-feature
/// indicator styling and block-rate tracking.
pub mod dashboard;
pub mod indicator;
pub mod line;
pub mod rate;
pub mod tui;

pub use line::LineRenderer;
pub use tui::TuiRenderer;
