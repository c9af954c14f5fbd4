use std::collections::VecDeque;
use std::time::Instant;

/// Cadence de blocs par fenêtre glissante. Zéro allocation après init.
///
/// # Example
/// ```
/// use am_render::rate::BlockRate;
/// let mut rate = BlockRate::new(43);
/// rate.tick();
/// assert!(rate.per_second() >= 0.0);
/// ```
pub struct BlockRate {
    /// Timestamps des derniers N blocs.
    timestamps: VecDeque<Instant>,
    window: usize,
    per_second: f64,
    /// Intervalle entre les deux derniers blocs, en ms.
    pub interval_ms: f64,
}

impl BlockRate {
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            timestamps: VecDeque::with_capacity(window + 1),
            window,
            per_second: 0.0,
            interval_ms: 0.0,
        }
    }

    /// Appeler une fois par bloc rendu.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        if let Some(&last) = self.timestamps.back() {
            self.interval_ms = now.duration_since(last).as_secs_f64() * 1000.0;
        }
        self.timestamps.push_back(now);
        if self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }
        if let Some(&first) = self.timestamps.front() {
            let secs = now.duration_since(first).as_secs_f64();
            if self.timestamps.len() >= 2 && secs > 0.0 {
                self.per_second = (self.timestamps.len() - 1) as f64 / secs;
            }
        }
    }

    /// Blocs par seconde, moyennés sur la fenêtre.
    #[must_use]
    pub fn per_second(&self) -> f64 {
        self.per_second
    }
}
