use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::AudioError;
use crate::source::BlockSource;

/// Amplitude des signaux continus (sinus, bruit).
const LEVEL: f32 = 0.5;

/// Synthetic signal shapes.
///
/// Parsed from `sine:<hz>`, `clicks:<bpm>`, `noise` or `silence`.
///
/// # Example
/// ```
/// use am_audio::synth::Signal;
/// assert_eq!("sine:440".parse::<Signal>().unwrap(), Signal::Sine { hz: 440.0 });
/// assert_eq!("clicks:120".parse::<Signal>().unwrap(), Signal::Clicks { bpm: 120.0 });
/// assert!("square:440".parse::<Signal>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Signal {
    /// Sinus pur.
    Sine { hz: f32 },
    /// Une impulsion pleine échelle par temps.
    Clicks { bpm: f32 },
    /// Bruit blanc uniforme (générateur déterministe).
    Noise,
    Silence,
}

impl FromStr for Signal {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let positive = |arg: Option<&str>| -> Result<f32, AudioError> {
            let value: f32 = arg
                .ok_or_else(|| AudioError::UnsupportedFormat(format!("{s} : valeur manquante")))?
                .trim()
                .parse()
                .map_err(|_| AudioError::UnsupportedFormat(format!("{s} : nombre invalide")))?;
            if value.is_finite() && value > 0.0 {
                Ok(value)
            } else {
                Err(AudioError::UnsupportedFormat(format!("{s} : valeur ≤ 0")))
            }
        };
        match kind.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Self::Sine { hz: positive(arg)? }),
            "clicks" => Ok(Self::Clicks { bpm: positive(arg)? }),
            "noise" => Ok(Self::Noise),
            "silence" => Ok(Self::Silence),
            _ => Err(AudioError::UnsupportedFormat(format!(
                "signal inconnu « {s} » (sine:<hz>, clicks:<bpm>, noise, silence)"
            ))),
        }
    }
}

/// Generated block source, for demos and tests.
///
/// Infinite unless a duration is set. With pacing enabled, `read` sleeps
/// so that samples are delivered no faster than real time.
///
/// # Example
/// ```
/// use am_audio::source::BlockSource;
/// use am_audio::synth::{Signal, SignalSource};
///
/// let mut source = SignalSource::new(Signal::Silence, 8000).with_duration(0.01);
/// let mut out = [1.0f32; 100];
/// assert_eq!(source.read(&mut out).unwrap(), 80);
/// assert_eq!(source.read(&mut out).unwrap(), 0);
/// ```
pub struct SignalSource {
    signal: Signal,
    sample_rate: u32,
    position: u64,
    limit: Option<u64>,
    realtime: bool,
    started: Option<Instant>,
    noise_state: u32,
    stopped: bool,
}

impl SignalSource {
    /// # Panics
    /// Panics if `sample_rate` is 0.
    #[must_use]
    pub fn new(signal: Signal, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be > 0");
        Self {
            signal,
            sample_rate,
            position: 0,
            limit: None,
            realtime: false,
            started: None,
            noise_state: 0x1234_5678,
            stopped: false,
        }
    }

    /// Fin de flux après `secs` secondes de signal.
    #[must_use]
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.limit = Some((secs.max(0.0) * f64::from(self.sample_rate)).round() as u64);
        self
    }

    /// Cadence les lectures au rythme d'un vrai périphérique.
    #[must_use]
    pub fn paced(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    fn next_sample(&mut self) -> f32 {
        let t = self.position as f64 / f64::from(self.sample_rate);
        match self.signal {
            Signal::Sine { hz } => {
                LEVEL * (2.0 * std::f64::consts::PI * f64::from(hz) * t).sin() as f32
            }
            Signal::Clicks { bpm } => {
                let period = 60.0 * f64::from(self.sample_rate) / f64::from(bpm);
                if (self.position as f64) % period < 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Signal::Noise => {
                self.noise_state = self
                    .noise_state
                    .wrapping_mul(1_664_525)
                    .wrapping_add(1_013_904_223);
                let unit = (self.noise_state >> 8) as f32 / (1u32 << 24) as f32;
                LEVEL * (unit * 2.0 - 1.0)
            }
            Signal::Silence => 0.0,
        }
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(self.position as f64 / f64::from(self.sample_rate));
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

impl BlockSource for SignalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
        if self.stopped {
            return Ok(0);
        }
        let remaining = self
            .limit
            .map_or(out.len() as u64, |limit| limit.saturating_sub(self.position));
        let n = out.len().min(remaining as usize);
        for slot in &mut out[..n] {
            *slot = self.next_sample();
            self.position += 1;
        }
        if self.realtime && n > 0 {
            self.pace();
        }
        Ok(n)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut SignalSource, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        let n = source.read(&mut out).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn parses_every_shape() {
        assert_eq!("noise".parse::<Signal>().unwrap(), Signal::Noise);
        assert_eq!("SILENCE".parse::<Signal>().unwrap(), Signal::Silence);
        assert_eq!("sine: 220.5".parse::<Signal>().unwrap(), Signal::Sine { hz: 220.5 });
        assert!("sine".parse::<Signal>().is_err());
        assert!("clicks:-3".parse::<Signal>().is_err());
        assert!("clicks:fast".parse::<Signal>().is_err());
    }

    #[test]
    fn clicks_land_once_per_beat() {
        // 120 BPM at 8 kHz: one click every 4000 samples.
        let mut source = SignalSource::new(Signal::Clicks { bpm: 120.0 }, 8000);
        let samples = drain(&mut source, 12_000);
        let clicks: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| **s > 0.5)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(clicks, vec![0, 4000, 8000]);
    }

    #[test]
    fn sine_stays_within_level() {
        let mut source = SignalSource::new(Signal::Sine { hz: 440.0 }, 44100);
        let samples = drain(&mut source, 4410);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= LEVEL + 1e-6 && peak > 0.49);
    }

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let a = drain(&mut SignalSource::new(Signal::Noise, 8000), 512);
        let b = drain(&mut SignalSource::new(Signal::Noise, 8000), 512);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.abs() <= LEVEL));
    }

    #[test]
    fn duration_ends_stream() {
        let mut source = SignalSource::new(Signal::Noise, 1000).with_duration(1.5);
        assert_eq!(drain(&mut source, 1000).len(), 1000);
        assert_eq!(drain(&mut source, 1000).len(), 500);
        assert!(drain(&mut source, 1000).is_empty());
    }

    #[test]
    fn stop_ends_an_infinite_stream() {
        let mut source = SignalSource::new(Signal::Sine { hz: 100.0 }, 8000);
        assert_eq!(drain(&mut source, 64).len(), 64);
        source.stop().unwrap();
        assert!(drain(&mut source, 64).is_empty());
    }

    #[test]
    fn paced_reads_take_real_time() {
        let mut source = SignalSource::new(Signal::Silence, 1000).paced(true);
        let start = Instant::now();
        drain(&mut source, 50);
        drain(&mut source, 50);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
