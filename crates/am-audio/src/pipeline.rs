use std::time::{Duration, Instant};

use am_core::cancel::CancelToken;
use am_core::config::{AnalysisConfig, MonitorConfig};
use am_core::frame::{AudioBlock, BlockReport, FeatureSet};
use am_core::traits::Renderer;
use anyhow::{Context, Result};

use crate::buffer::BlockBuffer;
use crate::centroid::SpectralCentroid;
use crate::classifier::classify;
use crate::pitch::PitchDetector;
use crate::source::BlockSource;
use crate::tempo::TempoEstimator;
use crate::volume;

/// The four extractors for one stream, with their reusable buffers.
///
/// # Example
/// ```
/// use am_audio::pipeline::Analyzer;
/// use am_core::config::AnalysisConfig;
/// use am_core::frame::{AudioBlock, Pitch, Tempo};
///
/// let mut analyzer = Analyzer::new(&AnalysisConfig::default(), 44100, 1024);
/// let block = AudioBlock::new(0, vec![0.0; 1024], 44100).unwrap();
/// let features = analyzer.analyze(&block);
/// assert_eq!(features.volume, 0.0);
/// assert_eq!(features.pitch, Pitch::Unvoiced);
/// assert_eq!(features.tempo, Tempo::InsufficientHistory);
/// ```
pub struct Analyzer {
    pitch: PitchDetector,
    centroid: SpectralCentroid,
    tempo: TempoEstimator,
    parallel: bool,
}

impl Analyzer {
    #[must_use]
    pub fn new(config: &AnalysisConfig, sample_rate: u32, block_size: usize) -> Self {
        Self {
            pitch: PitchDetector::new(
                sample_rate,
                block_size,
                config.pitch_tolerance,
                config.pitch_min_hz,
                config.pitch_max_hz,
            ),
            centroid: SpectralCentroid::new(sample_rate, block_size, config.centroid_fft_size),
            tempo: TempoEstimator::new(sample_rate, block_size, config),
            parallel: config.parallel,
        }
    }

    /// Extract the features of one block.
    ///
    /// The block joins the tempo history first; volume + pitch then run
    /// alongside centroid + tempo estimation and both halves are joined
    /// before returning.
    ///
    /// # Panics
    /// Panics if the block length differs from the one given to
    /// [`Analyzer::new`].
    pub fn analyze(&mut self, block: &AudioBlock) -> FeatureSet {
        let samples = block.samples();
        self.tempo.append(samples);

        let pitch = &mut self.pitch;
        let centroid = &mut self.centroid;
        let tempo = &self.tempo;
        let mut left = || (volume::rms(samples), pitch.estimate(samples));
        let mut right = || (centroid.compute(samples), tempo.estimate());

        let ((volume, pitch), (spectral_centroid, tempo)) = if self.parallel {
            rayon::join(left, right)
        } else {
            (left(), right())
        };

        FeatureSet {
            volume,
            pitch,
            tempo,
            spectral_centroid,
        }
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Le jeton d'annulation a été levé.
    Cancelled,
    /// La source finie est épuisée.
    EndOfStream,
    /// `max_blocks` atteint.
    BlockLimit,
}

/// Bilan d'un run du pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocs analysés et rendus.
    pub blocks: u64,
    pub exit: ExitReason,
}

/// Run the analysis loop until cancellation, end of stream, `max_blocks`
/// or a fatal error.
///
/// Each iteration checks `cancel`, pulls one block, extracts its features,
/// classifies them and hands the report to `renderer`. The source is
/// stopped and the renderer finished on every exit path, errors included.
///
/// # Errors
/// Returns the first source or renderer error. Source errors keep their
/// [`AudioError`](crate::AudioError) kind for downcasting.
///
/// # Example
/// ```
/// use am_audio::pipeline::{ExitReason, run_pipeline};
/// use am_audio::synth::{Signal, SignalSource};
/// use am_core::{BlockReport, CancelToken, MonitorConfig};
/// use am_core::traits::Renderer;
///
/// struct Count(u64);
/// impl Renderer for Count {
///     fn render(&mut self, _: &BlockReport) -> std::io::Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let source = SignalSource::new(Signal::Noise, 44100).with_duration(0.1);
/// let mut renderer = Count(0);
/// let summary = run_pipeline(source, &mut renderer, &MonitorConfig::default(), &CancelToken::new(), None).unwrap();
/// assert_eq!(summary.exit, ExitReason::EndOfStream);
/// assert_eq!(renderer.0, 5);
/// ```
pub fn run_pipeline<S, R>(
    source: S,
    renderer: &mut R,
    config: &MonitorConfig,
    cancel: &CancelToken,
    max_blocks: Option<u64>,
) -> Result<RunSummary>
where
    S: BlockSource,
    R: Renderer + ?Sized,
{
    let block_size = config.audio.block_size;
    // Le buffer possède la source et l'arrête au drop, même sur panique.
    let mut buffer = BlockBuffer::new(source, block_size);
    let sample_rate = buffer.sample_rate();
    if sample_rate != config.audio.sample_rate {
        log::info!(
            "Sample rate effectif {sample_rate}Hz (demandé {}Hz)",
            config.audio.sample_rate
        );
    }
    log::info!("Analyse : blocs de {block_size} échantillons @ {sample_rate}Hz");

    let mut analyzer = Analyzer::new(&config.analysis, sample_rate, block_size);
    let outcome = drive(&mut buffer, &mut analyzer, renderer, config, cancel, max_blocks);

    let stopped = buffer.stop();
    let finished = renderer.finish();
    let exit = outcome?;
    stopped.context("Arrêt de la source audio")?;
    finished.context("Restauration de l'affichage")?;

    let summary = RunSummary {
        blocks: buffer.blocks_read(),
        exit,
    };
    log::info!("Fin du run : {} blocs ({:?})", summary.blocks, summary.exit);
    Ok(summary)
}

fn drive<S, R>(
    buffer: &mut BlockBuffer<S>,
    analyzer: &mut Analyzer,
    renderer: &mut R,
    config: &MonitorConfig,
    cancel: &CancelToken,
    max_blocks: Option<u64>,
) -> Result<ExitReason>
where
    S: BlockSource,
    R: Renderer + ?Sized,
{
    let budget = Duration::from_secs_f64(buffer.block_size() as f64 / f64::from(buffer.sample_rate()));
    let mut slow_blocks = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Ok(ExitReason::Cancelled);
        }
        if max_blocks.is_some_and(|max| buffer.blocks_read() >= max) {
            return Ok(ExitReason::BlockLimit);
        }
        let Some(block) = buffer.next_block().context("Lecture de la source audio")? else {
            return Ok(ExitReason::EndOfStream);
        };

        let started = Instant::now();
        let features = analyzer.analyze(&block);
        let report = BlockReport {
            index: block.index(),
            features,
            classification: classify(&features, &config.thresholds),
        };
        renderer.render(&report).context("Erreur d'affichage")?;

        let elapsed = started.elapsed();
        if elapsed > budget {
            slow_blocks += 1;
            log::warn!(
                "Bloc {} traité en {:.1}ms, au-delà de sa durée ({:.1}ms) ; {slow_blocks} bloc(s) en retard",
                block.index(),
                elapsed.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use am_core::frame::{Level, Pitch, Tempo};

    use super::*;
    use crate::error::AudioError;
    use crate::synth::{Signal, SignalSource};

    /// Keeps every report; optionally cancels after a number of blocks.
    #[derive(Default)]
    struct Collect {
        reports: Vec<BlockReport>,
        cancel_after: Option<(usize, CancelToken)>,
        finished: u32,
    }

    impl Renderer for Collect {
        fn render(&mut self, report: &BlockReport) -> std::io::Result<()> {
            self.reports.push(*report);
            if let Some((after, token)) = &self.cancel_after
                && self.reports.len() >= *after
            {
                token.cancel();
            }
            Ok(())
        }

        fn finish(&mut self) -> std::io::Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    /// Delegates to a synthetic signal, counts stops, fails on demand.
    struct Probe {
        inner: SignalSource,
        stops: Rc<Cell<u32>>,
        fail_after_reads: Option<u32>,
        reads: u32,
    }

    impl Probe {
        fn new(inner: SignalSource) -> (Self, Rc<Cell<u32>>) {
            let stops = Rc::new(Cell::new(0));
            let probe = Self {
                inner,
                stops: Rc::clone(&stops),
                fail_after_reads: None,
                reads: 0,
            };
            (probe, stops)
        }
    }

    impl BlockSource for Probe {
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
            self.reads += 1;
            if self.fail_after_reads.is_some_and(|n| self.reads > n) {
                return Err(AudioError::Stalled(2000));
            }
            self.inner.read(out)
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            self.stops.set(self.stops.get() + 1);
            self.inner.stop()
        }
    }

    fn sine_440() -> SignalSource {
        SignalSource::new(Signal::Sine { hz: 440.0 }, 44100)
    }

    #[test]
    fn fifty_blocks_of_a440() {
        let mut renderer = Collect::default();
        let summary = run_pipeline(
            sine_440(),
            &mut renderer,
            &MonitorConfig::default(),
            &CancelToken::new(),
            Some(50),
        )
        .unwrap();

        assert_eq!(summary, RunSummary { blocks: 50, exit: ExitReason::BlockLimit });
        assert_eq!(renderer.reports.len(), 50);
        let first_volume = renderer.reports[0].features.volume;
        assert!((first_volume - 0.5 / std::f32::consts::SQRT_2).abs() < 0.01);

        for (i, report) in renderer.reports.iter().enumerate() {
            let f = report.features;
            assert_eq!(report.index, i as u64);
            let hz = f.pitch.frequency().unwrap_or_default();
            assert!((hz - 440.0).abs() < 4.4, "block {i}: pitch {hz}");
            assert!((f.volume - first_volume).abs() < 0.01, "block {i}: volume {}", f.volume);
            assert!((f.spectral_centroid - 440.0).abs() < 60.0, "block {i}: centroid {}", f.spectral_centroid);
            assert_eq!(f.tempo, Tempo::InsufficientHistory);

            let c = report.classification;
            assert_eq!(c.volume, Level::Low);
            assert_eq!(c.pitch, Level::High);
            assert_eq!(c.tempo, Level::Unknown);
            assert_eq!(c.centroid, Level::Low);
        }
        assert_eq!(renderer.finished, 1);
    }

    #[test]
    fn click_track_reaches_a_tempo() {
        let source = SignalSource::new(Signal::Clicks { bpm: 120.0 }, 44100);
        let mut renderer = Collect::default();
        run_pipeline(source, &mut renderer, &MonitorConfig::default(), &CancelToken::new(), Some(345))
            .unwrap();
        let last = renderer.reports.last().map(|r| r.features.tempo);
        let bpm = last.and_then(|t| t.bpm()).unwrap_or_default();
        assert!((bpm - 120.0).abs() <= 5.0, "tempo {last:?}");
    }

    #[test]
    fn end_of_stream_stops_source_once() {
        let (probe, stops) = Probe::new(sine_440().with_duration(0.25));
        let mut renderer = Collect::default();
        let summary = run_pipeline(probe, &mut renderer, &MonitorConfig::default(), &CancelToken::new(), None)
            .unwrap();
        // 11025 samples → 10 full blocks + 1 padded.
        assert_eq!(summary, RunSummary { blocks: 11, exit: ExitReason::EndOfStream });
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn cancellation_before_start_reads_nothing() {
        let (probe, stops) = Probe::new(sine_440());
        let token = CancelToken::new();
        token.cancel();
        let mut renderer = Collect::default();
        let summary = run_pipeline(probe, &mut renderer, &MonitorConfig::default(), &token, None).unwrap();
        assert_eq!(summary, RunSummary { blocks: 0, exit: ExitReason::Cancelled });
        assert!(renderer.reports.is_empty());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn cancellation_mid_run_finishes_the_block_in_flight() {
        let (probe, stops) = Probe::new(sine_440());
        let token = CancelToken::new();
        let mut renderer = Collect {
            cancel_after: Some((3, token.clone())),
            ..Collect::default()
        };
        let summary = run_pipeline(probe, &mut renderer, &MonitorConfig::default(), &token, None).unwrap();
        assert_eq!(summary, RunSummary { blocks: 3, exit: ExitReason::Cancelled });
        assert_eq!(renderer.reports.len(), 3);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn source_error_is_fatal_and_still_stops() {
        let (mut probe, stops) = Probe::new(sine_440());
        probe.fail_after_reads = Some(4);
        let mut renderer = Collect::default();
        let err = run_pipeline(probe, &mut renderer, &MonitorConfig::default(), &CancelToken::new(), None)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AudioError>(), Some(AudioError::Stalled(_))), "{err:#}");
        assert_eq!(renderer.reports.len(), 4);
        assert_eq!(renderer.finished, 1);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn renderer_error_is_fatal_and_still_stops() {
        struct Broken;
        impl Renderer for Broken {
            fn render(&mut self, _: &BlockReport) -> std::io::Result<()> {
                Err(std::io::Error::other("terminal closed"))
            }
        }
        let (probe, stops) = Probe::new(sine_440());
        let result = run_pipeline(probe, &mut Broken, &MonitorConfig::default(), &CancelToken::new(), None);
        assert!(result.is_err());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let mut config = AnalysisConfig::default();
        let mut parallel = Analyzer::new(&config, 44100, 1024);
        config.parallel = false;
        let mut sequential = Analyzer::new(&config, 44100, 1024);

        let mut source = SignalSource::new(Signal::Noise, 44100);
        let mut samples = vec![0.0; 1024];
        for i in 0..20 {
            source.read(&mut samples).unwrap();
            let block = AudioBlock::new(i, samples.clone(), 44100).unwrap();
            assert_eq!(parallel.analyze(&block), sequential.analyze(&block));
        }
    }

    #[test]
    fn silent_block_features() {
        let mut analyzer = Analyzer::new(&AnalysisConfig::default(), 44100, 1024);
        let block = AudioBlock::new(0, vec![0.0; 1024], 44100).unwrap();
        let f = analyzer.analyze(&block);
        assert_eq!(f.volume, 0.0);
        assert_eq!(f.spectral_centroid, 0.0);
        assert_eq!(f.pitch, Pitch::Unvoiced);
    }
}
