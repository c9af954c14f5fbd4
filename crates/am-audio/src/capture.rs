use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use am_core::config::CaptureConfig;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, SupportedStreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::AudioError;
use crate::source::BlockSource;

/// Intervalle d'attente quand le ring buffer est vide.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Microphone capture via cpal.
///
/// The device callback downmixes to mono and writes into a lock-free SPSC
/// ring buffer; [`BlockSource::read`] is the single consumer. When more than
/// `max_backlog_blocks` blocks are waiting, the oldest samples are dropped so
/// latency stays bounded. Samples the callback cannot push (ring full) are
/// counted as overruns.
///
/// # Example
/// ```no_run
/// use am_audio::capture::MicCapture;
/// use am_audio::source::BlockSource;
/// use am_core::config::CaptureConfig;
/// let capture = MicCapture::open(&CaptureConfig::default()).unwrap();
/// println!("{} Hz", capture.sample_rate());
/// ```
pub struct MicCapture {
    stream: cpal::Stream,
    consumer: Consumer<f32>,
    sample_rate: u32,
    max_backlog: usize,
    stall_timeout: Duration,
    overruns: Arc<AtomicU64>,
    reported_overruns: u64,
    /// Dernière erreur remontée par le callback d'erreur cpal.
    failure: Arc<Mutex<Option<String>>>,
    dropped: u64,
    last_data: Instant,
    stopped: bool,
}

impl MicCapture {
    /// Open the default input device and start capturing.
    ///
    /// The requested sample rate is used when the device supports it;
    /// otherwise the device default is used and a warning is logged.
    ///
    /// # Errors
    /// Returns an error if there is no input device, its sample format is
    /// not supported, or the stream cannot be built or started.
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        let name = device.name().unwrap_or_else(|_| "<sans nom>".into());

        let supported = select_config(&device, config.sample_rate)?;
        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels()).max(1);
        log::info!(
            "Capture : {name}, {sample_rate}Hz, {channels} canal(aux), {:?}",
            supported.sample_format()
        );

        let max_backlog = config.max_backlog_blocks.max(1) * config.block_size;
        // Ring buffer: 2 seconds of audio, never smaller than the backlog bound
        let capacity = (sample_rate as usize * 2).max(2 * (max_backlog + config.block_size));
        let (producer, consumer) = RingBuffer::new(capacity);

        let overruns = Arc::new(AtomicU64::new(0));
        let failure = Arc::new(Mutex::new(None));
        let stream_config = supported.config();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &stream_config,
                channels,
                producer,
                &overruns,
                &failure,
            ),
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &stream_config,
                channels,
                producer,
                &overruns,
                &failure,
            ),
            SampleFormat::U16 => build_stream::<u16>(
                &device,
                &stream_config,
                channels,
                producer,
                &overruns,
                &failure,
            ),
            other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))
            .context("Impossible de démarrer la capture")?;

        Ok(Self {
            stream,
            consumer,
            sample_rate,
            max_backlog,
            stall_timeout: Duration::from_millis(config.stall_timeout_ms),
            overruns,
            reported_overruns: 0,
            failure,
            dropped: 0,
            last_data: Instant::now(),
            stopped: false,
        })
    }

    /// Échantillons perdus côté callback (ring buffer plein).
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Échantillons jetés côté lecture pour borner la latence.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn check_failure(&self) -> Result<(), AudioError> {
        let message = self.failure.lock().ok().and_then(|slot| slot.clone());
        match message {
            Some(msg) => Err(AudioError::StreamError(msg)),
            None => Ok(()),
        }
    }

    fn report_overruns(&mut self) {
        let total = self.overruns();
        if total > self.reported_overruns {
            log::warn!(
                "Ring buffer plein : {} échantillons perdus ({total} au total)",
                total - self.reported_overruns
            );
            self.reported_overruns = total;
        }
    }
}

impl BlockSource for MicCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
        if self.stopped || out.is_empty() {
            return Ok(0);
        }
        loop {
            self.check_failure()?;
            self.report_overruns();

            let trimmed = trim_backlog(&mut self.consumer, self.max_backlog);
            if trimmed > 0 {
                self.dropped += trimmed as u64;
                log::warn!("Retard de traitement : {trimmed} échantillons anciens jetés");
            }

            let n = pop_into(&mut self.consumer, out);
            if n > 0 {
                self.last_data = Instant::now();
                return Ok(n);
            }

            let waited = self.last_data.elapsed();
            if waited >= self.stall_timeout {
                return Err(AudioError::Stalled(waited.as_millis() as u64));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        log::info!(
            "Arrêt de la capture ({} perdus, {} jetés)",
            self.overruns(),
            self.dropped
        );
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }
}

/// Requested rate if a supported range covers it, else the device default.
fn select_config(device: &cpal::Device, requested: u32) -> Result<SupportedStreamConfig> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamError(e.to_string()))
        .context("Impossible de lister les formats du périphérique")?;

    let mut candidates: Vec<_> = ranges
        .filter(|r| r.min_sample_rate().0 <= requested && requested <= r.max_sample_rate().0)
        .filter(|r| {
            matches!(
                r.sample_format(),
                SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
            )
        })
        .collect();
    // F32 d'abord : pas de conversion dans le callback.
    candidates.sort_by_key(|r| r.sample_format() != SampleFormat::F32);

    if let Some(range) = candidates.into_iter().next() {
        return Ok(range.with_sample_rate(cpal::SampleRate(requested)));
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| AudioError::StreamError(e.to_string()))
        .context("Pas de configuration d'entrée par défaut")?;
    log::warn!(
        "{requested}Hz non supporté par le périphérique, repli sur {}Hz",
        fallback.sample_rate().0
    );
    Ok(fallback)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut producer: Producer<f32>,
    overruns: &Arc<AtomicU64>,
    failure: &Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let overruns = Arc::clone(overruns);
    let failure = Arc::clone(failure);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let lost = push_downmixed(data, channels, &mut producer);
                if lost > 0 {
                    overruns.fetch_add(lost, Ordering::Relaxed);
                }
            },
            move |err| {
                log::error!("Erreur du stream audio : {err}");
                if let Ok(mut slot) = failure.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

/// Downmix interleaved frames to mono and push them. Returns how many
/// mono samples did not fit.
fn push_downmixed<T>(data: &[T], channels: usize, producer: &mut Producer<f32>) -> u64
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut lost = 0;
    for frame in data.chunks(channels) {
        let mono = frame
            .iter()
            .map(|&s| <f32 as FromSample<T>>::from_sample_(s))
            .sum::<f32>()
            / frame.len() as f32;
        if producer.push(mono).is_err() {
            lost += 1;
        }
    }
    lost
}

/// Discard the oldest samples beyond `max_backlog`. Returns how many.
fn trim_backlog(consumer: &mut Consumer<f32>, max_backlog: usize) -> usize {
    let excess = consumer.slots().saturating_sub(max_backlog);
    if excess == 0 {
        return 0;
    }
    match consumer.read_chunk(excess) {
        Ok(chunk) => {
            chunk.commit_all();
            excess
        }
        Err(_) => 0,
    }
}

/// Copy as many queued samples as fit into `out`.
fn pop_into(consumer: &mut Consumer<f32>, out: &mut [f32]) -> usize {
    let n = consumer.slots().min(out.len());
    if n == 0 {
        return 0;
    }
    let Ok(chunk) = consumer.read_chunk(n) else {
        return 0;
    };
    let (first, second) = chunk.as_slices();
    out[..first.len()].copy_from_slice(first);
    out[first.len()..n].copy_from_slice(second);
    chunk.commit_all();
    n
}
