use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;
use crate::source::BlockSource;

/// Audio file decoded packet by packet into mono f32 samples.
///
/// Supports WAV, MP3, FLAC, OGG, AAC via symphonia. Multi-channel
/// streams are averaged to mono. The stream ends with the file.
///
/// # Example
/// ```no_run
/// use am_audio::decode::FileSource;
/// use am_audio::source::BlockSource;
/// let source = FileSource::open("track.wav", true).unwrap();
/// println!("{} Hz", source.sample_rate());
/// ```
pub struct FileSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    /// Échantillons mono décodés, pas encore lus.
    pending: Vec<f32>,
    cursor: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    delivered: u64,
    realtime: bool,
    started: Option<Instant>,
    ended: bool,
}

impl FileSource {
    /// Open `path` and prepare its default track for decoding.
    ///
    /// With `realtime`, reads are paced to the file's sample rate, as if the
    /// file were playing on an input device.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, its format is not
    /// recognized, or it has no decodable audio track.
    pub fn open(path: impl AsRef<Path>, realtime: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Impossible d'ouvrir le fichier audio : {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))
            .with_context(|| format!("Format non reconnu : {}", path.display()))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("aucune piste audio".into()))?;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            AudioError::UnsupportedFormat("sample rate absent des métadonnées".into())
        })?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))
            .context("Impossible de créer le décodeur audio")?;

        log::info!(
            "Lecture de {} @ {sample_rate}Hz{}",
            path.display(),
            if realtime { " (temps réel)" } else { "" }
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            pending: Vec::new(),
            cursor: 0,
            sample_buf: None,
            delivered: 0,
            realtime,
            started: None,
            ended: false,
        })
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns `false` at end of file.
    fn refill(&mut self) -> Result<bool, AudioError> {
        self.pending.clear();
        self.cursor = 0;
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // Paquet corrompu : on saute, le flux reste exploitable.
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Paquet audio ignoré : {e}");
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let frames = decoded.capacity();
            // Reuse SampleBuffer: only reallocate if this packet is bigger
            let too_small = self
                .sample_buf
                .as_ref()
                .is_none_or(|b| b.capacity() < frames * channels);
            if too_small {
                self.sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            self.pending.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(self.delivered as f64 / f64::from(self.sample_rate));
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

impl BlockSource for FileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize, AudioError> {
        if self.ended || out.is_empty() {
            return Ok(0);
        }
        if self.cursor >= self.pending.len() && !self.refill()? {
            log::debug!("Fin du fichier après {} échantillons", self.delivered);
            self.ended = true;
            return Ok(0);
        }

        let available = &self.pending[self.cursor..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.cursor += n;
        self.delivered += n as u64;

        if self.realtime {
            self.pace();
        }
        Ok(n)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.ended = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// Écrit un WAV PCM 16 bits minimal.
    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[i16]) {
        let data_len = (frames.len() * 2) as u32;
        let block_align = channels * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in frames {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let mut file = File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    fn read_all(source: &mut FileSource) -> Vec<f32> {
        let mut all = Vec::new();
        let mut chunk = [0.0f32; 300];
        loop {
            let n = source.read(&mut chunk).unwrap();
            if n == 0 {
                return all;
            }
            all.extend_from_slice(&chunk[..n]);
        }
    }

    #[test]
    fn decodes_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        let frames: Vec<i16> = (0..1000).map(|i| (i * 16) as i16).collect();
        write_wav(&path, 22050, 1, &frames);

        let mut source = FileSource::open(&path, false).unwrap();
        assert_eq!(source.sample_rate(), 22050);
        let samples = read_all(&mut source);
        assert_eq!(samples.len(), 1000);
        assert!((samples[500] - 8000.0 / 32768.0).abs() < 1e-4);
        assert_eq!(source.read(&mut [0.0; 8]).unwrap(), 0);
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // Left full positive, right silent → mono at half level.
        let frames: Vec<i16> = (0..400).flat_map(|_| [16384i16, 0]).collect();
        write_wav(&path, 8000, 2, &frames);

        let mut source = FileSource::open(&path, false).unwrap();
        let samples = read_all(&mut source);
        assert_eq!(samples.len(), 400);
        assert!(samples.iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(FileSource::open("/nonexistent/track.wav", false).is_err());
    }

    #[test]
    fn garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(FileSource::open(&path, false).is_err());
    }
}
