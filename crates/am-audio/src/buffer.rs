use std::collections::VecDeque;

use am_core::frame::AudioBlock;

use crate::error::AudioError;
use crate::source::BlockSource;

/// Fenêtre glissante bornée, éviction FIFO.
///
/// Ne dépasse jamais sa capacité : un `push` à pleine capacité évince
/// l'entrée la plus ancienne et la retourne.
///
/// # Example
/// ```
/// use am_audio::buffer::HistoryWindow;
/// let mut window = HistoryWindow::new(2);
/// assert_eq!(window.push(1), None);
/// assert_eq!(window.push(2), None);
/// assert_eq!(window.push(3), Some(1));
/// assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Clone, Debug)]
pub struct HistoryWindow<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryWindow<T> {
    /// Create an empty window.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "HistoryWindow capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `value`, evicting (and returning) the oldest entry when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(value);
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        self.entries.iter()
    }
}

/// Découpe le flux d'une source en blocs de taille fixe.
///
/// Possède la source : `stop()` est garanti en sortie, explicitement via
/// [`BlockBuffer::stop`] ou au drop (retour d'erreur, annulation, panique).
pub struct BlockBuffer<S: BlockSource> {
    source: S,
    block_size: usize,
    next_index: u64,
    ended: bool,
    stopped: bool,
}

impl<S: BlockSource> BlockBuffer<S> {
    /// Wrap an open source.
    ///
    /// # Panics
    /// Panics if `block_size` is 0.
    #[must_use]
    pub fn new(source: S, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be > 0");
        Self {
            source,
            block_size,
            next_index: 0,
            ended: false,
            stopped: false,
        }
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Nombre de blocs déjà produits.
    #[must_use]
    pub fn blocks_read(&self) -> u64 {
        self.next_index
    }

    /// Pull exactly `block_size` samples from the source.
    ///
    /// Blocks while the source has fewer samples available. At the end of a
    /// finite source the last partial block is zero-padded; afterwards
    /// `Ok(None)` is returned.
    ///
    /// # Errors
    /// Propagates any source error; these are fatal.
    pub fn next_block(&mut self) -> Result<Option<AudioBlock>, AudioError> {
        if self.ended || self.stopped {
            return Ok(None);
        }

        let mut samples = vec![0.0f32; self.block_size];
        let mut filled = 0;
        while filled < self.block_size {
            let n = self.source.read(&mut samples[filled..])?;
            if n == 0 {
                self.ended = true;
                break;
            }
            filled += n.min(self.block_size - filled);
        }

        if filled == 0 {
            log::debug!("Fin de flux après {} blocs", self.next_index);
            return Ok(None);
        }
        if filled < self.block_size {
            log::debug!(
                "Dernier bloc partiel : {filled}/{} échantillons, complété par des zéros",
                self.block_size
            );
        }

        let block = AudioBlock::new(self.next_index, samples, self.source.sample_rate())
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
        self.next_index += 1;
        Ok(Some(block))
    }

    /// Stop the source. Idempotent; later calls and the drop are no-ops.
    ///
    /// # Errors
    /// Returns the source's stop error (reported once).
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        log::debug!("Arrêt de la source après {} blocs", self.next_index);
        self.source.stop()
    }
}

impl<S: BlockSource> Drop for BlockBuffer<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Arrêt de la source audio en échec : {e}");
        }
    }
}
