use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Jeton d'annulation coopératif partagé entre le pipeline et ses pilotes.
///
/// Le handler Ctrl-C, le renderer TUI (touche `q`) ou un test appellent
/// `cancel()`; la boucle d'analyse lit `is_cancelled()` une fois par bloc.
///
/// Clonable à volonté : tous les clones partagent le même drapeau atomique.
///
/// # Example
/// ```
/// use am_core::cancel::CancelToken;
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Crée un jeton non annulé.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Demande l'arrêt. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// `true` une fois que `cancel()` a été appelé sur n'importe quel clone.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
