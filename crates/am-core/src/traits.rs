use crate::frame::BlockReport;

/// Affiche le résultat de classification d'un bloc.
///
/// Implémenté par : `LineRenderer`, `TuiRenderer`.
///
/// # Example
/// ```
/// use am_core::traits::Renderer;
/// use am_core::frame::BlockReport;
///
/// struct CountingRenderer(usize);
/// impl Renderer for CountingRenderer {
///     fn render(&mut self, _report: &BlockReport) -> std::io::Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut r = CountingRenderer(0);
/// r.render(&BlockReport::default()).unwrap();
/// assert_eq!(r.0, 1);
/// ```
pub trait Renderer {
    /// Affiche un bloc.
    ///
    /// CONTRAT : ne bloque jamais sur une durée non bornée.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the terminal cannot be written.
    fn render(&mut self, report: &BlockReport) -> std::io::Result<()>;

    /// Restaure le terminal à la fin du run. Par défaut : rien à faire.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the terminal cannot be restored.
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, report: &BlockReport) -> std::io::Result<()> {
        (**self).render(report)
    }

    fn finish(&mut self) -> std::io::Result<()> {
        (**self).finish()
    }
}
