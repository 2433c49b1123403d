use tokio::sync::mpsc;

use crate::types::Annotation;

/// One-way channel for progress annotations.
///
/// Emitting never blocks and never fails the run: once the receiving side is
/// gone, annotations are dropped.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSink {
    tx: Option<mpsc::UnboundedSender<Annotation>>,
}

impl AnnotationSink {
    /// Create a sink and the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Annotation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Send `annotation` if anyone is listening; never blocks or fails
    pub fn emit(&self, annotation: Annotation) {
        if let Some(tx) = &self.tx {
            if tx.send(annotation).is_err() {
                tracing::trace!("Annotation receiver dropped");
            }
        }
    }
}
