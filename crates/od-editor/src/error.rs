use od_core::id::{AnnotationId, ViewportId};

/// Failures reported by the registry's fallible operations.
///
/// Interaction calls (hover, drag, placement) never error: they no-op when
/// their preconditions are gone, since those can legitimately disappear
/// during a viewport teardown.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("viewport descriptor has an empty symbol")]
    EmptySymbol,

    #[error("seconds per bar must be positive and finite, got {0}")]
    InvalidBarInterval(f64),

    #[error("unknown viewport {0}")]
    UnknownViewport(ViewportId),

    #[error("unknown annotation {0}")]
    UnknownAnnotation(AnnotationId),

    #[error("annotation {0} is still being drawn")]
    IncompleteAnnotation(AnnotationId),
}
