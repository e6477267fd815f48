use crate::shape::ShapeKind;

/// Failure to turn a persisted record back into an annotation, or to write
/// a symbol's list out.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("unknown shape kind `{0}`")]
    UnknownShapeKind(String),

    #[error("{kind} expects {expected} control points, found {found}")]
    PointCount {
        kind: ShapeKind,
        expected: usize,
        found: usize,
    },

    #[error("control point {index} is not finite")]
    NonFinitePoint { index: usize },

    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
