pub mod annotation;
pub mod config;
pub mod coords;
pub mod error;
pub mod id;
pub mod model;
pub mod persist;
pub mod shape;
pub mod style;

pub use annotation::{Annotation, AnnotationState, EditKind, PointOutcome};
pub use config::EngineConfig;
pub use coords::{ChartScale, CoordinateMapper, LinearScale};
pub use error::PersistError;
pub use id::{AnnotationId, Symbol, ViewportId};
pub use model::*;
pub use persist::{AnnotationRecord, KeyValueStore, MemoryStore, PersistenceAdapter};
pub use shape::{ShapeKind, ShapeSpec};
pub use style::{Color, FibonacciStyle, LineDash, LineStyle, RectangleStyle, StyleOptions};

// Re-export the geometry types so downstream crates share one definition
pub use kurbo::{Point, Rect, Vec2};
