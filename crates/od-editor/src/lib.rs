pub mod error;
pub mod events;
pub mod input;
pub mod registry;
pub mod shortcuts;
pub mod tools;
pub mod viewport;

pub use error::EngineError;
pub use events::{EngineEvent, EventBus, ToolGroup};
pub use input::{InputEvent, Modifiers, PointerButton};
pub use registry::{AnnotationRegistry, Selection, ViewportDescriptor, ViewportHandle};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use tools::{DrawingSession, Reanchor, ToolCoordinator, ToolToggle};
pub use viewport::{PointerResponse, ViewportController};
