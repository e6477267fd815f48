pub mod hit;
pub mod project;
pub mod surface;
pub mod transform;
pub mod view;

pub use hit::{CursorStyle, Handle, HitSlop};
pub use project::{Anchors, DeviceGeometry, FibLevel};
pub use surface::{ChartSurface, HeadlessSurface, OverlayError, OverlayHost, SurfaceProbe};
pub use view::{ViewInstance, ViewKey, ViewMode};
