//! Host chart surface: scale primitives plus overlay registration.

use crate::view::{ViewInstance, ViewKey};
use od_core::coords::{ChartScale, LinearScale};
use od_core::model::{Time, TimeRange};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("overlay {0:?} is already attached")]
    AlreadyAttached(ViewKey),

    #[error("overlay {0:?} is not attached")]
    NotAttached(ViewKey),

    #[error("host surface rejected the overlay: {0}")]
    Host(String),
}

/// Overlay registration on a host chart pane.
pub trait OverlayHost {
    fn attach_overlay(&mut self, view: &ViewInstance) -> Result<(), OverlayError>;
    fn detach_overlay(&mut self, key: ViewKey) -> Result<(), OverlayError>;
    /// Redraw hint after a view was re-projected.
    fn overlay_changed(&mut self, _view: &ViewInstance) {}
}

/// Everything the engine needs from one chart pane.
pub trait ChartSurface: ChartScale + OverlayHost {}

impl<T: ChartScale + OverlayHost + ?Sized> ChartSurface for T {}

// ─── Headless surface ────────────────────────────────────────────────────

#[derive(Debug)]
struct HeadlessState {
    scale: LinearScale,
    attached: Vec<ViewKey>,
    redraws: usize,
    fail_detach: bool,
}

/// A [`LinearScale`]-backed surface that records overlay traffic.
///
/// The state is shared with [`SurfaceProbe`] so a caller can keep looking
/// at it (and pan it) after handing the surface to the registry.
#[derive(Debug)]
pub struct HeadlessSurface {
    state: Rc<RefCell<HeadlessState>>,
}

/// Observer handle onto a [`HeadlessSurface`].
#[derive(Debug, Clone)]
pub struct SurfaceProbe {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new(scale: LinearScale) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                scale,
                attached: Vec::new(),
                redraws: 0,
                fail_detach: false,
            })),
        }
    }

    pub fn probe(&self) -> SurfaceProbe {
        SurfaceProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl SurfaceProbe {
    /// Views currently attached, in attach order.
    pub fn attached(&self) -> Vec<ViewKey> {
        self.state.borrow().attached.clone()
    }

    pub fn redraws(&self) -> usize {
        self.state.borrow().redraws
    }

    /// Scroll the surface's visible window.
    pub fn pan(&self, dt: f64) {
        self.state.borrow_mut().scale.pan(dt);
    }

    pub fn set_data_range(&self, data: TimeRange) {
        self.state.borrow_mut().scale.data = data;
    }

    /// Make every later detach fail, as a host that already dropped its
    /// overlays would.
    pub fn fail_detach(&self, fail: bool) {
        self.state.borrow_mut().fail_detach = fail;
    }
}

impl ChartScale for HeadlessSurface {
    fn time_to_x(&self, time: Time) -> Option<f64> {
        self.state.borrow().scale.time_to_x(time)
    }

    fn x_to_time(&self, x: f64) -> Option<Time> {
        self.state.borrow().scale.x_to_time(x)
    }

    fn price_to_y(&self, price: f64) -> Option<f64> {
        self.state.borrow().scale.price_to_y(price)
    }

    fn y_to_price(&self, y: f64) -> Option<f64> {
        self.state.borrow().scale.y_to_price(y)
    }

    fn visible_range(&self) -> Option<TimeRange> {
        self.state.borrow().scale.visible_range()
    }

    fn pane_size(&self) -> (f64, f64) {
        self.state.borrow().scale.pane_size()
    }
}

impl OverlayHost for HeadlessSurface {
    fn attach_overlay(&mut self, view: &ViewInstance) -> Result<(), OverlayError> {
        let mut state = self.state.borrow_mut();
        if state.attached.contains(&view.key()) {
            return Err(OverlayError::AlreadyAttached(view.key()));
        }
        state.attached.push(view.key());
        Ok(())
    }

    fn detach_overlay(&mut self, key: ViewKey) -> Result<(), OverlayError> {
        let mut state = self.state.borrow_mut();
        if state.fail_detach {
            return Err(OverlayError::Host("surface disposed".into()));
        }
        let before = state.attached.len();
        state.attached.retain(|k| *k != key);
        if state.attached.len() == before {
            return Err(OverlayError::NotAttached(key));
        }
        Ok(())
    }

    fn overlay_changed(&mut self, _view: &ViewInstance) {
        self.state.borrow_mut().redraws += 1;
    }
}
