//! Interaction controls attached to the map view.

/// Click-to-select control.
pub mod click;

/// A named interaction control of the map view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Drag to pan, scroll or double-click to zoom.
    Navigation,

    /// Zoom in/out buttons in the top-left corner.
    ZoomPanel,

    /// Touch drag panning. With `kinetic` the map keeps moving after release and slows down.
    TouchNavigation {
        /// Whether panning continues with inertia after the pointer is released.
        kinetic: bool,
    },
}

impl Control {
    /// A short human readable name of the control.
    pub fn name(&self) -> &'static str {
        match self {
            Control::Navigation => "Navigation",
            Control::ZoomPanel => "ZoomPanel",
            Control::TouchNavigation { .. } => "TouchNavigation",
        }
    }
}
