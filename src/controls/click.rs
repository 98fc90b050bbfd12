//! A control that reports single clicks on the map to application code.

use egui::Pos2;

use crate::Map;
use crate::form::{LayoutMode, PoiForm};

/// What a click handler may change in response to a click.
pub struct ClickContext<'a> {
    /// The map that was clicked.
    pub map: &'a mut Map,

    /// The point-of-interest form.
    pub form: &'a mut PoiForm,

    /// The layout of the surrounding window.
    pub layout: &'a mut LayoutMode,
}

/// The callback of a [`ClickControl`]. Receives the click position in viewport pixels.
pub type ClickHandler = Box<dyn FnMut(&mut ClickContext<'_>, Pos2)>;

/// Turns single clicks into calls of a handler with the clicked viewport pixel.
///
/// The control starts inactive. Clicks are ignored until [`ClickControl::activate`] is called.
pub struct ClickControl {
    handler: ClickHandler,
    active: bool,
}

impl ClickControl {
    /// Creates a new, inactive click control.
    pub fn new(handler: impl FnMut(&mut ClickContext<'_>, Pos2) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            active: false,
        }
    }

    /// Starts intercepting clicks.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Stops intercepting clicks.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Whether clicks are currently intercepted.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Delivers a click. Returns `true` if the handler ran.
    pub fn trigger(&mut self, ctx: &mut ClickContext<'_>, xy: Pos2) -> bool {
        if !self.active {
            return false;
        }
        (self.handler)(ctx, xy);
        true
    }
}

/// How long a click waits for a second click before it counts as a single click, in seconds.
pub const DOUBLE_CLICK_DELAY: f64 = 0.3;

/// Holds a click back until it is clear that it is not the first half of a double click.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleClickRecognizer {
    pending: Option<(Pos2, f64)>,
}

impl SingleClickRecognizer {
    /// Records a click at `xy` made at time `now`, replacing any pending click.
    pub fn click(&mut self, xy: Pos2, now: f64) {
        self.pending = Some((xy, now));
    }

    /// Forgets the pending click. Called when it turned out to be a double click.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Whether a click is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the pending click once [`DOUBLE_CLICK_DELAY`] has passed since it was made.
    pub fn poll(&mut self, now: f64) -> Option<Pos2> {
        match self.pending {
            Some((xy, at)) if now - at > DOUBLE_CLICK_DELAY => {
                self.pending = None;
                Some(xy)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context_parts() -> (Map, PoiForm, LayoutMode) {
        (Map::new("map"), PoiForm::default(), LayoutMode::Map)
    }

    #[test]
    fn starts_inactive_and_ignores_clicks() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut control = ClickControl::new(move |_, xy| sink.borrow_mut().push(xy));
        assert!(!control.is_active());

        let (mut map, mut form, mut layout) = context_parts();
        let mut ctx = ClickContext {
            map: &mut map,
            form: &mut form,
            layout: &mut layout,
        };
        assert!(!control.trigger(&mut ctx, Pos2::new(1.0, 2.0)));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn activate_and_deactivate() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut control = ClickControl::new(move |_, xy| sink.borrow_mut().push(xy));

        let (mut map, mut form, mut layout) = context_parts();
        let mut ctx = ClickContext {
            map: &mut map,
            form: &mut form,
            layout: &mut layout,
        };

        control.activate();
        assert!(control.is_active());
        assert!(control.trigger(&mut ctx, Pos2::new(10.0, 20.0)));

        control.deactivate();
        assert!(!control.trigger(&mut ctx, Pos2::new(30.0, 40.0)));

        assert_eq!(*seen.borrow(), vec![Pos2::new(10.0, 20.0)]);
    }

    #[test]
    fn handler_can_change_context() {
        let mut control = ClickControl::new(|ctx, _| {
            ctx.form.reveal();
            *ctx.layout = LayoutMode::MenuForm;
        });
        control.activate();

        let (mut map, mut form, mut layout) = context_parts();
        let mut ctx = ClickContext {
            map: &mut map,
            form: &mut form,
            layout: &mut layout,
        };
        control.trigger(&mut ctx, Pos2::ZERO);

        assert!(form.visible);
        assert_eq!(layout, LayoutMode::MenuForm);
    }

    #[test]
    fn single_click_waits_for_double_click_delay() {
        let mut clicks = SingleClickRecognizer::default();
        assert_eq!(clicks.poll(0.0), None);

        clicks.click(Pos2::new(5.0, 6.0), 1.0);
        assert!(clicks.is_pending());
        assert_eq!(clicks.poll(1.1), None);
        assert_eq!(clicks.poll(1.0 + DOUBLE_CLICK_DELAY + 0.01), Some(Pos2::new(5.0, 6.0)));
        assert!(!clicks.is_pending());
        assert_eq!(clicks.poll(5.0), None);
    }

    #[test]
    fn double_click_cancels_pending_click() {
        let mut clicks = SingleClickRecognizer::default();
        clicks.click(Pos2::new(5.0, 6.0), 1.0);
        clicks.cancel();
        assert_eq!(clicks.poll(2.0), None);
    }

    #[test]
    fn later_click_replaces_pending_one() {
        let mut clicks = SingleClickRecognizer::default();
        clicks.click(Pos2::new(1.0, 1.0), 1.0);
        clicks.click(Pos2::new(2.0, 2.0), 1.2);
        assert_eq!(clicks.poll(1.4), None);
        assert_eq!(clicks.poll(1.6), Some(Pos2::new(2.0, 2.0)));
    }
}
