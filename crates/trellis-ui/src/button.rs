//! Push button.
//!
//! A click raises `tap` on the logical view. Touch down/up toggles the
//! `highlighted` visual state so state rules in the style scope apply while
//! the button is pressed.

use std::rc::Rc;

use trellis_core::*;

pub const BUTTON: &str = "Button";
pub const TAP: &str = "tap";
pub const HIGHLIGHTED: &str = "highlighted";

struct TapForwarder {
    view: WeakView,
}

impl NativeListener for TapForwarder {
    fn on_event(&self, event: &NativeEvent) -> bool {
        if *event != NativeEvent::Click {
            return false;
        }
        let Some((tree, id)) = self.view.upgrade() else {
            return false;
        };
        tree.notify(EventData::new(TAP, id));
        true
    }
}

fn track_pressed(tree: &ViewTree, id: ViewId) {
    let view = tree.downgrade(id);
    let observed = tree.observe(id, GestureTypes::TOUCH, move |event| {
        let state = match event.touch.map(|t| t.action) {
            Some(TouchAction::Down) => Some(HIGHLIGHTED),
            Some(TouchAction::Up | TouchAction::Cancel) => None,
            _ => return,
        };
        if let Some((tree, id)) = view.upgrade()
            && let Err(err) = tree.set_visual_state(id, state)
        {
            log::warn!("button {id:?}: {err}");
        }
    });
    if let Err(err) = observed {
        log::warn!("button {id:?} cannot track touches: {err}");
    }
}

pub(crate) fn spec(text: PropertyId) -> WidgetSpec {
    WidgetSpec::new(BUTTON)
        .accessor(text, Accessor::text("text"))
        .on_init(track_pressed)
        .on_created(|call| {
            let view = call.view.clone();
            call.listen(ListenerSlot::Click, Rc::new(TapForwarder { view }));
        })
        .on_released(|call| call.unlisten(ListenerSlot::Click))
}
