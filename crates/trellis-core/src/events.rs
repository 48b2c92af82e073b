use std::rc::Rc;

use bitflags::bitflags;

use crate::native::TouchEvent;
use crate::tree::ViewId;

/// Named event raised on a view (`tap`, `loaded`, `propertyChange`, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct EventData {
    pub name: String,
    pub object: ViewId,
    pub data: serde_json::Value,
}

impl EventData {
    pub fn new(name: impl Into<String>, object: ViewId) -> Self {
        Self {
            name: name.into(),
            object,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

pub const LOADED: &str = "loaded";
pub const UNLOADED: &str = "unloaded";
pub const PROPERTY_CHANGE: &str = "propertyChange";

pub type EventHandler = Rc<dyn Fn(&EventData)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct GestureTypes: u32 {
        const TAP = 1 << 0;
        const DOUBLE_TAP = 1 << 1;
        const PINCH = 1 << 2;
        const PAN = 1 << 3;
        const SWIPE = 1 << 4;
        const ROTATION = 1 << 5;
        const LONG_PRESS = 1 << 6;
        const TOUCH = 1 << 7;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureTypes,
    pub view: ViewId,
    pub touch: Option<TouchEvent>,
}

pub type GestureObserver = Rc<dyn Fn(&GestureEvent)>;

/// Structural changes, in the order they happened. Drained by the owner of
/// the tree; nothing inside the core depends on them being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Attached(ViewId),
    Detached(ViewId),
    /// A non-forced detach was suppressed by the node's detach policy.
    Retained(ViewId),
    LayoutRequested(ViewId),
}
