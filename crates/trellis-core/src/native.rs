//! The contract between the view tree and a platform's widget toolkit.
//!
//! Handles and contexts are opaque to the core. A platform hands out
//! handles from `create_handle`, owns the actual widgets behind them and
//! reports user input back through [`NativeListener`]s.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Bounds, Point, Size};
use crate::units::MeasureSpec;

/// Opaque platform context (an activity, a window). Compared by identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NativeContext(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle(pub u64);

/// Out-of-band presentation surface for a modal page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

/// Widget type tag. Accessor tables and handle creation are keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetType(pub &'static str);

impl WidgetType {
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Attribute value as the native side stores it.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
}

impl NativeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            NativeValue::Float(f) => Some(*f),
            NativeValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NativeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Null => f.write_str("null"),
            NativeValue::Bool(b) => write!(f, "{b}"),
            NativeValue::Int(i) => write!(f, "{i}"),
            NativeValue::Float(v) => write!(f, "{v}"),
            NativeValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Listener slots a native widget exposes. One listener per slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerSlot {
    Touch,
    Click,
    Text,
    Focus,
    EditorAction,
    Dismiss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Device pixels, relative to the view.
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    Touch(TouchEvent),
    Click,
    TextChanged(String),
    FocusChanged(bool),
    /// Keyboard action key, e.g. `done` or `next`.
    EditorAction(String),
    Dismissed,
}

/// Callback installed on a native widget.
///
/// Listeners outlive nothing: they hold a [`crate::WeakView`] back to their
/// owner and must do nothing once it is gone. The return value tells the
/// platform whether the event was consumed.
pub trait NativeListener {
    fn on_event(&self, event: &NativeEvent) -> bool;
}

impl<F> NativeListener for F
where
    F: Fn(&NativeEvent) -> bool,
{
    fn on_event(&self, event: &NativeEvent) -> bool {
        self(event)
    }
}

/// Platform strategy object driven by the view tree.
///
/// All calls happen on the UI thread. Implementations must not call back
/// into the tree synchronously from these methods; user input is delivered
/// later through listeners.
pub trait NativePlatform {
    /// dip → px multiplier. Queried once per tree.
    fn display_density(&self) -> f32;

    fn create_handle(&mut self, widget: WidgetType, context: NativeContext) -> Result<NativeHandle>;
    fn destroy_handle(&mut self, handle: NativeHandle);

    fn insert_child(&mut self, parent: NativeHandle, child: NativeHandle, index: usize) -> Result<()>;
    /// Must be idempotent.
    fn remove_child(&mut self, parent: NativeHandle, child: NativeHandle);

    fn set_attribute(&mut self, handle: NativeHandle, key: &'static str, value: NativeValue) -> Result<()>;
    fn attribute(&self, handle: NativeHandle, key: &'static str) -> Option<NativeValue>;

    fn set_listener(
        &mut self,
        handle: NativeHandle,
        slot: ListenerSlot,
        listener: Option<Rc<dyn NativeListener>>,
    );

    fn request_layout(&mut self, handle: NativeHandle);
    fn is_layout_requested(&self, handle: NativeHandle) -> bool;
    /// Returns the measured size in device pixels.
    fn measure(&mut self, handle: NativeHandle, width: MeasureSpec, height: MeasureSpec) -> Size;
    fn layout(&mut self, handle: NativeHandle, bounds: Bounds);

    /// Device pixels.
    fn location_in_window(&self, handle: NativeHandle) -> Option<Point>;
    fn location_on_screen(&self, handle: NativeHandle) -> Option<Point>;

    fn request_focus(&mut self, handle: NativeHandle) -> bool;

    fn present_modal(
        &mut self,
        presenter: NativeHandle,
        content: NativeHandle,
        fullscreen: bool,
    ) -> Result<SurfaceId>;
    fn dismiss_modal(&mut self, surface: SurfaceId);
}
