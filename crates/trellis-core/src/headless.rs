//! In-memory platform that records every native call.
//!
//! Used by the test suites and the demo. Clones share state, so a test keeps
//! one clone to inspect while the tree owns another.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::geometry::{Bounds, Point, Size};
use crate::native::{
    ListenerSlot, NativeContext, NativeEvent, NativeHandle, NativeListener, NativePlatform, NativeValue,
    SurfaceId, WidgetType,
};
use crate::units::MeasureSpec;

#[derive(Clone, Debug, PartialEq)]
pub enum NativeCallRecord {
    Create { handle: NativeHandle, widget: &'static str },
    Destroy(NativeHandle),
    Insert { parent: NativeHandle, child: NativeHandle, index: usize },
    Remove { parent: NativeHandle, child: NativeHandle },
    Set { handle: NativeHandle, key: &'static str, value: NativeValue },
    RequestLayout(NativeHandle),
    PresentModal { presenter: NativeHandle, content: NativeHandle, surface: SurfaceId },
    DismissModal(SurfaceId),
}

struct HeadlessView {
    widget: &'static str,
    context: NativeContext,
    parent: Option<NativeHandle>,
    children: Vec<NativeHandle>,
    attributes: BTreeMap<&'static str, NativeValue>,
    listeners: HashMap<ListenerSlot, Rc<dyn NativeListener>>,
    layout_requested: bool,
    bounds: Bounds,
    intrinsic: Size,
}

struct Surface {
    content: NativeHandle,
    fullscreen: bool,
}

struct HeadlessState {
    density: f32,
    next_handle: u64,
    next_context: u64,
    next_surface: u64,
    views: BTreeMap<NativeHandle, HeadlessView>,
    surfaces: BTreeMap<SurfaceId, Surface>,
    calls: Vec<NativeCallRecord>,
    failing_widgets: HashSet<&'static str>,
    rejecting_parents: HashSet<NativeHandle>,
    window_origin: Point,
    focused: Option<NativeHandle>,
}

#[derive(Clone)]
pub struct HeadlessPlatform {
    state: Rc<RefCell<HeadlessState>>,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl HeadlessPlatform {
    pub fn new(density: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                density,
                next_handle: 1,
                next_context: 1,
                next_surface: 1,
                views: BTreeMap::new(),
                surfaces: BTreeMap::new(),
                calls: Vec::new(),
                failing_widgets: HashSet::new(),
                rejecting_parents: HashSet::new(),
                window_origin: Point::default(),
                focused: None,
            })),
        }
    }

    pub fn boxed(&self) -> Box<dyn NativePlatform> {
        Box::new(self.clone())
    }

    pub fn new_context(&self) -> NativeContext {
        let mut s = self.state.borrow_mut();
        let ctx = NativeContext(s.next_context);
        s.next_context += 1;
        ctx
    }

    pub fn set_density(&self, density: f32) {
        self.state.borrow_mut().density = density;
    }

    pub fn calls(&self) -> Vec<NativeCallRecord> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Attribute writes to `handle`, in call order.
    pub fn sets_for(&self, handle: NativeHandle) -> Vec<(&'static str, NativeValue)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                NativeCallRecord::Set { handle: h, key, value } if *h == handle => {
                    Some((*key, value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn children_of(&self, handle: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .borrow()
            .views
            .get(&handle)
            .map(|v| v.children.clone())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, handle: NativeHandle) -> Option<NativeHandle> {
        self.state.borrow().views.get(&handle)?.parent
    }

    pub fn widget_of(&self, handle: NativeHandle) -> Option<&'static str> {
        self.state.borrow().views.get(&handle).map(|v| v.widget)
    }

    pub fn context_of(&self, handle: NativeHandle) -> Option<NativeContext> {
        self.state.borrow().views.get(&handle).map(|v| v.context)
    }

    pub fn is_alive(&self, handle: NativeHandle) -> bool {
        self.state.borrow().views.contains_key(&handle)
    }

    pub fn live_handles(&self) -> usize {
        self.state.borrow().views.len()
    }

    pub fn has_listener(&self, handle: NativeHandle, slot: ListenerSlot) -> bool {
        self.state
            .borrow()
            .views
            .get(&handle)
            .is_some_and(|v| v.listeners.contains_key(&slot))
    }

    /// Stored attribute, without recording a call.
    pub fn peek(&self, handle: NativeHandle, key: &str) -> Option<NativeValue> {
        self.state.borrow().views.get(&handle)?.attributes.get(key).cloned()
    }

    /// Seeds an attribute as if the toolkit had a default for it.
    pub fn seed_attribute(&self, handle: NativeHandle, key: &'static str, value: NativeValue) {
        if let Some(v) = self.state.borrow_mut().views.get_mut(&handle) {
            v.attributes.insert(key, value);
        }
    }

    pub fn set_intrinsic_size(&self, handle: NativeHandle, size: Size) {
        if let Some(v) = self.state.borrow_mut().views.get_mut(&handle) {
            v.intrinsic = size;
        }
    }

    pub fn set_window_origin(&self, origin: Point) {
        self.state.borrow_mut().window_origin = origin;
    }

    /// Makes handle creation fail for `widget`.
    pub fn fail_creation_of(&self, widget: &'static str) {
        self.state.borrow_mut().failing_widgets.insert(widget);
    }

    /// Makes `insert_child` into `parent` fail until [`Self::accept_children`].
    pub fn reject_children(&self, parent: NativeHandle) {
        self.state.borrow_mut().rejecting_parents.insert(parent);
    }

    pub fn accept_children(&self, parent: NativeHandle) {
        self.state.borrow_mut().rejecting_parents.remove(&parent);
    }

    pub fn focused(&self) -> Option<NativeHandle> {
        self.state.borrow().focused
    }

    pub fn open_surfaces(&self) -> Vec<(SurfaceId, NativeHandle, bool)> {
        self.state
            .borrow()
            .surfaces
            .iter()
            .map(|(id, s)| (*id, s.content, s.fullscreen))
            .collect()
    }

    /// Delivers `event` to the listener in `slot`, like user input would.
    pub fn dispatch(&self, handle: NativeHandle, slot: ListenerSlot, event: NativeEvent) -> bool {
        let listener = self
            .state
            .borrow()
            .views
            .get(&handle)
            .and_then(|v| v.listeners.get(&slot).cloned());
        match listener {
            Some(l) => l.on_event(&event),
            None => false,
        }
    }

    /// Simulates the user dismissing a modal surface (back button, swipe).
    pub fn dismiss_surface(&self, surface: SurfaceId) -> bool {
        let content = self.state.borrow().surfaces.get(&surface).map(|s| s.content);
        match content {
            Some(content) => self.dispatch(content, ListenerSlot::Dismiss, NativeEvent::Dismissed),
            None => false,
        }
    }

    /// Indented dump of the native subtree under `root`.
    pub fn dump(&self, root: NativeHandle) -> String {
        let s = self.state.borrow();
        let mut out = String::new();
        dump_into(&s, root, 0, &mut out);
        out
    }
}

fn dump_into(s: &HeadlessState, handle: NativeHandle, depth: usize, out: &mut String) {
    let Some(view) = s.views.get(&handle) else {
        return;
    };
    let _ = write!(out, "{}{}#{}", "  ".repeat(depth), view.widget, handle.0);
    for (k, v) in &view.attributes {
        let _ = write!(out, " {k}={v}");
    }
    out.push('\n');
    for child in &view.children {
        dump_into(s, *child, depth + 1, out);
    }
}

impl HeadlessState {
    fn unlink(&mut self, child: NativeHandle) {
        let parent = self.views.get_mut(&child).and_then(|v| v.parent.take());
        if let Some(p) = parent
            && let Some(pv) = self.views.get_mut(&p)
        {
            pv.children.retain(|c| *c != child);
        }
    }

    fn window_location(&self, handle: NativeHandle) -> Option<Point> {
        let mut view = self.views.get(&handle)?;
        let mut p = Point {
            x: view.bounds.left,
            y: view.bounds.top,
        };
        while let Some(parent) = view.parent.and_then(|h| self.views.get(&h)) {
            p.x += parent.bounds.left;
            p.y += parent.bounds.top;
            view = parent;
        }
        Some(p)
    }
}

impl NativePlatform for HeadlessPlatform {
    fn display_density(&self) -> f32 {
        self.state.borrow().density
    }

    fn create_handle(&mut self, widget: WidgetType, context: NativeContext) -> Result<NativeHandle> {
        let mut s = self.state.borrow_mut();
        if s.failing_widgets.contains(widget.name()) {
            return Err(Error::Native(format!("{widget} is not available")));
        }
        let handle = NativeHandle(s.next_handle);
        s.next_handle += 1;
        s.views.insert(
            handle,
            HeadlessView {
                widget: widget.name(),
                context,
                parent: None,
                children: Vec::new(),
                attributes: BTreeMap::new(),
                listeners: HashMap::new(),
                layout_requested: false,
                bounds: Bounds::default(),
                intrinsic: Size::default(),
            },
        );
        s.calls.push(NativeCallRecord::Create {
            handle,
            widget: widget.name(),
        });
        Ok(handle)
    }

    fn destroy_handle(&mut self, handle: NativeHandle) {
        let mut s = self.state.borrow_mut();
        s.unlink(handle);
        if let Some(view) = s.views.remove(&handle) {
            for child in view.children {
                if let Some(c) = s.views.get_mut(&child) {
                    c.parent = None;
                }
            }
            if s.focused == Some(handle) {
                s.focused = None;
            }
            s.calls.push(NativeCallRecord::Destroy(handle));
        }
    }

    fn insert_child(&mut self, parent: NativeHandle, child: NativeHandle, index: usize) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if s.rejecting_parents.contains(&parent) {
            return Err(Error::Native(format!("{parent:?} rejected a child")));
        }
        if !s.views.contains_key(&parent) || !s.views.contains_key(&child) {
            return Err(Error::Native("insert of a destroyed handle".into()));
        }
        s.unlink(child);
        if let Some(pv) = s.views.get_mut(&parent) {
            let index = index.min(pv.children.len());
            pv.children.insert(index, child);
        }
        if let Some(cv) = s.views.get_mut(&child) {
            cv.parent = Some(parent);
        }
        s.calls.push(NativeCallRecord::Insert { parent, child, index });
        Ok(())
    }

    fn remove_child(&mut self, parent: NativeHandle, child: NativeHandle) {
        let mut s = self.state.borrow_mut();
        let linked = s.views.get(&child).is_some_and(|v| v.parent == Some(parent));
        if linked {
            s.unlink(child);
            s.calls.push(NativeCallRecord::Remove { parent, child });
        }
    }

    fn set_attribute(&mut self, handle: NativeHandle, key: &'static str, value: NativeValue) -> Result<()> {
        let mut s = self.state.borrow_mut();
        let Some(view) = s.views.get_mut(&handle) else {
            return Err(Error::Native(format!("{handle:?} is destroyed")));
        };
        view.attributes.insert(key, value.clone());
        s.calls.push(NativeCallRecord::Set { handle, key, value });
        Ok(())
    }

    fn attribute(&self, handle: NativeHandle, key: &'static str) -> Option<NativeValue> {
        self.peek(handle, key)
    }

    fn set_listener(
        &mut self,
        handle: NativeHandle,
        slot: ListenerSlot,
        listener: Option<Rc<dyn NativeListener>>,
    ) {
        if let Some(view) = self.state.borrow_mut().views.get_mut(&handle) {
            match listener {
                Some(l) => {
                    view.listeners.insert(slot, l);
                }
                None => {
                    view.listeners.remove(&slot);
                }
            }
        }
    }

    fn request_layout(&mut self, handle: NativeHandle) {
        let mut s = self.state.borrow_mut();
        if let Some(view) = s.views.get_mut(&handle) {
            view.layout_requested = true;
            s.calls.push(NativeCallRecord::RequestLayout(handle));
        }
    }

    fn is_layout_requested(&self, handle: NativeHandle) -> bool {
        self.state
            .borrow()
            .views
            .get(&handle)
            .is_some_and(|v| v.layout_requested)
    }

    fn measure(&mut self, handle: NativeHandle, width: MeasureSpec, height: MeasureSpec) -> Size {
        let s = self.state.borrow();
        let intrinsic = s.views.get(&handle).map(|v| v.intrinsic).unwrap_or_default();
        Size {
            width: width.constrain(intrinsic.width.round() as u32) as f32,
            height: height.constrain(intrinsic.height.round() as u32) as f32,
        }
    }

    fn layout(&mut self, handle: NativeHandle, bounds: Bounds) {
        if let Some(view) = self.state.borrow_mut().views.get_mut(&handle) {
            view.bounds = bounds;
            view.layout_requested = false;
        }
    }

    fn location_in_window(&self, handle: NativeHandle) -> Option<Point> {
        self.state.borrow().window_location(handle)
    }

    fn location_on_screen(&self, handle: NativeHandle) -> Option<Point> {
        let s = self.state.borrow();
        let p = s.window_location(handle)?;
        Some(Point {
            x: p.x + s.window_origin.x,
            y: p.y + s.window_origin.y,
        })
    }

    fn request_focus(&mut self, handle: NativeHandle) -> bool {
        let mut s = self.state.borrow_mut();
        if s.views.contains_key(&handle) {
            s.focused = Some(handle);
            true
        } else {
            false
        }
    }

    fn present_modal(
        &mut self,
        presenter: NativeHandle,
        content: NativeHandle,
        fullscreen: bool,
    ) -> Result<SurfaceId> {
        let mut s = self.state.borrow_mut();
        if !s.views.contains_key(&presenter) || !s.views.contains_key(&content) {
            return Err(Error::Native("modal presented from a destroyed handle".into()));
        }
        let surface = SurfaceId(s.next_surface);
        s.next_surface += 1;
        s.surfaces.insert(surface, Surface { content, fullscreen });
        s.calls.push(NativeCallRecord::PresentModal {
            presenter,
            content,
            surface,
        });
        Ok(surface)
    }

    fn dismiss_modal(&mut self, surface: SurfaceId) {
        let mut s = self.state.borrow_mut();
        if s.surfaces.remove(&surface).is_some() {
            s.calls.push(NativeCallRecord::DismissModal(surface));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_keep_native_order() {
        let mut p = HeadlessPlatform::default();
        let ctx = p.new_context();
        let root = p.create_handle(WidgetType("Stack"), ctx).unwrap();
        let a = p.create_handle(WidgetType("Label"), ctx).unwrap();
        let b = p.create_handle(WidgetType("Label"), ctx).unwrap();

        p.insert_child(root, b, 0).unwrap();
        p.insert_child(root, a, 0).unwrap();
        assert_eq!(p.children_of(root), vec![a, b]);

        p.remove_child(root, a);
        p.remove_child(root, a);
        assert_eq!(p.children_of(root), vec![b]);
        let removes = p
            .calls()
            .into_iter()
            .filter(|c| matches!(c, NativeCallRecord::Remove { .. }))
            .count();
        assert_eq!(removes, 1);
    }

    #[test]
    fn failures_are_injectable() {
        let mut p = HeadlessPlatform::default();
        let ctx = p.new_context();
        p.fail_creation_of("Map");
        assert!(p.create_handle(WidgetType("Map"), ctx).is_err());

        let root = p.create_handle(WidgetType("Stack"), ctx).unwrap();
        let child = p.create_handle(WidgetType("Label"), ctx).unwrap();
        p.reject_children(root);
        assert!(p.insert_child(root, child, 0).is_err());
        p.accept_children(root);
        assert!(p.insert_child(root, child, 0).is_ok());
    }
}
