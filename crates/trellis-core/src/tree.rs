//! The logical view tree and its attach/detach state machine.
//!
//! Nodes live in a slot-map arena owned by a cloneable [`ViewTree`] handle.
//! Parent links are plain keys. A node is either detached (no context, no
//! native handle) or attached to exactly one [`NativeContext`]; attaching
//! creates the native handle, walks the children and mirrors their order
//! into the native container, then pushes every pending property value.
//!
//! Callbacks into user code (event handlers, gesture observers, init hooks)
//! are queued while the tree is borrowed and run once the borrow is
//! released, so handlers may freely call back into the tree.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};
use once_cell::unsync::OnceCell;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::accessor::{InitHook, NativeCall, WidgetRegistry, WidgetSpec};
use crate::builtin::ViewProperties;
use crate::error::{Error, Result};
use crate::events::{
    EventData, EventHandler, GestureEvent, GestureObserver, GestureTypes, HandlerId, LOADED,
    LifecycleEvent, PROPERTY_CHANGE, UNLOADED,
};
use crate::geometry::{Bounds, Point, Size};
use crate::native::{
    ListenerSlot, NativeContext, NativeEvent, NativeHandle, NativeListener, NativePlatform, SurfaceId,
    WidgetType,
};
use crate::property::{PropertyDecl, PropertyId, PropertyRegistry, PropertyStore, ValueSource};
use crate::style::{StyleScope, StyleTarget};
use crate::units::{DisplayMetrics, MeasureSpec};
use crate::value::Value;

new_key_type! {
    pub struct ViewId;
}

const VISUAL_TREE: &str = "trellis::visual_tree";

#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    /// Overrides the platform's display density.
    pub density: Option<f32>,
}

/// Consulted by non-forced detaches. Returning true keeps the node attached
/// with its native handle; it is marked retained instead.
///
/// Implementations run while the tree is borrowed and must not call into it.
pub trait DetachPolicy {
    fn retain_native(&self, view: ViewId) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TouchMode {
    #[default]
    None,
    Forward,
    Block,
}

struct ViewNode {
    widget: WidgetType,
    parent: Option<ViewId>,
    children: SmallVec<[ViewId; 4]>,
    context: Option<NativeContext>,
    handle: Option<NativeHandle>,
    in_native_tree: bool,
    /// Pending values were pushed for the current attach cycle.
    settled: bool,
    retained: bool,
    props: PropertyStore,
    /// Native values read before the first push of each property, this cycle.
    native_defaults: HashMap<PropertyId, Option<Value>>,
    gesture_observers: HashMap<GestureTypes, SmallVec<[(HandlerId, GestureObserver); 2]>>,
    touch_mode: TouchMode,
    handlers: Vec<(String, HandlerId, EventHandler)>,
    classes: Vec<String>,
    style_id: Option<String>,
    style_scope: Option<Rc<dyn StyleScope>>,
    visual_state: Option<String>,
    measured: Option<Size>,
    bounds: Option<Bounds>,
    detach_policy: Option<Rc<dyn DetachPolicy>>,
}

impl ViewNode {
    fn new(widget: WidgetType) -> Self {
        Self {
            widget,
            parent: None,
            children: SmallVec::new(),
            context: None,
            handle: None,
            in_native_tree: false,
            settled: false,
            retained: false,
            props: PropertyStore::default(),
            native_defaults: HashMap::new(),
            gesture_observers: HashMap::new(),
            touch_mode: TouchMode::None,
            handlers: Vec::new(),
            classes: Vec::new(),
            style_id: None,
            style_scope: None,
            visual_state: None,
            measured: None,
            bounds: None,
            detach_policy: None,
        }
    }
}

enum Outgoing {
    Event(EventData),
    Gesture(GestureEvent),
    Init(Vec<InitHook>, ViewId),
}

struct TreeInner {
    nodes: SlotMap<ViewId, ViewNode>,
    registry: PropertyRegistry,
    widgets: WidgetRegistry,
    platform: Box<dyn NativePlatform>,
    options: TreeOptions,
    metrics: OnceCell<DisplayMetrics>,
    builtins: ViewProperties,
    lifecycle: Vec<LifecycleEvent>,
    outbox: VecDeque<Outgoing>,
    next_token: u64,
    weak_self: Weak<RefCell<TreeInner>>,
}

/// Weak reference to a view, held by native listeners.
///
/// `upgrade` fails when the tree was dropped, the view was removed, or the
/// tree is in the middle of an operation.
#[derive(Clone)]
pub struct WeakView {
    tree: Weak<RefCell<TreeInner>>,
    id: ViewId,
}

impl WeakView {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn upgrade(&self) -> Option<(ViewTree, ViewId)> {
        let inner = self.tree.upgrade()?;
        let alive = inner.try_borrow().ok()?.nodes.contains_key(self.id);
        alive.then(|| (ViewTree { inner }, self.id))
    }
}

#[derive(Clone)]
pub struct ViewTree {
    inner: Rc<RefCell<TreeInner>>,
}

struct TouchForwarder {
    view: WeakView,
}

impl NativeListener for TouchForwarder {
    fn on_event(&self, event: &NativeEvent) -> bool {
        let NativeEvent::Touch(touch) = event else {
            return false;
        };
        let Some((tree, id)) = self.view.upgrade() else {
            return false;
        };
        tree.dispatch_gesture(GestureEvent {
            kind: GestureTypes::TOUCH,
            view: id,
            touch: Some(*touch),
        });
        false
    }
}

impl TreeInner {
    fn node(&self, id: ViewId) -> Result<&ViewNode> {
        self.nodes.get(id).ok_or(Error::UnknownView(id))
    }

    fn node_mut(&mut self, id: ViewId) -> Result<&mut ViewNode> {
        self.nodes.get_mut(id).ok_or(Error::UnknownView(id))
    }

    fn decl(&self, id: PropertyId) -> Result<&PropertyDecl> {
        self.registry
            .get(id)
            .ok_or_else(|| Error::UnknownProperty(format!("#{}", id.index())))
    }

    fn metrics(&self) -> DisplayMetrics {
        *self.metrics.get_or_init(|| {
            let density = self
                .options
                .density
                .unwrap_or_else(|| self.platform.display_density());
            DisplayMetrics::new(density)
        })
    }

    fn weak_view(&self, id: ViewId) -> WeakView {
        WeakView {
            tree: self.weak_self.clone(),
            id,
        }
    }

    fn token(&mut self) -> HandlerId {
        self.next_token += 1;
        HandlerId(self.next_token)
    }

    fn subtree(&self, root: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn is_ancestor_or_self(&self, candidate: ViewId, mut id: ViewId) -> bool {
        loop {
            if id == candidate {
                return true;
            }
            match self.nodes.get(id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    // ---- attach / detach ----

    fn attach_node(&mut self, id: ViewId, ctx: NativeContext) -> Result<()> {
        let node = self.node(id)?;
        if node.context == Some(ctx) {
            if node.retained {
                debug!("{id:?} reused from cache");
                self.node_mut(id)?.retained = false;
            }
            return Ok(());
        }
        if let Some(parent) = node.parent
            && let Some(parent_ctx) = self.nodes.get(parent).and_then(|p| p.context)
            && parent_ctx != ctx
        {
            return Err(Error::InvalidContext);
        }
        if node.context.is_some() {
            debug!("{id:?} moves to {ctx:?}, dropping its native state");
            self.detach_node(id, true);
        }

        self.node_mut(id)?.context = Some(ctx);
        trace!(target: VISUAL_TREE, "attach {id:?} to {ctx:?}");
        if let Err(e) = self.create_native(id) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.context = None;
            }
            return Err(e);
        }

        let mut first_err = None;
        let children = self.node(id)?.children.clone();
        for child in children {
            let res = self.attach_node(child, ctx).and_then(|_| self.catch_up(id, child));
            if let Err(e) = res {
                warn!("attaching {child:?} under {id:?} failed: {e}");
                first_err.get_or_insert(e);
            }
        }

        self.lifecycle.push(LifecycleEvent::Attached(id));
        self.outbox
            .push_back(Outgoing::Event(EventData::new(LOADED, id)));
        first_err.map_or(Ok(()), Err)
    }

    fn create_native(&mut self, id: ViewId) -> Result<()> {
        let node = self.node(id)?;
        if node.handle.is_some() {
            return Ok(());
        }
        let widget = node.widget;
        let ctx = node.context.ok_or(Error::InvalidContext)?;
        let handle = self
            .platform
            .create_handle(widget, ctx)
            .map_err(|e| Error::HandleCreation {
                widget: widget.to_string(),
                reason: e.to_string(),
            })?;
        trace!(target: VISUAL_TREE, "created {handle:?} for {widget} {id:?}");

        let node = self.node_mut(id)?;
        node.handle = Some(handle);
        node.settled = false;
        node.native_defaults.clear();

        let hooks = self.widgets.created_hooks(widget);
        if !hooks.is_empty() {
            let metrics = self.metrics();
            let view = self.weak_view(id);
            let mut call = NativeCall {
                platform: &mut *self.platform,
                handle,
                metrics,
                view,
            };
            for hook in &hooks {
                hook(&mut call);
            }
        }
        Ok(())
    }

    /// Inserts `child` into the native container of `parent` if it is not
    /// there yet, then pushes the child's pending values.
    fn catch_up(&mut self, parent: ViewId, child: ViewId) -> Result<()> {
        let node = self.node(child)?;
        if node.handle.is_none() {
            return Ok(());
        }
        if !node.in_native_tree && !self.insert_into_native_tree(parent, child) {
            debug!(target: VISUAL_TREE, "{child:?} not in the native tree of {parent:?} yet");
        }
        self.flush_pending(child)
    }

    fn insert_into_native_tree(&mut self, parent: ViewId, child: ViewId) -> bool {
        let (Some(p), Some(c)) = (self.nodes.get(parent), self.nodes.get(child)) else {
            return false;
        };
        let (Some(parent_handle), Some(child_handle)) = (p.handle, c.handle) else {
            return false;
        };
        if !self.widgets.is_container(p.widget) {
            return false;
        }
        let index = p
            .children
            .iter()
            .take_while(|k| **k != child)
            .filter(|k| self.nodes.get(**k).is_some_and(|n| n.in_native_tree))
            .count();
        match self.platform.insert_child(parent_handle, child_handle, index) {
            Ok(()) => {
                trace!(target: VISUAL_TREE, "insert {child:?} into {parent:?} at {index}");
                if let Some(c) = self.nodes.get_mut(child) {
                    c.in_native_tree = true;
                }
                true
            }
            Err(e) => {
                warn!(target: VISUAL_TREE, "native insert of {child:?} into {parent:?} failed: {e}");
                false
            }
        }
    }

    fn unlink_native(&mut self, parent: ViewId, child: ViewId) {
        let parent_handle = self.nodes.get(parent).and_then(|n| n.handle);
        let Some(c) = self.nodes.get_mut(child) else {
            return;
        };
        if !c.in_native_tree {
            return;
        }
        c.in_native_tree = false;
        if let (Some(ph), Some(ch)) = (parent_handle, c.handle) {
            self.platform.remove_child(ph, ch);
            trace!(target: VISUAL_TREE, "remove {child:?} from {parent:?}");
        }
    }

    fn flush_pending(&mut self, id: ViewId) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.settled || node.handle.is_none() {
            return Ok(());
        }
        node.settled = true;
        let pending: Vec<(PropertyId, Value)> = node
            .props
            .set_ids()
            .filter_map(|pid| node.props.effective(pid).cloned().map(|v| (pid, v)))
            .collect();

        let mut layout = false;
        let mut first_err = None;
        for (pid, value) in pending {
            if let Err(e) = self.push_native(id, pid, &value) {
                warn!("applying pending value to {id:?} failed: {e}");
                first_err.get_or_insert(e);
            }
            layout |= self.registry.get(pid).is_some_and(|d| d.affects_layout);
        }
        self.sync_touch_listener(id);
        if layout {
            self.request_layout(id);
        }
        first_err.map_or(Ok(()), Err)
    }

    fn detach_node(&mut self, id: ViewId, force: bool) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.context.is_none() {
            return;
        }
        if !force
            && let Some(policy) = node.detach_policy.clone()
            && policy.retain_native(id)
        {
            debug!("{id:?} retained by its detach policy");
            if let Some(node) = self.nodes.get_mut(id) {
                node.retained = true;
            }
            self.lifecycle.push(LifecycleEvent::Retained(id));
            return;
        }

        let widget = node.widget;
        let handle = node.handle;
        let parent = node.parent;
        let touch_mode = node.touch_mode;
        let children = node.children.clone();
        for child in children {
            self.unlink_native(id, child);
            self.detach_node(child, force);
        }
        if let Some(parent) = parent {
            self.unlink_native(parent, id);
        }

        if let Some(handle) = handle {
            let hooks = self.widgets.released_hooks(widget);
            if !hooks.is_empty() {
                let metrics = self.metrics();
                let view = self.weak_view(id);
                let mut call = NativeCall {
                    platform: &mut *self.platform,
                    handle,
                    metrics,
                    view,
                };
                for hook in &hooks {
                    hook(&mut call);
                }
            }
            if touch_mode != TouchMode::None {
                self.platform.set_listener(handle, ListenerSlot::Touch, None);
            }
            self.platform.destroy_handle(handle);
            trace!(target: VISUAL_TREE, "destroyed {handle:?} of {id:?}");
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.handle = None;
            node.context = None;
            node.in_native_tree = false;
            node.settled = false;
            node.retained = false;
            node.touch_mode = TouchMode::None;
            node.native_defaults.clear();
            node.measured = None;
            node.bounds = None;
        }
        self.lifecycle.push(LifecycleEvent::Detached(id));
        self.outbox
            .push_back(Outgoing::Event(EventData::new(UNLOADED, id)));
    }

    // ---- properties ----

    fn push_native(&mut self, id: ViewId, pid: PropertyId, value: &Value) -> Result<()> {
        let node = self.node(id)?;
        let Some(handle) = node.handle else {
            return Ok(());
        };
        let captured = node.native_defaults.contains_key(&pid);
        let Some(accessor) = self.widgets.accessor(node.widget, pid) else {
            return Ok(());
        };
        let metrics = self.metrics();
        let view = self.weak_view(id);
        let mut call = NativeCall {
            platform: &mut *self.platform,
            handle,
            metrics,
            view,
        };
        if !captured {
            let native_default = accessor.get.as_ref().and_then(|get| get(&call));
            if let Some(node) = self.nodes.get_mut(id) {
                node.native_defaults.insert(pid, native_default);
            }
        }
        let result = (accessor.set)(&mut call, value);
        if pid == self.builtins.is_user_interaction_enabled {
            self.sync_touch_listener(id);
        }
        result
    }

    /// Value to push when nothing logical is set: the captured native
    /// default if there is one, else the declared default.
    fn fallback_value(&self, id: ViewId, pid: PropertyId) -> Option<Value> {
        let node = self.nodes.get(id)?;
        if let Some(v) = node.props.effective(pid) {
            return Some(v.clone());
        }
        if let Some(Some(v)) = node.native_defaults.get(&pid) {
            return Some(v.clone());
        }
        self.registry.get(pid).map(|d| d.default.clone())
    }

    fn check_kind(&self, pid: PropertyId, value: &Value) -> Result<(&'static str, bool)> {
        let decl = self.decl(pid)?;
        if decl.default.kind() != value.kind() {
            return Err(Error::invalid_argument(format!(
                "`{}` expects a {:?} value, got {:?}",
                decl.name,
                decl.default.kind(),
                value.kind()
            )));
        }
        Ok((decl.name, decl.affects_layout))
    }

    fn set_value(&mut self, id: ViewId, pid: PropertyId, value: Value, source: ValueSource) -> Result<()> {
        let (name, affects_layout) = self.check_kind(pid, &value)?;
        let node = self.node_mut(id)?;
        let changed = match source {
            ValueSource::Css => node.props.set_css(pid, value),
            _ => node.props.set_local(pid, value),
        };
        if changed {
            self.after_change(id, pid, name, affects_layout)
        } else {
            Ok(())
        }
    }

    fn clear_value(&mut self, id: ViewId, pid: PropertyId, source: ValueSource) -> Result<()> {
        let decl = self.decl(pid)?;
        let (name, affects_layout) = (decl.name, decl.affects_layout);
        let node = self.node_mut(id)?;
        let changed = match source {
            ValueSource::Css => node.props.clear_css(pid),
            _ => node.props.clear_local(pid),
        };
        if changed {
            self.after_change(id, pid, name, affects_layout)
        } else {
            Ok(())
        }
    }

    fn after_change(&mut self, id: ViewId, pid: PropertyId, name: &str, affects_layout: bool) -> Result<()> {
        let Some(value) = self.fallback_value(id, pid) else {
            return Ok(());
        };
        self.queue_property_change(id, name, &value);
        let live = self
            .nodes
            .get(id)
            .is_some_and(|n| n.handle.is_some() && n.settled);
        if !live {
            return Ok(());
        }
        let result = self.push_native(id, pid, &value);
        if affects_layout {
            self.request_layout(id);
        }
        result
    }

    fn queue_property_change(&mut self, id: ViewId, name: &str, value: &Value) {
        let data = serde_json::json!({ "propertyName": name, "value": value.to_json() });
        self.outbox.push_back(Outgoing::Event(
            EventData::new(PROPERTY_CHANGE, id).with_data(data),
        ));
    }

    fn request_layout(&mut self, id: ViewId) {
        if let Some(handle) = self.nodes.get(id).and_then(|n| n.handle) {
            self.platform.request_layout(handle);
            self.lifecycle.push(LifecycleEvent::LayoutRequested(id));
        }
    }

    fn sync_touch_listener(&mut self, id: ViewId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let Some(handle) = node.handle else {
            return;
        };
        let enabled = node
            .props
            .effective(self.builtins.is_user_interaction_enabled)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let desired = if !enabled {
            TouchMode::Block
        } else if !node.gesture_observers.is_empty() {
            TouchMode::Forward
        } else {
            TouchMode::None
        };
        if desired == node.touch_mode {
            return;
        }
        let listener: Option<Rc<dyn NativeListener>> = match desired {
            TouchMode::None => None,
            TouchMode::Block => Some(Rc::new(|_: &NativeEvent| true)),
            TouchMode::Forward => Some(Rc::new(TouchForwarder {
                view: self.weak_view(id),
            })),
        };
        self.platform.set_listener(handle, ListenerSlot::Touch, listener);
        if let Some(node) = self.nodes.get_mut(id) {
            node.touch_mode = desired;
        }
    }

    // ---- style ----

    fn scope_for(&self, mut id: ViewId) -> Option<Rc<dyn StyleScope>> {
        loop {
            let node = self.nodes.get(id)?;
            if let Some(scope) = &node.style_scope {
                return Some(scope.clone());
            }
            id = node.parent?;
        }
    }

    fn restyle(&mut self, id: ViewId, scope: &dyn StyleScope) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let lineage = self.widgets.lineage(node.widget);
        let declarations = scope.apply_selectors(&StyleTarget {
            lineage: &lineage,
            id: node.style_id.as_deref(),
            classes: &node.classes,
            visual_state: node.visual_state.as_deref(),
        });

        let mut values: BTreeMap<PropertyId, Value> = BTreeMap::new();
        for d in declarations {
            let Some(pid) = self.registry.find(&d.property) else {
                warn!("unknown style property `{}` on {id:?}", d.property);
                continue;
            };
            match self.decl(pid).and_then(|decl| decl.convert(&d.value)) {
                Ok(v) => {
                    values.insert(pid, v);
                }
                Err(e) => warn!("ignoring style declaration on {id:?}: {e}"),
            }
        }

        let stale: Vec<PropertyId> = node
            .props
            .css_ids()
            .filter(|pid| !values.contains_key(pid))
            .collect();
        for pid in stale {
            if let Err(e) = self.clear_value(id, pid, ValueSource::Css) {
                warn!("resetting style value on {id:?} failed: {e}");
            }
        }
        for (pid, value) in values {
            if let Err(e) = self.set_value(id, pid, value, ValueSource::Css) {
                warn!("applying style value on {id:?} failed: {e}");
            }
        }
    }

    fn restyle_subtree(&mut self, root: ViewId) {
        if let Some(scope) = self.scope_for(root) {
            for id in self.subtree(root) {
                self.restyle(id, &*scope);
            }
        }
    }
}

impl ViewTree {
    pub fn new(platform: Box<dyn NativePlatform>) -> Self {
        Self::with_options(platform, TreeOptions::default())
    }

    pub fn with_options(platform: Box<dyn NativePlatform>, options: TreeOptions) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let mut registry = PropertyRegistry::default();
            let builtins = ViewProperties::declare(&mut registry);
            let mut widgets = WidgetRegistry::default();
            // first registration into an empty registry
            let _ = widgets.register(builtins.view_spec());
            RefCell::new(TreeInner {
                nodes: SlotMap::with_key(),
                registry,
                widgets,
                platform,
                options,
                metrics: OnceCell::new(),
                builtins,
                lifecycle: Vec::new(),
                outbox: VecDeque::new(),
                next_token: 0,
                weak_self: weak.clone(),
            })
        });
        Self { inner }
    }

    fn with<R>(&self, f: impl FnOnce(&mut TreeInner) -> R) -> R {
        let r = f(&mut self.inner.borrow_mut());
        self.dispatch_outbox();
        r
    }

    fn read<R>(&self, f: impl FnOnce(&TreeInner) -> R) -> R {
        f(&self.inner.borrow())
    }

    fn dispatch_outbox(&self) {
        loop {
            let next = {
                let Ok(mut t) = self.inner.try_borrow_mut() else {
                    return;
                };
                let Some(item) = t.outbox.pop_front() else {
                    return;
                };
                item
            };
            match next {
                Outgoing::Event(event) => {
                    let handlers: Vec<EventHandler> = self.read(|t| {
                        t.nodes
                            .get(event.object)
                            .map(|n| {
                                n.handlers
                                    .iter()
                                    .filter(|(name, _, _)| *name == event.name)
                                    .map(|(_, _, h)| h.clone())
                                    .collect()
                            })
                            .unwrap_or_default()
                    });
                    for h in handlers {
                        h(&event);
                    }
                }
                Outgoing::Gesture(event) => {
                    let observers: Vec<GestureObserver> = self.read(|t| {
                        let Some(n) = t.nodes.get(event.view) else {
                            return Vec::new();
                        };
                        event
                            .kind
                            .iter()
                            .filter_map(|kind| n.gesture_observers.get(&kind))
                            .flat_map(|list| list.iter().map(|(_, o)| o.clone()))
                            .collect()
                    });
                    for o in observers {
                        o(&event);
                    }
                }
                Outgoing::Init(hooks, id) => {
                    for hook in hooks {
                        hook(self, id);
                    }
                }
            }
        }
    }

    pub fn downgrade(&self, id: ViewId) -> WeakView {
        self.read(|t| t.weak_view(id))
    }

    pub fn metrics(&self) -> DisplayMetrics {
        self.read(|t| t.metrics())
    }

    /// Ids of the properties every view has.
    pub fn props(&self) -> ViewProperties {
        self.read(|t| t.builtins)
    }

    pub fn declare_property(&self, decl: PropertyDecl) -> PropertyId {
        self.with(|t| t.registry.declare(decl))
    }

    pub fn find_property(&self, name: &str) -> Option<PropertyId> {
        self.read(|t| t.registry.find(name))
    }

    pub fn property_decl(&self, id: PropertyId) -> Option<PropertyDecl> {
        self.read(|t| t.registry.get(id).cloned())
    }

    pub fn register_widget(&self, spec: WidgetSpec) -> Result<WidgetType> {
        self.with(|t| t.widgets.register(spec))
    }

    pub fn drain_events(&self) -> Vec<LifecycleEvent> {
        self.with(|t| std::mem::take(&mut t.lifecycle))
    }

    // ---- structure ----

    pub fn create_view(&self, widget: &str) -> Result<ViewId> {
        self.with(|t| {
            let ty = t
                .widgets
                .resolve(widget)
                .ok_or_else(|| Error::UnknownWidget(widget.to_string()))?;
            let id = t.nodes.insert(ViewNode::new(ty));
            let hooks = t.widgets.init_hooks(ty);
            if !hooks.is_empty() {
                t.outbox.push_back(Outgoing::Init(hooks, id));
            }
            Ok(id)
        })
    }

    /// Detaches and drops `id` and its whole subtree.
    pub fn remove_view(&self, id: ViewId) -> Result<()> {
        self.with(|t| {
            let parent = t.node(id)?.parent;
            if let Some(parent) = parent {
                t.unlink_native(parent, id);
                if let Some(p) = t.nodes.get_mut(parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            t.detach_node(id, true);
            let mut stack = vec![id];
            while let Some(k) = stack.pop() {
                if let Some(node) = t.nodes.remove(k) {
                    stack.extend(node.children);
                }
            }
            Ok(())
        })
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.read(|t| t.nodes.contains_key(id))
    }

    pub fn widget(&self, id: ViewId) -> Option<WidgetType> {
        self.read(|t| t.nodes.get(id).map(|n| n.widget))
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.read(|t| t.nodes.get(id)?.parent)
    }

    pub fn children(&self, id: ViewId) -> Vec<ViewId> {
        self.read(|t| {
            t.nodes
                .get(id)
                .map(|n| n.children.to_vec())
                .unwrap_or_default()
        })
    }

    pub fn add_child(&self, parent: ViewId, child: ViewId) -> Result<()> {
        let len = self.read(|t| t.node(parent).map(|n| n.children.len()))?;
        self.insert_child(parent, child, len)
    }

    /// Links `child` under `parent` at `index`. If the parent is attached the
    /// child is attached with the same context and inserted natively.
    pub fn insert_child(&self, parent: ViewId, child: ViewId, index: usize) -> Result<()> {
        self.with(|t| {
            let len = t.node(parent)?.children.len();
            if index > len {
                return Err(Error::invalid_argument(format!(
                    "index {index} out of range for {len} children"
                )));
            }
            if t.node(child)?.parent.is_some() {
                return Err(Error::invalid_argument(format!(
                    "{child:?} already has a parent"
                )));
            }
            if t.is_ancestor_or_self(child, parent) {
                return Err(Error::invalid_argument(format!(
                    "adding {child:?} under {parent:?} would create a cycle"
                )));
            }

            t.node_mut(parent)?.children.insert(index, child);
            t.node_mut(child)?.parent = Some(parent);
            t.restyle_subtree(child);

            let Some(ctx) = t.node(parent)?.context else {
                return Ok(());
            };
            let attached = t.attach_node(child, ctx);
            let caught_up = t.catch_up(parent, child);
            t.request_layout(parent);
            attached.and(caught_up)
        })
    }

    /// Unlinks `child` natively and logically and detaches it (non-forced,
    /// so a detach policy may keep it alive).
    pub fn remove_child(&self, parent: ViewId, child: ViewId) -> Result<()> {
        self.with(|t| {
            if t.node(child)?.parent != Some(parent) {
                return Err(Error::invalid_argument(format!(
                    "{child:?} is not a child of {parent:?}"
                )));
            }
            t.unlink_native(parent, child);
            t.detach_node(child, false);
            t.node_mut(parent)?.children.retain(|c| *c != child);
            t.node_mut(child)?.parent = None;
            t.request_layout(parent);
            Ok(())
        })
    }

    /// Moves `child` to `index` among its siblings, reordering the native
    /// container by removal and reinsertion.
    pub fn move_child(&self, parent: ViewId, child: ViewId, index: usize) -> Result<()> {
        self.with(|t| {
            let node = t.node(parent)?;
            let Some(from) = node.children.iter().position(|c| *c == child) else {
                return Err(Error::invalid_argument(format!(
                    "{child:?} is not a child of {parent:?}"
                )));
            };
            if index >= node.children.len() {
                return Err(Error::invalid_argument(format!(
                    "index {index} out of range for {} children",
                    node.children.len()
                )));
            }
            if from == index {
                return Ok(());
            }
            t.unlink_native(parent, child);
            let p = t.node_mut(parent)?;
            p.children.remove(from);
            p.children.insert(index, child);
            if t.node(child)?.handle.is_some() {
                t.insert_into_native_tree(parent, child);
            }
            t.request_layout(parent);
            Ok(())
        })
    }

    // ---- lifecycle ----

    /// Attaches `id` and its subtree to `context`.
    ///
    /// No-op for the context the node already has. A node attached elsewhere
    /// is force-detached first, so native state never crosses contexts.
    pub fn attach(&self, id: ViewId, context: Option<NativeContext>) -> Result<()> {
        let ctx = context.ok_or(Error::InvalidContext)?;
        self.with(|t| {
            let attached = t.attach_node(id, ctx);
            let node = t.node(id)?;
            if node.handle.is_none() {
                return attached;
            }
            let parent = node.parent;
            let flushed = match parent {
                Some(p) if t.nodes.get(p).and_then(|n| n.context) == Some(ctx) => t.catch_up(p, id),
                _ => t.flush_pending(id),
            };
            attached.and(flushed)
        })
    }

    /// Detaches `id` and its subtree. Without `force` the node's detach
    /// policy may keep it attached.
    pub fn detach(&self, id: ViewId, force: bool) -> Result<()> {
        self.with(|t| {
            t.node(id)?;
            t.detach_node(id, force);
            Ok(())
        })
    }

    pub fn set_detach_policy(&self, id: ViewId, policy: Option<Rc<dyn DetachPolicy>>) -> Result<()> {
        self.with(|t| {
            t.node_mut(id)?.detach_policy = policy;
            Ok(())
        })
    }

    pub fn context(&self, id: ViewId) -> Option<NativeContext> {
        self.read(|t| t.nodes.get(id)?.context)
    }

    pub fn handle(&self, id: ViewId) -> Option<NativeHandle> {
        self.read(|t| t.nodes.get(id)?.handle)
    }

    pub fn is_attached(&self, id: ViewId) -> bool {
        self.context(id).is_some()
    }

    pub fn is_retained(&self, id: ViewId) -> bool {
        self.read(|t| t.nodes.get(id).is_some_and(|n| n.retained))
    }

    pub fn is_in_native_tree(&self, id: ViewId) -> bool {
        self.read(|t| t.nodes.get(id).is_some_and(|n| n.in_native_tree))
    }

    // ---- properties ----

    pub fn set_property(&self, id: ViewId, prop: PropertyId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.with(|t| t.set_value(id, prop, value, ValueSource::Local))
    }

    /// Converts `raw` with the property's converter, then sets it locally.
    pub fn set_property_str(&self, id: ViewId, name: &str, raw: &str) -> Result<()> {
        self.with(|t| {
            let pid = t
                .registry
                .find(name)
                .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;
            let value = t.decl(pid)?.convert(raw)?;
            t.set_value(id, pid, value, ValueSource::Local)
        })
    }

    pub fn clear_property(&self, id: ViewId, prop: PropertyId) -> Result<()> {
        self.with(|t| t.clear_value(id, prop, ValueSource::Local))
    }

    /// Logical value: local, else style, else the declared default.
    pub fn property(&self, id: ViewId, prop: PropertyId) -> Result<Value> {
        self.read(|t| {
            let node = t.node(id)?;
            match node.props.effective(prop) {
                Some(v) => Ok(v.clone()),
                None => Ok(t.decl(prop)?.default.clone()),
            }
        })
    }

    pub fn value_source(&self, id: ViewId, prop: PropertyId) -> Result<ValueSource> {
        self.read(|t| Ok(t.node(id)?.props.source(prop)))
    }

    /// Reads the property back through its native getter. `None` while
    /// detached or when the widget has no getter for it.
    pub fn native_value(&self, id: ViewId, prop: PropertyId) -> Result<Option<Value>> {
        self.with(|t| {
            let node = t.node(id)?;
            let Some(handle) = node.handle else {
                return Ok(None);
            };
            let Some(get) = t.widgets.accessor(node.widget, prop).and_then(|a| a.get) else {
                return Ok(None);
            };
            let metrics = t.metrics();
            let view = t.weak_view(id);
            let call = NativeCall {
                platform: &mut *t.platform,
                handle,
                metrics,
                view,
            };
            Ok(get(&call))
        })
    }

    pub fn set_style_value(&self, id: ViewId, prop: PropertyId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.with(|t| t.set_value(id, prop, value, ValueSource::Css))
    }

    pub fn clear_style_value(&self, id: ViewId, prop: PropertyId) -> Result<()> {
        self.with(|t| t.clear_value(id, prop, ValueSource::Css))
    }

    /// Records a value reported by the native side (user typing) as the
    /// local value. The setter is not invoked.
    pub fn native_property_changed(&self, id: ViewId, prop: PropertyId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.with(|t| {
            let (name, _) = t.check_kind(prop, &value)?;
            let node = t.node_mut(id)?;
            if node.props.set_local(prop, value.clone()) {
                t.queue_property_change(id, name, &value);
            }
            Ok(())
        })
    }

    // ---- style ----

    /// Applies `scope` to `root` and its subtree and remembers it for later
    /// restyles (visual state changes, added children).
    pub fn apply_style(&self, root: ViewId, scope: Rc<dyn StyleScope>) -> Result<()> {
        self.with(|t| {
            t.node_mut(root)?.style_scope = Some(scope.clone());
            scope.ensure_selectors();
            for id in t.subtree(root) {
                t.restyle(id, &*scope);
            }
            Ok(())
        })
    }

    /// Drops every style value under `root`, falling back to local values or
    /// defaults, and forgets the scope applied at `root`.
    pub fn reset_style(&self, root: ViewId) -> Result<()> {
        self.with(|t| {
            t.node_mut(root)?.style_scope = None;
            for id in t.subtree(root) {
                let Some(node) = t.nodes.get_mut(id) else {
                    continue;
                };
                for pid in node.props.reset_css() {
                    let Ok(decl) = t.decl(pid) else {
                        continue;
                    };
                    let (name, affects_layout) = (decl.name, decl.affects_layout);
                    if let Err(e) = t.after_change(id, pid, name, affects_layout) {
                        warn!("resetting style value on {id:?} failed: {e}");
                    }
                }
            }
            Ok(())
        })
    }

    pub fn add_class(&self, id: ViewId, class: &str) -> Result<()> {
        self.with(|t| {
            let node = t.node_mut(id)?;
            if !node.classes.iter().any(|c| c == class) {
                node.classes.push(class.to_string());
                t.restyle_subtree(id);
            }
            Ok(())
        })
    }

    pub fn remove_class(&self, id: ViewId, class: &str) -> Result<()> {
        self.with(|t| {
            let node = t.node_mut(id)?;
            let before = node.classes.len();
            node.classes.retain(|c| c != class);
            if node.classes.len() != before {
                t.restyle_subtree(id);
            }
            Ok(())
        })
    }

    pub fn set_style_id(&self, id: ViewId, style_id: Option<&str>) -> Result<()> {
        self.with(|t| {
            t.node_mut(id)?.style_id = style_id.map(str::to_string);
            t.restyle_subtree(id);
            Ok(())
        })
    }

    pub fn set_visual_state(&self, id: ViewId, state: Option<&str>) -> Result<()> {
        self.with(|t| {
            let node = t.node_mut(id)?;
            if node.visual_state.as_deref() == state {
                return Ok(());
            }
            node.visual_state = state.map(str::to_string);
            if let Some(scope) = t.scope_for(id) {
                t.restyle(id, &*scope);
            }
            Ok(())
        })
    }

    pub fn visual_state(&self, id: ViewId) -> Option<String> {
        self.read(|t| t.nodes.get(id)?.visual_state.clone())
    }

    // ---- events & gestures ----

    pub fn on(&self, id: ViewId, name: &str, handler: impl Fn(&EventData) + 'static) -> Result<HandlerId> {
        self.with(|t| {
            let token = t.token();
            let handler: EventHandler = Rc::new(handler);
            t.node_mut(id)?
                .handlers
                .push((name.to_string(), token, handler));
            Ok(token)
        })
    }

    pub fn off(&self, id: ViewId, handler: HandlerId) -> bool {
        self.with(|t| {
            let Some(node) = t.nodes.get_mut(id) else {
                return false;
            };
            let before = node.handlers.len();
            node.handlers.retain(|(_, h, _)| *h != handler);
            node.handlers.len() != before
        })
    }

    pub fn has_listeners(&self, id: ViewId, name: &str) -> bool {
        self.read(|t| {
            t.nodes
                .get(id)
                .is_some_and(|n| n.handlers.iter().any(|(e, _, _)| e == name))
        })
    }

    /// Delivers `event` to the handlers registered on `event.object`.
    pub fn notify(&self, event: EventData) {
        self.with(|t| t.outbox.push_back(Outgoing::Event(event)));
    }

    pub fn observe(
        &self,
        id: ViewId,
        types: GestureTypes,
        observer: impl Fn(&GestureEvent) + 'static,
    ) -> Result<HandlerId> {
        self.with(|t| {
            let token = t.token();
            let observer: GestureObserver = Rc::new(observer);
            let node = t.node_mut(id)?;
            for kind in types.iter() {
                node.gesture_observers
                    .entry(kind)
                    .or_default()
                    .push((token, observer.clone()));
            }
            t.sync_touch_listener(id);
            Ok(token)
        })
    }

    /// Removes observers for `types`; only `observer` when given.
    pub fn stop_observing(&self, id: ViewId, types: GestureTypes, observer: Option<HandlerId>) -> Result<()> {
        self.with(|t| {
            let node = t.node_mut(id)?;
            for kind in types.iter() {
                if let Some(list) = node.gesture_observers.get_mut(&kind) {
                    list.retain(|(token, _)| observer.is_some_and(|o| o != *token));
                    if list.is_empty() {
                        node.gesture_observers.remove(&kind);
                    }
                }
            }
            t.sync_touch_listener(id);
            Ok(())
        })
    }

    pub fn gesture_types(&self, id: ViewId) -> GestureTypes {
        self.read(|t| {
            t.nodes
                .get(id)
                .map(|n| n.gesture_observers.keys().fold(GestureTypes::empty(), |acc, k| acc | *k))
                .unwrap_or(GestureTypes::empty())
        })
    }

    pub fn dispatch_gesture(&self, event: GestureEvent) {
        self.with(|t| t.outbox.push_back(Outgoing::Gesture(event)));
    }

    /// Installs a native listener on the view's handle. The `Touch` slot is
    /// managed by the tree for gesture observers.
    pub fn set_listener(
        &self,
        id: ViewId,
        slot: ListenerSlot,
        listener: Option<Rc<dyn NativeListener>>,
    ) -> Result<()> {
        self.with(|t| {
            let handle = t
                .node(id)?
                .handle
                .ok_or_else(|| Error::invalid_argument(format!("{id:?} has no native handle")))?;
            t.platform.set_listener(handle, slot, listener);
            Ok(())
        })
    }

    // ---- geometry ----

    /// Measures the view natively. Sizes are device pixels.
    pub fn measure(&self, id: ViewId, width: MeasureSpec, height: MeasureSpec) -> Option<Size> {
        self.with(|t| {
            let handle = t.nodes.get(id)?.handle?;
            let size = t.platform.measure(handle, width, height);
            if let Some(node) = t.nodes.get_mut(id) {
                node.measured = Some(size);
            }
            Some(size)
        })
    }

    /// Positions the view inside its native parent. False while detached.
    pub fn layout(&self, id: ViewId, bounds: Bounds) -> bool {
        self.with(|t| {
            let Some(handle) = t.nodes.get(id).and_then(|n| n.handle) else {
                return false;
            };
            t.platform.layout(handle, bounds);
            if let Some(node) = t.nodes.get_mut(id) {
                node.bounds = Some(bounds);
            }
            true
        })
    }

    pub fn measured_size(&self, id: ViewId) -> Option<Size> {
        self.read(|t| t.nodes.get(id)?.measured)
    }

    pub fn layout_bounds(&self, id: ViewId) -> Option<Bounds> {
        self.read(|t| t.nodes.get(id)?.bounds)
    }

    /// Device-independent position inside the window.
    pub fn location_in_window(&self, id: ViewId) -> Option<Point> {
        self.read(|t| {
            let handle = t.nodes.get(id)?.handle?;
            let p = t.platform.location_in_window(handle)?;
            let m = t.metrics();
            Some(Point {
                x: m.to_device_independent(p.x),
                y: m.to_device_independent(p.y),
            })
        })
    }

    /// Device-independent position on screen.
    pub fn location_on_screen(&self, id: ViewId) -> Option<Point> {
        self.read(|t| {
            let handle = t.nodes.get(id)?.handle?;
            let p = t.platform.location_on_screen(handle)?;
            let m = t.metrics();
            Some(Point {
                x: m.to_device_independent(p.x),
                y: m.to_device_independent(p.y),
            })
        })
    }

    /// Position of `id` relative to `other`, in dips. `None` unless both are
    /// attached.
    pub fn location_relative_to(&self, id: ViewId, other: ViewId) -> Option<Point> {
        let a = self.location_in_window(id)?;
        let b = self.location_in_window(other)?;
        Some(Point {
            x: a.x - b.x,
            y: a.y - b.y,
        })
    }

    pub fn request_layout(&self, id: ViewId) {
        self.with(|t| t.request_layout(id));
    }

    /// False while detached or while a layout pass is pending.
    pub fn is_layout_valid(&self, id: ViewId) -> bool {
        self.read(|t| {
            t.nodes
                .get(id)
                .and_then(|n| n.handle)
                .is_some_and(|h| !t.platform.is_layout_requested(h))
        })
    }

    pub fn focus(&self, id: ViewId) -> bool {
        self.with(|t| {
            let Some(handle) = t.nodes.get(id).and_then(|n| n.handle) else {
                return false;
            };
            t.platform.request_focus(handle)
        })
    }

    // ---- modal surfaces ----

    pub fn present_modal(&self, presenter: ViewId, content: ViewId, fullscreen: bool) -> Result<SurfaceId> {
        self.with(|t| {
            let not_attached = |id: ViewId| Error::invalid_argument(format!("{id:?} is not attached"));
            let ph = t.node(presenter)?.handle.ok_or_else(|| not_attached(presenter))?;
            let ch = t.node(content)?.handle.ok_or_else(|| not_attached(content))?;
            t.platform.present_modal(ph, ch, fullscreen)
        })
    }

    pub fn dismiss_modal(&self, surface: SurfaceId) {
        self.with(|t| t.platform.dismiss_modal(surface));
    }
}
