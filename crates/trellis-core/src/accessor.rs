//! Per-widget-type native accessor tables.
//!
//! A declared property knows nothing about native widgets. Each widget type
//! registers a [`WidgetSpec`] mapping property ids to getter/setter pairs;
//! lookups walk the `extends` chain so a button inherits the base view's
//! accessors for `opacity`, `width` and friends.

use std::collections::HashMap;
use std::rc::Rc;

use crate::color::Color;
use crate::error::{Error, Result};
use crate::native::{ListenerSlot, NativeHandle, NativeListener, NativePlatform, NativeValue, WidgetType};
use crate::property::PropertyId;
use crate::tree::{ViewTree, WeakView};
use crate::units::{DisplayMetrics, Length, ResolvedLength};
use crate::value::Value;

/// Native size constant for `auto` lengths.
pub const LAYOUT_AUTO: i64 = -2;

/// The native side of one accessor invocation.
pub struct NativeCall<'a> {
    pub(crate) platform: &'a mut dyn NativePlatform,
    pub handle: NativeHandle,
    pub metrics: DisplayMetrics,
    /// Owner of the handle, for listeners that call back into the tree.
    pub view: WeakView,
}

impl NativeCall<'_> {
    pub fn set(&mut self, key: &'static str, value: NativeValue) -> Result<()> {
        self.platform.set_attribute(self.handle, key, value)
    }

    pub fn get(&self, key: &'static str) -> Option<NativeValue> {
        self.platform.attribute(self.handle, key)
    }

    pub fn listen(&mut self, slot: ListenerSlot, listener: Rc<dyn NativeListener>) {
        self.platform.set_listener(self.handle, slot, Some(listener));
    }

    pub fn unlisten(&mut self, slot: ListenerSlot) {
        self.platform.set_listener(self.handle, slot, None);
    }

    pub fn request_layout(&mut self) {
        self.platform.request_layout(self.handle);
    }
}

pub type Setter = Rc<dyn Fn(&mut NativeCall<'_>, &Value) -> Result<()>>;
pub type Getter = Rc<dyn Fn(&NativeCall<'_>) -> Option<Value>>;
/// Runs right after handle creation or right before handle destruction.
pub type NativeHook = Rc<dyn Fn(&mut NativeCall<'_>)>;
/// Runs once when a logical view of the widget type is created.
pub type InitHook = Rc<dyn Fn(&ViewTree, crate::tree::ViewId)>;

fn mismatch(key: &str, value: &Value) -> Error {
    Error::invalid_argument(format!("`{key}` cannot take a {:?} value", value.kind()))
}

#[derive(Clone)]
pub struct Accessor {
    pub get: Option<Getter>,
    pub set: Setter,
}

impl Accessor {
    pub fn new(set: impl Fn(&mut NativeCall<'_>, &Value) -> Result<()> + 'static) -> Self {
        Self {
            get: None,
            set: Rc::new(set),
        }
    }

    pub fn with_getter(mut self, get: impl Fn(&NativeCall<'_>) -> Option<Value> + 'static) -> Self {
        self.get = Some(Rc::new(get));
        self
    }

    pub fn bool(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let b = v.as_bool().ok_or_else(|| mismatch(key, v))?;
            call.set(key, NativeValue::Bool(b))
        })
        .with_getter(move |call| call.get(key)?.as_bool().map(Value::Bool))
    }

    pub fn float(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let f = v.as_f32().ok_or_else(|| mismatch(key, v))?;
            call.set(key, NativeValue::Float(f))
        })
        .with_getter(move |call| call.get(key)?.as_float().map(|f| Value::Number(f as f64)))
    }

    /// Number in dips, stored natively in device pixels.
    pub fn dip(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let dip = v.as_f32().ok_or_else(|| mismatch(key, v))?;
            let px = call.metrics.to_device_pixels(dip);
            call.set(key, NativeValue::Float(px))
        })
        .with_getter(move |call| {
            let px = call.get(key)?.as_float()?;
            Some(Value::Number(call.metrics.to_device_independent(px) as f64))
        })
    }

    pub fn text(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let s = v.as_str().ok_or_else(|| mismatch(key, v))?;
            call.set(key, NativeValue::Text(s.to_string()))
        })
        .with_getter(move |call| call.get(key)?.as_text().map(Value::from))
    }

    pub fn color(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let c = v.as_color().ok_or_else(|| mismatch(key, v))?;
            call.set(key, NativeValue::Int(c.to_argb() as i64))
        })
        .with_getter(move |call| {
            let argb = call.get(key)?.as_int()?;
            Some(Value::Color(Color::from_argb(argb as u32)))
        })
    }

    /// Length without percentage support.
    pub fn length(key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let len = v.as_length().ok_or_else(|| mismatch(key, v))?;
            match len.resolve(call.metrics) {
                ResolvedLength::Auto => call.set(key, NativeValue::Int(LAYOUT_AUTO)),
                ResolvedLength::Px(px) => call.set(key, NativeValue::Float(px)),
                ResolvedLength::Percent(_) => Err(Error::invalid_argument(format!(
                    "`{key}` does not accept percentages"
                ))),
            }
        })
    }

    /// Length whose percentages go to `percent_key` for the layout container.
    ///
    /// A percentage sets `key` to auto; anything else resets `percent_key`
    /// to `-1`.
    pub fn percent_length(key: &'static str, percent_key: &'static str) -> Self {
        Accessor::new(move |call, v| {
            let len: Length = v.as_length().ok_or_else(|| mismatch(key, v))?;
            match len.resolve(call.metrics) {
                ResolvedLength::Auto => {
                    call.set(key, NativeValue::Int(LAYOUT_AUTO))?;
                    call.set(percent_key, NativeValue::Float(-1.0))
                }
                ResolvedLength::Px(px) => {
                    call.set(key, NativeValue::Float(px))?;
                    call.set(percent_key, NativeValue::Float(-1.0))
                }
                ResolvedLength::Percent(f) => {
                    call.set(key, NativeValue::Int(LAYOUT_AUTO))?;
                    call.set(percent_key, NativeValue::Float(f))
                }
            }
        })
    }
}

pub type AccessorTable = HashMap<PropertyId, Accessor>;

/// Registration record for one widget type.
#[derive(Clone)]
pub struct WidgetSpec {
    pub name: &'static str,
    pub extends: Option<&'static str>,
    pub container: bool,
    pub accessors: AccessorTable,
    pub on_init: Option<InitHook>,
    pub on_created: Option<NativeHook>,
    pub on_released: Option<NativeHook>,
}

impl WidgetSpec {
    /// A widget extending the base `View`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            extends: Some(crate::builtin::VIEW),
            container: false,
            accessors: AccessorTable::new(),
            on_init: None,
            on_created: None,
            on_released: None,
        }
    }

    pub(crate) fn root(name: &'static str) -> Self {
        Self {
            extends: None,
            ..Self::new(name)
        }
    }

    pub fn extends(mut self, base: &'static str) -> Self {
        self.extends = Some(base);
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn accessor(mut self, id: PropertyId, accessor: Accessor) -> Self {
        self.accessors.insert(id, accessor);
        self
    }

    pub fn on_init(mut self, f: impl Fn(&ViewTree, crate::tree::ViewId) + 'static) -> Self {
        self.on_init = Some(Rc::new(f));
        self
    }

    pub fn on_created(mut self, f: impl Fn(&mut NativeCall<'_>) + 'static) -> Self {
        self.on_created = Some(Rc::new(f));
        self
    }

    pub fn on_released(mut self, f: impl Fn(&mut NativeCall<'_>) + 'static) -> Self {
        self.on_released = Some(Rc::new(f));
        self
    }
}

#[derive(Default)]
pub struct WidgetRegistry {
    specs: HashMap<&'static str, WidgetSpec>,
}

impl WidgetRegistry {
    pub fn register(&mut self, spec: WidgetSpec) -> Result<WidgetType> {
        if self.specs.contains_key(spec.name) {
            return Err(Error::invalid_argument(format!(
                "widget `{}` is already registered",
                spec.name
            )));
        }
        if let Some(base) = spec.extends
            && !self.specs.contains_key(base)
        {
            return Err(Error::invalid_argument(format!(
                "widget `{}` extends unknown widget `{base}`",
                spec.name
            )));
        }
        let ty = WidgetType(spec.name);
        self.specs.insert(spec.name, spec);
        Ok(ty)
    }

    pub fn resolve(&self, name: &str) -> Option<WidgetType> {
        self.specs.get_key_value(name).map(|(k, _)| WidgetType(*k))
    }

    /// The widget's spec followed by its ancestors.
    pub fn chain(&self, widget: WidgetType) -> impl Iterator<Item = &WidgetSpec> + '_ {
        std::iter::successors(self.specs.get(widget.0), |spec| {
            spec.extends.and_then(|base| self.specs.get(base))
        })
    }

    /// Nearest accessor for `id`, walking the `extends` chain.
    pub fn accessor(&self, widget: WidgetType, id: PropertyId) -> Option<Accessor> {
        self.chain(widget)
            .find_map(|spec| spec.accessors.get(&id))
            .cloned()
    }

    pub fn is_container(&self, widget: WidgetType) -> bool {
        self.chain(widget).any(|spec| spec.container)
    }

    /// `on_created` hooks, base first.
    pub fn created_hooks(&self, widget: WidgetType) -> Vec<NativeHook> {
        let mut hooks: Vec<NativeHook> = self
            .chain(widget)
            .filter_map(|spec| spec.on_created.clone())
            .collect();
        hooks.reverse();
        hooks
    }

    /// `on_released` hooks, most derived first.
    pub fn released_hooks(&self, widget: WidgetType) -> Vec<NativeHook> {
        self.chain(widget)
            .filter_map(|spec| spec.on_released.clone())
            .collect()
    }

    pub fn init_hooks(&self, widget: WidgetType) -> Vec<InitHook> {
        let mut hooks: Vec<InitHook> = self
            .chain(widget)
            .filter_map(|spec| spec.on_init.clone())
            .collect();
        hooks.reverse();
        hooks
    }

    /// Widget names from most derived to the root, for style matching.
    pub fn lineage(&self, widget: WidgetType) -> Vec<&'static str> {
        self.chain(widget).map(|spec| spec.name).collect()
    }
}
