//! Declared properties and the per-node value store.
//!
//! Every node keeps, per property, an optional local value and an optional
//! style value. The effective value is local if set, else style, else the
//! declared default. Mutations report whether the effective value changed so
//! the tree knows when a native setter must run.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::value::{Value, ValueConverter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(pub(crate) usize);

impl PropertyId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub name: &'static str,
    pub default: Value,
    pub affects_layout: bool,
    pub converter: ValueConverter,
}

impl PropertyDecl {
    pub fn new(name: &'static str, default: impl Into<Value>, converter: ValueConverter) -> Self {
        Self {
            name,
            default: default.into(),
            affects_layout: false,
            converter,
        }
    }

    pub fn affects_layout(mut self) -> Self {
        self.affects_layout = true;
        self
    }

    /// Runs the converter, mapping a rejection to [`Error::Conversion`].
    pub fn convert(&self, raw: &str) -> Result<Value> {
        (self.converter)(raw).ok_or_else(|| Error::Conversion {
            property: self.name.to_string(),
            value: raw.to_string(),
        })
    }
}

/// Property declarations of one tree, in declaration order.
#[derive(Default)]
pub struct PropertyRegistry {
    decls: Vec<PropertyDecl>,
    by_name: HashMap<&'static str, PropertyId>,
}

impl PropertyRegistry {
    /// Declares a property. Redeclaring a name returns the existing id.
    pub fn declare(&mut self, decl: PropertyDecl) -> PropertyId {
        if let Some(id) = self.by_name.get(decl.name) {
            return *id;
        }
        let id = PropertyId(self.decls.len());
        self.by_name.insert(decl.name, id);
        self.decls.push(decl);
        id
    }

    pub fn get(&self, id: PropertyId) -> Option<&PropertyDecl> {
        self.decls.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Where the effective value of a property comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSource {
    Default,
    Css,
    Local,
}

#[derive(Clone, Debug, Default)]
struct Slot {
    local: Option<Value>,
    css: Option<Value>,
}

impl Slot {
    fn effective(&self) -> Option<&Value> {
        self.local.as_ref().or(self.css.as_ref())
    }
}

/// Logical values of one node. Iterates in declaration order.
#[derive(Clone, Debug, Default)]
pub struct PropertyStore {
    slots: BTreeMap<PropertyId, Slot>,
}

impl PropertyStore {
    /// Non-default value, if any.
    pub fn effective(&self, id: PropertyId) -> Option<&Value> {
        self.slots.get(&id).and_then(Slot::effective)
    }

    pub fn source(&self, id: PropertyId) -> ValueSource {
        match self.slots.get(&id) {
            Some(s) if s.local.is_some() => ValueSource::Local,
            Some(s) if s.css.is_some() => ValueSource::Css,
            _ => ValueSource::Default,
        }
    }

    pub fn set_local(&mut self, id: PropertyId, value: Value) -> bool {
        let slot = self.slots.entry(id).or_default();
        let changed = slot.effective() != Some(&value);
        slot.local = Some(value);
        changed
    }

    pub fn clear_local(&mut self, id: PropertyId) -> bool {
        self.update(id, |s| s.local = None)
    }

    pub fn set_css(&mut self, id: PropertyId, value: Value) -> bool {
        let slot = self.slots.entry(id).or_default();
        let before = slot.effective().cloned();
        slot.css = Some(value);
        slot.effective() != before.as_ref()
    }

    pub fn clear_css(&mut self, id: PropertyId) -> bool {
        self.update(id, |s| s.css = None)
    }

    /// Drops every style value, returning the ids whose effective value changed.
    pub fn reset_css(&mut self) -> Vec<PropertyId> {
        let ids: Vec<PropertyId> = self.css_ids().collect();
        ids.into_iter().filter(|id| self.clear_css(*id)).collect()
    }

    /// Ids with a non-default value, in declaration order.
    pub fn set_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots
            .iter()
            .filter(|(_, s)| s.effective().is_some())
            .map(|(id, _)| *id)
    }

    pub fn css_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots
            .iter()
            .filter(|(_, s)| s.css.is_some())
            .map(|(id, _)| *id)
    }

    fn update(&mut self, id: PropertyId, f: impl FnOnce(&mut Slot)) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        let before = slot.effective().cloned();
        f(slot);
        let changed = slot.effective() != before.as_ref();
        if slot.local.is_none() && slot.css.is_none() {
            self.slots.remove(&id);
        }
        changed
    }
}
