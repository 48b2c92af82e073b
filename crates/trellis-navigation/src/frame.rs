//! Navigation frame.
//!
//! A frame shows one page at a time. Navigating forward moves the current
//! page onto the back stack; with `cache_pages_on_navigate` the page keeps
//! its native state while it waits there. Going back discards the current
//! page for good.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use trellis_core::*;

use crate::NavProperties;
use crate::page::Page;

pub const FRAME: &str = "Frame";

pub(crate) fn spec() -> WidgetSpec {
    WidgetSpec::new(FRAME).container()
}

/// What the rest of the system needs from a navigation host.
pub trait Navigator {
    fn topmost_page(&self) -> Option<Page>;
    /// Builds a fresh page for `entry`, or `None` if nothing is registered
    /// under its module name.
    fn resolve_page_from_entry(&self, entry: &NavigationEntry) -> Option<Page>;
    fn cache_pages_on_navigate(&self) -> bool;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEntry {
    pub module_name: String,
    #[serde(default)]
    pub context: serde_json::Value,
    /// Drop every back stack entry once the navigation completes.
    #[serde(default)]
    pub clear_history: bool,
    /// Whether this entry stays on the back stack after navigating away.
    #[serde(default = "visible")]
    pub back_stack_visible: bool,
}

fn visible() -> bool {
    true
}

impl NavigationEntry {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            context: serde_json::Value::Null,
            clear_history: false,
            back_stack_visible: true,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn clear_history(mut self) -> Self {
        self.clear_history = true;
        self
    }

    pub fn hidden_from_back_stack(mut self) -> Self {
        self.back_stack_visible = false;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameOptions {
    /// Keep native state of pages on the back stack.
    pub cache_pages_on_navigate: bool,
}

/// Fills a freshly created page.
pub type PageFactory = Rc<dyn Fn(&Page) -> Result<()>>;

#[derive(Clone)]
struct BackstackEntry {
    entry: NavigationEntry,
    page: Page,
}

#[derive(Default)]
struct FrameState {
    factories: HashMap<String, PageFactory>,
    back_stack: Vec<BackstackEntry>,
    current: Option<BackstackEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    current: Option<&'a NavigationEntry>,
    back_stack: Vec<&'a NavigationEntry>,
}

struct FrameInner {
    tree: ViewTree,
    id: ViewId,
    props: NavProperties,
    options: FrameOptions,
    state: RefCell<FrameState>,
}

#[derive(Clone)]
pub struct Frame {
    inner: Rc<FrameInner>,
}

impl Frame {
    pub fn new(tree: &ViewTree, props: NavProperties, options: FrameOptions) -> Result<Frame> {
        let id = tree.create_view(FRAME)?;
        Ok(Frame {
            inner: Rc::new(FrameInner {
                tree: tree.clone(),
                id,
                props,
                options,
                state: RefCell::new(FrameState::default()),
            }),
        })
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn options(&self) -> FrameOptions {
        self.inner.options
    }

    pub fn register_page(&self, module: impl Into<String>, factory: impl Fn(&Page) -> Result<()> + 'static) {
        self.inner
            .state
            .borrow_mut()
            .factories
            .insert(module.into(), Rc::new(factory));
    }

    pub fn current_page(&self) -> Option<Page> {
        self.inner.state.borrow().current.as_ref().map(|e| e.page.clone())
    }

    pub fn can_go_back(&self) -> bool {
        !self.inner.state.borrow().back_stack.is_empty()
    }

    /// Back stack entries, oldest first.
    pub fn back_stack(&self) -> Vec<NavigationEntry> {
        self.inner
            .state
            .borrow()
            .back_stack
            .iter()
            .map(|e| e.entry.clone())
            .collect()
    }

    /// Current entry and back stack as JSON.
    pub fn to_json(&self) -> String {
        let s = self.inner.state.borrow();
        let snapshot = Snapshot {
            current: s.current.as_ref().map(|e| &e.entry),
            back_stack: s.back_stack.iter().map(|e| &e.entry).collect(),
        };
        serde_json::to_string(&snapshot).unwrap_or("{}".into())
    }

    fn build_page(&self, entry: &NavigationEntry) -> Result<Page> {
        let factory = self
            .inner
            .state
            .borrow()
            .factories
            .get(&entry.module_name)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("no page registered for `{}`", entry.module_name)))?;
        let tree = &self.inner.tree;
        let page = Page::new(tree, self.inner.props)?;
        if let Err(err) = factory(&page) {
            tree.remove_view(page.id())?;
            return Err(err);
        }
        Ok(page)
    }

    /// Shows the page registered for `entry`, moving the current page to the
    /// back stack.
    pub fn navigate(&self, entry: NavigationEntry) -> Result<Page> {
        let page = self.build_page(&entry)?;
        let tree = &self.inner.tree;
        let current = self.inner.state.borrow_mut().current.take();

        if let Some(cur) = &current {
            cur.page.on_navigating_from(false);
        }
        page.on_navigating_to(entry.context.clone(), false);
        page.policy().cached.set(self.inner.options.cache_pages_on_navigate);

        if let Some(cur) = &current {
            cur.page.on_navigated_from(false);
            tree.remove_child(self.id(), cur.page.id())?;
            if tree.is_retained(cur.page.id()) {
                log::debug!("caching {:?}", cur.page);
            }
        }
        tree.add_child(self.id(), page.id())?;

        let stale = {
            let mut s = self.inner.state.borrow_mut();
            let mut stale = Vec::new();
            if let Some(cur) = current {
                if cur.entry.back_stack_visible {
                    s.back_stack.push(cur);
                } else {
                    stale.push(cur);
                }
            }
            if entry.clear_history {
                stale.append(&mut s.back_stack);
            }
            s.current = Some(BackstackEntry {
                entry,
                page: page.clone(),
            });
            stale
        };
        for dropped in stale {
            tree.remove_view(dropped.page.id())?;
        }

        page.on_navigated_to(false);
        Ok(page)
    }

    /// Returns to the previous page. `false` when the back stack is empty.
    pub fn go_back(&self) -> Result<bool> {
        let tree = &self.inner.tree;
        let (previous, current) = {
            let mut s = self.inner.state.borrow_mut();
            let Some(previous) = s.back_stack.pop() else {
                return Ok(false);
            };
            (previous, s.current.take())
        };

        if let Some(cur) = &current {
            cur.page.on_navigating_from(true);
        }
        previous
            .page
            .on_navigating_to(previous.entry.context.clone(), true);

        if let Some(cur) = &current {
            cur.page.on_navigated_from(true);
            tree.remove_view(cur.page.id())?;
        }
        tree.add_child(self.id(), previous.page.id())?;
        self.inner.state.borrow_mut().current = Some(previous.clone());

        previous.page.on_navigated_to(true);
        Ok(true)
    }
}

impl Navigator for Frame {
    fn topmost_page(&self) -> Option<Page> {
        self.current_page()
    }

    fn resolve_page_from_entry(&self, entry: &NavigationEntry) -> Option<Page> {
        match self.build_page(entry) {
            Ok(page) => Some(page),
            Err(err) => {
                log::warn!("resolving `{}` failed: {err}", entry.module_name);
                None
            }
        }
    }

    fn cache_pages_on_navigate(&self) -> bool {
        self.inner.options.cache_pages_on_navigate
    }
}
