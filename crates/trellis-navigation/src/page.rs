//! Page: content plus action bar.
//!
//! Children are kept in the order content, action bar. The action bar can
//! be replaced but never removed. A page applies its own style scope the
//! first time it is loaded and re-applies it when the scope changes.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use serde_json::json;
use trellis_core::*;
use trellis_ui::ACTION_BAR;

use crate::NavProperties;
use crate::modal::ModalLink;

pub const PAGE: &str = "Page";

pub const NAVIGATING_TO: &str = "navigatingTo";
pub const NAVIGATED_TO: &str = "navigatedTo";
pub const NAVIGATING_FROM: &str = "navigatingFrom";
pub const NAVIGATED_FROM: &str = "navigatedFrom";

pub(crate) fn spec(props: &NavProperties) -> WidgetSpec {
    WidgetSpec::new(PAGE)
        .container()
        .accessor(props.action_bar_hidden, Accessor::bool("actionBarHidden"))
        .accessor(
            props.background_span_under_status_bar,
            Accessor::bool("backgroundSpanUnderStatusBar"),
        )
        .accessor(
            props.enable_swipe_back_navigation,
            Accessor::bool("swipeBackEnabled"),
        )
}

/// Keeps a page's native state while its frame caches pages, unless the
/// page is being left through back navigation.
#[derive(Default)]
pub(crate) struct PagePolicy {
    pub(crate) cached: Cell<bool>,
    pub(crate) back_navigation: Cell<bool>,
}

impl DetachPolicy for PagePolicy {
    fn retain_native(&self, _view: ViewId) -> bool {
        self.cached.get() && !self.back_navigation.get()
    }
}

pub(crate) struct PageState {
    pub(crate) content: Option<ViewId>,
    pub(crate) action_bar: ViewId,
    pub(crate) css: Option<Rc<dyn StyleScope>>,
    pub(crate) css_applied: bool,
    pub(crate) navigation_context: serde_json::Value,
    /// Page this one presents modally.
    pub(crate) modal: Option<Page>,
    /// Set while this page is shown modally.
    pub(crate) modal_link: Option<ModalLink>,
    pub(crate) modal_context: serde_json::Value,
}

pub(crate) struct PageInner {
    pub(crate) tree: ViewTree,
    pub(crate) id: ViewId,
    pub(crate) props: NavProperties,
    pub(crate) policy: Rc<PagePolicy>,
    pub(crate) state: RefCell<PageState>,
}

/// Cloneable handle to a page view.
#[derive(Clone)]
pub struct Page {
    pub(crate) inner: Rc<PageInner>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Page").field(&self.inner.id).finish()
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Page {
    /// Creates a detached page with an empty action bar.
    pub fn new(tree: &ViewTree, props: NavProperties) -> Result<Page> {
        let id = tree.create_view(PAGE)?;
        let action_bar = tree.create_view(ACTION_BAR)?;
        tree.add_child(id, action_bar)?;
        let policy = Rc::new(PagePolicy::default());
        tree.set_detach_policy(id, Some(policy.clone()))?;

        let page = Page {
            inner: Rc::new(PageInner {
                tree: tree.clone(),
                id,
                props,
                policy,
                state: RefCell::new(PageState {
                    content: None,
                    action_bar,
                    css: None,
                    css_applied: false,
                    navigation_context: serde_json::Value::Null,
                    modal: None,
                    modal_link: None,
                    modal_context: serde_json::Value::Null,
                }),
            }),
        };

        let weak = Rc::downgrade(&page.inner);
        tree.on(id, LOADED, move |_| {
            if let Some(page) = Page::upgrade(&weak) {
                page.apply_css();
            }
        })?;
        Ok(page)
    }

    pub(crate) fn upgrade(weak: &Weak<PageInner>) -> Option<Page> {
        weak.upgrade().map(|inner| Page { inner })
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn tree(&self) -> &ViewTree {
        &self.inner.tree
    }

    pub fn props(&self) -> NavProperties {
        self.inner.props
    }

    pub(crate) fn state(&self) -> Ref<'_, PageState> {
        self.inner.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, PageState> {
        self.inner.state.borrow_mut()
    }

    pub(crate) fn policy(&self) -> &PagePolicy {
        &self.inner.policy
    }

    pub fn content(&self) -> Option<ViewId> {
        self.state().content
    }

    /// Replaces the content view, which always sits before the action bar.
    pub fn set_content(&self, content: Option<ViewId>) -> Result<()> {
        let old = self.state().content;
        if old == content {
            return Ok(());
        }
        let tree = self.tree();
        if let Some(old) = old {
            tree.remove_child(self.id(), old)?;
            self.state_mut().content = None;
        }
        if let Some(new) = content {
            tree.insert_child(self.id(), new, 0)?;
            self.state_mut().content = Some(new);
        }
        Ok(())
    }

    pub fn action_bar(&self) -> ViewId {
        self.state().action_bar
    }

    /// Swaps the action bar. The old bar is detached and unparented before
    /// the new one is added.
    pub fn set_action_bar(&self, action_bar: Option<ViewId>) -> Result<()> {
        let bar = action_bar.ok_or_else(|| Error::invalid_argument("action bar cannot be empty"))?;
        let tree = self.tree();
        if tree.widget(bar).map(WidgetType::name) != Some(ACTION_BAR) {
            return Err(Error::invalid_argument(format!("{bar:?} is not an action bar")));
        }
        let old = self.state().action_bar;
        if old == bar {
            return Ok(());
        }
        if tree.parent(bar).is_some() {
            return Err(Error::invalid_argument(format!("{bar:?} already has a parent")));
        }
        let index = tree
            .children(self.id())
            .iter()
            .position(|c| *c == old)
            .unwrap_or_default();
        tree.remove_child(self.id(), old)?;
        if let Err(err) = tree.add_child(self.id(), bar) {
            tree.insert_child(self.id(), old, index)?;
            return Err(err);
        }
        self.state_mut().action_bar = bar;
        tree.request_layout(self.id());
        Ok(())
    }

    /// Content first, then the action bar.
    pub fn child_views(&self) -> Vec<ViewId> {
        let s = self.state();
        s.content.into_iter().chain([s.action_bar]).collect()
    }

    pub fn child_count(&self) -> usize {
        self.child_views().len()
    }

    // ---- style ----

    /// Sets the page's style scope, replacing values applied by the old one.
    pub fn set_css(&self, scope: Rc<dyn StyleScope>) -> Result<()> {
        self.state_mut().css = Some(scope);
        self.refresh_css()
    }

    fn refresh_css(&self) -> Result<()> {
        let applied = std::mem::take(&mut self.state_mut().css_applied);
        if applied {
            self.tree().reset_style(self.id())?;
        }
        if self.tree().is_attached(self.id()) {
            self.apply_css();
        }
        Ok(())
    }

    fn apply_css(&self) {
        let scope = {
            let s = self.state();
            if s.css_applied {
                return;
            }
            s.css.clone()
        };
        let Some(scope) = scope else {
            return;
        };
        match self.tree().apply_style(self.id(), scope) {
            Ok(()) => self.state_mut().css_applied = true,
            Err(err) => log::warn!("{self:?}: applying css failed: {err}"),
        }
    }

    // ---- navigation ----

    pub fn navigation_context(&self) -> serde_json::Value {
        self.state().navigation_context.clone()
    }

    fn notify_navigation(&self, name: &str, back: bool) {
        let context = self.navigation_context();
        self.tree().notify(
            EventData::new(name, self.id())
                .with_data(json!({ "context": context, "isBackNavigation": back })),
        );
    }

    pub fn on_navigating_to(&self, context: serde_json::Value, back: bool) {
        self.state_mut().navigation_context = context;
        self.policy().back_navigation.set(false);
        self.notify_navigation(NAVIGATING_TO, back);
    }

    pub fn on_navigated_to(&self, back: bool) {
        self.notify_navigation(NAVIGATED_TO, back);
    }

    pub fn on_navigating_from(&self, back: bool) {
        self.notify_navigation(NAVIGATING_FROM, back);
    }

    pub fn on_navigated_from(&self, back: bool) {
        self.policy().back_navigation.set(back);
        self.notify_navigation(NAVIGATED_FROM, back);
        self.state_mut().navigation_context = serde_json::Value::Null;
    }
}
