//! Modal presentation.
//!
//! Showing a page modally attaches it with the presenter's native context
//! and hands it to a platform surface. The close path is a single-fire
//! link stored on the modal page: the first close tears the surface down,
//! unlinks the presenter and forwards its arguments to the caller's
//! callback; later closes do nothing. A dismissal reported by the platform
//! goes through the same link.

use std::rc::{Rc, Weak};

use trellis_core::*;

use crate::frame::{NavigationEntry, Navigator};
use crate::page::{Page, PageInner};

pub const SHOWING_MODALLY: &str = "showingModally";
pub const SHOWN_MODALLY: &str = "shownModally";

pub type CloseCallback = Box<dyn FnOnce(serde_json::Value)>;

/// What to show modally.
pub enum ModalTarget<'a> {
    Page(Page),
    /// A page module resolved through a navigator.
    Module {
        navigator: &'a dyn Navigator,
        module: &'a str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModalState {
    Normal,
    PresentingModal,
    PresentedAsModal,
}

pub(crate) struct ModalLink {
    presenter: Weak<PageInner>,
    surface: Option<SurfaceId>,
    on_close: Option<CloseCallback>,
}

struct DismissListener {
    page: Weak<PageInner>,
}

impl NativeListener for DismissListener {
    fn on_event(&self, event: &NativeEvent) -> bool {
        if *event != NativeEvent::Dismissed {
            return false;
        }
        match Page::upgrade(&self.page) {
            Some(page) => {
                page.close_modal(serde_json::Value::Null);
                true
            }
            None => false,
        }
    }
}

impl Page {
    /// Shows `target` modally over this page and returns the shown page.
    pub fn show_modal(
        &self,
        target: ModalTarget<'_>,
        context: serde_json::Value,
        on_close: Option<CloseCallback>,
        fullscreen: bool,
    ) -> Result<Page> {
        let page = match target {
            ModalTarget::Page(page) => page,
            ModalTarget::Module { navigator, module } => navigator
                .resolve_page_from_entry(&NavigationEntry::new(module))
                .ok_or_else(|| Error::invalid_argument(format!("no page for module `{module}`")))?,
        };
        page.show_native_modal(self, context, on_close, fullscreen)?;
        Ok(page)
    }

    /// Shows this page full screen over the navigator's topmost page.
    pub fn show_modal_over(&self, navigator: &dyn Navigator) -> Result<()> {
        let presenter = navigator
            .topmost_page()
            .ok_or_else(|| Error::invalid_argument("navigator has no page to present from"))?;
        self.show_native_modal(&presenter, serde_json::Value::Null, None, true)
    }

    /// Closes this page if it is shown modally. Only the first call after a
    /// show has an effect.
    pub fn close_modal(&self, args: serde_json::Value) {
        let Some(link) = self.state_mut().modal_link.take() else {
            return;
        };
        if let Some(on_close) = self.hide_native_modal(link) {
            on_close(args);
        }
    }

    /// The page this page is presenting.
    pub fn modal(&self) -> Option<Page> {
        self.state().modal.clone()
    }

    pub fn modal_context(&self) -> serde_json::Value {
        self.state().modal_context.clone()
    }

    pub fn modal_state(&self) -> ModalState {
        let s = self.state();
        if s.modal_link.is_some() {
            ModalState::PresentedAsModal
        } else if s.modal.is_some() {
            ModalState::PresentingModal
        } else {
            ModalState::Normal
        }
    }

    fn show_native_modal(
        &self,
        presenter: &Page,
        context: serde_json::Value,
        on_close: Option<CloseCallback>,
        fullscreen: bool,
    ) -> Result<()> {
        if self == presenter {
            return Err(Error::invalid_argument("a page cannot present itself"));
        }
        if self.state().modal_link.is_some() {
            return Err(Error::invalid_argument(format!("{self:?} is already shown modally")));
        }
        if presenter.state().modal.is_some() {
            return Err(Error::invalid_argument(format!(
                "{presenter:?} is already presenting a modal page"
            )));
        }
        let ctx = self.tree().context(presenter.id()).ok_or(Error::InvalidContext)?;

        presenter.state_mut().modal = Some(self.clone());
        {
            let mut s = self.state_mut();
            s.modal_context = context.clone();
            s.modal_link = Some(ModalLink {
                presenter: Rc::downgrade(&presenter.inner),
                surface: None,
                on_close,
            });
        }

        if let Err(err) = self.present(presenter, ctx, &context, fullscreen) {
            log::warn!("{self:?}: modal presentation failed: {err}");
            let link = self.state_mut().modal_link.take();
            if let Some(link) = link {
                self.hide_native_modal(link);
            }
            return Err(err);
        }
        Ok(())
    }

    fn present(
        &self,
        presenter: &Page,
        ctx: NativeContext,
        context: &serde_json::Value,
        fullscreen: bool,
    ) -> Result<()> {
        let tree = self.tree();
        let id = self.id();
        let view = tree.props();

        if tree.value_source(id, view.background_color)? == ValueSource::Default {
            tree.set_property(id, view.background_color, Color::WHITE)?;
        }
        let alignment = if fullscreen { "stretch" } else { "center" };
        tree.set_property(id, view.horizontal_alignment, alignment)?;
        tree.set_property(id, view.vertical_alignment, alignment)?;
        tree.set_property(id, self.props().action_bar_hidden, true)?;
        tree.attach(id, Some(ctx))?;

        self.notify_modal(SHOWING_MODALLY, context);
        let surface = tree.present_modal(presenter.id(), id, fullscreen)?;
        if let Some(link) = self.state_mut().modal_link.as_mut() {
            link.surface = Some(surface);
        }
        let listener = DismissListener {
            page: Rc::downgrade(&self.inner),
        };
        tree.set_listener(id, ListenerSlot::Dismiss, Some(Rc::new(listener)))?;
        self.notify_modal(SHOWN_MODALLY, context);
        Ok(())
    }

    fn hide_native_modal(&self, link: ModalLink) -> Option<CloseCallback> {
        let tree = self.tree();
        let id = self.id();
        self.state_mut().modal_context = serde_json::Value::Null;
        if let Some(surface) = link.surface {
            tree.dismiss_modal(surface);
        }
        if tree.handle(id).is_some()
            && let Err(err) = tree.set_listener(id, ListenerSlot::Dismiss, None)
        {
            log::warn!("{self:?}: {err}");
        }
        if let Some(presenter) = Page::upgrade(&link.presenter) {
            let mut s = presenter.state_mut();
            if s.modal.as_ref() == Some(self) {
                s.modal = None;
            }
        }
        if let Err(err) = tree.detach(id, true) {
            log::warn!("{self:?}: detaching closed modal failed: {err}");
        }
        link.on_close
    }

    fn notify_modal(&self, name: &str, context: &serde_json::Value) {
        self.tree()
            .notify(EventData::new(name, self.id()).with_data(context.clone()));
    }
}
