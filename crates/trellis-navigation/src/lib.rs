//! Pages, modal presentation and a minimal navigation frame.
//!
//! A [`Page`] composes its content view and an action bar. Pages show other
//! pages modally on a separate native surface; a [`Frame`] hosts one page at
//! a time and keeps a back stack of the pages navigated away from.

pub mod frame;
pub mod modal;
pub mod page;

pub use frame::{Frame, FrameOptions, NavigationEntry, Navigator, PageFactory};
pub use modal::{CloseCallback, ModalState, ModalTarget};
pub use page::*;

use trellis_core::{PropertyDecl, PropertyId, Result, ViewTree, converters};
use trellis_ui::UiProperties;

#[derive(Clone, Copy, Debug)]
pub struct NavProperties {
    pub ui: UiProperties,
    pub action_bar_hidden: PropertyId,
    pub background_span_under_status_bar: PropertyId,
    pub enable_swipe_back_navigation: PropertyId,
}

/// Installs the widgets of `trellis-ui` plus `Page` and `Frame`.
pub fn install(tree: &ViewTree) -> Result<NavProperties> {
    let ui = trellis_ui::install(tree)?;
    let d = |decl| tree.declare_property(decl);
    let props = NavProperties {
        ui,
        action_bar_hidden: d(PropertyDecl::new("actionBarHidden", false, converters::boolean).affects_layout()),
        background_span_under_status_bar: d(
            PropertyDecl::new("backgroundSpanUnderStatusBar", false, converters::boolean).affects_layout(),
        ),
        enable_swipe_back_navigation: d(PropertyDecl::new(
            "enableSwipeBackNavigation",
            true,
            converters::boolean,
        )),
    };
    tree.register_widget(page::spec(&props))?;
    tree.register_widget(frame::spec())?;
    Ok(props)
}
