//! Widgets, layouts and text fields.
//!
//! Every widget here is a [`WidgetSpec`] over the base `View`: an accessor
//! table for its own properties plus the native listeners it installs when
//! its handle is created. [`install`] declares the properties and registers
//! the widgets on a tree.

pub mod button;
pub mod indicator;
pub mod layout;
pub mod tests;
pub mod text_field;

pub use button::{BUTTON, HIGHLIGHTED, TAP};
pub use indicator::ACTIVITY_INDICATOR;
pub use layout::{ACTION_BAR, CONTENT_LAYOUT};
pub use text_field::{RETURN_PRESS, TEXT_FIELD, TextFieldProperties, UpdateTextTrigger};

use trellis_core::*;

/// Ids of the properties declared by [`install`].
#[derive(Clone, Copy, Debug)]
pub struct UiProperties {
    /// Shared by buttons and text fields.
    pub text: PropertyId,
    pub title: PropertyId,
    pub busy: PropertyId,
    pub color: PropertyId,
    pub text_field: TextFieldProperties,
}

/// Declares widget properties and registers every widget of this crate.
pub fn install(tree: &ViewTree) -> Result<UiProperties> {
    let text = tree.declare_property(PropertyDecl::new("text", "", converters::text).affects_layout());
    let title = tree.declare_property(PropertyDecl::new("title", "", converters::text));
    let busy = tree.declare_property(PropertyDecl::new("busy", false, converters::boolean));
    let color = tree.declare_property(PropertyDecl::new("color", Color::BLACK, converters::color));
    let text_field = TextFieldProperties::declare(tree, text);

    tree.register_widget(layout::content_layout())?;
    tree.register_widget(layout::action_bar(title))?;
    tree.register_widget(button::spec(text))?;
    tree.register_widget(indicator::spec(busy, color, tree.props().visibility))?;
    tree.register_widget(text_field::spec(text_field))?;
    log::debug!("installed widgets on tree");

    Ok(UiProperties {
        text,
        title,
        busy,
        color,
        text_field,
    })
}

fn mismatch(property: &str, value: &Value) -> Error {
    Error::invalid_argument(format!("`{property}` cannot take a {:?} value", value.kind()))
}
