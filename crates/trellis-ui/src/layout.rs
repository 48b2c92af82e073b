use trellis_core::{Accessor, PropertyId, WidgetSpec};

/// Single-child container hosting a page's content.
pub const CONTENT_LAYOUT: &str = "ContentLayout";
pub const ACTION_BAR: &str = "ActionBar";

pub(crate) fn content_layout() -> WidgetSpec {
    WidgetSpec::new(CONTENT_LAYOUT).container()
}

pub(crate) fn action_bar(title: PropertyId) -> WidgetSpec {
    WidgetSpec::new(ACTION_BAR).accessor(title, Accessor::text("title"))
}
