//! Properties every view has, and the base `View` widget that maps them.

use crate::accessor::{Accessor, WidgetSpec};
use crate::color::Color;
use crate::enums::{HorizontalAlignment, VerticalAlignment, Visibility};
use crate::error::Error;
use crate::native::NativeValue;
use crate::property::{PropertyDecl, PropertyId, PropertyRegistry};
use crate::units::Length;
use crate::value::{Value, converters};

pub const VIEW: &str = "View";

/// Ids of the built-in view properties of a tree.
#[derive(Clone, Copy, Debug)]
pub struct ViewProperties {
    pub visibility: PropertyId,
    pub opacity: PropertyId,
    pub is_enabled: PropertyId,
    pub is_user_interaction_enabled: PropertyId,
    pub width: PropertyId,
    pub height: PropertyId,
    pub min_width: PropertyId,
    pub min_height: PropertyId,
    pub margin_left: PropertyId,
    pub margin_top: PropertyId,
    pub margin_right: PropertyId,
    pub margin_bottom: PropertyId,
    pub padding_left: PropertyId,
    pub padding_top: PropertyId,
    pub padding_right: PropertyId,
    pub padding_bottom: PropertyId,
    pub horizontal_alignment: PropertyId,
    pub vertical_alignment: PropertyId,
    pub rotate: PropertyId,
    pub scale_x: PropertyId,
    pub scale_y: PropertyId,
    pub translate_x: PropertyId,
    pub translate_y: PropertyId,
    pub z_index: PropertyId,
    pub automation_text: PropertyId,
    pub origin_x: PropertyId,
    pub origin_y: PropertyId,
    pub background_color: PropertyId,
}

fn zero() -> Value {
    Value::Length(Length::Dip(0.0))
}

impl ViewProperties {
    pub(crate) fn declare(reg: &mut PropertyRegistry) -> Self {
        use converters::*;
        let mut d = |decl: PropertyDecl| reg.declare(decl);
        Self {
            visibility: d(PropertyDecl::new("visibility", "visible", text).affects_layout()),
            opacity: d(PropertyDecl::new("opacity", 1.0, number)),
            is_enabled: d(PropertyDecl::new("isEnabled", true, boolean)),
            is_user_interaction_enabled: d(PropertyDecl::new("isUserInteractionEnabled", true, boolean)),
            width: d(PropertyDecl::new("width", Length::Auto, percent_length).affects_layout()),
            height: d(PropertyDecl::new("height", Length::Auto, percent_length).affects_layout()),
            min_width: d(PropertyDecl::new("minWidth", zero(), length).affects_layout()),
            min_height: d(PropertyDecl::new("minHeight", zero(), length).affects_layout()),
            margin_left: d(PropertyDecl::new("marginLeft", zero(), length).affects_layout()),
            margin_top: d(PropertyDecl::new("marginTop", zero(), length).affects_layout()),
            margin_right: d(PropertyDecl::new("marginRight", zero(), length).affects_layout()),
            margin_bottom: d(PropertyDecl::new("marginBottom", zero(), length).affects_layout()),
            padding_left: d(PropertyDecl::new("paddingLeft", zero(), length).affects_layout()),
            padding_top: d(PropertyDecl::new("paddingTop", zero(), length).affects_layout()),
            padding_right: d(PropertyDecl::new("paddingRight", zero(), length).affects_layout()),
            padding_bottom: d(PropertyDecl::new("paddingBottom", zero(), length).affects_layout()),
            horizontal_alignment: d(
                PropertyDecl::new("horizontalAlignment", "stretch", text).affects_layout(),
            ),
            vertical_alignment: d(
                PropertyDecl::new("verticalAlignment", "stretch", text).affects_layout(),
            ),
            rotate: d(PropertyDecl::new("rotate", 0.0, number)),
            scale_x: d(PropertyDecl::new("scaleX", 1.0, number)),
            scale_y: d(PropertyDecl::new("scaleY", 1.0, number)),
            translate_x: d(PropertyDecl::new("translateX", 0.0, number)),
            translate_y: d(PropertyDecl::new("translateY", 0.0, number)),
            z_index: d(PropertyDecl::new("zIndex", 0.0, number)),
            automation_text: d(PropertyDecl::new("automationText", "", text)),
            origin_x: d(PropertyDecl::new("originX", 0.5, number)),
            origin_y: d(PropertyDecl::new("originY", 0.5, number)),
            background_color: d(PropertyDecl::new("backgroundColor", Color::TRANSPARENT, color)),
        }
    }

    pub(crate) fn view_spec(&self) -> WidgetSpec {
        WidgetSpec::root(VIEW)
            .accessor(self.visibility, visibility())
            .accessor(self.opacity, Accessor::float("alpha"))
            .accessor(self.is_enabled, Accessor::bool("enabled"))
            .accessor(self.is_user_interaction_enabled, Accessor::bool("userInteractionEnabled"))
            .accessor(self.width, Accessor::percent_length("width", "widthPercent"))
            .accessor(self.height, Accessor::percent_length("height", "heightPercent"))
            .accessor(self.min_width, Accessor::length("minWidth"))
            .accessor(self.min_height, Accessor::length("minHeight"))
            .accessor(self.margin_left, Accessor::length("marginLeft"))
            .accessor(self.margin_top, Accessor::length("marginTop"))
            .accessor(self.margin_right, Accessor::length("marginRight"))
            .accessor(self.margin_bottom, Accessor::length("marginBottom"))
            .accessor(self.padding_left, Accessor::length("paddingLeft"))
            .accessor(self.padding_top, Accessor::length("paddingTop"))
            .accessor(self.padding_right, Accessor::length("paddingRight"))
            .accessor(self.padding_bottom, Accessor::length("paddingBottom"))
            .accessor(self.horizontal_alignment, horizontal_gravity())
            .accessor(self.vertical_alignment, vertical_gravity())
            .accessor(self.rotate, Accessor::float("rotation"))
            .accessor(self.scale_x, Accessor::float("scaleX"))
            .accessor(self.scale_y, Accessor::float("scaleY"))
            .accessor(self.translate_x, Accessor::dip("translationX"))
            .accessor(self.translate_y, Accessor::dip("translationY"))
            .accessor(self.z_index, Accessor::float("z"))
            .accessor(self.automation_text, Accessor::text("contentDescription"))
            .accessor(self.origin_x, Accessor::float("pivotX"))
            .accessor(self.origin_y, Accessor::float("pivotY"))
            .accessor(self.background_color, Accessor::color("background"))
    }
}

fn text_arg<'v>(key: &str, v: &'v Value) -> Result<&'v str, Error> {
    v.as_str()
        .ok_or_else(|| Error::invalid_argument(format!("`{key}` expects text")))
}

fn visibility() -> Accessor {
    Accessor::new(|call, v| {
        let code = match Visibility::parse(text_arg("visibility", v)?)? {
            Visibility::Visible => 0,
            Visibility::Hidden => 4,
            Visibility::Collapse => 8,
        };
        call.set("visibility", NativeValue::Int(code))
    })
}

// gravity bits follow the usual native layout constants
fn horizontal_gravity() -> Accessor {
    Accessor::new(|call, v| {
        let bits = match HorizontalAlignment::parse(text_arg("horizontalAlignment", v)?)? {
            HorizontalAlignment::Left => 3,
            HorizontalAlignment::Center => 1,
            HorizontalAlignment::Right => 5,
            HorizontalAlignment::Stretch => 7,
        };
        call.set("horizontalGravity", NativeValue::Int(bits))
    })
}

fn vertical_gravity() -> Accessor {
    Accessor::new(|call, v| {
        let bits = match VerticalAlignment::parse(text_arg("verticalAlignment", v)?)? {
            VerticalAlignment::Top => 48,
            VerticalAlignment::Center => 16,
            VerticalAlignment::Bottom => 80,
            VerticalAlignment::Stretch => 112,
        };
        call.set("verticalGravity", NativeValue::Int(bits))
    })
}
