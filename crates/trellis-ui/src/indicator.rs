//! Busy spinner.

use trellis_core::*;

use crate::mismatch;

pub const ACTIVITY_INDICATOR: &str = "ActivityIndicator";

pub(crate) fn spec(busy: PropertyId, color: PropertyId, visibility: PropertyId) -> WidgetSpec {
    let animating = Accessor::new(|call, v| {
        let on = v.as_bool().ok_or_else(|| mismatch("busy", v))?;
        call.set("animating", NativeValue::Bool(on))?;
        // a stopped spinner collapses
        call.request_layout();
        Ok(())
    })
    .with_getter(|call| call.get("animating")?.as_bool().map(Value::Bool));

    // The native spinner only knows shown/hidden.
    let hidden = Accessor::new(|call, v| {
        let raw = v.as_str().ok_or_else(|| mismatch("visibility", v))?;
        let visibility = Visibility::parse(raw)?;
        call.set("hidden", NativeValue::Bool(visibility != Visibility::Visible))
    });

    WidgetSpec::new(ACTIVITY_INDICATOR)
        .accessor(busy, animating)
        .accessor(color, Accessor::color("color"))
        .accessor(visibility, hidden)
}
