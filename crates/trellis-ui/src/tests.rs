#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_core::headless::{HeadlessPlatform, NativeCallRecord};
    use trellis_core::*;

    use crate::*;

    struct Fixture {
        platform: HeadlessPlatform,
        tree: ViewTree,
        ui: UiProperties,
        ctx: NativeContext,
    }

    fn fixture() -> Fixture {
        let platform = HeadlessPlatform::new(2.0);
        let tree = ViewTree::new(platform.boxed());
        let ui = install(&tree).unwrap();
        let ctx = platform.new_context();
        Fixture {
            platform,
            tree,
            ui,
            ctx,
        }
    }

    fn record(tree: &ViewTree, id: ViewId, name: &str) -> Rc<RefCell<Vec<EventData>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.on(id, name, move |e| sink.borrow_mut().push(e.clone()))
            .unwrap();
        seen
    }

    fn touch(action: TouchAction) -> NativeEvent {
        NativeEvent::Touch(TouchEvent { action, x: 1.0, y: 1.0 })
    }

    #[test]
    fn test_install_twice_fails() {
        let f = fixture();
        assert!(matches!(install(&f.tree), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_button_click_raises_tap() {
        let f = fixture();
        let button = f.tree.create_view(BUTTON).unwrap();
        f.tree.set_property(button, f.ui.text, "OK").unwrap();
        let taps = record(&f.tree, button, TAP);

        f.tree.attach(button, Some(f.ctx)).unwrap();
        let h = f.tree.handle(button).unwrap();
        assert_eq!(f.platform.peek(h, "text"), Some(NativeValue::Text("OK".into())));

        assert!(f.platform.dispatch(h, ListenerSlot::Click, NativeEvent::Click));
        assert_eq!(taps.borrow().len(), 1);
        assert_eq!(taps.borrow()[0].object, button);

        f.tree.detach(button, true).unwrap();
        assert!(!f.platform.has_listener(h, ListenerSlot::Click));
        assert!(!f.platform.dispatch(h, ListenerSlot::Click, NativeEvent::Click));
        assert_eq!(taps.borrow().len(), 1);
    }

    #[test]
    fn test_click_after_tree_dropped_is_ignored() {
        let f = fixture();
        let button = f.tree.create_view(BUTTON).unwrap();
        f.tree.attach(button, Some(f.ctx)).unwrap();
        let h = f.tree.handle(button).unwrap();

        drop(f.tree);
        assert!(f.platform.has_listener(h, ListenerSlot::Click));
        assert!(!f.platform.dispatch(h, ListenerSlot::Click, NativeEvent::Click));
    }

    #[test]
    fn test_button_highlight_follows_touches() {
        let f = fixture();
        let button = f.tree.create_view(BUTTON).unwrap();
        let scope = StaticStyleScope::new().state_rule(
            Selector::Type(BUTTON.into()),
            HIGHLIGHTED,
            &[("opacity", "0.5")],
        );
        f.tree.apply_style(button, Rc::new(scope)).unwrap();
        f.tree.attach(button, Some(f.ctx)).unwrap();
        let h = f.tree.handle(button).unwrap();
        assert!(f.tree.gesture_types(button).contains(GestureTypes::TOUCH));

        f.platform.dispatch(h, ListenerSlot::Touch, touch(TouchAction::Down));
        assert_eq!(f.tree.visual_state(button).as_deref(), Some(HIGHLIGHTED));
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(0.5)));

        f.platform.dispatch(h, ListenerSlot::Touch, touch(TouchAction::Up));
        assert_eq!(f.tree.visual_state(button), None);
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(1.0)));
    }

    #[test]
    fn test_indicator_busy_requests_layout() {
        let f = fixture();
        let spinner = f.tree.create_view(ACTIVITY_INDICATOR).unwrap();
        f.tree.set_property(spinner, f.ui.busy, true).unwrap();
        f.tree.set_property(spinner, f.ui.color, Color::WHITE).unwrap();
        f.tree.attach(spinner, Some(f.ctx)).unwrap();
        let h = f.tree.handle(spinner).unwrap();

        assert_eq!(f.platform.peek(h, "animating"), Some(NativeValue::Bool(true)));
        assert_eq!(
            f.platform.peek(h, "color"),
            Some(NativeValue::Int(Color::WHITE.to_argb() as i64))
        );
        assert!(
            f.platform
                .calls()
                .contains(&NativeCallRecord::RequestLayout(h))
        );
    }

    #[test]
    fn test_indicator_overrides_visibility_mapping() {
        let f = fixture();
        let visibility = f.tree.props().visibility;
        let spinner = f.tree.create_view(ACTIVITY_INDICATOR).unwrap();
        f.tree.attach(spinner, Some(f.ctx)).unwrap();
        let h = f.tree.handle(spinner).unwrap();

        f.tree.set_property(spinner, visibility, "collapse").unwrap();
        assert_eq!(f.platform.peek(h, "hidden"), Some(NativeValue::Bool(true)));
        assert_eq!(f.platform.peek(h, "visibility"), None);

        assert_eq!(
            f.tree.set_property(spinner, visibility, "sideways"),
            Err(Error::UnresolvedEnumValue {
                property: "visibility",
                value: "sideways".into()
            })
        );
    }

    #[test]
    fn test_text_field_reports_typing_without_echo() {
        let f = fixture();
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        let changes = record(&f.tree, field, PROPERTY_CHANGE);
        f.tree.attach(field, Some(f.ctx)).unwrap();
        let h = f.tree.handle(field).unwrap();

        f.platform.dispatch(h, ListenerSlot::Text, NativeEvent::TextChanged("abc".into()));
        assert_eq!(f.tree.property(field, f.ui.text), Ok(Value::from("abc")));
        assert_eq!(f.platform.peek(h, "text"), None);

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].data["propertyName"], "text");
        assert_eq!(changes[0].data["value"], "abc");
    }

    #[test]
    fn test_text_field_focus_lost_trigger() {
        let f = fixture();
        let tf = f.ui.text_field;
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        f.tree.set_property(field, tf.update_text_trigger, "focusLost").unwrap();
        f.tree.attach(field, Some(f.ctx)).unwrap();
        let h = f.tree.handle(field).unwrap();

        f.platform.dispatch(h, ListenerSlot::Text, NativeEvent::TextChanged("a".into()));
        f.platform.dispatch(h, ListenerSlot::Text, NativeEvent::TextChanged("ab".into()));
        assert_eq!(f.tree.property(field, tf.text), Ok(Value::from("")));

        f.platform.dispatch(h, ListenerSlot::Focus, NativeEvent::FocusChanged(true));
        assert_eq!(f.tree.property(field, tf.text), Ok(Value::from("")));

        f.platform.dispatch(h, ListenerSlot::Focus, NativeEvent::FocusChanged(false));
        assert_eq!(f.tree.property(field, tf.text), Ok(Value::from("ab")));
        assert_eq!(f.tree.value_source(field, tf.text), Ok(ValueSource::Local));
    }

    #[test]
    fn test_text_field_rejects_unknown_trigger() {
        let f = fixture();
        let tf = f.ui.text_field;
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        f.tree.attach(field, Some(f.ctx)).unwrap();

        assert_eq!(
            f.tree.set_property_str(field, "updateTextTrigger", "onBlur"),
            Err(Error::Conversion {
                property: "updateTextTrigger".into(),
                value: "onBlur".into()
            })
        );
        assert_eq!(
            f.tree.set_property(field, tf.update_text_trigger, "onBlur"),
            Err(Error::UnresolvedEnumValue {
                property: "updateTextTrigger",
                value: "onBlur".into()
            })
        );
        f.tree.set_property_str(field, "updateTextTrigger", "focusLost").unwrap();
        assert_eq!(f.tree.property(field, tf.update_text_trigger), Ok(Value::from("focusLost")));
    }

    #[test]
    fn test_text_field_return_press() {
        let f = fixture();
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        let presses = record(&f.tree, field, RETURN_PRESS);
        f.tree.attach(field, Some(f.ctx)).unwrap();
        let h = f.tree.handle(field).unwrap();

        let action = |a: &str| NativeEvent::EditorAction(a.into());
        f.platform.dispatch(h, ListenerSlot::EditorAction, action("done"));
        f.platform.dispatch(h, ListenerSlot::EditorAction, action("previous"));
        f.platform.dispatch(h, ListenerSlot::EditorAction, action("enter"));
        assert_eq!(presses.borrow().len(), 2);
    }

    #[test]
    fn test_text_field_input_type_bits_compose() {
        let f = fixture();
        let tf = f.ui.text_field;
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        f.tree.set_property(field, tf.keyboard_type, "email").unwrap();
        f.tree.set_property(field, tf.autocapitalization_type, "none").unwrap();
        f.tree.set_property(field, tf.autocorrect, true).unwrap();
        f.tree.set_property(field, tf.return_key_type, "search").unwrap();
        f.tree.attach(field, Some(f.ctx)).unwrap();
        let h = f.tree.handle(field).unwrap();

        // email | auto complete | auto correct
        assert_eq!(f.platform.peek(h, "inputType"), Some(NativeValue::Int(0x18021)));
        assert_eq!(f.platform.peek(h, "imeOptions"), Some(NativeValue::Int(3)));

        f.tree.set_property(field, tf.autocapitalization_type, "words").unwrap();
        assert_eq!(f.platform.peek(h, "inputType"), Some(NativeValue::Int(0x1a021)));

        f.tree.set_property(field, tf.keyboard_type, "42").unwrap();
        assert_eq!(f.platform.peek(h, "inputType"), Some(NativeValue::Int(42)));
    }

    #[test]
    fn test_text_field_clear_restores_native_default() {
        let f = fixture();
        let tf = f.ui.text_field;
        let field = f.tree.create_view(TEXT_FIELD).unwrap();
        f.tree.attach(field, Some(f.ctx)).unwrap();
        let h = f.tree.handle(field).unwrap();
        f.platform.seed_attribute(h, "imeOptions", NativeValue::Int(5));

        f.tree.set_property(field, tf.return_key_type, "go").unwrap();
        assert_eq!(f.platform.peek(h, "imeOptions"), Some(NativeValue::Int(2)));
        f.tree.clear_property(field, tf.return_key_type).unwrap();
        assert_eq!(f.platform.peek(h, "imeOptions"), Some(NativeValue::Int(5)));
    }

    #[test]
    fn test_widget_tree_dump() {
        let f = fixture();
        let layout = f.tree.create_view(CONTENT_LAYOUT).unwrap();
        let bar = f.tree.create_view(ACTION_BAR).unwrap();
        let button = f.tree.create_view(BUTTON).unwrap();
        f.tree.set_property(bar, f.ui.title, "Home").unwrap();
        f.tree.set_property(button, f.ui.text, "Go").unwrap();
        f.tree.add_child(layout, bar).unwrap();
        f.tree.add_child(layout, button).unwrap();
        f.tree.attach(layout, Some(f.ctx)).unwrap();

        let dump = f.platform.dump(f.tree.handle(layout).unwrap());
        insta::assert_snapshot!(dump, @r#"
        ContentLayout#1
          ActionBar#2 title="Home"
          Button#3 text="Go"
        "#);
    }
}
