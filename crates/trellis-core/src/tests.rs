#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::headless::{HeadlessPlatform, NativeCallRecord};
    use crate::*;

    struct Fixture {
        platform: HeadlessPlatform,
        tree: ViewTree,
        text: PropertyId,
        ctx: NativeContext,
    }

    fn fixture() -> Fixture {
        let platform = HeadlessPlatform::new(2.0);
        let tree = ViewTree::new(platform.boxed());
        let text = tree.declare_property(PropertyDecl::new("text", "", converters::text));
        tree.register_widget(WidgetSpec::new("Stack").container()).unwrap();
        tree.register_widget(WidgetSpec::new("Label").accessor(text, Accessor::text("text"))).unwrap();
        let ctx = platform.new_context();
        Fixture {
            platform,
            tree,
            text,
            ctx,
        }
    }

    impl Fixture {
        fn label(&self, text: &str) -> ViewId {
            let id = self.tree.create_view("Label").unwrap();
            self.tree.set_property(id, self.text, text).unwrap();
            id
        }

        fn stack_of(&self, labels: &[&str]) -> (ViewId, Vec<ViewId>) {
            let root = self.tree.create_view("Stack").unwrap();
            let children: Vec<ViewId> = labels.iter().map(|t| self.label(t)).collect();
            for c in &children {
                self.tree.add_child(root, *c).unwrap();
            }
            (root, children)
        }

        fn handles(&self, ids: &[ViewId]) -> Vec<NativeHandle> {
            ids.iter().filter_map(|id| self.tree.handle(*id)).collect()
        }

        fn creates(&self) -> usize {
            self.platform
                .calls()
                .iter()
                .filter(|c| matches!(c, NativeCallRecord::Create { .. }))
                .count()
        }
    }

    struct Keep(Rc<Cell<bool>>);

    impl DetachPolicy for Keep {
        fn retain_native(&self, _view: ViewId) -> bool {
            self.0.get()
        }
    }

    #[test]
    fn test_attach_is_idempotent() {
        let f = fixture();
        let (root, _) = f.stack_of(&["a", "b"]);

        f.tree.attach(root, Some(f.ctx)).unwrap();
        assert_eq!(f.creates(), 3);
        f.tree.attach(root, Some(f.ctx)).unwrap();
        assert_eq!(f.creates(), 3);

        assert_eq!(f.tree.attach(root, None), Err(Error::InvalidContext));
    }

    #[test]
    fn test_detach_then_reattach_recreates_handles() {
        let f = fixture();
        let (root, kids) = f.stack_of(&["a", "b"]);
        f.tree.attach(root, Some(f.ctx)).unwrap();
        let old = f.handles(&[root, kids[0], kids[1]]);

        f.tree.detach(root, true).unwrap();
        assert!(f.handles(&[root, kids[0], kids[1]]).is_empty());
        assert_eq!(f.platform.live_handles(), 0);
        f.tree.detach(root, true).unwrap();

        f.tree.attach(root, Some(f.ctx)).unwrap();
        let new = f.handles(&[root, kids[0], kids[1]]);
        assert_eq!(new.len(), 3);
        assert!(old.iter().all(|h| !new.contains(h)));
        assert_eq!(f.platform.children_of(new[0]), vec![new[1], new[2]]);
        assert_eq!(
            f.platform.peek(new[2], "text"),
            Some(NativeValue::Text("b".into()))
        );
    }

    #[test]
    fn test_pending_values_flush_once_in_declaration_order() {
        let f = fixture();
        let props = f.tree.props();
        let label = f.tree.create_view("Label").unwrap();
        f.tree.set_property(label, f.text, "hi").unwrap();
        f.tree.set_property(label, f.text, "hello").unwrap();
        f.tree.set_property(label, props.opacity, 0.5).unwrap();
        assert!(f.platform.calls().is_empty());
        assert_eq!(f.tree.property(label, f.text), Ok(Value::from("hello")));

        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();
        assert_eq!(
            f.platform.sets_for(h),
            vec![
                ("alpha", NativeValue::Float(0.5)),
                ("text", NativeValue::Text("hello".into())),
            ]
        );

        // equal value: no setter call
        f.tree.set_property(label, f.text, "hello").unwrap();
        assert_eq!(f.platform.sets_for(h).len(), 2);
    }

    #[test]
    fn test_native_order_follows_logical_order() {
        let f = fixture();
        let (root, kids) = f.stack_of(&["a"]);
        f.tree.attach(root, Some(f.ctx)).unwrap();
        let root_h = f.tree.handle(root).unwrap();

        f.platform.reject_children(root_h);
        let b = f.label("b");
        f.tree.add_child(root, b).unwrap();
        assert!(f.tree.is_attached(b));
        assert!(!f.tree.is_in_native_tree(b));

        f.platform.accept_children(root_h);
        let c = f.label("c");
        f.tree.add_child(root, c).unwrap();
        assert_eq!(f.platform.children_of(root_h), f.handles(&[kids[0], c]));

        // root attach of an already attached child retries the insertion
        f.tree.attach(b, Some(f.ctx)).unwrap();
        assert_eq!(f.platform.children_of(root_h), f.handles(&[kids[0], b, c]));

        f.tree.move_child(root, c, 0).unwrap();
        assert_eq!(f.tree.children(root), vec![c, kids[0], b]);
        assert_eq!(f.platform.children_of(root_h), f.handles(&[c, kids[0], b]));

        let d = f.label("d");
        f.tree.insert_child(root, d, 1).unwrap();
        assert_eq!(f.platform.children_of(root_h), f.handles(&[c, d, kids[0], b]));
    }

    #[test]
    fn test_native_order_ignores_child_attach_order() {
        let f = fixture();
        let (root, kids) = f.stack_of(&["a", "b", "c"]);
        let [a, b, c] = [kids[0], kids[1], kids[2]];
        for child in [c, a, b] {
            f.tree.attach(child, Some(f.ctx)).unwrap();
            assert!(!f.tree.is_in_native_tree(child));
        }

        f.tree.attach(root, Some(f.ctx)).unwrap();
        let root_h = f.tree.handle(root).unwrap();
        assert_eq!(f.creates(), 4);
        assert_eq!(f.platform.children_of(root_h), f.handles(&[a, b, c]));
    }

    #[test]
    fn test_structural_errors() {
        let f = fixture();
        let (root, kids) = f.stack_of(&["a"]);
        let other = f.tree.create_view("Stack").unwrap();

        assert!(matches!(
            f.tree.add_child(other, kids[0]),
            Err(Error::InvalidArgument(_))
        ));
        f.tree.add_child(other, root).unwrap();
        assert!(matches!(
            f.tree.add_child(kids[0], other),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.tree.remove_child(root, other),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            f.tree.create_view("Nope"),
            Err(Error::UnknownWidget("Nope".into()))
        );

        f.tree.attach(other, Some(f.ctx)).unwrap();
        let elsewhere = f.platform.new_context();
        assert_eq!(
            f.tree.attach(kids[0], Some(elsewhere)),
            Err(Error::InvalidContext)
        );
        assert_eq!(f.tree.context(kids[0]), Some(f.ctx));
    }

    #[test]
    fn test_handle_creation_failure_leaves_node_detached() {
        let f = fixture();
        f.platform.fail_creation_of("Label");
        let (root, kids) = f.stack_of(&["a"]);

        let err = f.tree.attach(root, Some(f.ctx)).unwrap_err();
        assert!(matches!(err, Error::HandleCreation { .. }));
        assert!(f.tree.is_attached(root));
        assert!(!f.tree.is_attached(kids[0]));
        assert!(f.tree.handle(kids[0]).is_none());
    }

    #[test]
    fn test_local_value_beats_style() {
        let f = fixture();
        let props = f.tree.props();
        let label = f.tree.create_view("Label").unwrap();
        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();
        let alpha = || f.platform.peek(h, "alpha");

        f.tree.set_style_value(label, props.opacity, 0.3).unwrap();
        assert_eq!(alpha(), Some(NativeValue::Float(0.3)));
        f.tree.set_property(label, props.opacity, 0.8).unwrap();
        f.tree.set_style_value(label, props.opacity, 0.1).unwrap();
        assert_eq!(alpha(), Some(NativeValue::Float(0.8)));
        assert_eq!(f.tree.value_source(label, props.opacity), Ok(ValueSource::Local));

        f.tree.clear_property(label, props.opacity).unwrap();
        assert_eq!(alpha(), Some(NativeValue::Float(0.1)));
        assert_eq!(f.tree.value_source(label, props.opacity), Ok(ValueSource::Css));

        f.tree.clear_style_value(label, props.opacity).unwrap();
        assert_eq!(alpha(), Some(NativeValue::Float(1.0)));
        assert_eq!(f.tree.property(label, props.opacity), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_style_scope_and_visual_state() {
        let f = fixture();
        let props = f.tree.props();
        let (root, _) = f.stack_of(&[]);
        let label = f.tree.create_view("Label").unwrap();
        f.tree.add_child(root, label).unwrap();
        f.tree.attach(root, Some(f.ctx)).unwrap();

        let scope = StaticStyleScope::new()
            .rule(Selector::Type("Label".into()), &[("opacity", "0.5")])
            .state_rule(Selector::Type("Label".into()), "highlighted", &[("opacity", "0.2")])
            .rule(Selector::Class("loud".into()), &[("text", "HEY"), ("bogus", "1")]);
        f.tree.apply_style(root, Rc::new(scope)).unwrap();

        let h = f.tree.handle(label).unwrap();
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(0.5)));

        f.tree.add_class(label, "loud").unwrap();
        assert_eq!(f.platform.peek(h, "text"), Some(NativeValue::Text("HEY".into())));

        f.tree.set_visual_state(label, Some("highlighted")).unwrap();
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(0.2)));
        f.tree.set_visual_state(label, None).unwrap();
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(0.5)));

        f.tree.remove_class(label, "loud").unwrap();
        assert_eq!(f.platform.peek(h, "text"), Some(NativeValue::Text(String::new())));

        // local values survive a restyle
        f.tree.set_property(label, props.opacity, 0.9).unwrap();
        f.tree.reset_style(root).unwrap();
        assert_eq!(f.tree.property(label, props.opacity), Ok(Value::Number(0.9)));
        assert_eq!(f.tree.value_source(label, props.opacity), Ok(ValueSource::Local));
    }

    #[test]
    fn test_enum_and_alignment_errors_surface_at_setter_time() {
        let f = fixture();
        let label = f.tree.create_view("Label").unwrap();
        f.tree.set_property_str(label, "visibility", "bogus").unwrap();

        assert_eq!(
            f.tree.attach(label, Some(f.ctx)),
            Err(Error::UnresolvedEnumValue {
                property: "visibility",
                value: "bogus".into()
            })
        );
        assert!(f.tree.is_attached(label));

        assert_eq!(
            f.tree.set_property_str(label, "horizontalAlignment", "sideways"),
            Err(Error::UnresolvedAlignment("sideways".into()))
        );
        let props = f.tree.props();
        assert_eq!(
            f.tree.property(label, props.horizontal_alignment),
            Ok(Value::from("sideways"))
        );

        f.tree.set_property_str(label, "verticalAlignment", "middle").unwrap();
        f.tree.set_property_str(label, "visibility", "collapsed").unwrap();
        let h = f.tree.handle(label).unwrap();
        assert_eq!(f.platform.peek(h, "verticalGravity"), Some(NativeValue::Int(16)));
        assert_eq!(f.platform.peek(h, "visibility"), Some(NativeValue::Int(8)));

        assert!(matches!(
            f.tree.set_property(label, props.opacity, "x"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.tree.set_property_str(label, "opacity", "lots"),
            Err(Error::Conversion { .. })
        ));
        assert_eq!(
            f.tree.set_property_str(label, "nope", "1"),
            Err(Error::UnknownProperty("nope".into()))
        );
    }

    #[test]
    fn test_dips_are_scaled_by_cached_density() {
        let f = fixture();
        let props = f.tree.props();
        let label = f.tree.create_view("Label").unwrap();
        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();

        f.tree.set_property(label, props.translate_x, 10.0).unwrap();
        assert_eq!(f.platform.peek(h, "translationX"), Some(NativeValue::Float(20.0)));

        f.platform.set_density(4.0);
        f.tree.set_property_str(label, "marginLeft", "3").unwrap();
        assert_eq!(f.platform.peek(h, "marginLeft"), Some(NativeValue::Float(6.0)));
        f.tree.set_property_str(label, "minWidth", "5px").unwrap();
        assert_eq!(f.platform.peek(h, "minWidth"), Some(NativeValue::Float(5.0)));

        f.tree.set_property_str(label, "width", "50%").unwrap();
        assert_eq!(f.platform.peek(h, "widthPercent"), Some(NativeValue::Float(0.5)));
        assert_eq!(f.platform.peek(h, "width"), Some(NativeValue::Int(LAYOUT_AUTO)));
        assert!(matches!(
            f.tree.set_property_str(label, "marginTop", "10%"),
            Err(Error::Conversion { .. })
        ));

        let overridden = ViewTree::with_options(
            f.platform.boxed(),
            TreeOptions { density: Some(3.0) },
        );
        assert_eq!(overridden.metrics().density, 3.0);
        assert_eq!(f.tree.metrics().density, 2.0);
    }

    #[test]
    fn test_native_defaults_are_restored() {
        let f = fixture();
        let props = f.tree.props();
        f.tree
            .register_widget(WidgetSpec::new("Card").on_created(|call| {
                let _ = call.set("background", NativeValue::Int(0xff00_ff00));
            }))
            .unwrap();
        let card = f.tree.create_view("Card").unwrap();
        f.tree.attach(card, Some(f.ctx)).unwrap();
        let h = f.tree.handle(card).unwrap();

        f.tree.set_property(card, props.background_color, Color::WHITE).unwrap();
        assert_eq!(
            f.platform.peek(h, "background"),
            Some(NativeValue::Int(Color::WHITE.to_argb() as i64))
        );
        f.tree.clear_property(card, props.background_color).unwrap();
        assert_eq!(f.platform.peek(h, "background"), Some(NativeValue::Int(0xff00_ff00)));
        assert_eq!(
            f.tree.native_value(card, props.background_color),
            Ok(Some(Value::Color(Color::from_argb(0xff00_ff00))))
        );
        assert_eq!(
            f.tree.property(card, props.background_color),
            Ok(Value::Color(Color::TRANSPARENT))
        );
    }

    #[test]
    fn test_native_changes_do_not_echo() {
        let f = fixture();
        let label = f.label("start");
        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        f.tree
            .on(label, PROPERTY_CHANGE, move |e| sink.borrow_mut().push(e.data.clone()))
            .unwrap();
        f.platform.clear_calls();

        f.tree.native_property_changed(label, f.text, "typed").unwrap();
        assert!(f.platform.sets_for(h).is_empty());
        assert_eq!(f.tree.property(label, f.text), Ok(Value::from("typed")));
        assert_eq!(
            *seen.borrow(),
            vec![serde_json::json!({ "propertyName": "text", "value": "typed" })]
        );
    }

    #[test]
    fn test_handlers_may_reenter_the_tree() {
        let f = fixture();
        let props = f.tree.props();
        let label = f.label("x");
        let tree = f.tree.clone();
        f.tree
            .on(label, LOADED, move |e| {
                tree.set_property(e.object, props.opacity, 0.25).unwrap();
            })
            .unwrap();
        let unloaded = Rc::new(Cell::new(0));
        let count = unloaded.clone();
        let token = f
            .tree
            .on(label, UNLOADED, move |_| count.set(count.get() + 1))
            .unwrap();

        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();
        assert_eq!(f.platform.peek(h, "alpha"), Some(NativeValue::Float(0.25)));

        f.tree.detach(label, false).unwrap();
        assert_eq!(unloaded.get(), 1);
        assert!(f.tree.off(label, token));
        assert!(!f.tree.has_listeners(label, UNLOADED));
    }

    #[test]
    fn test_gesture_listeners_hold_weak_references() {
        let f = fixture();
        let props = f.tree.props();
        let label = f.label("x");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        f.tree
            .observe(label, GestureTypes::TOUCH, move |e| {
                assert_eq!(e.touch.map(|t| t.action), Some(TouchAction::Down));
                counter.set(counter.get() + 1);
            })
            .unwrap();
        assert_eq!(f.tree.gesture_types(label), GestureTypes::TOUCH);

        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();
        let down = NativeEvent::Touch(TouchEvent {
            action: TouchAction::Down,
            x: 1.0,
            y: 1.0,
        });
        assert!(!f.platform.dispatch(h, ListenerSlot::Touch, down.clone()));
        assert_eq!(hits.get(), 1);

        // disabled interaction swallows touches
        f.tree.set_property(label, props.is_user_interaction_enabled, false).unwrap();
        assert!(f.platform.dispatch(h, ListenerSlot::Touch, down.clone()));
        assert_eq!(hits.get(), 1);
        f.tree.set_property(label, props.is_user_interaction_enabled, true).unwrap();

        let weak = f.tree.downgrade(label);
        assert!(weak.upgrade().is_some());
        f.tree.remove_view(label).unwrap();
        assert!(weak.upgrade().is_none());
        assert!(!f.platform.dispatch(h, ListenerSlot::Touch, down));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_stop_observing_removes_touch_listener() {
        let f = fixture();
        let label = f.label("x");
        f.tree.attach(label, Some(f.ctx)).unwrap();
        let h = f.tree.handle(label).unwrap();

        let token = f.tree.observe(label, GestureTypes::TOUCH | GestureTypes::TAP, |_| {}).unwrap();
        assert!(f.platform.has_listener(h, ListenerSlot::Touch));
        f.tree
            .stop_observing(label, GestureTypes::TOUCH | GestureTypes::TAP, Some(token))
            .unwrap();
        assert!(!f.platform.has_listener(h, ListenerSlot::Touch));
        assert_eq!(f.tree.gesture_types(label), GestureTypes::empty());
    }

    #[test]
    fn test_retained_nodes_survive_non_forced_detach() {
        let f = fixture();
        let keep = Rc::new(Cell::new(true));
        let (root, kids) = f.stack_of(&["a"]);
        let a = kids[0];
        f.tree.set_detach_policy(a, Some(Rc::new(Keep(keep.clone())))).unwrap();
        f.tree.attach(root, Some(f.ctx)).unwrap();
        let a_handle = f.tree.handle(a).unwrap();
        f.tree.drain_events();

        f.tree.remove_child(root, a).unwrap();
        assert!(f.tree.is_retained(a));
        assert_eq!(f.tree.handle(a), Some(a_handle));
        assert!(!f.tree.is_in_native_tree(a));
        assert!(f.tree.drain_events().contains(&LifecycleEvent::Retained(a)));

        let before = f.creates();
        f.tree.add_child(root, a).unwrap();
        assert_eq!(f.creates(), before);
        assert!(!f.tree.is_retained(a));
        assert_eq!(
            f.platform.children_of(f.tree.handle(root).unwrap()),
            vec![a_handle]
        );

        // a retained child follows its parent into the same context
        f.tree.detach(root, false).unwrap();
        assert!(f.tree.is_retained(a));
        f.tree.attach(root, Some(f.ctx)).unwrap();
        assert_eq!(f.tree.handle(a), Some(a_handle));
        assert_eq!(
            f.platform.children_of(f.tree.handle(root).unwrap()),
            vec![a_handle]
        );

        // but never into a new one
        f.tree.detach(root, false).unwrap();
        let next = f.platform.new_context();
        f.tree.attach(root, Some(next)).unwrap();
        assert!(!f.platform.is_alive(a_handle));
        let fresh = f.tree.handle(a).unwrap();
        assert_eq!(f.platform.context_of(fresh), Some(next));
        assert_eq!(f.platform.children_of(f.tree.handle(root).unwrap()), vec![fresh]);

        f.tree.detach(root, true).unwrap();
        assert!(!f.tree.is_attached(a));
    }

    #[test]
    fn test_geometry_is_none_while_detached() {
        let f = fixture();
        let (root, kids) = f.stack_of(&["a"]);
        let a = kids[0];

        assert_eq!(f.tree.measured_size(a), None);
        assert_eq!(f.tree.layout_bounds(a), None);
        assert_eq!(f.tree.location_in_window(a), None);
        assert_eq!(f.tree.location_relative_to(a, root), None);
        assert_eq!(
            f.tree.measure(a, MeasureSpec::unspecified(), MeasureSpec::unspecified()),
            None
        );
        assert!(!f.tree.layout(a, Bounds::default()));
        assert!(!f.tree.is_layout_valid(a));
        assert!(!f.tree.focus(a));

        f.tree.attach(root, Some(f.ctx)).unwrap();
        let h = f.tree.handle(a).unwrap();
        f.platform.set_intrinsic_size(
            h,
            Size {
                width: 80.0,
                height: 30.0,
            },
        );
        let size = f
            .tree
            .measure(a, MeasureSpec::at_most(50), MeasureSpec::unspecified());
        assert_eq!(
            size,
            Some(Size {
                width: 50.0,
                height: 30.0
            })
        );
        assert_eq!(f.tree.measured_size(a), size);

        assert!(f.tree.layout(root, Bounds::new(10.0, 20.0, 110.0, 220.0)));
        assert!(f.tree.layout(a, Bounds::new(4.0, 6.0, 54.0, 36.0)));
        assert!(f.tree.is_layout_valid(a));
        f.platform.set_window_origin(Point { x: 100.0, y: 0.0 });

        assert_eq!(f.tree.location_in_window(a), Some(Point { x: 7.0, y: 13.0 }));
        assert_eq!(f.tree.location_on_screen(a), Some(Point { x: 57.0, y: 13.0 }));
        assert_eq!(f.tree.location_relative_to(a, root), Some(Point { x: 2.0, y: 3.0 }));

        f.tree.request_layout(a);
        assert!(!f.tree.is_layout_valid(a));
        assert!(f.tree.focus(a));
        assert_eq!(f.platform.focused(), Some(h));

        f.tree.detach(root, true).unwrap();
        assert_eq!(f.tree.measured_size(a), None);
        assert_eq!(f.tree.layout_bounds(a), None);
    }

    #[test]
    fn test_native_tree_dump() {
        let f = fixture();
        let (root, _) = f.stack_of(&["a", "b"]);
        f.tree.attach(root, Some(f.ctx)).unwrap();

        insta::assert_snapshot!(f.platform.dump(f.tree.handle(root).unwrap()), @r#"
        Stack#1
          Label#2 text="a"
          Label#3 text="b"
        "#);
    }
}
