//! Drives a headless tree through a frame, a cached back navigation and a
//! modal sign-in sheet, printing the native tree along the way.
//!
//! `RUST_LOG=trellis::visual_tree=trace` shows every native insertion.

use std::rc::Rc;

use serde_json::json;
use trellis_core::headless::HeadlessPlatform;
use trellis_core::*;
use trellis_navigation::*;
use trellis_ui::{BUTTON, RETURN_PRESS, TAP, TEXT_FIELD};

fn dump(platform: &HeadlessPlatform, tree: &ViewTree, id: ViewId, title: &str) {
    println!("--- {title}");
    if let Some(handle) = tree.handle(id) {
        print!("{}", platform.dump(handle));
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let platform = HeadlessPlatform::new(2.0);
    let tree = ViewTree::new(platform.boxed());
    let props = install(&tree)?;
    let text = props.ui.text;

    let frame = Frame::new(
        &tree,
        props,
        FrameOptions {
            cache_pages_on_navigate: true,
        },
    )?;
    frame.register_page("home", move |page| {
        let tree = page.tree();
        let button = tree.create_view(BUTTON)?;
        tree.set_property(button, text, "Sign in")?;
        page.set_content(Some(button))?;
        tree.set_property(page.action_bar(), page.props().ui.title, "Home")?;
        Ok(())
    });
    frame.register_page("sign-in", move |page| {
        let tree = page.tree();
        let field = tree.create_view(TEXT_FIELD)?;
        tree.set_property(field, page.props().ui.text_field.hint, "user name")?;
        tree.set_property(field, page.props().ui.text_field.return_key_type, "done")?;
        page.set_content(Some(field))?;
        Ok(())
    });

    tree.attach(frame.id(), Some(platform.new_context()))?;
    let home = frame.navigate(NavigationEntry::new("home"))?;
    dump(&platform, &tree, frame.id(), "home");

    let button = home
        .content()
        .ok_or_else(|| anyhow::anyhow!("home page has no content"))?;
    let presenter = home.clone();
    let navigator = frame.clone();
    tree.on(button, TAP, move |_| {
        let target = ModalTarget::Module {
            navigator: &navigator,
            module: "sign-in",
        };
        let on_close: CloseCallback = Box::new(|args| println!("sign-in closed with {args}"));
        if let Err(err) = presenter.show_modal(target, json!({ "reason": "tap" }), Some(on_close), false) {
            log::error!("cannot show sign-in: {err}");
        }
    })?;

    let button_handle = tree
        .handle(button)
        .ok_or_else(|| anyhow::anyhow!("button was not materialized"))?;
    platform.dispatch(button_handle, ListenerSlot::Click, NativeEvent::Click);

    let sheet = home
        .modal()
        .ok_or_else(|| anyhow::anyhow!("sign-in sheet was not shown"))?;
    dump(&platform, &tree, sheet.id(), "sign-in sheet");

    let field = sheet
        .content()
        .ok_or_else(|| anyhow::anyhow!("sign-in page has no content"))?;
    let field_handle = tree
        .handle(field)
        .ok_or_else(|| anyhow::anyhow!("text field was not materialized"))?;
    let closing = sheet.clone();
    tree.on(field, RETURN_PRESS, move |_| closing.close_modal(json!({ "user": "ada" })))?;

    platform.dispatch(field_handle, ListenerSlot::Text, NativeEvent::TextChanged("ada".into()));
    println!("typed: {:?}", tree.property(field, text)?);
    platform.dispatch(
        field_handle,
        ListenerSlot::EditorAction,
        NativeEvent::EditorAction("done".into()),
    );
    println!("modal state after return: {:?}", home.modal_state());

    let scope = StaticStyleScope::new().rule(Selector::Type(BUTTON.into()), &[("backgroundColor", "#3366ff")]);
    home.set_css(Rc::new(scope))?;

    frame.navigate(NavigationEntry::new("sign-in").with_context(json!({ "step": 2 })))?;
    println!("home cached: {}", tree.is_retained(home.id()));
    frame.go_back()?;
    dump(&platform, &tree, frame.id(), "back home");
    println!("back stack: {}", frame.to_json());
    Ok(())
}
