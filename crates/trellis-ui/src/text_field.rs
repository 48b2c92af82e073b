//! Editable single-line text.
//!
//! Typing is reported back with [`ViewTree::native_property_changed`], either
//! on every change or once focus is lost, depending on `updateTextTrigger`.
//! Keyboard type, capitalization and autocorrect all share the native
//! `inputType` bit set, so their setters read it back before writing.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::*;

use crate::mismatch;

pub const TEXT_FIELD: &str = "TextField";
pub const RETURN_PRESS: &str = "returnPress";

const INPUT_TYPE: &str = "inputType";
const IME_OPTIONS: &str = "imeOptions";

mod input_type {
    pub const CLASS_TEXT: i64 = 0x1;
    pub const CLASS_NUMBER: i64 = 0x2;
    pub const CLASS_PHONE: i64 = 0x3;
    pub const CLASS_DATETIME: i64 = 0x4;
    pub const VARIATION_URI: i64 = 0x10;
    pub const VARIATION_EMAIL: i64 = 0x20;
    pub const NUMBER_SIGNED: i64 = 0x1000;
    pub const NUMBER_DECIMAL: i64 = 0x2000;
    pub const CAP_CHARACTERS: i64 = 0x1000;
    pub const CAP_WORDS: i64 = 0x2000;
    pub const CAP_SENTENCES: i64 = 0x4000;
    pub const CAP_MASK: i64 = CAP_CHARACTERS | CAP_WORDS | CAP_SENTENCES;
    pub const AUTO_CORRECT: i64 = 0x8000;
    pub const AUTO_COMPLETE: i64 = 0x10000;
    pub const NO_SUGGESTIONS: i64 = 0x80000;
}

const KEYBOARDS: [(&str, i64); 5] = [
    ("datetime", input_type::CLASS_DATETIME),
    ("phone", input_type::CLASS_PHONE),
    (
        "number",
        input_type::CLASS_NUMBER | input_type::NUMBER_SIGNED | input_type::NUMBER_DECIMAL,
    ),
    ("url", input_type::CLASS_TEXT | input_type::VARIATION_URI),
    ("email", input_type::CLASS_TEXT | input_type::VARIATION_EMAIL),
];

const RETURN_KEYS: [(&str, i64); 5] = [("go", 2), ("search", 3), ("send", 4), ("next", 5), ("done", 6)];

/// When typed text is written back to the `text` property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateTextTrigger {
    #[default]
    TextChanged,
    FocusLost,
}

impl UpdateTextTrigger {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "textChanged" => Ok(UpdateTextTrigger::TextChanged),
            "focusLost" => Ok(UpdateTextTrigger::FocusLost),
            other => Err(Error::UnresolvedEnumValue {
                property: "updateTextTrigger",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TextFieldProperties {
    pub text: PropertyId,
    pub hint: PropertyId,
    pub editable: PropertyId,
    pub keyboard_type: PropertyId,
    pub return_key_type: PropertyId,
    pub autocapitalization_type: PropertyId,
    pub autocorrect: PropertyId,
    pub update_text_trigger: PropertyId,
}

impl TextFieldProperties {
    pub(crate) fn declare(tree: &ViewTree, text: PropertyId) -> Self {
        use trellis_core::converters::{boolean, text as string};
        let d = |decl| tree.declare_property(decl);
        Self {
            text,
            hint: d(PropertyDecl::new("hint", "", string)),
            editable: d(PropertyDecl::new("editable", true, boolean)),
            keyboard_type: d(PropertyDecl::new("keyboardType", "", string)),
            return_key_type: d(PropertyDecl::new("returnKeyType", "", string)),
            autocapitalization_type: d(PropertyDecl::new("autocapitalizationType", "sentences", string)),
            autocorrect: d(PropertyDecl::new("autocorrect", false, boolean)),
            update_text_trigger: d(PropertyDecl::new("updateTextTrigger", "textChanged", trigger_name)),
        }
    }
}

fn trigger_name(raw: &str) -> Option<Value> {
    UpdateTextTrigger::parse(raw.trim()).ok().map(|_| Value::from(raw.trim()))
}

/// Native side keeps no copy; the setter only rejects unknown triggers.
fn update_text_trigger() -> Accessor {
    Accessor::new(|_, v| {
        let name = v.as_str().ok_or_else(|| mismatch("updateTextTrigger", v))?;
        UpdateTextTrigger::parse(name).map(|_| ())
    })
}

fn input_type_of(call: &NativeCall<'_>) -> i64 {
    call.get(INPUT_TYPE)
        .and_then(|v| v.as_int())
        .unwrap_or(input_type::CLASS_TEXT)
}

fn keyboard_type() -> Accessor {
    Accessor::new(|call, v| {
        let name = v.as_str().ok_or_else(|| mismatch("keyboardType", v))?;
        let bits = KEYBOARDS
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, bits)| *bits)
            .or_else(|| name.parse().ok())
            .unwrap_or(input_type::CLASS_TEXT);
        call.set(INPUT_TYPE, NativeValue::Int(bits))
    })
    .with_getter(|call| {
        let bits = call.get(INPUT_TYPE)?.as_int()?;
        let name = KEYBOARDS
            .iter()
            .find(|(_, b)| *b == bits)
            .map(|(k, _)| k.to_string())
            .unwrap_or_else(|| bits.to_string());
        Some(Value::Text(name))
    })
}

fn return_key_type() -> Accessor {
    Accessor::new(|call, v| {
        let name = v.as_str().ok_or_else(|| mismatch("returnKeyType", v))?;
        let ime = RETURN_KEYS
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, ime)| *ime)
            .or_else(|| name.parse().ok())
            .unwrap_or(0);
        call.set(IME_OPTIONS, NativeValue::Int(ime))
    })
    .with_getter(|call| {
        let ime = call.get(IME_OPTIONS)?.as_int()?;
        let name = RETURN_KEYS
            .iter()
            .find(|(_, i)| *i == ime)
            .map(|(k, _)| k.to_string())
            .unwrap_or_else(|| ime.to_string());
        Some(Value::Text(name))
    })
}

fn autocapitalization_type() -> Accessor {
    Accessor::new(|call, v| {
        let name = v.as_str().ok_or_else(|| mismatch("autocapitalizationType", v))?;
        let base = input_type_of(call) & !input_type::CAP_MASK;
        let bits = match name {
            "none" => base,
            "words" => base | input_type::CAP_WORDS,
            "sentences" => base | input_type::CAP_SENTENCES,
            "allCharacters" => base | input_type::CAP_CHARACTERS,
            other => other.parse().unwrap_or(base | input_type::CAP_SENTENCES),
        };
        call.set(INPUT_TYPE, NativeValue::Int(bits))
    })
}

fn autocorrect() -> Accessor {
    Accessor::new(|call, v| {
        let on = v.as_bool().ok_or_else(|| mismatch("autocorrect", v))?;
        let suggest = input_type::AUTO_COMPLETE | input_type::AUTO_CORRECT;
        let bits = input_type_of(call);
        let bits = if on {
            (bits | suggest) & !input_type::NO_SUGGESTIONS
        } else {
            (bits & !suggest) | input_type::NO_SUGGESTIONS
        };
        call.set(INPUT_TYPE, NativeValue::Int(bits))
    })
    .with_getter(|call| {
        let bits = call.get(INPUT_TYPE)?.as_int()?;
        Some(Value::Bool(bits & input_type::AUTO_CORRECT != 0))
    })
}

/// One listener for the text, focus and editor-action slots.
struct EditListener {
    view: WeakView,
    props: TextFieldProperties,
    /// Typed text not yet written back under `focusLost`.
    dirty: RefCell<Option<String>>,
}

impl EditListener {
    fn report(&self, tree: &ViewTree, id: ViewId, text: String) {
        if let Err(err) = tree.native_property_changed(id, self.props.text, text) {
            log::warn!("text field {id:?}: {err}");
        }
    }

    fn trigger(&self, tree: &ViewTree, id: ViewId) -> UpdateTextTrigger {
        let raw = tree.property(id, self.props.update_text_trigger);
        match raw.as_ref().ok().and_then(Value::as_str).map(UpdateTextTrigger::parse) {
            Some(Ok(trigger)) => trigger,
            Some(Err(err)) => {
                log::warn!("text field {id:?}: {err}");
                UpdateTextTrigger::default()
            }
            None => UpdateTextTrigger::default(),
        }
    }
}

impl NativeListener for EditListener {
    fn on_event(&self, event: &NativeEvent) -> bool {
        let Some((tree, id)) = self.view.upgrade() else {
            return false;
        };
        match event {
            NativeEvent::TextChanged(text) => match self.trigger(&tree, id) {
                UpdateTextTrigger::FocusLost => {
                    self.dirty.replace(Some(text.clone()));
                }
                UpdateTextTrigger::TextChanged => self.report(&tree, id, text.clone()),
            },
            NativeEvent::FocusChanged(false) => {
                let pending = self.dirty.take();
                if let Some(text) = pending {
                    self.report(&tree, id, text);
                }
            }
            NativeEvent::EditorAction(action) => {
                let submits = action == "enter" || RETURN_KEYS.iter().any(|(k, _)| *k == action.as_str());
                if submits {
                    tree.notify(EventData::new(RETURN_PRESS, id));
                }
            }
            _ => {}
        }
        false
    }
}

const EDIT_SLOTS: [ListenerSlot; 3] = [ListenerSlot::Text, ListenerSlot::Focus, ListenerSlot::EditorAction];

pub(crate) fn spec(props: TextFieldProperties) -> WidgetSpec {
    WidgetSpec::new(TEXT_FIELD)
        .accessor(props.text, Accessor::text("text"))
        .accessor(props.hint, Accessor::text("hint"))
        .accessor(props.editable, Accessor::bool("keyListener"))
        .accessor(props.keyboard_type, keyboard_type())
        .accessor(props.return_key_type, return_key_type())
        .accessor(props.autocapitalization_type, autocapitalization_type())
        .accessor(props.autocorrect, autocorrect())
        .accessor(props.update_text_trigger, update_text_trigger())
        .on_created(move |call| {
            let listener: Rc<dyn NativeListener> = Rc::new(EditListener {
                view: call.view.clone(),
                props,
                dirty: RefCell::new(None),
            });
            for slot in EDIT_SLOTS {
                call.listen(slot, listener.clone());
            }
        })
        .on_released(|call| {
            for slot in EDIT_SLOTS {
                call.unlisten(slot);
            }
        })
}
