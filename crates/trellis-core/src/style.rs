//! Style scopes feed computed declarations into the property system.
//!
//! Parsing style sheets is someone else's job. A scope only has to answer
//! "which declarations apply to this node right now".

/// What a scope sees of a node when matching selectors.
#[derive(Clone, Debug)]
pub struct StyleTarget<'a> {
    /// Widget type followed by the types it extends.
    pub lineage: &'a [&'static str],
    pub id: Option<&'a str>,
    pub classes: &'a [String],
    pub visual_state: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

pub trait StyleScope {
    /// Makes sure selectors are compiled. Returns true when they changed.
    fn ensure_selectors(&self) -> bool;

    /// Matching declarations in application order; later entries win.
    fn apply_selectors(&self, target: &StyleTarget<'_>) -> Vec<Declaration>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    Universal,
    Type(String),
    Class(String),
    Id(String),
}

impl Selector {
    fn specificity(&self) -> u32 {
        match self {
            Selector::Universal => 0,
            Selector::Type(_) => 1,
            Selector::Class(_) => 10,
            Selector::Id(_) => 100,
        }
    }

    fn matches(&self, target: &StyleTarget<'_>) -> bool {
        match self {
            Selector::Universal => true,
            Selector::Type(t) => target.lineage.iter().any(|name| name == t),
            Selector::Class(c) => target.classes.iter().any(|name| name == c),
            Selector::Id(id) => target.id == Some(id.as_str()),
        }
    }
}

#[derive(Clone, Debug)]
struct Rule {
    selector: Selector,
    state: Option<String>,
    declarations: Vec<Declaration>,
}

impl Rule {
    fn specificity(&self) -> u32 {
        self.selector.specificity() + if self.state.is_some() { 10 } else { 0 }
    }
}

/// In-memory rule list with single simple selectors and an optional
/// visual-state pseudo class (`Button:highlighted`).
#[derive(Clone, Debug, Default)]
pub struct StaticStyleScope {
    rules: Vec<Rule>,
}

impl StaticStyleScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, selector: Selector, declarations: &[(&str, &str)]) -> Self {
        self.push(selector, None, declarations);
        self
    }

    pub fn state_rule(mut self, selector: Selector, state: &str, declarations: &[(&str, &str)]) -> Self {
        self.push(selector, Some(state.to_string()), declarations);
        self
    }

    fn push(&mut self, selector: Selector, state: Option<String>, declarations: &[(&str, &str)]) {
        self.rules.push(Rule {
            selector,
            state,
            declarations: declarations
                .iter()
                .map(|(p, v)| Declaration::new(*p, *v))
                .collect(),
        });
    }
}

impl StyleScope for StaticStyleScope {
    fn ensure_selectors(&self) -> bool {
        false
    }

    fn apply_selectors(&self, target: &StyleTarget<'_>) -> Vec<Declaration> {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(target))
            .filter(|r| r.state.is_none() || r.state.as_deref() == target.visual_state)
            .collect();
        // stable: equal specificity keeps source order
        matched.sort_by_key(|r| r.specificity());
        matched
            .into_iter()
            .flat_map(|r| r.declarations.iter().cloned())
            .collect()
    }
}
