//! # Trellis core
//!
//! A logical view tree mirrored onto a platform's native widget toolkit.
//!
//! - [`ViewTree`] owns the nodes. It attaches subtrees to a native context,
//!   creates native handles lazily and keeps the native child order in sync
//!   with the logical one.
//! - Declared properties ([`PropertyDecl`]) hold local, style and default
//!   values per node. Per-widget [`Accessor`]s push the effective value to
//!   the native side while a node is attached; values set while detached
//!   are pushed exactly once on the next attach.
//! - [`NativePlatform`] is the toolkit strategy. [`headless::HeadlessPlatform`]
//!   records every call and backs the tests.
//!
//! ```rust
//! use trellis_core::*;
//! use trellis_core::headless::HeadlessPlatform;
//!
//! let platform = HeadlessPlatform::default();
//! let tree = ViewTree::new(platform.boxed());
//! let view = tree.create_view("View").unwrap();
//! let props = tree.props();
//!
//! tree.set_property(view, props.opacity, 0.5).unwrap();
//! assert!(tree.handle(view).is_none());
//!
//! tree.attach(view, Some(platform.new_context())).unwrap();
//! let handle = tree.handle(view).unwrap();
//! assert_eq!(platform.peek(handle, "alpha"), Some(NativeValue::Float(0.5)));
//! ```

pub mod accessor;
pub mod builtin;
pub mod color;
pub mod enums;
pub mod error;
pub mod events;
pub mod geometry;
pub mod headless;
pub mod native;
pub mod property;
pub mod style;
pub mod tests;
pub mod tree;
pub mod units;
pub mod value;

pub use accessor::*;
pub use builtin::{VIEW, ViewProperties};
pub use color::*;
pub use enums::*;
pub use error::{Error, Result};
pub use events::*;
pub use geometry::*;
pub use native::*;
pub use property::*;
pub use style::*;
pub use tree::*;
pub use units::*;
pub use value::*;
