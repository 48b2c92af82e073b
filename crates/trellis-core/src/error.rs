use crate::tree::ViewId;

/// Errors raised by the view tree, the property system and native bindings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("expected a valid native context instance")]
    InvalidContext,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid alignment value: {0}")]
    UnresolvedAlignment(String),

    #[error("invalid value `{value}` for {property}")]
    UnresolvedEnumValue {
        property: &'static str,
        value: String,
    },

    #[error("cannot convert `{value}` for property `{property}`")]
    Conversion { property: String, value: String },

    #[error("unknown view {0:?}")]
    UnknownView(ViewId),

    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("unknown widget type `{0}`")]
    UnknownWidget(String),

    #[error("failed to create native handle for {widget}: {reason}")]
    HandleCreation { widget: String, reason: String },

    #[error("native call failed: {0}")]
    Native(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
