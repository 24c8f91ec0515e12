use crate::args::ArgCount;
use crate::registry::CallbackHandle;
use crate::schema::Kind;
use crate::value::ValueType;
use thiserror::Error;

/// Everything that can go wrong between a script call site and a native callback.
///
/// Validation errors (`ArgumentCount`, `TypeMismatch`, `MissingField`,
/// `NumericRange`) are returned to whoever parsed or read the arguments.
/// `DoubleRelease` and `SchemaConflict` are call-site bugs; they are returned
/// rather than swallowed so they show up the first time the code runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("expected {expected} argument(s), got {actual}")]
    ArgumentCount { expected: ArgCount, actual: usize },

    #[error("'{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: Kind,
        actual: ValueType,
    },

    #[error("'{path}' is missing")]
    MissingField { path: String },

    #[error("'{path}': {value} does not fit in {target}")]
    NumericRange {
        path: String,
        value: f64,
        target: &'static str,
    },

    #[error("callback handle {handle} is not registered")]
    StaleHandle { handle: CallbackHandle },

    #[error("callback handle {handle} was already released")]
    DoubleRelease { handle: CallbackHandle },

    #[error("'{path}' is declared as {existing}, cannot redeclare as {requested}")]
    SchemaConflict {
        path: String,
        existing: Kind,
        requested: Kind,
    },

    #[error("callback handle {handle} is a weak alias and does not own its reference")]
    NotOwner { handle: CallbackHandle },

    #[error("{operation} must run on the engine thread")]
    WrongThread { operation: &'static str },

    #[error("callback failed: {message}")]
    Invocation { message: String },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub(crate) fn mismatch(path: &str, expected: Kind, actual: ValueType) -> Self {
        BridgeError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual,
        }
    }

    pub(crate) fn missing(path: &str) -> Self {
        BridgeError::MissingField {
            path: path.to_string(),
        }
    }
}
