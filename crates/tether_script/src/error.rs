use rquickjs::Ctx;
use tether_core::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("quickjs: {0}")]
    Js(#[from] rquickjs::Error),

    /// Something the script threw.
    #[error("uncaught exception: {message}")]
    Exception { message: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("value nested deeper than {limit} levels")]
    DepthLimit { limit: usize },

    #[error("{type_name} values cannot cross the bridge")]
    Unsupported { type_name: String },
}

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Turn a failed QuickJS call into an error carrying the thrown value.
pub(crate) fn caught(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptError {
    if !err.is_exception() {
        return err.into();
    }
    let thrown = ctx.catch();
    let message = if let Some(exception) = thrown.as_exception() {
        exception.message().unwrap_or_default()
    } else if let Some(text) = thrown.as_string().and_then(|s| s.to_string().ok()) {
        text
    } else {
        format!("{thrown:?}")
    };
    ScriptError::Exception { message }
}
