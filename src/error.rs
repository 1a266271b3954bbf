use std::error::Error as StdError;

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type GraphResult<T> = Result<T, GraphError>;
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors raised while loading or deserializing a configuration tree.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Errors raised while parsing a single handler's options or linking it into a graph.
///
/// A `HandlerError` invalidates the handler it names; it never aborts a whole group.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid options for handler '{handler}': {message}")]
    InvalidOptions { handler: String, message: String },
    #[error("handler '{handler}' references unknown source '{source_name}'")]
    UnknownSource {
        handler: String,
        source_name: String,
    },
    #[error("handler '{handler}' sources from '{source_name}', which is declared later in the group (forward/cyclic reference)")]
    ForwardReference {
        handler: String,
        source_name: String,
    },
    #[error("handler '{handler}' has the wrong source type for this operation")]
    WrongSourceType { handler: String },
    #[error("handler '{handler}' failed to configure: {reason}")]
    ConfigureFailed { handler: String, reason: String },
}

/// Errors raised while assembling the handler graph for a processing group.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("processing group '{group}' has an empty or invalid channel set")]
    InvalidChannelSet { group: String },
    #[error("processing group '{group}' declares handler '{handler}' more than once")]
    DuplicateHandler { group: String, handler: String },
    #[error("handler error in group '{group}': {source}")]
    Handler {
        group: String,
        #[source]
        source: HandlerError,
    },
    #[error("{message}")]
    Message { message: String },
}

impl GraphError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Status returned by [`crate::engine::Engine::update`] and surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    FetchError,
    NoData,
}
