//! Tool errors.

/// Errors from tool registration and execution.
///
/// Lookup and execution failures are not fatal to the agent: the runtime
/// converts them to `"Error: ..."` tool results so the model can see them
/// and react.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("tool {0} already registered")]
    AlreadyRegistered(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}
