//! Error types for inbound command validation.

/// A frame that parsed but cannot be turned into a client command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A header the command requires is absent or empty.
    #[error("{command} frame missing required header '{header}'")]
    MissingHeader {
        /// Frame command.
        command: &'static str,
        /// Missing header name.
        header: &'static str,
    },

    /// The command is not one a client may send.
    #[error("unsupported client command: {0}")]
    Unsupported(String),
}
