//! Error taxonomy for the debug server and its commands.
//!
//! One `Error` enum per crate, following the teacher's convention
//! (`bux::Error`, `bux_oci::Error`): stable, matchable variants rather
//! than an opaque `Box<dyn Error>` at the API boundary.

/// Alias for `Result<T, xdbg::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by debug-server operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A lifecycle operation was attempted while the server was not running.
    #[error("server is not running")]
    NotRunning,

    /// `Start` was called on a server that is already started.
    #[error("server is already running")]
    AlreadyRunning,

    /// A lifecycle transition was attempted from a state that does not
    /// permit it (e.g. calling `Enable` on a `Stopped` server).
    #[error("invalid state for this operation")]
    InvalidState,

    /// `Start` was called with a null/cancelled context.
    #[error("context must not be nil")]
    NilContext,

    /// The named command is not registered.
    #[error("command not found")]
    CommandNotFound,

    /// The named command is registered but not on the active whitelist.
    #[error("command forbidden")]
    CommandForbidden,

    /// A deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,

    /// The server already has `MaxSessions` active sessions.
    #[error("too many sessions")]
    TooManySessions,

    /// The server already has `MaxConcurrentCommands` commands in flight.
    #[error("too many concurrent commands")]
    TooManyCommands,

    /// A decoded frame failed structural validation.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A frame's payload exceeded `MaxPayloadSize`.
    #[error("message too large")]
    MessageTooLarge,

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Client-side marker: the response output was truncated.
    #[error("output truncated")]
    OutputTruncated,

    /// `RegisterCommand` was called with an empty name.
    #[error("command name must not be empty")]
    EmptyCommandName,

    /// A command was constructed with no executable body.
    #[error("command function must not be nil")]
    NilCommandFunc,

    /// A socket path failed validation (empty, relative, `..`, or under a
    /// reserved system prefix).
    #[error("invalid socket path: {0}")]
    InvalidSocketPath(String),

    /// A requested file mode grants permissions to "others".
    #[error("socket mode {0:o} grants access to others")]
    ModeTooPermissive(u32),

    /// An I/O error from the transport, a command, or the audit sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A wire-protocol error surfaced from `xdbg-proto`.
    #[error(transparent)]
    Proto(#[from] xdbg_proto::ProtoError),
}

impl Error {
    /// True if this error's display text should be treated by clients as
    /// "the response was truncated", independent of the discriminant.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::OutputTruncated)
    }
}
