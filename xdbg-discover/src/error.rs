//! Discovery-specific error taxonomy (separate from `xdbg::Error`, per the
//! teacher's one-`Error`-enum-per-crate convention).

/// Errors from process discovery and signal delivery.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoverError {
    /// No process matched the given name or owning socket.
    #[error("no process found matching '{0}'")]
    NotFound(String),

    /// More than one process matched; the caller must disambiguate with
    /// an explicit PID.
    #[error("multiple processes match '{query}': {pids:?}; pass an explicit PID")]
    Ambiguous {
        /// The name or socket path that was searched for.
        query: String,
        /// PIDs of every match.
        pids: Vec<i32>,
    },

    /// The target PID does not exist (or is not signalable by us).
    #[error("process {0} does not exist")]
    NoSuchProcess(i32),

    /// The process existed before the signal was sent but had exited by
    /// the post-signal liveness recheck — the tool cannot tell whether it
    /// handled the signal and exited on its own, or was killed by it.
    #[error("process {0} exited shortly after receiving the signal (it may not handle it)")]
    ExitedAfterSignal(i32),

    /// Underlying I/O failure reading `/proc`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying signal-delivery failure.
    #[error(transparent)]
    Errno(#[from] nix::Error),
}
