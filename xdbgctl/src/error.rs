//! Exit-code taxonomy for the CLI (§6, §7).
//!
//! `xdbg::Error` and `xdbg_discover::DiscoverError` both fold into one
//! of two buckets here: a usage mistake the caller can fix (bad flags,
//! an unresolvable name, an ambiguous match) exits `2`; anything else
//! that went wrong while actually talking to a server exits `1`.

use std::fmt;

/// A CLI-level failure, tagged with the exit code it should produce.
#[derive(Debug)]
pub enum CliError {
    /// The caller's input was invalid: bad flags, unresolvable name,
    /// ambiguous match. Exit code `2`.
    Usage(String),
    /// Everything else: transport failure, server rejection, I/O error.
    /// Exit code `1`.
    Runtime(String),
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// The process exit code this error should produce.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Runtime(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "usage error: {msg}"),
            Self::Runtime(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<xdbg::Error> for CliError {
    fn from(err: xdbg::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl From<xdbg_discover::DiscoverError> for CliError {
    fn from(err: xdbg_discover::DiscoverError) -> Self {
        use xdbg_discover::DiscoverError;
        match err {
            DiscoverError::NotFound(_) | DiscoverError::Ambiguous { .. } | DiscoverError::NoSuchProcess(_) => {
                Self::Usage(err.to_string())
            }
            DiscoverError::ExitedAfterSignal(_) | DiscoverError::Io(_) | DiscoverError::Errno(_) => {
                Self::Runtime(err.to_string())
            }
            _ => Self::Runtime(err.to_string()),
        }
    }
}
