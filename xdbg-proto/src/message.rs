//! Request/response payload types (§3 DATA MODEL).

use serde::{Deserialize, Serialize};

/// A command invocation sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Registered command name.
    pub command: String,
    /// Positional arguments; may be empty.
    pub args: Vec<String>,
}

impl Request {
    /// Builds a request with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Builds a request with the given arguments.
    pub fn with_args(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

/// The server's reply to a [`Request`].
///
/// Invariants (enforced by the constructors below, never by serde):
/// `success ⇒ error.is_none()`; `!success ⇒ error.is_some() && output.is_none()`;
/// `truncated ⇒ success && original_size > output.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the command completed successfully.
    pub success: bool,
    /// Command output, present only on success.
    pub output: Option<String>,
    /// Error message, present only on failure.
    pub error: Option<String>,
    /// Set when `output` was truncated to fit `MaxOutputSize`.
    pub truncated: bool,
    /// Pre-truncation byte length of the output, when `truncated` is set.
    pub original_size: Option<usize>,
}

impl Response {
    /// A successful response carrying `output` verbatim (not truncated).
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            truncated: false,
            original_size: None,
        }
    }

    /// A successful response with no output.
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            output: None,
            error: None,
            truncated: false,
            original_size: None,
        }
    }

    /// A successful response whose output was truncated from `original_size`
    /// bytes down to `output`.
    pub fn ok_truncated(output: impl Into<String>, original_size: usize) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            truncated: true,
            original_size: Some(original_size),
        }
    }

    /// A failure response.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(message.into()),
            truncated: false,
            original_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_postcard() {
        let req = Request::with_args("setlog", vec!["debug".to_owned()]);
        let bytes = postcard::to_allocvec(&req).unwrap();
        let decoded: Request = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn response_constructors_uphold_invariants() {
        let ok = Response::ok("hi");
        assert!(ok.success && ok.error.is_none());

        let err = Response::err("boom");
        assert!(!err.success && err.output.is_none() && err.error.is_some());

        let trunc = Response::ok_truncated("ab", 12);
        assert!(trunc.success && trunc.truncated);
        assert!(trunc.original_size.unwrap() > trunc.output.as_ref().unwrap().len());
    }
}
