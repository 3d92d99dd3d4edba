//! Log-level control surface backing the `setlog` command.

/// The log levels `setlog` accepts, case-insensitively.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Injectable log-level control. The framework ships no implementation;
/// embedders wire this to whatever logging backend they use (e.g. a
/// `tracing_subscriber::reload::Handle`).
pub trait Leveler: Send + Sync {
    /// Returns the current level name.
    fn get(&self) -> String;

    /// Sets the level. `level` is guaranteed to be one of
    /// [`LOG_LEVELS`], lowercased, by the time this is called.
    fn set(&self, level: &str) -> Result<(), String>;
}

/// Validates a user-supplied level string against [`LOG_LEVELS`],
/// case-insensitively, returning the canonical lowercase form.
pub fn validate_level(input: &str) -> Option<&'static str> {
    let lower = input.to_ascii_lowercase();
    LOG_LEVELS.iter().find(|&&l| l == lower).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_level_is_case_insensitive() {
        assert_eq!(validate_level("DEBUG"), Some("debug"));
        assert_eq!(validate_level("Warn"), Some("warn"));
    }

    #[test]
    fn validate_level_rejects_unknown() {
        assert_eq!(validate_level("verbose"), None);
    }
}
