//! `ServerOptions` builder, mirroring the teacher's `VmBuilder`: collect
//! every tunable, then `validate()` before `Start` ever touches the OS.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::Sink;
use crate::error::{Error, Result};
use crate::leveler::Leveler;
use crate::registries::{BreakerRegistry, CacheRegistry, ConfigProvider, LimitRegistry};
use crate::transport::{Transport, validate_socket_mode, validate_socket_path};
use crate::trigger::Trigger;

/// Default Unix-domain socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/xdbg.sock";
/// Default socket file mode (owner read/write only).
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// The subset of [`ServerOptions`] that is plain data and can round-trip
/// through TOML. Injected trait objects (registries, custom transport/
/// trigger, audit sink) are code-only and excluded — the in-code
/// builder remains the authoritative, fully-specified API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Unix-domain socket path.
    pub socket_path: PathBuf,
    /// Socket file mode.
    pub socket_mode: u32,
    /// Cap on simultaneously accepted sessions.
    pub max_sessions: usize,
    /// Cap on commands executing concurrently across all sessions.
    pub max_concurrent_commands: usize,
    /// Output byte cap enforced per command response.
    pub max_output_size: usize,
    /// Read deadline applied per frame read, or zero to disable.
    pub session_read_timeout: Duration,
    /// Write deadline applied per frame write, or zero to disable.
    pub session_write_timeout: Duration,
    /// Deadline applied to a single command execution.
    pub command_timeout: Duration,
    /// Idle period after which `Listening` auto-disables; zero disables
    /// the idle timer entirely.
    pub auto_shutdown: Duration,
    /// Bound on how long `Stop` waits for tasks to drain.
    pub shutdown_timeout: Duration,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            socket_mode: DEFAULT_SOCKET_MODE,
            max_sessions: 8,
            max_concurrent_commands: 4,
            max_output_size: 64 * 1024,
            session_read_timeout: Duration::from_secs(30),
            session_write_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            auto_shutdown: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl FileOptions {
    /// Loads file options from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::InvalidSocketPath(format!("invalid config: {e}")))
    }

    /// Serializes file options to a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidSocketPath(format!("cannot serialize config: {e}")))
    }
}

/// Every tunable accepted by [`crate::server::DebugServer::new`].
///
/// Construct with [`ServerOptions::builder`], fill in the file-backed
/// fields directly or via [`ServerOptionsBuilder::load_toml_file`], inject
/// code-only collaborators through the builder methods, then call
/// `build()`, which runs [`ServerOptions::validate`].
pub struct ServerOptions {
    pub(crate) file: FileOptions,
    pub(crate) whitelist: Option<HashSet<String>>,
    pub(crate) leveler: Option<Arc<dyn Leveler>>,
    pub(crate) breaker_registry: Option<Arc<dyn BreakerRegistry>>,
    pub(crate) limit_registry: Option<Arc<dyn LimitRegistry>>,
    pub(crate) cache_registry: Option<Arc<dyn CacheRegistry>>,
    pub(crate) config_provider: Option<Arc<dyn ConfigProvider>>,
    pub(crate) transport: Option<Box<dyn Transport>>,
    pub(crate) trigger: Option<Box<dyn Trigger>>,
    pub(crate) audit_sink: Option<Arc<dyn Sink>>,
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("file", &self.file)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

impl ServerOptions {
    /// Starts a builder with every default applied.
    pub fn builder() -> ServerOptionsBuilder {
        ServerOptionsBuilder::default()
    }

    /// Validates the assembled options before the server ever touches
    /// the OS: ambient input validation, not a behavior the spec names.
    pub fn validate(&self) -> Result<()> {
        if self.file.max_sessions == 0 {
            return Err(Error::InvalidSocketPath(
                "max_sessions must be greater than zero".to_owned(),
            ));
        }
        if self.file.max_concurrent_commands == 0 {
            return Err(Error::InvalidSocketPath(
                "max_concurrent_commands must be greater than zero".to_owned(),
            ));
        }
        if self.transport.is_none() {
            validate_socket_path(&self.file.socket_path)?;
            validate_socket_mode(self.file.socket_mode)?;
        }
        Ok(())
    }
}

/// Builder for [`ServerOptions`].
pub struct ServerOptionsBuilder {
    file: FileOptions,
    whitelist: Option<HashSet<String>>,
    leveler: Option<Arc<dyn Leveler>>,
    breaker_registry: Option<Arc<dyn BreakerRegistry>>,
    limit_registry: Option<Arc<dyn LimitRegistry>>,
    cache_registry: Option<Arc<dyn CacheRegistry>>,
    config_provider: Option<Arc<dyn ConfigProvider>>,
    transport: Option<Box<dyn Transport>>,
    trigger: Option<Box<dyn Trigger>>,
    audit_sink: Option<Arc<dyn Sink>>,
}

impl Default for ServerOptionsBuilder {
    fn default() -> Self {
        Self {
            file: FileOptions::default(),
            whitelist: None,
            leveler: None,
            breaker_registry: None,
            limit_registry: None,
            cache_registry: None,
            config_provider: None,
            transport: None,
            trigger: None,
            audit_sink: None,
        }
    }
}

impl ServerOptionsBuilder {
    /// Overrides every file-backed field from a loaded [`FileOptions`],
    /// e.g. one produced by [`FileOptions::from_toml_str`].
    pub fn file_options(mut self, file: FileOptions) -> Self {
        self.file = file;
        self
    }

    /// Reads and applies a TOML config file. Additive: code-only fields
    /// set elsewhere on the builder are untouched.
    pub fn load_toml_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        self.file = FileOptions::from_toml_str(&text)?;
        Ok(self)
    }

    /// Sets the Unix-domain socket path.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file.socket_path = path.into();
        self
    }

    /// Sets the socket file mode.
    pub fn socket_mode(mut self, mode: u32) -> Self {
        self.file.socket_mode = mode;
        self
    }

    /// Sets the maximum number of concurrently accepted sessions.
    pub fn max_sessions(mut self, n: usize) -> Self {
        self.file.max_sessions = n;
        self
    }

    /// Sets the maximum number of concurrently executing commands.
    pub fn max_concurrent_commands(mut self, n: usize) -> Self {
        self.file.max_concurrent_commands = n;
        self
    }

    /// Sets the per-response output byte cap.
    pub fn max_output_size(mut self, n: usize) -> Self {
        self.file.max_output_size = n;
        self
    }

    /// Sets the per-frame read deadline (zero disables it).
    pub fn session_read_timeout(mut self, d: Duration) -> Self {
        self.file.session_read_timeout = d;
        self
    }

    /// Sets the per-frame write deadline (zero disables it).
    pub fn session_write_timeout(mut self, d: Duration) -> Self {
        self.file.session_write_timeout = d;
        self
    }

    /// Sets the per-command execution deadline.
    pub fn command_timeout(mut self, d: Duration) -> Self {
        self.file.command_timeout = d;
        self
    }

    /// Sets the idle-to-auto-disable period (zero disables the idle
    /// timer).
    pub fn auto_shutdown(mut self, d: Duration) -> Self {
        self.file.auto_shutdown = d;
        self
    }

    /// Sets the bound on `Stop`'s wait for in-flight tasks to drain.
    pub fn shutdown_timeout(mut self, d: Duration) -> Self {
        self.file.shutdown_timeout = d;
        self
    }

    /// Sets the command admission whitelist. `None` admits all; `Some`
    /// of an empty set admits only the essentials.
    pub fn whitelist(mut self, whitelist: Option<HashSet<String>>) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Injects a log-level control backing the `setlog` command.
    pub fn leveler(mut self, leveler: Arc<dyn Leveler>) -> Self {
        self.leveler = Some(leveler);
        self
    }

    /// Injects a breaker registry, enabling the `breaker` command.
    pub fn breaker_registry(mut self, registry: Arc<dyn BreakerRegistry>) -> Self {
        self.breaker_registry = Some(registry);
        self
    }

    /// Injects a limiter registry, enabling the `limit` command.
    pub fn limit_registry(mut self, registry: Arc<dyn LimitRegistry>) -> Self {
        self.limit_registry = Some(registry);
        self
    }

    /// Injects a cache registry, enabling the `cache` command.
    pub fn cache_registry(mut self, registry: Arc<dyn CacheRegistry>) -> Self {
        self.cache_registry = Some(registry);
        self
    }

    /// Injects a config provider, enabling the `config` command.
    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config_provider = Some(provider);
        self
    }

    /// Injects a custom transport. Ownership stays with the caller: the
    /// server will not recreate it after `close`.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Injects a custom trigger source, replacing the default SIGUSR1
    /// trigger.
    pub fn trigger(mut self, trigger: Box<dyn Trigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Injects an audit sink, replacing the default no-op sink.
    pub fn audit_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Finalizes the builder into validated [`ServerOptions`].
    pub fn build(self) -> Result<ServerOptions> {
        let options = ServerOptions {
            file: self.file,
            whitelist: self.whitelist,
            leveler: self.leveler,
            breaker_registry: self.breaker_registry,
            limit_registry: self.limit_registry,
            cache_registry: self.cache_registry,
            config_provider: self.config_provider,
            transport: self.transport,
            trigger: self.trigger,
            audit_sink: self.audit_sink,
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        ServerOptions::builder().build().unwrap();
    }

    #[test]
    fn zero_max_sessions_is_rejected() {
        let err = ServerOptions::builder().max_sessions(0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn reserved_prefix_socket_path_is_rejected() {
        let err = ServerOptions::builder()
            .socket_path("/proc/xdbg.sock")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn injected_transport_bypasses_path_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.sock");
        let transport = crate::transport::UnixTransport::new(path, 0o600).unwrap();
        ServerOptions::builder()
            .socket_path("/proc/unused.sock")
            .transport(Box::new(transport))
            .build()
            .unwrap();
    }

    #[test]
    fn file_options_round_trip_toml() {
        let mut file = FileOptions::default();
        file.max_sessions = 16;
        file.socket_path = PathBuf::from("/var/run/custom.sock");
        let toml_text = file.to_toml_string().unwrap();
        let parsed = FileOptions::from_toml_str(&toml_text).unwrap();
        assert_eq!(parsed.max_sessions, 16);
        assert_eq!(parsed.socket_path, PathBuf::from("/var/run/custom.sock"));
    }
}
