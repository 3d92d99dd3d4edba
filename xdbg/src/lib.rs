//! Embeddable runtime debug service.
//!
//! A long-running process embeds [`DebugServer`] to expose operational
//! commands over a Unix-domain-socket control channel: stack/heap
//! snapshots, log-level changes, circuit breaker and rate limiter
//! introspection, configuration dumps, and a graceful `exit`. Commands
//! beyond the built-ins are reached by injecting the matching registry
//! trait (`BreakerRegistry`, `LimitRegistry`, `CacheRegistry`,
//! `ConfigProvider`) through [`ServerOptions`].
//!
//! The companion `xdbgctl` binary and the [`client::Client`] here are
//! the two ways to talk to a running server; `xdbg-discover` locates
//! one by process name or owning socket.

mod audit;
mod backoff;
mod client;
mod commands;
mod error;
mod leveler;
mod options;
mod peer;
mod registries;
mod registry;
mod server;
mod session;
mod state;
mod transport;
mod trigger;

pub use audit::{AuditEvent, AuditRecord, JsonLinesSink, NullSink, Redactor, RedactingSink, Sink, TextSink};
pub use client::{Client, DEFAULT_CLIENT_TIMEOUT, default_socket_path, owner_is_caller_or_privileged};
pub use commands::{
    BreakerCommand, CacheCommand, ConfigCommand, ExitCommand, FreememCommand, HelpCommand, LimitCommand,
    PprofCommand, SetlogCommand, StackCommand, VersionCommand,
};
pub use error::{Error, Result};
pub use leveler::{LOG_LEVELS, Leveler, validate_level};
pub use options::{DEFAULT_SOCKET_MODE, DEFAULT_SOCKET_PATH, FileOptions, ServerOptions, ServerOptionsBuilder};
pub use peer::{IdentityInfo, PeerIdentity, capture as capture_peer_identity};
pub use registries::{BreakerInfo, BreakerRegistry, CacheInfo, CacheRegistry, ConfigProvider, LimitInfo, LimitRegistry};
pub use registry::{Command, CommandRegistry, ESSENTIAL_COMMANDS};
pub use server::DebugServer;
pub use session::{CommandContext, CommandContextTemplate, ServerHandle, SessionOptions};
pub use state::{AtomicLifecycle, LifecycleState};
pub use transport::{Transport, UnixTransport, validate_socket_mode, validate_socket_path};
pub use trigger::{ChannelTrigger, Event, SignalTrigger, Trigger, resolve_toggle};
