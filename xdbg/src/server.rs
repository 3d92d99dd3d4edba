//! The embeddable debug server: lifecycle, accept loop, trigger loop,
//! idle timer, and a deterministic, single-elected `Stop`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::audit::{AuditEvent, AuditRecord, NullSink, Sink};
use crate::backoff::Backoff;
use crate::commands::{
    BreakerCommand, CacheCommand, ConfigCommand, ExitCommand, FreememCommand, HelpCommand, LimitCommand,
    PprofCommand, SetlogCommand, StackCommand, VersionCommand,
};
use crate::error::{Error, Result};
use crate::options::ServerOptions;
use crate::peer::{self, IdentityInfo};
use crate::registry::CommandRegistry;
use crate::session::{CommandContextTemplate, Session, SessionOptions, ServerHandle};
use crate::state::{AtomicLifecycle, LifecycleState};
use crate::transport::{Transport, UnixTransport};
use crate::trigger::{self, SignalTrigger, Trigger};

/// The embeddable runtime debug server.
///
/// `Start` installs the trigger watcher and idle timer without opening a
/// listener; the server only begins accepting connections once
/// `Listening` is reached, either via an explicit `Enable` or a trigger
/// event. `Stop` is idempotent and safe to call from any state.
pub struct DebugServer {
    state: AtomicLifecycle,
    options: tokio::sync::Mutex<Option<ServerOptions>>,
    registry: Arc<CommandRegistry>,
    audit: Arc<dyn Sink>,
    root_cancel: CancellationToken,
    tasks: TaskTracker,
    command_slots: Arc<Semaphore>,
    session_slots: Arc<Semaphore>,
    pprof: Arc<PprofCommand>,
    listening: Arc<AtomicBool>,
    /// Scopes the accept loop and idle timer; re-created fresh on every
    /// `Enable` so a prior `Disable`'s cancellation never leaks forward.
    /// Always a child of `root_cancel`, so `Stop` still reaches it.
    listen_cancel: tokio::sync::Mutex<CancellationToken>,
    /// Bumped on every accepted connection to reset the idle timer.
    activity: Arc<tokio::sync::Notify>,
    /// The most recent transport `close()` result, so `Stop` can join it
    /// into its own return value instead of discarding it.
    transport_close_result: tokio::sync::Mutex<Option<Result<()>>>,
}

impl std::fmt::Debug for DebugServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugServer")
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

impl DebugServer {
    /// Builds a server from validated `options`, registering every
    /// built-in command plus the integration commands whose backing
    /// registries were injected.
    pub fn new(options: ServerOptions) -> Arc<Self> {
        let registry = Arc::new(CommandRegistry::new());
        registry.set_whitelist(options.whitelist.clone());

        let audit: Arc<dyn Sink> = options.audit_sink.clone().unwrap_or_else(|| Arc::new(NullSink));
        let pprof = Arc::new(PprofCommand::new());
        let root_cancel = CancellationToken::new();
        let listen_cancel = root_cancel.child_token();

        let server = Arc::new(Self {
            state: AtomicLifecycle::new(),
            options: tokio::sync::Mutex::new(Some(options)),
            registry: Arc::clone(&registry),
            audit,
            root_cancel,
            tasks: TaskTracker::new(),
            command_slots: Arc::new(Semaphore::new(1)),
            session_slots: Arc::new(Semaphore::new(1)),
            pprof: Arc::clone(&pprof),
            listening: Arc::new(AtomicBool::new(false)),
            listen_cancel: tokio::sync::Mutex::new(listen_cancel),
            activity: Arc::new(tokio::sync::Notify::new()),
            transport_close_result: tokio::sync::Mutex::new(None),
        });

        registry.register(Arc::new(HelpCommand::new(Arc::clone(&registry)))).expect("help registers");
        registry.register(Arc::new(ExitCommand)).expect("exit registers");
        registry.register(Arc::new(SetlogCommand)).expect("setlog registers");
        registry.register(Arc::new(StackCommand)).expect("stack registers");
        registry.register(Arc::new(FreememCommand)).expect("freemem registers");
        registry.register(Arc::clone(&pprof) as Arc<dyn crate::registry::Command>).expect("pprof registers");
        registry.register(Arc::new(VersionCommand)).expect("version registers");

        server
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// The registry backing this server, for embedders that want to
    /// register additional custom commands before `Start`.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Moves `Created -> Started`: installs the integration commands,
    /// the audit sink's `ServerStart` record, and spawns the trigger
    /// watcher. Does not open a listener.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if !self.state.try_transition(LifecycleState::Created, LifecycleState::Started) {
            return match self.state.load() {
                LifecycleState::Stopped => Err(Error::InvalidState),
                _ => Err(Error::AlreadyRunning),
            };
        }

        {
            let mut guard = self.options.lock().await;
            let options = guard.as_mut().expect("options present until Stop");
            if let Some(breaker) = &options.breaker_registry {
                self.registry
                    .register(Arc::new(BreakerCommand::new(Arc::clone(breaker))))
                    .expect("breaker registers");
            }
            if let Some(limit) = &options.limit_registry {
                self.registry
                    .register(Arc::new(LimitCommand::new(Arc::clone(limit))))
                    .expect("limit registers");
            }
            if let Some(cache) = &options.cache_registry {
                self.registry
                    .register(Arc::new(CacheCommand::new(Arc::clone(cache))))
                    .expect("cache registers");
            }
            if let Some(config) = &options.config_provider {
                self.registry
                    .register(Arc::new(ConfigCommand::new(Arc::clone(config))))
                    .expect("config registers");
            }
            self.command_slots
                .add_permits(options.file.max_concurrent_commands.saturating_sub(1));
            self.session_slots.add_permits(options.file.max_sessions.saturating_sub(1));
        }

        self.audit.write(&AuditRecord::new(AuditEvent::ServerStart));
        self.spawn_trigger_watcher();
        Ok(())
    }

    fn spawn_trigger_watcher(self: &Arc<Self>) {
        let server = Arc::clone(self);
        let cancel = self.root_cancel.child_token();
        self.tasks.spawn(async move {
            let mut trigger = server.take_trigger().await;
            loop {
                let event = tokio::select! {
                    e = trigger.recv() => e,
                    () = cancel.cancelled() => break,
                };
                match event {
                    Some(trigger::Event::Enable) => {
                        let _ = server.enable().await;
                    }
                    Some(trigger::Event::Disable) => {
                        let _ = server.disable_internal().await;
                    }
                    Some(trigger::Event::Toggle) => {
                        let resolved = trigger::resolve_toggle(server.listening.load(Ordering::SeqCst));
                        match resolved {
                            trigger::Event::Enable => {
                                let _ = server.enable().await;
                            }
                            trigger::Event::Disable => {
                                let _ = server.disable_internal().await;
                            }
                            trigger::Event::Toggle => unreachable!("resolve_toggle never returns Toggle"),
                        }
                    }
                    None => break,
                }
            }
            trigger.close();
        });
    }

    async fn take_trigger(&self) -> Box<dyn Trigger> {
        let mut guard = self.options.lock().await;
        let options = guard.as_mut().expect("options present until Stop");
        if let Some(custom) = options.trigger.take() {
            return custom;
        }
        match SignalTrigger::new() {
            Ok(t) => Box::new(t),
            Err(_) => {
                let (_tx, fallback) = crate::trigger::ChannelTrigger::channel();
                Box::new(fallback)
            }
        }
    }

    /// Moves `Started -> Listening`: opens the transport and spawns the
    /// accept loop. A no-op if already `Listening`.
    pub async fn enable(self: &Arc<Self>) -> Result<()> {
        if self.listening.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.state.try_transition(LifecycleState::Started, LifecycleState::Listening) {
            return match self.state.load() {
                LifecycleState::Listening => Ok(()),
                LifecycleState::Stopped => Err(Error::InvalidState),
                LifecycleState::Created => Err(Error::NotRunning),
                LifecycleState::Started => Err(Error::InvalidState),
            };
        }

        let (mut transport, injected) = self.take_transport().await;
        if let Err(e) = transport.listen().await {
            self.state.rollback_listening_to_started();
            if injected {
                self.options.lock().await.as_mut().expect("options present until Stop").transport = Some(transport);
            }
            return Err(e);
        }

        let fresh = self.root_cancel.child_token();
        *self.listen_cancel.lock().await = fresh;

        self.listening.store(true, Ordering::SeqCst);
        self.arm_idle_timer();
        self.spawn_accept_loop(transport, injected);
        Ok(())
    }

    /// Takes the transport to listen on, plus whether it was caller-
    /// injected. Injected transports are handed back to `options` once
    /// the accept loop retires so the next `Enable` reuses the same
    /// object instead of rebuilding it — per the caller-controlled
    /// ownership contract, a `Disable` only asks it to stop listening.
    async fn take_transport(&self) -> (Box<dyn Transport>, bool) {
        let mut guard = self.options.lock().await;
        let options = guard.as_mut().expect("options present until Stop");
        if let Some(custom) = options.transport.take() {
            return (custom, true);
        }
        let built_in = Box::new(
            UnixTransport::new(options.file.socket_path.clone(), options.file.socket_mode)
                .expect("validated at ServerOptions::build"),
        );
        (built_in, false)
    }

    /// Spawns the single idle timer for this `Enable` round. Loops
    /// rather than re-spawning per accept: each accepted connection just
    /// notifies `activity`, which restarts the sleep.
    fn arm_idle_timer(self: &Arc<Self>) {
        let server = Arc::clone(self);
        self.tasks.spawn(async move {
            let auto_shutdown = {
                let guard = server.options.lock().await;
                guard.as_ref().map(|o| o.file.auto_shutdown).unwrap_or_default()
            };
            if auto_shutdown.is_zero() {
                return;
            }
            let cancel = server.listen_cancel.lock().await.clone();
            loop {
                tokio::select! {
                    () = tokio::time::sleep(auto_shutdown) => {
                        let _ = server.disable_internal().await;
                        break;
                    }
                    () = server.activity.notified() => {}
                    () = cancel.cancelled() => break,
                }
            }
        });
    }

    fn spawn_accept_loop(self: &Arc<Self>, mut transport: Box<dyn Transport>, injected: bool) {
        let server = Arc::clone(self);
        self.tasks.spawn(async move {
            let cancel = server.listen_cancel.lock().await.clone();
            let mut backoff = Backoff::new();
            loop {
                let accepted = tokio::select! {
                    a = transport.accept() => a,
                    () = cancel.cancelled() => break,
                };

                match accepted {
                    Ok(stream) => {
                        backoff.reset();
                        server.activity.notify_one();
                        server.spawn_session(stream);
                    }
                    Err(_) => {
                        let wait = backoff.next();
                        tokio::select! {
                            () = tokio::time::sleep(wait) => {}
                            () = cancel.cancelled() => break,
                        }
                    }
                }
            }
            let close_result = transport.close().await;
            *server.transport_close_result.lock().await = Some(close_result);
            if injected {
                if let Some(options) = server.options.lock().await.as_mut() {
                    options.transport = Some(transport);
                }
            }
        });
    }

    fn spawn_session(self: &Arc<Self>, stream: tokio::net::UnixStream) {
        let server = Arc::clone(self);
        self.tasks.spawn(async move {
            let Ok(permit) = Arc::clone(&server.session_slots).try_acquire_owned() else {
                server.reject_session(stream).await;
                return;
            };
            let identity = peer::capture(&stream);
            let peer = IdentityInfo::resolve(identity);
            let (session_options, template) = server.session_collaborators().await;
            let session = Arc::new(Session::new(
                stream,
                peer,
                &server.root_cancel,
                session_options,
                Arc::clone(&server.registry),
                Arc::clone(&server.audit),
                Arc::clone(&server.command_slots),
                template,
            ));
            session.run().await;
            drop(permit);
        });
    }

    /// Sends a single `ErrTooManySessions` response under the
    /// configured write deadline, then closes the connection, per §4.3's
    /// rejection path for a session slot that's already full.
    async fn reject_session(&self, mut stream: tokio::net::UnixStream) {
        let write_timeout = {
            let guard = self.options.lock().await;
            guard.as_ref().map(|o| o.file.session_write_timeout).unwrap_or_default()
        };

        let response = xdbg_proto::Response::err(Error::TooManySessions.to_string());
        if let Ok(payload) = xdbg_proto::encode_response(&response) {
            let write = async {
                stream.write_all(&payload).await?;
                stream.flush().await
            };
            if write_timeout.is_zero() {
                let _ = write.await;
            } else {
                let _ = tokio::time::timeout(write_timeout, write).await;
            }
        }
        let _ = stream.shutdown().await;
    }

    async fn session_collaborators(self: &Arc<Self>) -> (SessionOptions, CommandContextTemplate) {
        let guard = self.options.lock().await;
        let options = guard.as_ref().expect("options present until Stop");
        let session_options = SessionOptions {
            read_timeout: options.file.session_read_timeout,
            write_timeout: options.file.session_write_timeout,
            command_timeout: options.file.command_timeout,
            max_output_size: options.file.max_output_size,
        };
        let disable_server = Arc::clone(self);
        let template = CommandContextTemplate {
            leveler: options.leveler.clone(),
            breaker_registry: options.breaker_registry.clone(),
            limit_registry: options.limit_registry.clone(),
            cache_registry: options.cache_registry.clone(),
            config_provider: options.config_provider.clone(),
            server: ServerHandle {
                tasks: self.tasks.clone(),
                root_cancel: self.root_cancel.clone(),
                disable: Arc::new(move || {
                    let server = Arc::clone(&disable_server);
                    tokio::spawn(async move {
                        let _ = server.disable_internal().await;
                    });
                }),
            },
        };
        (session_options, template)
    }

    /// Moves `Listening -> Started`: stops accepting new connections and
    /// closes the transport. Existing sessions keep running. A no-op if
    /// not currently `Listening`.
    pub async fn disable(self: &Arc<Self>) -> Result<()> {
        self.disable_internal().await
    }

    async fn disable_internal(self: &Arc<Self>) -> Result<()> {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.state.rollback_listening_to_started();
        self.listen_cancel.lock().await.cancel();
        Ok(())
    }

    /// Terminally shuts the server down. Exactly one concurrent caller
    /// performs teardown (`AtomicLifecycle::elect_stopper`); the rest
    /// observe `Ok(())` once the elected caller finishes.
    ///
    /// Joins in the Transport's `close()` result (the only fallible
    /// close among Transport/Trigger/audit sink — `Trigger::close` and
    /// `Sink::close` are infallible by design) so a caller who cares can
    /// tell a socket-teardown failure from a clean `Stop`.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        if !self.state.elect_stopper() {
            return Ok(());
        }

        self.listening.store(false, Ordering::SeqCst);
        self.root_cancel.cancel();
        self.pprof.cleanup();

        let shutdown_timeout = {
            let guard = self.options.lock().await;
            guard.as_ref().map(|o| o.file.shutdown_timeout).unwrap_or(Duration::from_secs(5))
        };

        self.tasks.close();
        let _ = tokio::time::timeout(shutdown_timeout, self.tasks.wait()).await;

        self.audit.write(&AuditRecord::new(AuditEvent::ServerStop));
        self.audit.close();
        self.options.lock().await.take();

        self.transport_close_result.lock().await.take().unwrap_or(Ok(()))
    }
}
