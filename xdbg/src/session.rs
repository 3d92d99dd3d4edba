//! Per-connection session: read-request, dispatch, write-reply, with
//! deadlines, panic isolation, and once-only close.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use xdbg_proto::{Request, Response};

use crate::audit::{AuditEvent, AuditRecord, Sink};
use crate::error::Error;
use crate::leveler::Leveler;
use crate::peer::IdentityInfo;
use crate::registries::{BreakerRegistry, CacheRegistry, ConfigProvider, LimitRegistry};
use crate::registry::CommandRegistry;

/// Everything a [`crate::registry::Command`] needs to execute: the
/// connected peer's identity, a deadline-bound cancellation token, the
/// injected integration registries, and a handle back to the server for
/// commands (like `exit`) that must schedule follow-up work tracked by
/// the server's wait group.
pub struct CommandContext {
    /// The connected peer's captured identity.
    pub peer: IdentityInfo,
    /// Cancelled when the command's deadline elapses or the session
    /// closes. Cooperative: commands must poll it themselves.
    pub cancel: CancellationToken,
    /// Injected log-level control, if configured.
    pub leveler: Option<Arc<dyn Leveler>>,
    /// Injected breaker registry, if configured.
    pub breaker_registry: Option<Arc<dyn BreakerRegistry>>,
    /// Injected limiter registry, if configured.
    pub limit_registry: Option<Arc<dyn LimitRegistry>>,
    /// Injected cache registry, if configured.
    pub cache_registry: Option<Arc<dyn CacheRegistry>>,
    /// Injected config provider, if configured.
    pub config_provider: Option<Arc<dyn ConfigProvider>>,
    /// Handle back to the owning server, for `exit`'s deferred disable.
    pub server: ServerHandle,
}

/// A non-owning handle sessions and commands use to reach back into the
/// server without owning any of its state.
#[derive(Clone)]
pub struct ServerHandle {
    pub(crate) tasks: TaskTracker,
    pub(crate) root_cancel: CancellationToken,
    pub(crate) disable: Arc<dyn Fn() + Send + Sync>,
}

impl ServerHandle {
    /// Schedules a deferred `Disable` roughly `delay` from now, tracked
    /// by the server's wait group so `Stop` never races it.
    pub fn schedule_disable(&self, delay: Duration) {
        let disable = Arc::clone(&self.disable);
        let cancel = self.root_cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => (disable)(),
                () = cancel.cancelled() => {}
            }
        });
    }
}

/// Tunables a session needs at construction; a narrowed view of
/// [`crate::options::ServerOptions`].
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Read deadline per frame; zero disables it.
    pub read_timeout: Duration,
    /// Write deadline per frame; zero disables it.
    pub write_timeout: Duration,
    /// Deadline applied to each command execution.
    pub command_timeout: Duration,
    /// Output byte cap enforced per response.
    pub max_output_size: usize,
}

/// The collaborators baked into every [`CommandContext`] this session
/// produces, minus the per-command cancellation token.
#[derive(Clone)]
pub struct CommandContextTemplate {
    /// Injected log-level control, if configured.
    pub leveler: Option<Arc<dyn Leveler>>,
    /// Injected breaker registry, if configured.
    pub breaker_registry: Option<Arc<dyn BreakerRegistry>>,
    /// Injected limiter registry, if configured.
    pub limit_registry: Option<Arc<dyn LimitRegistry>>,
    /// Injected cache registry, if configured.
    pub cache_registry: Option<Arc<dyn CacheRegistry>>,
    /// Injected config provider, if configured.
    pub config_provider: Option<Arc<dyn ConfigProvider>>,
    /// Handle back to the owning server.
    pub server: ServerHandle,
}

/// One accepted connection and its sequential request/reply loop.
///
/// Owns the stream and a cancellation scope derived from the server's
/// root scope. `closed` blocks further writes; `conn_closed` gates
/// once-only resource release. They are deliberately distinct: a prior
/// write failure sets `closed` without tearing anything down, so the
/// eventual `close()` call still cancels the scope, releases the
/// connection, and audits `SessionEnd` exactly once.
pub struct Session {
    reader: Mutex<Option<BufReader<ReadHalf<UnixStream>>>>,
    writer: Mutex<Option<BufWriter<WriteHalf<UnixStream>>>>,
    closed: std::sync::atomic::AtomicBool,
    conn_closed: std::sync::atomic::AtomicBool,
    cancel: CancellationToken,
    peer: IdentityInfo,
    options: SessionOptions,
    registry: Arc<CommandRegistry>,
    audit: Arc<dyn Sink>,
    command_slots: Arc<Semaphore>,
    context_template: CommandContextTemplate,
}

impl Session {
    /// Builds a session around `stream`, deriving its cancellation scope
    /// from `parent_cancel`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: UnixStream,
        peer: IdentityInfo,
        parent_cancel: &CancellationToken,
        options: SessionOptions,
        registry: Arc<CommandRegistry>,
        audit: Arc<dyn Sink>,
        command_slots: Arc<Semaphore>,
        context_template: CommandContextTemplate,
    ) -> Self {
        let (r, w) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(Some(BufReader::new(r))),
            writer: Mutex::new(Some(BufWriter::new(w))),
            closed: std::sync::atomic::AtomicBool::new(false),
            conn_closed: std::sync::atomic::AtomicBool::new(false),
            cancel: parent_cancel.child_token(),
            peer,
            options,
            registry,
            audit,
            command_slots,
            context_template,
        }
    }

    fn audit(&self, record: AuditRecord) {
        self.audit.write(&record.with_identity(IdentityInfo {
            identity: self.peer.identity,
            username: self.peer.username.clone(),
            groupname: self.peer.groupname.clone(),
        }));
    }

    /// Runs the session to completion: `SessionStart`, then
    /// request/dispatch/reply until the peer disconnects, a read fails,
    /// or the scope is cancelled; always followed by exactly one
    /// `close()`.
    pub async fn run(self: Arc<Self>) {
        self.audit(AuditRecord::new(AuditEvent::SessionStart));

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let read = tokio::select! {
                r = self.read_next() => r,
                () = self.cancel.cancelled() => break,
            };

            match read {
                Ok(Some(request)) => self.dispatch(request).await,
                Ok(None) => break,
                Err(response) => {
                    self.write_response(&response).await;
                    break;
                }
            }
        }

        self.close().await;
    }

    async fn read_next(&self) -> Result<Option<Request>, Response> {
        // The reader is only ever touched from this single run-loop
        // task, so the lock never contends; it exists to let `close()`
        // take the half away without an `Option`-returning accessor.
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Ok(None);
        };
        let decode = xdbg_proto::decode_request(reader);

        let result = if self.options.read_timeout.is_zero() {
            decode.await
        } else {
            match tokio::time::timeout(self.options.read_timeout, decode).await {
                Ok(r) => r,
                Err(_) => return Err(Response::err(Error::Timeout.to_string())),
            }
        };

        match result {
            Ok(request) => Ok(Some(request)),
            Err(xdbg_proto::ProtoError::ConnectionClosed) => Ok(None),
            Err(e) => Err(Response::err(e.to_string())),
        }
    }

    async fn dispatch(&self, request: Request) {
        self.audit(
            AuditRecord::new(AuditEvent::Command).with_command(request.command.clone(), &request.args),
        );

        let Some(command) = self.registry.get(&request.command) else {
            self.audit(
                AuditRecord::new(AuditEvent::CommandFailed).with_command(request.command.clone(), &request.args),
            );
            self.write_response(&Response::err(Error::CommandNotFound.to_string())).await;
            return;
        };

        if !self.registry.is_allowed(&request.command) {
            self.audit(
                AuditRecord::new(AuditEvent::CommandForbidden).with_command(request.command.clone(), &request.args),
            );
            self.write_response(&Response::err(format!("{}: forbidden by the active whitelist", Error::CommandForbidden)))
                .await;
            return;
        }

        let Ok(permit) = Arc::clone(&self.command_slots).try_acquire_owned() else {
            self.write_response(&Response::err(Error::TooManyCommands.to_string())).await;
            return;
        };

        let deadline_cancel = self.cancel.child_token();
        let ctx = CommandContext {
            peer: self.peer.clone(),
            cancel: deadline_cancel.clone(),
            leveler: self.context_template.leveler.clone(),
            breaker_registry: self.context_template.breaker_registry.clone(),
            limit_registry: self.context_template.limit_registry.clone(),
            cache_registry: self.context_template.cache_registry.clone(),
            config_provider: self.context_template.config_provider.clone(),
            server: self.context_template.server.clone(),
        };

        let start = Instant::now();
        let args = request.args.clone();
        let timeout = self.options.command_timeout;

        // Commands run as their own task so a panic inside `execute`
        // surfaces through `JoinError::is_panic` instead of unwinding
        // across the `.await` points in this loop. The permit moves in
        // with it and is only dropped once the task actually finishes —
        // a cooperative-timeout command keeps holding its slot until it
        // returns on its own, per the back-pressure the spec relies on.
        let exec_args = args.clone();
        let handle = tokio::spawn(async move {
            let result = command.execute(&ctx, &exec_args).await;
            drop(permit);
            result
        });

        let outcome = if timeout.is_zero() {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(format!("command panicked: {e}")),
                Err(e) => Err(e.to_string()),
            }
        } else {
            tokio::select! {
                joined = handle => match joined {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(format!("command panicked: {e}")),
                    Err(e) => Err(e.to_string()),
                },
                () = tokio::time::sleep(timeout) => {
                    deadline_cancel.cancel();
                    Err(Error::Timeout.to_string())
                }
            }
        };
        let duration = start.elapsed();

        match outcome {
            Ok(output) => {
                let (body, truncated, original_size) = truncate_output(&output, self.options.max_output_size);
                self.audit(
                    AuditRecord::new(AuditEvent::CommandSuccess)
                        .with_command(request.command.clone(), &args)
                        .with_duration(duration),
                );
                let response = if truncated {
                    Response::ok_truncated(body, original_size)
                } else {
                    Response::ok(body)
                };
                self.write_response(&response).await;
            }
            Err(error) => {
                self.audit(
                    AuditRecord::new(AuditEvent::CommandFailed)
                        .with_command(request.command.clone(), &args)
                        .with_duration(duration)
                        .with_error(error.clone()),
                );
                self.write_response(&Response::err(error)).await;
            }
        }
    }

    async fn write_response(&self, response: &Response) {
        let payload = match xdbg_proto::encode_response(response) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.audit(AuditRecord::new(AuditEvent::CommandFailed).with_error("response encoding failed"));
                let degraded = Response::err("response encoding failed: output too large after encoding");
                match xdbg_proto::encode_response(&degraded) {
                    Ok(bytes) => bytes,
                    Err(_) => return,
                }
            }
        };
        self.write_bytes(&payload).await;
    }

    async fn write_bytes(&self, bytes: &[u8]) {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let result = self.write_guarded(bytes).await;

        // A write failure only marks the session closed; `SessionEnd` is
        // `close()`'s job alone, so it stays a once-only record.
        if let Err(error) = result {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
            tracing::warn!(peer = ?self.peer.identity, %error, "session write failed");
        }
    }

    async fn write_guarded(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(std::io::Error::from(std::io::ErrorKind::NotConnected));
        };

        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };

        if self.options.write_timeout.is_zero() {
            write.await
        } else {
            match tokio::time::timeout(self.options.write_timeout, write).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::from(std::io::ErrorKind::TimedOut)),
            }
        }
    }

    /// Ends the session exactly once: cancels the scope, audits
    /// `SessionEnd`, and releases the underlying connection.
    pub async fn close(&self) {
        if self.conn_closed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        self.cancel.cancel();
        self.audit(AuditRecord::new(AuditEvent::SessionEnd));
        *self.reader.lock().await = None;
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

/// UTF-8-safe truncation of command output to `max_bytes`.
fn truncate_output(output: &str, max_bytes: usize) -> (String, bool, usize) {
    if output.len() <= max_bytes {
        return (output.to_owned(), false, output.len());
    }
    let truncated = xdbg_proto::truncate_utf8(output, max_bytes);
    (truncated.to_owned(), true, output.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_output_marks_truncation() {
        let (body, truncated, original) = truncate_output("你好世界", 6);
        assert_eq!(body, "你好");
        assert!(truncated);
        assert_eq!(original, 12);
    }

    #[test]
    fn truncate_output_is_identity_under_limit() {
        let (body, truncated, original) = truncate_output("short", 64);
        assert_eq!(body, "short");
        assert!(!truncated);
        assert_eq!(original, 5);
    }
}
