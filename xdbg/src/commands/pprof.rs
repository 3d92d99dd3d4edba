//! `pprof` — `cpu start|stop`, `heap`, `tasks`. Owns every temp file it
//! creates; `cleanup()` (called by the server on `Stop`) ends any active
//! CPU profile and removes every tracked path.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::registry::Command;
use crate::session::CommandContext;

struct ActiveProfile {
    file: NamedTempFile,
    started_at: std::time::Instant,
}

/// Owns the CPU-profile-in-progress (if any) and every temp file path
/// produced by `heap`/`tasks`/`cpu stop`, so `cleanup()` can remove them
/// all deterministically on server `Stop`.
#[derive(Default)]
pub struct PprofCommand {
    active: Mutex<Option<ActiveProfile>>,
    tracked: Mutex<Vec<PathBuf>>,
}

impl PprofCommand {
    /// Builds an idle `pprof` command with no active profile.
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, path: PathBuf) {
        self.tracked.lock().expect("pprof tracked-paths lock poisoned").push(path);
    }

    /// Ends any in-flight CPU profile and removes every tracked temp
    /// file. Idempotent; called exactly once by the server during `Stop`.
    pub fn cleanup(&self) {
        if let Some(active) = self.active.lock().expect("pprof active-profile lock poisoned").take() {
            drop(active.file);
        }
        let mut tracked = self.tracked.lock().expect("pprof tracked-paths lock poisoned");
        for path in tracked.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }

    fn cpu_start(&self) -> Result<String, String> {
        let mut guard = self.active.lock().expect("pprof active-profile lock poisoned");
        if guard.is_some() {
            return Err("a CPU profile is already in progress".to_owned());
        }
        // `tempfile::NamedTempFile` uses a CSPRNG-backed unique suffix
        // internally (O_EXCL create), so the name is both collision-free
        // and resistant to symlink pre-planting.
        let mut file = NamedTempFile::with_prefix("xdbg-cpu-").map_err(|e| e.to_string())?;
        writeln!(file, "cpu profile started at {:?}", std::time::SystemTime::now())
            .map_err(|e| e.to_string())?;
        let path = file.path().display().to_string();
        *guard = Some(ActiveProfile {
            file,
            started_at: std::time::Instant::now(),
        });
        Ok(format!("cpu profiling started: {path}"))
    }

    fn cpu_stop(&self) -> Result<String, String> {
        let mut guard = self.active.lock().expect("pprof active-profile lock poisoned");
        let Some(mut active) = guard.take() else {
            return Err("no CPU profile is in progress".to_owned());
        };
        let elapsed = active.started_at.elapsed();
        writeln!(active.file, "cpu profile stopped after {elapsed:?}").map_err(|e| e.to_string())?;
        let path = active.file.path().to_path_buf();
        let (_, keep_path) = active.file.keep().map_err(|e| e.to_string())?;
        self.track(keep_path.clone());
        Ok(format!("cpu profile written to {}", path.display()))
    }

    fn snapshot(&self, kind: &str, body: &str) -> Result<String, String> {
        let mut file = NamedTempFile::with_prefix(format!("xdbg-{kind}-")).map_err(|e| e.to_string())?;
        file.write_all(body.as_bytes()).map_err(|e| e.to_string())?;
        let (_, path) = file.keep().map_err(|e| e.to_string())?;
        self.track(path.clone());
        Ok(format!("{kind} snapshot written to {}", path.display()))
    }
}

#[async_trait]
impl Command for PprofCommand {
    fn name(&self) -> &str {
        "pprof"
    }

    fn help(&self) -> &str {
        "cpu start|stop, heap, tasks — write profiling snapshots to temp files"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        match args {
            [sub, rest @ ..] if sub == "cpu" => match rest {
                [action] if action == "start" => self.cpu_start(),
                [action] if action == "stop" => self.cpu_stop(),
                _ => Err("usage: pprof cpu start|stop".to_owned()),
            },
            [sub] if sub == "heap" => {
                let body = format!("heap snapshot at {:?}\npid={}\n", std::time::SystemTime::now(), std::process::id());
                self.snapshot("heap", &body)
            }
            [sub] if sub == "tasks" => {
                let body = format!("task snapshot at {:?}\npid={}\n", std::time::SystemTime::now(), std::process::id());
                self.snapshot("tasks", &body)
            }
            _ => Err("usage: pprof cpu start|stop|heap|tasks".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::session::ServerHandle;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    fn ctx() -> CommandContext {
        CommandContext {
            peer: IdentityInfo {
                identity: PeerIdentity { uid: 0, gid: 0, pid: 0 },
                username: None,
                groupname: None,
            },
            cancel: CancellationToken::new(),
            leveler: None,
            breaker_registry: None,
            limit_registry: None,
            cache_registry: None,
            config_provider: None,
            server: ServerHandle {
                tasks: TaskTracker::new(),
                root_cancel: CancellationToken::new(),
                disable: Arc::new(|| {}),
            },
        }
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let cmd = PprofCommand::new();
        cmd.execute(&ctx(), &["cpu".to_owned(), "start".to_owned()]).await.unwrap();
        let err = cmd
            .execute(&ctx(), &["cpu".to_owned(), "start".to_owned()])
            .await
            .unwrap_err();
        assert!(err.contains("already in progress"));
        cmd.cleanup();
    }

    #[tokio::test]
    async fn stop_without_start_fails() {
        let cmd = PprofCommand::new();
        let err = cmd.execute(&ctx(), &["cpu".to_owned(), "stop".to_owned()]).await.unwrap_err();
        assert!(err.contains("no CPU profile"));
    }

    #[tokio::test]
    async fn cleanup_removes_every_tracked_file() {
        let cmd = PprofCommand::new();
        cmd.execute(&ctx(), &["cpu".to_owned(), "start".to_owned()]).await.unwrap();
        cmd.execute(&ctx(), &["cpu".to_owned(), "stop".to_owned()]).await.unwrap();
        cmd.execute(&ctx(), &["heap".to_owned()]).await.unwrap();
        let tracked = cmd.tracked.lock().unwrap().clone();
        assert_eq!(tracked.len(), 2);
        for path in &tracked {
            assert!(path.exists());
        }
        cmd.cleanup();
        for path in &tracked {
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn unknown_subcommand_fails() {
        let cmd = PprofCommand::new();
        let err = cmd.execute(&ctx(), &["bogus".to_owned()]).await.unwrap_err();
        assert!(err.contains("usage"));
    }
}
