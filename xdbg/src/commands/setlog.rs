//! `setlog` — show or set the injected leveler's log level.

use async_trait::async_trait;

use crate::leveler::validate_level;
use crate::registry::Command;
use crate::session::CommandContext;

/// Reads/writes the embedding process's log level through an injected
/// [`crate::leveler::Leveler`].
#[derive(Debug, Default)]
pub struct SetlogCommand;

#[async_trait]
impl Command for SetlogCommand {
    fn name(&self) -> &str {
        "setlog"
    }

    fn help(&self) -> &str {
        "show or set the log level (trace|debug|info|warn|error)"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        let Some(leveler) = &ctx.leveler else {
            return Err("no leveler configured".to_owned());
        };

        let Some(requested) = args.first() else {
            return Ok(leveler.get());
        };

        let Some(level) = validate_level(requested) else {
            return Err(format!(
                "invalid level {requested:?}: must be one of trace, debug, info, warn, error"
            ));
        };

        leveler.set(level).map(|()| format!("log level set to {level}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leveler::Leveler;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::session::ServerHandle;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct FakeLeveler(Mutex<String>);

    impl Leveler for FakeLeveler {
        fn get(&self) -> String {
            self.0.lock().unwrap().clone()
        }
        fn set(&self, level: &str) -> Result<(), String> {
            *self.0.lock().unwrap() = level.to_owned();
            Ok(())
        }
    }

    fn ctx(leveler: Option<Arc<dyn Leveler>>) -> CommandContext {
        CommandContext {
            peer: IdentityInfo {
                identity: PeerIdentity { uid: 0, gid: 0, pid: 0 },
                username: None,
                groupname: None,
            },
            cancel: CancellationToken::new(),
            leveler,
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
    async fn no_leveler_fails() {
        let cmd = SetlogCommand;
        let err = cmd.execute(&ctx(None), &[]).await.unwrap_err();
        assert!(err.contains("no leveler"));
    }

    #[tokio::test]
    async fn no_args_shows_current_level() {
        let leveler: Arc<dyn Leveler> = Arc::new(FakeLeveler(Mutex::new("info".to_owned())));
        let cmd = SetlogCommand;
        let out = cmd.execute(&ctx(Some(leveler)), &[]).await.unwrap();
        assert_eq!(out, "info");
    }

    #[tokio::test]
    async fn invalid_level_is_rejected() {
        let leveler: Arc<dyn Leveler> = Arc::new(FakeLeveler(Mutex::new("info".to_owned())));
        let cmd = SetlogCommand;
        let err = cmd
            .execute(&ctx(Some(leveler)), &["verbose".to_owned()])
            .await
            .unwrap_err();
        assert!(err.contains("invalid level"));
    }

    #[tokio::test]
    async fn valid_level_is_set_case_insensitively() {
        let leveler: Arc<dyn Leveler> = Arc::new(FakeLeveler(Mutex::new("info".to_owned())));
        let cmd = SetlogCommand;
        let out = cmd
            .execute(&ctx(Some(Arc::clone(&leveler))), &["DEBUG".to_owned()])
            .await
            .unwrap();
        assert!(out.contains("debug"));
        assert_eq!(leveler.get(), "debug");
    }
}
