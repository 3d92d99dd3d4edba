//! `exit` — schedules a deferred `Disable` so the "shutting down" reply
//! can flush before the listener actually closes.

use std::time::Duration;

use async_trait::async_trait;

use crate::registry::Command;
use crate::session::CommandContext;

/// Delay between replying and actually disabling the listener.
const DISABLE_DELAY: Duration = Duration::from_millis(100);

/// Always-essential `exit` command.
#[derive(Debug, Default)]
pub struct ExitCommand;

#[async_trait]
impl Command for ExitCommand {
    fn name(&self) -> &str {
        "exit"
    }

    fn help(&self) -> &str {
        "disable the debug listener"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> Result<String, String> {
        // Scheduled through the server's wait group so a concurrent Stop
        // can never race an exit that fires after teardown has begun.
        ctx.server.schedule_disable(DISABLE_DELAY);
        Ok("shutting down".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    #[tokio::test]
    async fn schedules_a_deferred_disable() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let ctx = CommandContext {
            peer: crate::peer::IdentityInfo {
                identity: crate::peer::PeerIdentity { uid: 0, gid: 0, pid: 0 },
                username: None,
                groupname: None,
            },
            cancel: CancellationToken::new(),
            leveler: None,
            breaker_registry: None,
            limit_registry: None,
            cache_registry: None,
            config_provider: None,
            server: crate::session::ServerHandle {
                tasks: TaskTracker::new(),
                root_cancel: CancellationToken::new(),
                disable: Arc::new(move || fired_clone.store(true, Ordering::SeqCst)),
            },
        };
        let cmd = ExitCommand;
        let output = cmd.execute(&ctx, &[]).await.unwrap();
        assert_eq!(output, "shutting down");
        ctx.server.tasks.close();
        ctx.server.tasks.wait().await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
