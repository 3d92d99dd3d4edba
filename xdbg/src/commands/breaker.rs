//! `breaker` — list/detail/reset circuit breakers, registered only when
//! a [`BreakerRegistry`] is injected.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registries::BreakerRegistry;
use crate::registry::Command;
use crate::session::CommandContext;

/// `breaker` with no args lists names; `breaker <name>` shows detail;
/// `breaker <name> reset` resets it.
pub struct BreakerCommand {
    registry: Arc<dyn BreakerRegistry>,
}

impl BreakerCommand {
    /// Builds a `breaker` command backed by `registry`.
    pub fn new(registry: Arc<dyn BreakerRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for BreakerCommand {
    fn name(&self) -> &str {
        "breaker"
    }

    fn help(&self) -> &str {
        "list, inspect, or reset circuit breakers"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        match args {
            [] => {
                let mut names = self.registry.list();
                names.sort();
                Ok(names.join("\n"))
            }
            [name] => self
                .registry
                .get(name)
                .map(|info| format!("{}: state={} failures={}", info.name, info.state, info.failure_count))
                .ok_or_else(|| format!("unknown breaker: {name}")),
            [name, action] if action == "reset" => self.registry.reset(name).map(|()| format!("{name}: reset")),
            _ => Err("usage: breaker [<name> [reset]]".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::registries::BreakerInfo;
    use crate::session::ServerHandle;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct FakeRegistry;
    impl BreakerRegistry for FakeRegistry {
        fn list(&self) -> Vec<String> {
            vec!["db".to_owned()]
        }
        fn get(&self, name: &str) -> Option<BreakerInfo> {
            (name == "db").then(|| BreakerInfo {
                name: "db".to_owned(),
                state: "closed".to_owned(),
                failure_count: 0,
            })
        }
        fn reset(&self, name: &str) -> Result<(), String> {
            if name == "db" {
                Ok(())
            } else {
                Err("unknown".to_owned())
            }
        }
    }

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
    async fn lists_names() {
        let cmd = BreakerCommand::new(Arc::new(FakeRegistry));
        assert_eq!(cmd.execute(&ctx(), &[]).await.unwrap(), "db");
    }

    #[tokio::test]
    async fn shows_detail() {
        let cmd = BreakerCommand::new(Arc::new(FakeRegistry));
        let out = cmd.execute(&ctx(), &["db".to_owned()]).await.unwrap();
        assert!(out.contains("state=closed"));
    }

    #[tokio::test]
    async fn resets_by_name() {
        let cmd = BreakerCommand::new(Arc::new(FakeRegistry));
        let out = cmd.execute(&ctx(), &["db".to_owned(), "reset".to_owned()]).await.unwrap();
        assert_eq!(out, "db: reset");
    }
}
