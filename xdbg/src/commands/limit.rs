//! `limit` — list/detail registered rate or concurrency limiters,
//! registered only when a [`LimitRegistry`] is injected.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registries::LimitRegistry;
use crate::registry::Command;
use crate::session::CommandContext;

/// `limit` with no args lists names; `limit <name>` shows detail.
pub struct LimitCommand {
    registry: Arc<dyn LimitRegistry>,
}

impl LimitCommand {
    /// Builds a `limit` command backed by `registry`.
    pub fn new(registry: Arc<dyn LimitRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for LimitCommand {
    fn name(&self) -> &str {
        "limit"
    }

    fn help(&self) -> &str {
        "list or inspect rate/concurrency limiters"
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
                .map(|info| format!("{}: {}/{}", info.name, info.in_use, info.limit))
                .ok_or_else(|| format!("unknown limiter: {name}")),
            _ => Err("usage: limit [<name>]".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::registries::LimitInfo;
    use crate::session::ServerHandle;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct FakeRegistry;
    impl LimitRegistry for FakeRegistry {
        fn list(&self) -> Vec<String> {
            vec!["api".to_owned()]
        }
        fn get(&self, name: &str) -> Option<LimitInfo> {
            (name == "api").then(|| LimitInfo {
                name: "api".to_owned(),
                limit: 100,
                in_use: 42,
            })
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
    async fn shows_usage_over_limit() {
        let cmd = LimitCommand::new(Arc::new(FakeRegistry));
        let out = cmd.execute(&ctx(), &["api".to_owned()]).await.unwrap();
        assert_eq!(out, "api: 42/100");
    }

    #[tokio::test]
    async fn unknown_name_fails() {
        let cmd = LimitCommand::new(Arc::new(FakeRegistry));
        let err = cmd.execute(&ctx(), &["nope".to_owned()]).await.unwrap_err();
        assert!(err.contains("unknown limiter"));
    }
}
