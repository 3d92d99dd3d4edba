//! `cache` — list/detail registered caches with computed hit rate,
//! registered only when a [`CacheRegistry`] is injected.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registries::CacheRegistry;
use crate::registry::Command;
use crate::session::CommandContext;

/// `cache` with no args lists names with hit rate; `cache <name>` shows
/// detail.
pub struct CacheCommand {
    registry: Arc<dyn CacheRegistry>,
}

impl CacheCommand {
    /// Builds a `cache` command backed by `registry`.
    pub fn new(registry: Arc<dyn CacheRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for CacheCommand {
    fn name(&self) -> &str {
        "cache"
    }

    fn help(&self) -> &str {
        "list or inspect caches and their hit rates"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        match args {
            [] => {
                let mut names = self.registry.list();
                names.sort();
                let mut lines = Vec::new();
                for name in names {
                    if let Some(info) = self.registry.get(&name) {
                        lines.push(format!("{}: {:.1}% hit rate", info.name, info.hit_rate()));
                    }
                }
                Ok(lines.join("\n"))
            }
            [name] => self
                .registry
                .get(name)
                .map(|info| {
                    format!(
                        "{}: hits={} misses={} size={} hit_rate={:.1}%",
                        info.name,
                        info.hits,
                        info.misses,
                        info.size,
                        info.hit_rate()
                    )
                })
                .ok_or_else(|| format!("unknown cache: {name}")),
            _ => Err("usage: cache [<name>]".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::registries::CacheInfo;
    use crate::session::ServerHandle;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct FakeRegistry;
    impl CacheRegistry for FakeRegistry {
        fn list(&self) -> Vec<String> {
            vec!["users".to_owned(), "empty".to_owned()]
        }
        fn get(&self, name: &str) -> Option<CacheInfo> {
            match name {
                "users" => Some(CacheInfo {
                    name: "users".to_owned(),
                    hits: 3,
                    misses: 1,
                    size: 10,
                }),
                "empty" => Some(CacheInfo {
                    name: "empty".to_owned(),
                    hits: 0,
                    misses: 0,
                    size: 0,
                }),
                _ => None,
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
    async fn list_includes_hit_rate_for_every_cache() {
        let cmd = CacheCommand::new(Arc::new(FakeRegistry));
        let out = cmd.execute(&ctx(), &[]).await.unwrap();
        assert!(out.contains("users: 75.0% hit rate"));
        assert!(out.contains("empty: 0.0% hit rate"));
    }

    #[tokio::test]
    async fn detail_includes_raw_counters() {
        let cmd = CacheCommand::new(Arc::new(FakeRegistry));
        let out = cmd.execute(&ctx(), &["users".to_owned()]).await.unwrap();
        assert!(out.contains("hits=3"));
        assert!(out.contains("hit_rate=75.0%"));
    }
}
