//! `config` — dumps the embedder's current configuration verbatim.
//!
//! The framework never filters this output; if secrets need redaction,
//! that is the injected [`ConfigProvider`]'s responsibility.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registries::ConfigProvider;
use crate::registry::Command;
use crate::session::CommandContext;

/// `config` with no args dumps the provider's configuration.
pub struct ConfigCommand {
    provider: Arc<dyn ConfigProvider>,
}

impl ConfigCommand {
    /// Builds a `config` command backed by `provider`.
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Command for ConfigCommand {
    fn name(&self) -> &str {
        "config"
    }

    fn help(&self) -> &str {
        "dump the running configuration"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        if !args.is_empty() {
            return Err("usage: config".to_owned());
        }
        Ok(self.provider.dump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{IdentityInfo, PeerIdentity};
    use crate::session::ServerHandle;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct FakeProvider;
    impl ConfigProvider for FakeProvider {
        fn dump(&self) -> String {
            "listen_addr = \"0.0.0.0:8080\"\napi_key = \"super-secret\"".to_owned()
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
    async fn dumps_provider_output_unmodified() {
        let cmd = ConfigCommand::new(Arc::new(FakeProvider));
        let out = cmd.execute(&ctx(), &[]).await.unwrap();
        assert!(out.contains("api_key = \"super-secret\""));
    }

    #[tokio::test]
    async fn rejects_arguments() {
        let cmd = ConfigCommand::new(Arc::new(FakeProvider));
        let err = cmd.execute(&ctx(), &["extra".to_owned()]).await.unwrap_err();
        assert!(err.contains("usage"));
    }
}
