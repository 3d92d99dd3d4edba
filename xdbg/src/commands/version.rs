//! `version` — reports the embedding crate's version and the wire
//! protocol version, mirroring a liveness-probe reply.

use async_trait::async_trait;

use crate::registry::Command;
use crate::session::CommandContext;

/// Always-available `version` command.
#[derive(Debug, Default)]
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    fn name(&self) -> &str {
        "version"
    }

    fn help(&self) -> &str {
        "show the server and protocol version"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        if !args.is_empty() {
            return Err("usage: version".to_owned());
        }
        Ok(format!(
            "xdbg {} (protocol v{})",
            env!("CARGO_PKG_VERSION"),
            xdbg_proto::VERSION,
        ))
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
    async fn reports_crate_and_protocol_version() {
        let cmd = VersionCommand;
        let out = cmd.execute(&ctx(), &[]).await.unwrap();
        assert!(out.starts_with("xdbg "));
        assert!(out.contains("protocol v"));
    }
}
