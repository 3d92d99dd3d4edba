//! `help` — with no args, list every command alphabetically with its
//! one-line help; with a name, show that command's help.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registry::{Command, CommandRegistry};
use crate::session::CommandContext;

/// Always-essential `help` command; needs the registry itself to
/// enumerate what else is registered.
pub struct HelpCommand {
    registry: Arc<CommandRegistry>,
}

impl HelpCommand {
    /// Builds a `help` command backed by `registry`.
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn help(&self) -> &str {
        "list commands, or show help for one command"
    }

    async fn execute(&self, _ctx: &CommandContext, args: &[String]) -> Result<String, String> {
        if let Some(name) = args.first() {
            return self
                .registry
                .get(name)
                .map(|cmd| format!("{name}: {}", cmd.help()))
                .ok_or_else(|| format!("unknown command: {name}"));
        }

        let mut lines = Vec::new();
        for cmd in self.registry.commands() {
            lines.push(format!("{:<12} {}", cmd.name(), cmd.help()));
        }
        Ok(lines.join("\n"))
    }
}
