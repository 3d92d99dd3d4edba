//! Command trait and the name→command registry with whitelist admission.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::session::CommandContext;

/// A debug command, executed with its arguments against a running server.
///
/// `async-trait` backs this so commands can be stored as `dyn Command`
/// trait objects inside the registry while still awaiting I/O (stack
/// dumps, profile writes) in `execute` — native `async fn` in traits
/// isn't dyn-compatible.
#[async_trait]
pub trait Command: Send + Sync {
    /// The command's registered name.
    fn name(&self) -> &str;

    /// A one-line help string shown by `help`.
    fn help(&self) -> &str;

    /// Runs the command, returning its textual output or an error message.
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> Result<String, String>;
}

/// Name→command map with whitelist-based admission control.
///
/// Thread-safe via an internal `RwLock`: readers (dispatch, `help`) take
/// a shared lock, `Register`/`Unregister`/`SetWhitelist` take an
/// exclusive one.
#[derive(Debug)]
pub struct CommandRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    commands: HashMap<String, std::sync::Arc<dyn Command>>,
    whitelist: Option<HashSet<String>>,
}

impl std::fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command").field("name", &self.name()).finish()
    }
}

/// Command names always admitted regardless of whitelist.
pub const ESSENTIAL_COMMANDS: [&str; 2] = ["help", "exit"];

impl CommandRegistry {
    /// Creates an empty registry with no whitelist (admit-all).
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registers `cmd`, overwriting any existing command of the same name.
    /// A command with an empty name is rejected rather than silently
    /// dropped, matching the framework's `ErrEmptyCommandName`.
    pub fn register(&self, cmd: std::sync::Arc<dyn Command>) -> crate::error::Result<()> {
        if cmd.name().is_empty() {
            return Err(crate::error::Error::EmptyCommandName);
        }
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.commands.insert(cmd.name().to_owned(), cmd);
        Ok(())
    }

    /// Removes a command by name; no-op if absent.
    pub fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.commands.remove(name);
    }

    /// Looks up a command by name.
    pub fn get(&self, name: &str) -> Option<std::sync::Arc<dyn Command>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.commands.get(name).cloned()
    }

    /// True if a command by this name is registered.
    pub fn has(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.commands.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut names: Vec<String> = inner.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered commands, sorted by name.
    pub fn commands(&self) -> Vec<std::sync::Arc<dyn Command>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut cmds: Vec<_> = inner.commands.values().cloned().collect();
        cmds.sort_by(|a, b| a.name().cmp(b.name()));
        cmds
    }

    /// Sets the admission whitelist.
    ///
    /// `None` means "admit all commands"; `Some(empty)` means "admit only
    /// the essentials". This asymmetry is deliberate — collapsing the two
    /// would let an uninitialized/empty list accidentally authorize every
    /// command.
    pub fn set_whitelist(&self, whitelist: Option<HashSet<String>>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.whitelist = whitelist;
    }

    /// True iff `name` is essential, or the whitelist is `None`, or `name`
    /// is in the whitelist.
    pub fn is_allowed(&self, name: &str) -> bool {
        if ESSENTIAL_COMMANDS.contains(&name) {
            return true;
        }
        let inner = self.inner.read().expect("registry lock poisoned");
        match &inner.whitelist {
            None => true,
            Some(set) => set.contains(name),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);

    #[async_trait]
    impl Command for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn help(&self) -> &str {
            "stub"
        }
        async fn execute(&self, _ctx: &CommandContext, _args: &[String]) -> Result<String, String> {
            Ok(String::new())
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let reg = CommandRegistry::new();
        reg.register(std::sync::Arc::new(Stub("stack"))).unwrap();
        assert!(reg.has("stack"));
        assert_eq!(reg.get("stack").unwrap().name(), "stack");
    }

    #[test]
    fn empty_name_is_rejected() {
        let reg = CommandRegistry::new();
        let err = reg.register(std::sync::Arc::new(Stub(""))).unwrap_err();
        assert!(matches!(err, crate::error::Error::EmptyCommandName));
    }

    #[test]
    fn duplicate_name_overwrites() {
        let reg = CommandRegistry::new();
        reg.register(std::sync::Arc::new(Stub("stack"))).unwrap();
        reg.register(std::sync::Arc::new(Stub("stack"))).unwrap();
        assert_eq!(reg.list(), vec!["stack"]);
    }

    #[test]
    fn list_is_sorted() {
        let reg = CommandRegistry::new();
        reg.register(std::sync::Arc::new(Stub("stack"))).unwrap();
        reg.register(std::sync::Arc::new(Stub("exit"))).unwrap();
        reg.register(std::sync::Arc::new(Stub("help"))).unwrap();
        assert_eq!(reg.list(), vec!["exit", "help", "stack"]);
    }

    #[test]
    fn null_whitelist_admits_all() {
        let reg = CommandRegistry::new();
        reg.set_whitelist(None);
        assert!(reg.is_allowed("anything"));
    }

    #[test]
    fn empty_whitelist_admits_only_essentials() {
        let reg = CommandRegistry::new();
        reg.set_whitelist(Some(HashSet::new()));
        assert!(reg.is_allowed("help"));
        assert!(reg.is_allowed("exit"));
        assert!(!reg.is_allowed("stack"));
    }

    #[test]
    fn nonempty_whitelist_admits_essentials_plus_listed() {
        let reg = CommandRegistry::new();
        let mut wl = HashSet::new();
        wl.insert("stack".to_owned());
        reg.set_whitelist(Some(wl));
        assert!(reg.is_allowed("help"));
        assert!(reg.is_allowed("stack"));
        assert!(!reg.is_allowed("freemem"));
    }
}
