//! Built-in and integration [`crate::registry::Command`] implementations.

mod breaker;
mod cache;
mod config_cmd;
mod exit;
mod freemem;
mod help;
mod limit;
mod pprof;
mod setlog;
mod stack;
mod version;

pub use breaker::BreakerCommand;
pub use cache::CacheCommand;
pub use config_cmd::ConfigCommand;
pub use exit::ExitCommand;
pub use freemem::FreememCommand;
pub use help::HelpCommand;
pub use limit::LimitCommand;
pub use pprof::PprofCommand;
pub use setlog::SetlogCommand;
pub use stack::StackCommand;
pub use version::VersionCommand;
