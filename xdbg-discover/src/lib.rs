//! Process discovery for the xdbg control CLI (§4.8).
//!
//! Two independent lookup strategies, tried in strict priority order by
//! the caller (an explicit `--pid` always wins over both):
//!
//! - [`by_name::find_by_name`] scans `/proc` for a process whose compact
//!   command name matches exactly.
//! - [`by_socket::find_by_socket`] cross-references the kernel's
//!   Unix-socket inode table (`/proc/net/unix`) with each process's open
//!   file descriptors, since a `stat()` on the socket path yields a
//!   filesystem inode in a different namespace than the kernel socket
//!   inode exposed via `/proc` (see spec §9 design rationale).
//!
//! Grounded on the `kill(pid, 0)` liveness idiom used throughout
//! `bux::runtime::is_pid_alive`, generalized here into [`signal::send_and_verify`].

mod by_name;
mod by_socket;
mod container;
mod error;
mod proc_table;
mod signal;

pub use by_name::find_by_name;
pub use by_socket::find_by_socket;
pub use container::{ContainerHint, detect_container};
pub use error::DiscoverError;
pub use signal::{SignalOutcome, send_and_verify};
