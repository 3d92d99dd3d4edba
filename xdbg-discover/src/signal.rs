//! Signal delivery with pre/post liveness verification (§4.8, §9 "Signal
//! side-effects"). Generalizes the `kill(pid, 0)` liveness check and
//! `kill(pid, sig)` delivery from `bux::runtime::{is_pid_alive, VmHandle::signal}`.

use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::DiscoverError;

/// Window after sending the signal before the liveness recheck. A
/// heuristic, not a guarantee: the target may have raced the signal
/// handler with an unrelated exit, or may simply be slow to die.
const POST_SIGNAL_CHECK_DELAY: Duration = Duration::from_millis(50);

/// Outcome of a verified signal delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The process was alive before and after sending the signal.
    Delivered,
    /// The process existed before the signal but was gone by the
    /// post-signal recheck. Could mean it handled the signal and exited
    /// on its own, or that the signal killed it (default SIGUSR1 action
    /// is to terminate any process that doesn't install a handler).
    ProcessExited,
}

/// Sends `signal` to `pid`, verifying liveness before and after.
///
/// Returns [`DiscoverError::NoSuchProcess`] if the process is already
/// gone before the signal would be sent (never delivers to a reused PID
/// we didn't observe as alive).
pub fn send_and_verify(pid: i32, sig: Signal) -> Result<SignalOutcome, DiscoverError> {
    let target = Pid::from_raw(pid);

    if !is_alive(target) {
        return Err(DiscoverError::NoSuchProcess(pid));
    }

    signal::kill(target, sig)?;
    thread::sleep(POST_SIGNAL_CHECK_DELAY);

    if is_alive(target) {
        Ok(SignalOutcome::Delivered)
    } else {
        Ok(SignalOutcome::ProcessExited)
    }
}

/// Checks liveness via `kill(pid, 0)`, which delivers no signal but
/// fails with `ESRCH` if the process doesn't exist.
fn is_alive(pid: Pid) -> bool {
    signal::kill(pid, None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(Pid::this()));
    }

    #[test]
    fn nonexistent_pid_is_not_signalable() {
        // PID 1 is init and exists on any real system; use an absurdly
        // high PID unlikely to be assigned instead.
        let bogus = 2_000_000_000;
        let err = send_and_verify(bogus, Signal::SIGUSR1).unwrap_err();
        assert!(matches!(err, DiscoverError::NoSuchProcess(p) if p == bogus));
    }
}
