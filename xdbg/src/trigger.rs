//! External trigger source: produces Enable/Disable/Toggle events that
//! drive the server's state machine from outside.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// An event emitted by a [`Trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Move to `Listening` if not already there.
    Enable,
    /// Move to `Started` if currently `Listening`.
    Disable,
    /// `Enable` if not currently `Listening`, else `Disable`.
    Toggle,
}

/// Source of external trigger events. The default implementation wraps
/// a POSIX signal (SIGUSR1 → Toggle); a caller may inject any other
/// implementation via `ServerOptions`.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Awaits the next event, or `None` once the source is exhausted
    /// (e.g. the signal stream was closed).
    async fn recv(&mut self) -> Option<Event>;

    /// Releases any held OS resources (signal handlers, channels).
    /// Idempotent.
    fn close(&mut self) {}
}

/// Default trigger: SIGUSR1 mapped to [`Event::Toggle`].
pub struct SignalTrigger {
    signal: tokio::signal::unix::Signal,
}

impl SignalTrigger {
    /// Installs a SIGUSR1 handler.
    pub fn new() -> std::io::Result<Self> {
        let signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())?;
        Ok(Self { signal })
    }
}

#[async_trait]
impl Trigger for SignalTrigger {
    async fn recv(&mut self) -> Option<Event> {
        self.signal.recv().await.map(|()| Event::Toggle)
    }
}

impl std::fmt::Debug for SignalTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalTrigger").finish_non_exhaustive()
    }
}

/// A programmatic trigger: events are pushed in-process via an
/// [`mpsc`] channel, for embedders that want to drive the state
/// machine from their own code rather than a signal.
#[derive(Debug)]
pub struct ChannelTrigger {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl ChannelTrigger {
    /// Creates a trigger and a sender handle for driving it.
    pub fn channel() -> (mpsc::UnboundedSender<Event>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl Trigger for ChannelTrigger {
    async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    fn close(&mut self) {
        self.rx.close();
    }
}

/// Resolves a [`Event::Toggle`] against current listening state.
pub fn resolve_toggle(is_listening: bool) -> Event {
    if is_listening {
        Event::Disable
    } else {
        Event::Enable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_trigger_delivers_pushed_events() {
        let (tx, mut trigger) = ChannelTrigger::channel();
        tx.send(Event::Enable).unwrap();
        assert_eq!(trigger.recv().await, Some(Event::Enable));
    }

    #[tokio::test]
    async fn channel_trigger_ends_when_sender_dropped() {
        let (tx, mut trigger) = ChannelTrigger::channel();
        drop(tx);
        assert_eq!(trigger.recv().await, None);
    }

    #[test]
    fn toggle_resolves_against_listening_state() {
        assert_eq!(resolve_toggle(true), Event::Disable);
        assert_eq!(resolve_toggle(false), Event::Enable);
    }
}
