//! Peer credential capture for audit purposes only — never authorization.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;

/// Kernel-reported credentials of a connected client.
///
/// `pid` is `0` on platforms where the kernel doesn't expose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Peer user id.
    pub uid: u32,
    /// Peer group id.
    pub gid: u32,
    /// Peer process id, or `0` if unavailable.
    pub pid: i32,
}

/// [`PeerIdentity`] plus best-effort resolved names, used only to build
/// human-readable audit strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    /// The raw numeric identity.
    pub identity: PeerIdentity,
    /// Resolved username, if lookup succeeded.
    pub username: Option<String>,
    /// Resolved group name, if lookup succeeded.
    pub groupname: Option<String>,
}

impl IdentityInfo {
    /// Resolves `identity`'s uid/gid to names via `nix::unistd`, falling
    /// back to `None` on lookup failure (never an error: this is
    /// audit-only best-effort).
    pub fn resolve(identity: PeerIdentity) -> Self {
        let username = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(identity.uid))
            .ok()
            .flatten()
            .map(|u| u.name);
        let groupname = nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(identity.gid))
            .ok()
            .flatten()
            .map(|g| g.name);
        Self {
            identity,
            username,
            groupname,
        }
    }

    /// Formats `uid(username)` for audit lines, falling back to the bare
    /// number when the name couldn't be resolved.
    pub fn display_user(&self) -> String {
        match &self.username {
            Some(name) => format!("{}({name})", self.identity.uid),
            None => self.identity.uid.to_string(),
        }
    }
}

/// Captures the peer's credentials from an accepted Unix stream via
/// `SO_PEERCRED` (Linux) / `LOCAL_PEERCRED` (BSD/macOS), both exposed
/// uniformly by `UnixStream::peer_cred` in `tokio`/`std`.
///
/// On a platform lacking this API, substitutes the server's own identity
/// and sets `pid = 0`, per §6 "Peer identity".
pub fn capture(stream: &UnixStream) -> PeerIdentity {
    match stream.peer_cred() {
        Ok(cred) => PeerIdentity {
            uid: cred.uid(),
            gid: cred.gid(),
            pid: cred.pid().unwrap_or(0),
        },
        Err(_) => fallback_identity(),
    }
}

fn fallback_identity() -> PeerIdentity {
    static FALLBACK: OnceLock<PeerIdentity> = OnceLock::new();
    *FALLBACK.get_or_init(|| PeerIdentity {
        uid: nix::unistd::getuid().as_raw(),
        gid: nix::unistd::getgid().as_raw(),
        pid: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_never_panics_on_bogus_ids() {
        let info = IdentityInfo::resolve(PeerIdentity {
            uid: u32::MAX,
            gid: u32::MAX,
            pid: 0,
        });
        assert!(info.username.is_none());
    }

    #[test]
    fn display_user_falls_back_to_number() {
        let info = IdentityInfo {
            identity: PeerIdentity {
                uid: 424_242,
                gid: 0,
                pid: 0,
            },
            username: None,
            groupname: None,
        };
        assert_eq!(info.display_user(), "424242");
    }
}
