//! Async client for issuing one-shot debug commands over a Unix socket.
//!
//! Grounded on `bux::client::inner::Client`: a persistent connection
//! guarded by a `tokio::sync::Mutex` so every method takes `&self`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use xdbg_proto::{Request, Response};

use crate::error::{Error, Result};

/// Connects to a running debug server and executes commands against it.
#[derive(Debug)]
pub struct Client {
    stream: Mutex<UnixStream>,
    timeout: Duration,
}

impl Client {
    /// Dials `path`, failing if it does not resolve to a socket within
    /// `timeout`.
    pub async fn connect(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        validate_target(path)?;
        let connect = UnixStream::connect(path);
        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| Error::Timeout)??;
        Ok(Self {
            stream: Mutex::new(stream),
            timeout,
        })
    }

    /// Executes `command` with `args` and returns the decoded response.
    ///
    /// A version-mismatch error from the wire layer is rewrapped with an
    /// explanatory message so callers don't have to parse the protocol
    /// error text themselves.
    pub async fn execute(&self, command: impl Into<String>, args: Vec<String>) -> Result<Response> {
        let request = Request::with_args(command, args);
        let mut stream = self.stream.lock().await;

        let payload = xdbg_proto::encode_request(&request)?;
        tokio::time::timeout(self.timeout, stream.write_all(&payload))
            .await
            .map_err(|_| Error::Timeout)??;
        tokio::time::timeout(self.timeout, stream.flush())
            .await
            .map_err(|_| Error::Timeout)??;

        let response = tokio::time::timeout(self.timeout, xdbg_proto::decode_response(&mut *stream))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| {
                if e.is_version_mismatch() {
                    Error::InvalidMessage(format!("{e} (client/server protocol version skew)"))
                } else {
                    e.into()
                }
            })?;
        Ok(response)
    }

    /// Executes `help` and reports whether the server is reachable and
    /// responsive.
    pub async fn ping(&self) -> Result<bool> {
        let response = self.execute("help", Vec::new()).await?;
        Ok(response.success)
    }
}

/// Validates that `path` plausibly names a Unix-domain socket before
/// dialing it: must exist and be a socket file.
fn validate_target(path: &Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    let meta = std::fs::symlink_metadata(path)
        .map_err(|_| Error::InvalidSocketPath(format!("{} does not exist", path.display())))?;
    if !meta.file_type().is_socket() {
        return Err(Error::InvalidSocketPath(format!("{} is not a socket", path.display())));
    }
    Ok(())
}

/// Owner check gate for the CLI, per §9 Open Question (a): rejects
/// sockets whose owner is neither the calling uid nor a privileged uid
/// (0). Whether this is appropriate on multi-user systems is left to
/// the embedder; `xdbgctl` enables it by default (see DESIGN.md).
pub fn owner_is_caller_or_privileged(path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)?;
    let owner = meta.uid();
    let caller = nix::unistd::getuid().as_raw();
    Ok(owner == caller || owner == 0)
}

/// Default dial timeout used by `xdbgctl` when `--timeout` is omitted.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default socket path the CLI targets when `--socket` is omitted.
pub fn default_socket_path() -> PathBuf {
    PathBuf::from(crate::options::DEFAULT_SOCKET_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_nonexistent_path() {
        let err = Client::connect("/tmp/xdbg-client-test-missing.sock", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn owner_check_accepts_files_owned_by_caller() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(owner_is_caller_or_privileged(file.path()).unwrap());
    }
}
