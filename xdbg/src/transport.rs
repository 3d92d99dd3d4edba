//! Stream-socket transport: listener lifecycle, path validation, and
//! idempotent close.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};

use crate::error::{Error, Result};

/// Prefixes a socket path must never fall under.
const RESERVED_PREFIXES: [&str; 8] = ["/etc", "/usr", "/bin", "/sbin", "/boot", "/proc", "/sys", "/dev"];

/// Validates a candidate socket path per §6: must be absolute,
/// non-empty, free of `..` components, and outside reserved system
/// directories.
pub fn validate_socket_path(path: &Path) -> Result<()> {
    let display = path.display().to_string();
    if display.is_empty() {
        return Err(Error::InvalidSocketPath("path is empty".to_owned()));
    }
    if !path.is_absolute() {
        return Err(Error::InvalidSocketPath(format!("{display} is not absolute")));
    }
    if path.components().any(|c| c.as_os_str() == "..") {
        return Err(Error::InvalidSocketPath(format!("{display} contains '..'")));
    }
    if RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return Err(Error::InvalidSocketPath(format!(
            "{display} falls under a reserved system directory"
        )));
    }
    Ok(())
}

/// Validates a candidate socket file mode: any "others" bit
/// (`& 0o007 != 0`) is rejected; owner and group bits are unrestricted.
pub fn validate_socket_mode(mode: u32) -> Result<()> {
    if mode & 0o007 != 0 {
        return Err(Error::ModeTooPermissive(mode));
    }
    Ok(())
}

/// A listening transport over which sessions are accepted.
///
/// The server owns the default [`UnixTransport`] exclusively; an
/// injected implementation stays owned by the caller, and the server
/// must not recreate it after `close`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Binds and begins listening.
    async fn listen(&mut self) -> Result<()>;

    /// Accepts the next connection.
    async fn accept(&mut self) -> Result<UnixStream>;

    /// Stops listening. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// The default Unix-domain-socket transport.
#[derive(Debug)]
pub struct UnixTransport {
    path: PathBuf,
    mode: u32,
    listener: Option<UnixListener>,
    closed: bool,
}

impl UnixTransport {
    /// Creates a transport bound to `path` with file mode `mode`, validating
    /// both up front.
    pub fn new(path: PathBuf, mode: u32) -> Result<Self> {
        validate_socket_path(&path)?;
        validate_socket_mode(mode)?;
        Ok(Self {
            path,
            mode,
            listener: None,
            closed: false,
        })
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for UnixTransport {
    async fn listen(&mut self) -> Result<()> {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_socket() => {
                std::fs::remove_file(&self.path)?;
            }
            Ok(_) => {
                return Err(Error::InvalidSocketPath(format!(
                    "{} exists and is not a socket",
                    self.path.display()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(&self.path)?;
        std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(self.mode))?;
        self.listener = Some(listener);
        self.closed = false;
        Ok(())
    }

    async fn accept(&mut self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or(Error::NotRunning)?;
        let (stream, _addr) = listener.accept().await?;
        Ok(stream)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.listener = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(_) if !self.path.exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

trait FileTypeExt {
    fn is_socket(&self) -> bool;
}

impl FileTypeExt for std::fs::FileType {
    fn is_socket(&self) -> bool {
        <std::fs::FileType as std::os::unix::fs::FileTypeExt>::is_socket(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_path() {
        let err = validate_socket_path(Path::new("rel.sock")).unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn rejects_dotdot() {
        let err = validate_socket_path(Path::new("/tmp/../etc/x.sock")).unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn rejects_reserved_prefix() {
        let err = validate_socket_path(Path::new("/proc/x.sock")).unwrap_err();
        assert!(matches!(err, Error::InvalidSocketPath(_)));
    }

    #[test]
    fn accepts_ordinary_absolute_path() {
        assert!(validate_socket_path(Path::new("/var/run/xdbg.sock")).is_ok());
    }

    #[test]
    fn rejects_world_any_bit() {
        assert!(validate_socket_mode(0o600).is_ok());
        assert!(validate_socket_mode(0o660).is_ok());
        assert!(validate_socket_mode(0o604).is_err());
        assert!(validate_socket_mode(0o602).is_err());
        assert!(validate_socket_mode(0o601).is_err());
    }

    #[tokio::test]
    async fn listen_accept_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xdbg.sock");
        let mut transport = UnixTransport::new(path.clone(), 0o600).unwrap();
        transport.listen().await.unwrap();
        assert!(path.exists());

        let connector = path.clone();
        let client = tokio::spawn(async move { UnixStream::connect(connector).await });
        let accepted = transport.accept().await;
        let _client = client.await.unwrap().unwrap();
        assert!(accepted.is_ok());

        transport.close().await.unwrap();
        assert!(!path.exists());
        // Idempotent.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn listen_replaces_a_stale_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xdbg.sock");
        {
            let mut first = UnixTransport::new(path.clone(), 0o600).unwrap();
            first.listen().await.unwrap();
            // Drop without close: leaves a stale socket file + bound listener.
        }
        let mut second = UnixTransport::new(path.clone(), 0o600).unwrap();
        second.listen().await.unwrap();
        second.close().await.unwrap();
    }
}
