//! `SshSession` on top of libssh2
//!
//! libssh2 is blocking, so every call runs on tokio's blocking pool. The
//! session sits behind its own mutex to move it in and out of those tasks.
//! A clone of the TCP socket is kept outside that mutex so `close` can cut
//! off an exec that is still reading.

use std::fmt::Write as _;
use std::io::Read;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use ssh2::{CheckResult, HashType, KnownHostFileKind, Session};

use super::{ConnectParams, ExecOutput, HostKeyPolicy, SshAuth, SshSession};
use crate::error::{ConnectError, SshError};

/// An [`SshSession`] backed by the `ssh2` crate
#[derive(Default)]
pub struct Libssh2Session {
    session: Arc<Mutex<Option<Session>>>,
    socket: Arc<Mutex<Option<TcpStream>>>,
}

impl Libssh2Session {
    /// Creates a closed session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shuts the socket down so blocked reads on it fail immediately
    fn shutdown_socket(&self) {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(socket) = socket
            && let Err(e) = socket.shutdown(Shutdown::Both)
        {
            tracing::debug!(error = %e, "Socket already shut down");
        }
    }
}

impl std::fmt::Debug for Libssh2Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self
            .session
            .lock()
            .map(|session| session.is_some())
            .unwrap_or(false);
        f.debug_struct("Libssh2Session").field("open", &open).finish()
    }
}

#[async_trait]
impl SshSession for Libssh2Session {
    async fn connect(&mut self, params: &ConnectParams) -> Result<(), ConnectError> {
        self.shutdown_socket();
        let slot = Arc::clone(&self.session);
        let socket_slot = Arc::clone(&self.socket);
        let params = params.clone();
        let host = params.host.clone();
        tokio::task::spawn_blocking(move || {
            let (session, socket) = open_session(&params)?;
            *socket_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(socket);
            let previous = slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(session);
            if let Some(previous) = previous {
                let _ = previous.disconnect(None, "reconnecting", None);
            }
            Ok(())
        })
        .await
        .map_err(|e| ConnectError::Connect {
            host,
            reason: format!("connect task failed: {e}"),
        })?
    }

    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, SshError> {
        let session = Arc::clone(&self.session);
        let command = command.to_string();
        tokio::task::spawn_blocking(move || {
            let guard = session.lock().unwrap_or_else(PoisonError::into_inner);
            let session = guard.as_ref().ok_or(SshError::NotOpen)?;
            run_command(session, &command, timeout)
        })
        .await
        .map_err(|e| SshError::Transport(format!("exec task failed: {e}")))?
    }

    async fn close(&mut self) -> Result<(), SshError> {
        let idle = match self.session.try_lock() {
            Ok(mut slot) => Some(slot.take()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().take()),
            Err(TryLockError::WouldBlock) => None,
        };

        let result = match idle {
            Some(Some(session)) => tokio::task::spawn_blocking(move || {
                session
                    .disconnect(None, "closing", None)
                    .map_err(|e| SshError::Transport(e.to_string()))
            })
            .await
            .map_err(|e| SshError::Transport(format!("close task failed: {e}")))?,
            Some(None) => Ok(()),
            None => {
                // An abandoned exec still holds the session; cut it off first
                tracing::debug!("Exec still running, shutting the socket down");
                self.shutdown_socket();
                let slot = Arc::clone(&self.session);
                tokio::task::spawn_blocking(move || {
                    drop(slot.lock().unwrap_or_else(PoisonError::into_inner).take());
                })
                .await
                .map_err(|e| SshError::Transport(format!("close task failed: {e}")))
            }
        };
        self.shutdown_socket();
        result
    }
}

fn open_session(params: &ConnectParams) -> Result<(Session, TcpStream), ConnectError> {
    let connect_error = |reason: String| ConnectError::Connect {
        host: params.host.clone(),
        reason,
    };

    let address = (params.host.as_str(), params.port)
        .to_socket_addrs()
        .map_err(|e| connect_error(format!("cannot resolve: {e}")))?
        .next()
        .ok_or_else(|| connect_error("no address found".to_string()))?;
    let tcp = TcpStream::connect_timeout(&address, params.timeout)
        .map_err(|e| connect_error(e.to_string()))?;

    let socket = tcp
        .try_clone()
        .map_err(|e| connect_error(e.to_string()))?;

    let mut session = Session::new().map_err(|e| connect_error(e.to_string()))?;
    session.set_timeout(millis(params.timeout));
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| connect_error(format!("handshake failed: {e}")))?;

    verify_host_key(&session, params)?;
    authenticate(&session, params)?;

    tracing::debug!(host = %params.host, port = params.port, "SSH session established");
    Ok((session, socket))
}

fn verify_host_key(session: &Session, params: &ConnectParams) -> Result<(), ConnectError> {
    let connect_error = |reason: String| ConnectError::Connect {
        host: params.host.clone(),
        reason,
    };

    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| connect_error("server sent no host key".to_string()))?;
    let fingerprint = session
        .host_key_hash(HashType::Sha256)
        .map(fingerprint)
        .unwrap_or_default();

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| connect_error(e.to_string()))?;
    let path = params.host_key_policy.known_hosts_path();
    if let Some(path) = &path
        && path.exists()
    {
        known_hosts
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| connect_error(format!("cannot read {}: {e}", path.display())))?;
    }

    match known_hosts.check_port(&params.host, params.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => Err(connect_error(format!(
            "host key mismatch (SHA256 {fingerprint})"
        ))),
        CheckResult::Failure => Err(connect_error("host key check failed".to_string())),
        CheckResult::NotFound => match params.host_key_policy {
            HostKeyPolicy::AutoAdd => {
                tracing::info!(host = %params.host, %fingerprint, "Adding unknown host key");
                let entry = if params.port == super::DEFAULT_PORT {
                    params.host.clone()
                } else {
                    format!("[{}]:{}", params.host, params.port)
                };
                let stored = known_hosts
                    .add(&entry, key, "added by remotectl", key_type.into())
                    .and_then(|()| match &path {
                        Some(path) => known_hosts.write_file(path, KnownHostFileKind::OpenSSH),
                        None => Ok(()),
                    });
                if let Err(e) = stored {
                    tracing::warn!(host = %params.host, error = %e, "Cannot store host key");
                }
                Ok(())
            }
            HostKeyPolicy::RejectUnknown | HostKeyPolicy::KnownHosts(_) => {
                Err(ConnectError::HostKeyUnknown {
                    host: params.host.clone(),
                    fingerprint,
                })
            }
        },
    }
}

fn authenticate(session: &Session, params: &ConnectParams) -> Result<(), ConnectError> {
    let result = match &params.auth {
        SshAuth::Password(password) => {
            session.userauth_password(&params.username, password.expose_secret())
        }
        SshAuth::KeyFile { path, passphrase } => session.userauth_pubkey_file(
            &params.username,
            None,
            path,
            passphrase.as_ref().map(ExposeSecret::expose_secret),
        ),
        SshAuth::Agent => session.userauth_agent(&params.username),
    };

    let auth_error = |reason: String| ConnectError::Auth {
        host: params.host.clone(),
        user: params.username.clone(),
        reason,
    };
    result.map_err(|e| auth_error(e.message().to_string()))?;
    if session.authenticated() {
        Ok(())
    } else {
        Err(auth_error("server did not accept the credentials".to_string()))
    }
}

fn run_command(session: &Session, command: &str, timeout: Duration) -> Result<ExecOutput, SshError> {
    let transport = |e: &dyn std::fmt::Display| SshError::Transport(e.to_string());
    let deadline = Instant::now() + timeout;

    session.set_timeout(millis(timeout));
    let mut channel = session.channel_session().map_err(|e| transport(&e))?;
    channel.exec(command).map_err(|e| transport(&e))?;

    let stdout = read_until(session, &mut channel, deadline, timeout);
    let stdout = match stdout {
        Ok(stdout) => stdout,
        Err(e) => {
            let _ = channel.close();
            return Err(e);
        }
    };
    let stderr = read_until(session, &mut channel.stderr(), deadline, timeout);
    let stderr = match stderr {
        Ok(stderr) => stderr,
        Err(e) => {
            let _ = channel.close();
            return Err(e);
        }
    };

    channel.wait_close().map_err(|e| transport(&e))?;
    let exit_code = channel.exit_status().map_err(|e| transport(&e))?;
    Ok(ExecOutput::from_streams(
        &String::from_utf8_lossy(&stdout),
        &String::from_utf8_lossy(&stderr),
        exit_code,
    ))
}

/// Reads `reader` to EOF, giving up once `deadline` passes.
///
/// The libssh2 timeout only bounds a single blocking call, so a command
/// that keeps writing would otherwise never be cut off.
fn read_until(
    session: &Session,
    reader: &mut impl Read,
    deadline: Instant,
    timeout: Duration,
) -> Result<Vec<u8>, SshError> {
    let mut out = Vec::new();
    let mut buf = [0_u8; 8192];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SshError::Deadline(timeout));
        }
        // 0 would mean no timeout at all
        session.set_timeout(millis(remaining).max(1));
        match reader.read(&mut buf) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(SshError::Deadline(timeout));
            }
            Err(e) => return Err(SshError::Transport(e.to_string())),
        }
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn fingerprint(hash: &[u8]) -> String {
    let mut out = String::with_capacity(hash.len() * 3);
    for (i, byte) in hash.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}
