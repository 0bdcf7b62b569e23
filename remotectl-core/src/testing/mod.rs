//! In-memory stand-ins for the SSH session, the reachability probe and the
//! magic packet sender.
//!
//! Each double is a cheap `Clone` handle over shared state: hand one clone
//! to a [`Remote`](crate::remote::Remote) and keep another to script
//! responses and inspect what happened.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ConnectError, PingError, SshError};
use crate::ping::{PingReply, Pinger};
use crate::ssh::{ConnectParams, ExecOutput, SshSession};
use crate::wol::{MacAddress, WakeOnLan, WolError, WolResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Exact(String),
    Contains(String),
}

impl Matcher {
    fn matches(&self, command: &str) -> bool {
        match self {
            Self::Exact(expected) => command == expected,
            Self::Contains(fragment) => command.contains(fragment.as_str()),
        }
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    responses: Vec<(Matcher, ExecOutput)>,
    default_output: ExecOutput,
    connect_errors: VecDeque<ConnectError>,
    sticky_connect_error: Option<ConnectError>,
    fail_exec: bool,
    fail_exec_once: usize,
    exec_errors: VecDeque<SshError>,
    exec_delay: Option<Duration>,
    close_delay: Option<Duration>,
    open: bool,
    executed: Vec<String>,
    connect_count: usize,
    close_count: usize,
}

/// Scripted [`SshSession`]
///
/// Unmatched commands produce empty output with exit status 0, which is
/// what the health check expects from a live session.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    inner: Arc<Mutex<SessionInner>>,
}

impl MockSession {
    /// Creates a session that connects and answers every command with
    /// empty output
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut SessionInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    /// Answers `command` exactly with `stdout` lines and `exit_code`
    #[must_use]
    pub fn with_response(self, command: &str, stdout: &[&str], exit_code: i32) -> Self {
        self.set_response(Matcher::Exact(command.to_string()), stdout, exit_code);
        self
    }

    /// Answers any command containing `fragment`
    ///
    /// Exact responses take precedence.
    #[must_use]
    pub fn with_response_containing(self, fragment: &str, stdout: &[&str], exit_code: i32) -> Self {
        self.set_response(Matcher::Contains(fragment.to_string()), stdout, exit_code);
        self
    }

    /// Changes the answer for `command` on a live session
    pub fn respond(&self, command: &str, stdout: &[&str], exit_code: i32) {
        self.set_response(Matcher::Exact(command.to_string()), stdout, exit_code);
    }

    /// Changes the answer for commands containing `fragment`
    pub fn respond_containing(&self, fragment: &str, stdout: &[&str], exit_code: i32) {
        self.set_response(Matcher::Contains(fragment.to_string()), stdout, exit_code);
    }

    fn set_response(&self, matcher: Matcher, stdout: &[&str], exit_code: i32) {
        let output = ExecOutput {
            stdout: stdout.iter().map(ToString::to_string).collect(),
            stderr: Vec::new(),
            exit_code,
        };
        self.with_inner(|inner| {
            inner.responses.retain(|(m, _)| *m != matcher);
            inner.responses.push((matcher, output));
        });
    }

    /// Output for commands without a scripted response
    #[must_use]
    pub fn with_default_stdout(self, stdout: &[&str], exit_code: i32) -> Self {
        self.with_inner(|inner| {
            inner.default_output = ExecOutput {
                stdout: stdout.iter().map(ToString::to_string).collect(),
                stderr: Vec::new(),
                exit_code,
            };
        });
        self
    }

    /// Makes every connect attempt fail with `error`
    #[must_use]
    pub fn with_connect_error(self, error: ConnectError) -> Self {
        self.set_connect_error(Some(error));
        self
    }

    /// Sets or clears the error every connect attempt fails with
    pub fn set_connect_error(&self, error: Option<ConnectError>) {
        self.with_inner(|inner| inner.sticky_connect_error = error);
    }

    /// Makes only the next connect attempt fail with `error`
    pub fn fail_next_connect(&self, error: ConnectError) {
        self.with_inner(|inner| inner.connect_errors.push_back(error));
    }

    /// Makes exec fail with a transport error
    pub fn set_fail_exec(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_exec = fail);
    }

    /// Makes only the next exec fail with a transport error
    pub fn fail_next_exec(&self) {
        self.with_inner(|inner| inner.fail_exec_once += 1);
    }

    /// Makes only the next exec fail with `error`
    pub fn fail_next_exec_with(&self, error: SshError) {
        self.with_inner(|inner| inner.exec_errors.push_back(error));
    }

    /// Delays every exec by `delay`
    #[must_use]
    pub fn with_exec_delay(self, delay: Duration) -> Self {
        self.with_inner(|inner| inner.exec_delay = Some(delay));
        self
    }

    /// Delays every close by `delay`, after the session is marked closed
    #[must_use]
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.with_inner(|inner| inner.close_delay = Some(delay));
        self
    }

    /// Commands executed so far, in order
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.with_inner(|inner| inner.executed.clone())
    }

    /// How many times `command` was executed
    #[must_use]
    pub fn executed_count(&self, command: &str) -> usize {
        self.with_inner(|inner| inner.executed.iter().filter(|c| *c == command).count())
    }

    /// Number of connect attempts
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.with_inner(|inner| inner.connect_count)
    }

    /// Number of close calls
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.with_inner(|inner| inner.close_count)
    }

    /// Whether the session is currently open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.with_inner(|inner| inner.open)
    }
}

#[async_trait]
impl SshSession for MockSession {
    async fn connect(&mut self, _params: &ConnectParams) -> Result<(), ConnectError> {
        self.with_inner(|inner| {
            inner.connect_count += 1;
            let error = inner
                .connect_errors
                .pop_front()
                .or_else(|| inner.sticky_connect_error.clone());
            match error {
                Some(e) => Err(e),
                None => {
                    inner.open = true;
                    Ok(())
                }
            }
        })
    }

    async fn exec(&mut self, command: &str, _timeout: Duration) -> Result<ExecOutput, SshError> {
        let delay = self.with_inner(|inner| {
            inner.executed.push(command.to_string());
            inner.exec_delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_inner(|inner| {
            if !inner.open {
                return Err(SshError::NotOpen);
            }
            if let Some(error) = inner.exec_errors.pop_front() {
                return Err(error);
            }
            if inner.fail_exec_once > 0 {
                inner.fail_exec_once -= 1;
                return Err(SshError::Transport("broken pipe".to_string()));
            }
            if inner.fail_exec {
                return Err(SshError::Transport("connection reset by peer".to_string()));
            }
            Ok(inner
                .responses
                .iter()
                .filter(|(m, _)| matches!(m, Matcher::Exact(_)))
                .chain(inner.responses.iter().filter(|(m, _)| matches!(m, Matcher::Contains(_))))
                .find(|(m, _)| m.matches(command))
                .map(|(_, output)| output.clone())
                .unwrap_or_else(|| inner.default_output.clone()))
        })
    }

    async fn close(&mut self) -> Result<(), SshError> {
        let delay = self.with_inner(|inner| {
            inner.close_count += 1;
            inner.open = false;
            inner.close_delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct PingerInner {
    alive: AtomicBool,
    calls: AtomicUsize,
    error: Mutex<Option<PingError>>,
}

/// [`Pinger`] whose answer is set by the test
#[derive(Debug, Clone)]
pub struct MockPinger {
    inner: Arc<PingerInner>,
}

impl MockPinger {
    /// Creates a pinger reporting `alive`
    #[must_use]
    pub fn new(alive: bool) -> Self {
        Self {
            inner: Arc::new(PingerInner {
                alive: AtomicBool::new(alive),
                calls: AtomicUsize::new(0),
                error: Mutex::new(None),
            }),
        }
    }

    /// Changes the reported reachability
    pub fn set_alive(&self, alive: bool) {
        self.inner.alive.store(alive, Ordering::SeqCst);
    }

    /// Makes every probe fail with `error`, or clears it
    pub fn set_error(&self, error: Option<PingError>) {
        *self
            .inner
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of probes so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for MockPinger {
    async fn ping(
        &self,
        _host: &str,
        _count: u32,
        _timeout: Duration,
    ) -> Result<PingReply, PingError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .inner
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        Ok(PingReply {
            is_alive: self.inner.alive.load(Ordering::SeqCst),
        })
    }
}

/// [`WakeOnLan`] that records MAC addresses instead of sending packets
#[derive(Debug, Clone, Default)]
pub struct RecordingWakeOnLan {
    sent: Arc<Mutex<Vec<MacAddress>>>,
    error: Arc<Mutex<Option<WolError>>>,
}

impl RecordingWakeOnLan {
    /// Creates an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with `error`, or clears it
    pub fn set_error(&self, error: Option<WolError>) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// MAC addresses packets were sent for
    #[must_use]
    pub fn sent(&self) -> Vec<MacAddress> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl WakeOnLan for RecordingWakeOnLan {
    async fn send_magic_packet(&self, mac: &MacAddress) -> WolResult<()> {
        if let Some(error) = self
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*mac);
        Ok(())
    }
}
